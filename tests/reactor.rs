//! Socket-level tests: a real reactor on an ephemeral port driven one turn at
//! a time, with blocking std clients on the other end.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpStream};
use std::time::Duration;

use wsloop::config::DEFAULT_BODY;
use wsloop::protocol::http::BAD_REQUEST;
use wsloop::{ConnectionId, Config, Frame, FrameHandler, HttpRequest, Mode, OpCode, Reactor};

const UPGRADE: &[u8] = b"GET /websocket HTTP/1.1\r\n\
    Host: localhost:5010\r\n\
    Upgrade: websocket\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
    Sec-WebSocket-Version: 13\r\n\
    \r\n";

const RFC_ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";

/// Masked text frame carrying "hi" with key 01 02 03 04.
const MASKED_HI: [u8; 8] = [0x81, 0x82, 0x01, 0x02, 0x03, 0x04, 0x69, 0x6b];

#[derive(Default)]
struct Recorder {
    opened: Vec<ConnectionId>,
    upgraded: Vec<(ConnectionId, String)>,
    frames: Vec<(ConnectionId, OpCode, Vec<u8>)>,
    closed: Vec<ConnectionId>,
}

impl FrameHandler for Recorder {
    fn on_frame(&mut self, conn: ConnectionId, frame: &Frame) {
        self.frames.push((conn, frame.opcode, frame.payload().to_vec()));
    }

    fn on_open(&mut self, conn: ConnectionId, _peer: SocketAddr) {
        self.opened.push(conn);
    }

    fn on_upgrade(&mut self, conn: ConnectionId, request: &HttpRequest) {
        self.upgraded.push((conn, request.target.clone()));
    }

    fn on_close(&mut self, conn: ConnectionId) {
        self.closed.push(conn);
    }
}

fn start() -> (Reactor<Recorder>, SocketAddr) {
    let config = Config::default()
        .with_bind_addr(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)))
        .with_poll_interval(Duration::from_millis(10))
        .with_read_buffer_size(4096);
    let reactor = Reactor::bind(config, Recorder::default()).unwrap();
    let addr = reactor.local_addr().unwrap();
    (reactor, addr)
}

/// Turn the reactor until `done` holds, failing the test after a few seconds.
fn turn_until(reactor: &mut Reactor<Recorder>, done: impl Fn(&Reactor<Recorder>) -> bool) {
    for _ in 0..500 {
        if done(&*reactor) {
            return;
        }
        reactor.turn(Some(Duration::from_millis(10))).unwrap();
    }
    panic!("reactor did not reach the expected state");
}

/// Turn the reactor a few times without expecting anything in particular.
fn settle(reactor: &mut Reactor<Recorder>) {
    for _ in 0..5 {
        reactor.turn(Some(Duration::from_millis(10))).unwrap();
    }
}

fn connect(reactor: &mut Reactor<Recorder>, addr: SocketAddr) -> (TcpStream, ConnectionId) {
    let client = TcpStream::connect(addr).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let before = reactor.handler().opened.len();
    turn_until(reactor, |r| r.handler().opened.len() > before);
    let id = reactor.handler().opened[before];
    (client, id)
}

/// Read until the blank line that ends a response head.
fn read_head(client: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = client.read(&mut byte).unwrap();
        assert_eq!(n, 1, "connection closed mid-head: {:?}", String::from_utf8_lossy(&head));
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

fn upgraded(reactor: &mut Reactor<Recorder>, addr: SocketAddr) -> (TcpStream, ConnectionId) {
    let (mut client, id) = connect(reactor, addr);
    client.write_all(UPGRADE).unwrap();
    turn_until(reactor, |r| r.mode_of(id) == Some(Mode::WebSocketEstablished));
    let head = read_head(&mut client);
    assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"), "{head}");
    (client, id)
}

#[test]
fn test_upgrade_keeps_connection_open() {
    let (mut reactor, addr) = start();
    let (mut client, id) = connect(&mut reactor, addr);
    assert_eq!(reactor.mode_of(id), Some(Mode::AwaitingHttpHead));

    client.write_all(UPGRADE).unwrap();
    turn_until(&mut reactor, |r| !r.handler().upgraded.is_empty());

    let head = read_head(&mut client);
    assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(head.contains("Upgrade: websocket\r\n"));
    assert!(head.contains("Connection: Upgrade\r\n"));
    assert!(head.contains(&format!("Sec-WebSocket-Accept: {RFC_ACCEPT}\r\n")));

    settle(&mut reactor);
    assert_eq!(reactor.connection_count(), 1);
    assert_eq!(reactor.mode_of(id), Some(Mode::WebSocketEstablished));
    assert_eq!(reactor.handler().upgraded, vec![(id, "/websocket".to_string())]);
    assert!(reactor.handler().closed.is_empty());
}

#[test]
fn test_masked_frame_is_delivered() {
    let (mut reactor, addr) = start();
    let (mut client, id) = upgraded(&mut reactor, addr);

    client.write_all(&MASKED_HI).unwrap();
    turn_until(&mut reactor, |r| !r.handler().frames.is_empty());

    assert_eq!(
        reactor.handler().frames,
        vec![(id, OpCode::Text, b"hi".to_vec())]
    );
    assert_eq!(reactor.connection_count(), 1);
}

#[test]
fn test_frame_split_across_writes() {
    let (mut reactor, addr) = start();
    let (mut client, id) = upgraded(&mut reactor, addr);

    client.write_all(&MASKED_HI[..3]).unwrap();
    settle(&mut reactor);
    assert!(reactor.handler().frames.is_empty());

    client.write_all(&MASKED_HI[3..]).unwrap();
    turn_until(&mut reactor, |r| !r.handler().frames.is_empty());
    assert_eq!(
        reactor.handler().frames,
        vec![(id, OpCode::Text, b"hi".to_vec())]
    );
}

#[test]
fn test_two_frames_in_one_write() {
    let (mut reactor, addr) = start();
    let (mut client, _id) = upgraded(&mut reactor, addr);

    let mut wire = MASKED_HI.to_vec();
    wire.extend(Frame::binary(vec![7u8; 300]).masked_with([9, 8, 7, 6]).to_bytes());
    client.write_all(&wire).unwrap();
    turn_until(&mut reactor, |r| r.handler().frames.len() == 2);

    let frames = &reactor.handler().frames;
    assert_eq!(frames[0].2, b"hi");
    assert_eq!(frames[1].1, OpCode::Binary);
    assert_eq!(frames[1].2, vec![7u8; 300]);
}

#[test]
fn test_plain_request_gets_default_page_then_close() {
    let (mut reactor, addr) = start();
    let (mut client, id) = connect(&mut reactor, addr);

    client.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
    turn_until(&mut reactor, |r| r.handler().closed.contains(&id));

    let mut response = Vec::new();
    client.read_to_end(&mut response).unwrap();
    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n\r\n"));
    assert!(response.ends_with(DEFAULT_BODY));
    assert_eq!(reactor.connection_count(), 0);
    assert!(reactor.handler().upgraded.is_empty());
}

#[test]
fn test_invalid_upgrade_gets_bad_request() {
    let (mut reactor, addr) = start();
    let (mut client, id) = connect(&mut reactor, addr);

    client
        .write_all(b"GET /websocket HTTP/1.1\r\nUpgrade: websocket\r\n\r\n")
        .unwrap();
    turn_until(&mut reactor, |r| r.handler().closed.contains(&id));

    let mut response = Vec::new();
    client.read_to_end(&mut response).unwrap();
    assert_eq!(response, BAD_REQUEST);
    assert_eq!(reactor.mode_of(id), None);
}

#[test]
fn test_odd_version_outside_route_gets_default_page() {
    let (mut reactor, addr) = start();
    let (mut client, id) = connect(&mut reactor, addr);

    client.write_all(b"GET /index.html HTTP/x\r\n\r\n").unwrap();
    turn_until(&mut reactor, |r| r.handler().closed.contains(&id));

    let mut response = Vec::new();
    client.read_to_end(&mut response).unwrap();
    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n\r\n"));
    assert!(response.ends_with(DEFAULT_BODY));
}

#[test]
fn test_version_below_one_point_one_gets_bad_request() {
    let (mut reactor, addr) = start();
    let (mut client, id) = connect(&mut reactor, addr);

    let request = String::from_utf8(UPGRADE.to_vec())
        .unwrap()
        .replacen("HTTP/1.1", "HTTP/1.05", 1);
    client.write_all(request.as_bytes()).unwrap();
    turn_until(&mut reactor, |r| r.handler().closed.contains(&id));

    let mut response = Vec::new();
    client.read_to_end(&mut response).unwrap();
    assert_eq!(response, BAD_REQUEST);
    assert!(reactor.handler().upgraded.is_empty());
}

#[test]
fn test_malformed_request_line_gets_bad_request() {
    let (mut reactor, addr) = start();
    let (mut client, id) = connect(&mut reactor, addr);

    client.write_all(b"NONSENSE\r\n\r\n").unwrap();
    turn_until(&mut reactor, |r| r.handler().closed.contains(&id));

    let mut response = Vec::new();
    client.read_to_end(&mut response).unwrap();
    assert_eq!(response, BAD_REQUEST);
}

#[test]
fn test_peer_close_only_removes_that_connection() {
    let (mut reactor, addr) = start();
    let (mut first, first_id) = upgraded(&mut reactor, addr);
    let (second, second_id) = connect(&mut reactor, addr);

    second.shutdown(Shutdown::Both).unwrap();
    drop(second);
    turn_until(&mut reactor, |r| r.handler().closed.contains(&second_id));

    assert_eq!(reactor.connection_count(), 1);
    assert_eq!(reactor.mode_of(second_id), None);
    assert_eq!(reactor.mode_of(first_id), Some(Mode::WebSocketEstablished));

    first.write_all(&MASKED_HI).unwrap();
    turn_until(&mut reactor, |r| !r.handler().frames.is_empty());
    assert_eq!(reactor.handler().frames[0].0, first_id);
}

#[test]
fn test_unmasked_frame_closes_without_response() {
    let (mut reactor, addr) = start();
    let (mut client, id) = upgraded(&mut reactor, addr);

    client.write_all(&[0x81, 0x02, b'h', b'i']).unwrap();
    turn_until(&mut reactor, |r| r.handler().closed.contains(&id));

    let mut rest = Vec::new();
    client.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());
    assert!(reactor.handler().frames.is_empty());
}

#[test]
fn test_handshake_arriving_in_pieces() {
    let (mut reactor, addr) = start();
    let (mut client, id) = connect(&mut reactor, addr);

    for piece in UPGRADE.chunks(16) {
        client.write_all(piece).unwrap();
        client.flush().unwrap();
        settle(&mut reactor);
    }
    turn_until(&mut reactor, |r| r.mode_of(id) == Some(Mode::WebSocketEstablished));

    let head = read_head(&mut client);
    assert!(head.contains(&format!("Sec-WebSocket-Accept: {RFC_ACCEPT}\r\n")));
    assert_eq!(reactor.handler().upgraded.len(), 1);
}

#[test]
fn test_connections_get_distinct_ids() {
    let (mut reactor, addr) = start();
    let (_a, a) = connect(&mut reactor, addr);
    let (_b, b) = connect(&mut reactor, addr);
    let (_c, c) = connect(&mut reactor, addr);

    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_ne!(a, c);
    let mut ids = reactor.connection_ids();
    ids.sort();
    assert_eq!(ids, vec![a, b, c]);
}
