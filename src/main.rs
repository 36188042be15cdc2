use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error};

use wsloop::config::{DEFAULT_PORT, DEFAULT_WEBSOCKET_PATH};
use wsloop::{Config, Limits, LogHandler, Reactor};

/// Serve a static page over HTTP/1.1 and upgrade one route to WebSocket.
#[derive(Debug, Parser)]
#[command(name = "wsloop", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    addr: IpAddr,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Request target that is upgraded to WebSocket.
    #[arg(long, default_value = DEFAULT_WEBSOCKET_PATH)]
    path: String,

    /// Longest wait for readiness before the loop wakes up anyway.
    #[arg(long, default_value_t = 5000)]
    poll_interval_ms: u64,

    /// Largest request head accepted, in bytes.
    #[arg(long, default_value_t = Limits::default().max_head_size)]
    max_head_size: usize,

    /// Largest frame payload accepted, in bytes.
    #[arg(long, default_value_t = Limits::default().max_frame_size)]
    max_frame_size: usize,

    /// Accept frames that arrive without a masking key.
    #[arg(long)]
    accept_unmasked: bool,

    /// Maximum log level (error, warn, info, debug, trace).
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,
}

impl Args {
    fn config(&self) -> Config {
        Config::default()
            .with_bind_addr(SocketAddr::new(self.addr, self.port))
            .with_websocket_path(self.path.clone())
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_accept_unmasked_frames(self.accept_unmasked)
            .with_limits(Limits::new(self.max_head_size, self.max_frame_size))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .init();

    let mut reactor = match Reactor::bind(args.config(), LogHandler) {
        Ok(reactor) => reactor,
        Err(e) => {
            error!(error = %e, "failed to start server");
            return ExitCode::FAILURE;
        }
    };

    match reactor.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "event loop stopped");
            ExitCode::FAILURE
        }
    }
}
