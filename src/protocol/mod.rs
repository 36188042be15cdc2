//! Protocol engine: HTTP head parsing, upgrade negotiation and frame decoding.
//!
//! Everything in this module is pure; sockets live in [`crate::connection`]
//! and [`crate::reactor`].

pub mod decoder;
pub mod frame;
pub mod handshake;
pub mod http;
pub mod mask;
pub mod opcode;

pub use decoder::FrameDecoder;
pub use frame::{Frame, FrameHeader};
pub use handshake::{
    HandshakeContext, WS_GUID, build_handshake_response, derive_accept_value, is_valid_upgrade,
};
pub use http::{HeadStatus, HttpRequest, HttpVersion, parse_head};
pub use mask::{apply_mask, apply_mask_fast};
pub use opcode::OpCode;
