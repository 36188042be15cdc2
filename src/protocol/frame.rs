//! WebSocket frame codec (RFC 6455 Section 5.2).
//!
//! Decoding is a pure transformation from bytes to a [`Frame`]; nothing here
//! touches a socket.

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Length field value announcing a 16-bit extended length.
const LEN_16: u8 = 126;
/// Length field value announcing a 64-bit extended length.
const LEN_64: u8 = 127;

/// The fixed and variable-length header fields of a frame.
///
/// `header_len` counts everything before the payload: the two fixed bytes,
/// the 0/2/8 byte length extension and the 4 byte masking key if present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub mask: Option<[u8; 4]>,
    pub payload_len: u64,
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse a frame header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if the fixed bytes, the length extension or
    ///   the masking key are not all present yet
    /// - `Error::ReservedOpcode` if a reserved opcode is used
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let byte0 = buf[0];
        let byte1 = buf[1];

        let fin = (byte0 & 0x80) != 0;
        let rsv1 = (byte0 & 0x40) != 0;
        let rsv2 = (byte0 & 0x20) != 0;
        let rsv3 = (byte0 & 0x10) != 0;
        let opcode = OpCode::from_nibble(byte0 & 0x0F)?;

        let masked = (byte1 & 0x80) != 0;
        let length_field = byte1 & 0x7F;

        let extension_len = match length_field {
            LEN_16 => 2,
            LEN_64 => 8,
            _ => 0,
        };
        let mask_offset = 2 + extension_len;
        let header_len = if masked { mask_offset + 4 } else { mask_offset };

        if buf.len() < header_len {
            return Err(Error::IncompleteFrame {
                needed: header_len - buf.len(),
            });
        }

        let payload_len = match length_field {
            LEN_16 => u64::from(u16::from_be_bytes([buf[2], buf[3]])),
            LEN_64 => {
                let mut ext = [0u8; 8];
                ext.copy_from_slice(&buf[2..10]);
                u64::from_be_bytes(ext)
            }
            literal => u64::from(literal),
        };

        let mask = masked.then(|| {
            [
                buf[mask_offset],
                buf[mask_offset + 1],
                buf[mask_offset + 2],
                buf[mask_offset + 3],
            ]
        });

        Ok(Self {
            fin,
            rsv1,
            rsv2,
            rsv3,
            opcode,
            mask,
            payload_len,
            header_len,
        })
    }

    /// Total bytes the frame occupies on the wire, if addressable on this platform.
    #[must_use]
    pub fn frame_len(&self) -> Option<usize> {
        usize::try_from(self.payload_len)
            .ok()
            .and_then(|len| len.checked_add(self.header_len))
    }
}

/// A decoded WebSocket frame.
///
/// The payload is always stored unmasked; `mask` records the key that was on
/// the wire (or the key to apply when writing).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                  Masking key (if MASK set)                    |
/// +---------------------------------------------------------------+
/// |                         Payload data                          |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1. Must be 0 unless an extension is negotiated.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame type.
    pub opcode: OpCode,
    /// Masking key, present iff the MASK bit is set.
    pub mask: Option<[u8; 4]>,
    payload: Vec<u8>,
}

impl Frame {
    /// Create an unmasked frame with clear reserved bits.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            mask: None,
            payload,
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create a final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Set the masking key used by [`Frame::write`].
    #[must_use]
    pub fn masked_with(mut self, key: [u8; 4]) -> Self {
        self.mask = Some(key);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Payload length as it appears (or would appear) in the header.
    #[inline]
    #[must_use]
    pub fn payload_len(&self) -> u64 {
        self.payload.len() as u64
    }

    /// The unmasked payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Build a frame from a parsed header and its raw (still masked) payload.
    pub(crate) fn from_header(header: &FrameHeader, raw_payload: &[u8]) -> Self {
        let mut payload = raw_payload.to_vec();
        if let Some(key) = header.mask {
            apply_mask_fast(&mut payload, key);
        }
        Self {
            fin: header.fin,
            rsv1: header.rsv1,
            rsv2: header.rsv2,
            rsv3: header.rsv3,
            opcode: header.opcode,
            mask: header.mask,
            payload,
        }
    }

    /// Parse one frame from the start of `buf`.
    ///
    /// Returns the frame and the number of bytes it occupied. Bytes after the
    /// frame are left untouched.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if not enough data is available
    /// - `Error::ReservedOpcode` if a reserved opcode is used
    /// - `Error::FrameTooLarge` if the declared length cannot be addressed
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = FrameHeader::parse(buf)?;
        let total = header.frame_len().ok_or(Error::FrameTooLarge {
            size: header.payload_len,
            max: usize::MAX - header.header_len,
        })?;

        if buf.len() < total {
            return Err(Error::IncompleteFrame {
                needed: total - buf.len(),
            });
        }

        Ok((Self::from_header(&header, &buf[header.header_len..total]), total))
    }

    /// Decode a buffer that holds exactly one complete frame.
    ///
    /// # Errors
    ///
    /// Everything [`Frame::parse`] reports, plus `Error::InvalidFrame` if bytes
    /// remain after the frame.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (frame, consumed) = Self::parse(buf)?;
        if consumed != buf.len() {
            return Err(Error::InvalidFrame(format!(
                "{} trailing bytes after frame",
                buf.len() - consumed
            )));
        }
        Ok(frame)
    }

    /// Check the frame against RFC 6455 base framing rules.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if RSV bits are set without extension
    /// - `Error::FragmentedControlFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control frame payload > 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len()));
            }
        }

        Ok(())
    }

    /// Bytes needed to write this frame.
    #[must_use]
    pub fn wire_size(&self) -> usize {
        let len = self.payload.len();
        let extension = if len <= 125 {
            0
        } else if len <= usize::from(u16::MAX) {
            2
        } else {
            8
        };
        let mask = if self.mask.is_some() { 4 } else { 0 };
        2 + extension + mask + len
    }

    /// Write the frame into `buf`, masking the payload if a key is set.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidFrame` if the buffer is too small.
    pub fn write(&self, buf: &mut [u8]) -> Result<usize> {
        let total = self.wire_size();
        if buf.len() < total {
            return Err(Error::InvalidFrame(format!(
                "Buffer too small: need {} bytes, have {}",
                total,
                buf.len()
            )));
        }

        let mut byte0 = self.opcode.as_u8();
        for (set, bit) in [(self.fin, 0x80), (self.rsv1, 0x40), (self.rsv2, 0x20), (self.rsv3, 0x10)] {
            if set {
                byte0 |= bit;
            }
        }
        buf[0] = byte0;

        let len = self.payload.len();
        let mask_bit = if self.mask.is_some() { 0x80 } else { 0 };
        let mut offset = 2;
        if len <= 125 {
            buf[1] = mask_bit | len as u8;
        } else if let Ok(short) = u16::try_from(len) {
            buf[1] = mask_bit | LEN_16;
            buf[2..4].copy_from_slice(&short.to_be_bytes());
            offset = 4;
        } else {
            buf[1] = mask_bit | LEN_64;
            buf[2..10].copy_from_slice(&(len as u64).to_be_bytes());
            offset = 10;
        }

        if let Some(key) = self.mask {
            buf[offset..offset + 4].copy_from_slice(&key);
            offset += 4;
        }

        let payload = &mut buf[offset..offset + len];
        payload.copy_from_slice(&self.payload);
        if let Some(key) = self.mask {
            apply_mask_fast(payload, key);
        }

        Ok(total)
    }

    /// Encode the frame into a freshly allocated buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.wire_size()];
        let written = self.write(&mut buf).unwrap_or(0);
        buf.truncate(written);
        buf
    }
}
