//! Incremental frame decoding over a connection's receive buffer.
//!
//! A frame may arrive split across any number of reads, and one read may
//! carry several frames. The decoder keeps the header of the frame currently
//! being assembled so the header is parsed once, and surfaces the frame only
//! when its whole payload is buffered. Bytes of a partial frame stay in the
//! buffer.

use bytes::{Buf, BytesMut};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::frame::{Frame, FrameHeader};

/// Per-connection frame decoder.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    limits: Limits,
    accept_unmasked_frames: bool,
    pending: Option<FrameHeader>,
}

impl FrameDecoder {
    /// Create a decoder enforcing `limits` and requiring masked client frames.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            accept_unmasked_frames: false,
            pending: None,
        }
    }

    /// Accept unmasked frames (not RFC 6455 compliant for a server).
    #[must_use]
    pub fn with_accept_unmasked(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Whether a header has been parsed for a frame whose payload is still arriving.
    #[must_use]
    pub fn has_pending_header(&self) -> bool {
        self.pending.is_some()
    }

    /// Try to take one complete frame off the front of `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed; nothing is consumed in that case.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedOpcode` / `Error::ReservedBitsSet` for header violations
    /// - `Error::UnmaskedClientFrame` if masking is required and absent
    /// - `Error::FrameTooLarge` if the declared length exceeds `max_frame_size`
    /// - `Error::FragmentedControlFrame` / `Error::ControlFrameTooLarge`
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        let header = match self.pending {
            Some(header) => header,
            None => match FrameHeader::parse(buf) {
                Ok(header) => {
                    self.check_header(&header)?;
                    self.pending = Some(header);
                    header
                }
                Err(Error::IncompleteFrame { .. }) => return Ok(None),
                Err(e) => return Err(e),
            },
        };

        // check_header already bounded payload_len by max_frame_size
        let total = header.frame_len().ok_or(Error::FrameTooLarge {
            size: header.payload_len,
            max: self.limits.max_frame_size,
        })?;
        if buf.len() < total {
            buf.reserve(total - buf.len());
            return Ok(None);
        }

        let frame = Frame::from_header(&header, &buf[header.header_len..total]);
        buf.advance(total);
        self.pending = None;

        frame.validate()?;
        Ok(Some(frame))
    }

    /// Drain every complete frame currently buffered.
    ///
    /// # Errors
    ///
    /// Stops at the first frame that fails [`FrameDecoder::decode`].
    pub fn decode_all(&mut self, buf: &mut BytesMut) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.decode(buf)? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn check_header(&self, header: &FrameHeader) -> Result<()> {
        if header.mask.is_none() && !self.accept_unmasked_frames {
            return Err(Error::UnmaskedClientFrame);
        }
        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(Error::ReservedBitsSet);
        }
        self.limits.check_frame_size(header.payload_len)
    }
}
