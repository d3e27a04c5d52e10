//! Policy-aware decoding of client frames.

use crate::{
    OpCode,
    error::FrameDecodeError,
    frame::{Frame, FrameHeader, FrameMut},
};

const MAX_CONTROL_PAYLOAD: u8 = 125;

/// Decodes client frames out of an accumulation buffer.
///
/// Holds no state between calls, every call parses from the start of `src`.
#[derive(Debug, Clone, Copy)]
pub struct FramesCodec {
    require_mask: bool,
    max_payload_len: usize,
}

impl FramesCodec {
    /// Creates a codec rejecting payloads longer than `max_payload_len`.
    pub const fn new(max_payload_len: usize) -> Self {
        Self {
            require_mask: true,
            max_payload_len,
        }
    }

    /// Sets whether unmasked frames are a protocol violation.
    pub const fn with_require_mask(mut self, require_mask: bool) -> Self {
        self.require_mask = require_mask;
        self
    }

    /// Decodes and unmasks the frame at the start of `src`.
    ///
    /// Returns `Ok(None)` while the frame is incomplete, otherwise the frame
    /// and the number of bytes it occupies. Header violations are reported as
    /// soon as the bytes carrying them are available.
    pub fn decode<'buf>(
        &self,
        src: &'buf mut [u8],
    ) -> Result<Option<(Frame<'buf>, usize)>, FrameDecodeError> {
        if src.len() < 2 {
            return Ok(None);
        }

        let fin = src[0] & 0b1000_0000 != 0;

        if src[0] & 0b0111_0000 != 0 {
            return Err(FrameDecodeError::ReservedBitsNotZero);
        }

        if self.require_mask && src[1] & 0b1000_0000 == 0 {
            return Err(FrameDecodeError::Unmasked);
        }

        let raw_opcode = src[0] & 0b0000_1111;

        if OpCode::is_control_raw(raw_opcode) {
            if !fin {
                return Err(FrameDecodeError::ControlFrameFragmented);
            }

            // 126 and 127 announce an extended length.
            if src[1] & 0x7F > MAX_CONTROL_PAYLOAD {
                return Err(FrameDecodeError::ControlFrameTooLarge);
            }
        }

        let Some((header, header_len)) = FrameHeader::decode(src) else {
            return Ok(None);
        };

        let payload_len = usize::try_from(header.payload_len)
            .ok()
            .filter(|len| *len <= self.max_payload_len)
            .ok_or(FrameDecodeError::PayloadTooLarge)?;

        let opcode = OpCode::try_from(raw_opcode)?;

        let end = header_len + payload_len;

        if src.len() < end {
            return Ok(None);
        }

        let mut frame = FrameMut::new(fin, opcode, header.mask, &mut src[header_len..end]);

        frame.unmask();

        Ok(Some((frame.into_frame(), end)))
    }
}
