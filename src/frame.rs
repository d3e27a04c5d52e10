//! Frame headers and frame views.

use crate::OpCode;

/// The largest possible header: 2 bytes, 8 bytes of extended length and a 4-byte mask.
pub const MAX_HEADER_SIZE: usize = 14;

const FIN: u8 = 0b1000_0000;
const RSV: u8 = 0b0111_0000;
const OPCODE: u8 = 0b0000_1111;
const MASK: u8 = 0b1000_0000;
const LEN: u8 = 0b0111_1111;

/// The bit fields of a frame header, as they appear on the wire.
///
/// `opcode` is kept as the raw nibble so reserved opcodes survive a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Indicates if this is the final frame in a message.
    pub fin: bool,
    /// RSV1-3, in the low 3 bits.
    pub rsv: u8,
    /// The raw opcode nibble.
    pub opcode: u8,
    /// The masking key of the frame, if any.
    pub mask: Option<[u8; 4]>,
    /// The length of the payload.
    pub payload_len: u64,
}

impl FrameHeader {
    /// A final, unmasked header as the server sends it.
    pub const fn server(opcode: OpCode, payload_len: usize) -> Self {
        Self {
            fin: true,
            rsv: 0,
            opcode: opcode.into_u8(),
            mask: None,
            payload_len: payload_len as u64,
        }
    }

    /// The number of bytes [`FrameHeader::encode`] produces.
    pub const fn encoded_len(&self) -> usize {
        let extra = if self.payload_len < 126 {
            0
        } else if self.payload_len <= u16::MAX as u64 {
            2
        } else {
            8
        };

        let mask = if self.mask.is_some() { 4 } else { 0 };

        2 + extra + mask
    }

    /// Writes the header using the shortest length form.
    ///
    /// Returns the buffer and the number of bytes used.
    pub fn encode(&self) -> ([u8; MAX_HEADER_SIZE], usize) {
        let mut dst = [0u8; MAX_HEADER_SIZE];

        dst[0] = (self.fin as u8) << 7 | (self.rsv & 0b111) << 4 | (self.opcode & OPCODE);

        let len = self.payload_len;

        let mut pos = if len < 126 {
            dst[1] = len as u8;
            2
        } else if len <= u16::MAX as u64 {
            dst[1] = 126;
            dst[2..4].copy_from_slice(&(len as u16).to_be_bytes());
            4
        } else {
            dst[1] = 127;
            dst[2..10].copy_from_slice(&len.to_be_bytes());
            10
        };

        if let Some(mask) = self.mask {
            dst[1] |= MASK;
            dst[pos..pos + 4].copy_from_slice(&mask);
            pos += 4;
        }

        (dst, pos)
    }

    /// Reads a header from the start of `src`.
    ///
    /// Returns `None` if `src` does not hold the whole header yet.
    pub fn decode(src: &[u8]) -> Option<(Self, usize)> {
        let [b0, b1, rest @ ..] = src else {
            return None;
        };

        let (payload_len, rest) = match b1 & LEN {
            126 => {
                let (len, rest) = rest.split_first_chunk::<2>()?;
                (u16::from_be_bytes(*len) as u64, rest)
            }
            127 => {
                let (len, rest) = rest.split_first_chunk::<8>()?;
                (u64::from_be_bytes(*len), rest)
            }
            len => (len as u64, rest),
        };

        let mask = match b1 & MASK != 0 {
            true => Some(*rest.first_chunk::<4>()?),
            false => None,
        };

        let header = Self {
            fin: b0 & FIN != 0,
            rsv: (b0 & RSV) >> 4,
            opcode: b0 & OPCODE,
            mask,
            payload_len,
        };

        let len = src.len() - rest.len() + if mask.is_some() { 4 } else { 0 };

        Some((header, len))
    }
}

/// A received frame.
#[derive(Debug)]
pub struct Frame<'a> {
    /// Indicates if this is the final frame in a message.
    fin: bool,
    /// The opcode of the frame.
    opcode: OpCode,
    /// The payload of the frame.
    payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Creates a new `Frame` instance.
    pub const fn new(fin: bool, opcode: OpCode, payload: &'a [u8]) -> Self {
        Self {
            fin,
            opcode,
            payload,
        }
    }

    /// Returns whether this is the final frame in a message.
    pub const fn is_final(&self) -> bool {
        self.fin
    }

    /// Returns the opcode of the frame.
    pub const fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Returns the payload of the frame.
    pub const fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// A received frame whose payload may still be masked.
#[derive(Debug)]
pub(crate) struct FrameMut<'a> {
    fin: bool,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload: &'a mut [u8],
}

impl<'a> FrameMut<'a> {
    pub(crate) const fn new(
        fin: bool,
        opcode: OpCode,
        mask: Option<[u8; 4]>,
        payload: &'a mut [u8],
    ) -> Self {
        Self {
            fin,
            opcode,
            mask,
            payload,
        }
    }

    pub(crate) fn into_frame(self) -> Frame<'a> {
        Frame {
            fin: self.fin,
            opcode: self.opcode,
            payload: self.payload,
        }
    }

    pub(crate) fn unmask(&mut self) {
        if let Some(mask) = self.mask.take() {
            crate::mask::unmask(self.payload, mask);
        }
    }
}
