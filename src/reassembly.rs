use crate::{OpCode, error::ProtocolError, frame::Frame};

/// Joins fragmented data frames into messages.
///
/// Idle while `assembling` is `None`, otherwise holds the opcode of the
/// first frame and every payload received so far.
#[derive(Debug)]
pub(crate) struct Reassembler {
    assembling: Option<OpCode>,
    buffer: Vec<u8>,
    frames: usize,
    max_message_size: usize,
    max_frames: Option<usize>,
}

impl Reassembler {
    pub(crate) const fn new(max_message_size: usize, max_frames: Option<usize>) -> Self {
        Self {
            assembling: None,
            buffer: Vec::new(),
            frames: 0,
            max_message_size,
            max_frames,
        }
    }

    pub(crate) const fn is_assembling(&self) -> bool {
        self.assembling.is_some()
    }

    /// Feeds a data frame, calling `deliver` once a whole message is available.
    ///
    /// A final frame outside a fragmented message is delivered straight from
    /// its payload without being copied.
    pub(crate) fn push<F, E>(&mut self, frame: Frame<'_>, deliver: F) -> Result<(), E>
    where
        F: FnOnce(OpCode, &[u8]) -> Result<(), E>,
        E: From<ProtocolError>,
    {
        match (self.assembling, frame.opcode()) {
            (None, OpCode::Continuation) => Err(ProtocolError::UnexpectedContinuation.into()),
            (None, opcode) if frame.is_final() => deliver(opcode, frame.payload()),
            (None, opcode) => {
                self.append(frame.payload())?;
                self.assembling = Some(opcode);

                Ok(())
            }
            (Some(opcode), OpCode::Continuation) => {
                self.append(frame.payload())?;

                if !frame.is_final() {
                    return Ok(());
                }

                let result = deliver(opcode, &self.buffer);

                self.reset();

                result
            }
            (Some(_), _) => Err(ProtocolError::ExpectedContinuation.into()),
        }
    }

    fn append(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        if self.buffer.len() + payload.len() > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge);
        }

        if self.max_frames.is_some_and(|max| self.frames >= max) {
            return Err(ProtocolError::TooManyFrames);
        }

        self.buffer.extend_from_slice(payload);
        self.frames += 1;

        Ok(())
    }

    fn reset(&mut self) {
        self.assembling = None;
        self.buffer.clear();
        self.frames = 0;
    }
}
