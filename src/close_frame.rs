use crate::{CloseCode, error::ProtocolError};

/// The longest reason that fits in a control frame next to the 2-byte code.
pub(crate) const MAX_REASON_LEN: usize = 123;

/// The payload of a close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseFrame<'a> {
    /// The reason as a code.
    code: CloseCode,
    /// The reason as text string.
    reason: &'a str,
}

impl<'a> CloseFrame<'a> {
    /// Creates a new [`CloseFrame`].
    pub const fn new(code: CloseCode, reason: &'a str) -> Self {
        Self { code, reason }
    }

    /// Creates a new [`CloseFrame`] without a reason.
    pub const fn no_reason(code: CloseCode) -> Self {
        Self::new(code, "")
    }

    /// Returns the close code.
    pub const fn code(&self) -> CloseCode {
        self.code
    }

    /// Returns the reason as a string slice.
    pub const fn reason(&self) -> &'a str {
        self.reason
    }

    /// Returns the reason cut down to what fits in a control frame, on a char boundary.
    pub(crate) fn truncated_reason(&self) -> &'a str {
        if self.reason.len() <= MAX_REASON_LEN {
            return self.reason;
        }

        let mut end = MAX_REASON_LEN;

        while !self.reason.is_char_boundary(end) {
            end -= 1;
        }

        &self.reason[..end]
    }

    /// Validates the payload of a received close frame.
    ///
    /// An empty payload carries no code and yields `None`.
    pub fn parse(payload: &'a [u8]) -> Result<Option<Self>, ProtocolError> {
        match payload.len() {
            0 => Ok(None),
            1 => Err(ProtocolError::IncompleteCloseCode),
            _ => {
                let code = CloseCode::from_u16(u16::from_be_bytes([payload[0], payload[1]]));

                if !code.is_allowed() {
                    return Err(ProtocolError::InvalidCloseCode(code.into_u16()));
                }

                let reason = core::str::from_utf8(&payload[2..])
                    .map_err(|_| ProtocolError::InvalidCloseReason)?;

                Ok(Some(CloseFrame::new(code, reason)))
            }
        }
    }
}
