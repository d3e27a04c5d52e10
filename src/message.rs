use crate::{CloseFrame, OpCode};

/// A WebSocket message, borrowed from the connection buffer on receive
/// or from the caller on send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message<'a> {
    /// A text message, always valid UTF-8.
    Text(&'a str),
    /// A binary WebSocket message
    Binary(&'a [u8]),
    /// A ping message with the specified payload
    ///
    /// The payload here must have a length of at most 125 bytes
    Ping(&'a [u8]),
    /// A pong message with the specified payload
    ///
    /// The payload here must have a length of at most 125 bytes
    Pong(&'a [u8]),
    /// A close message with the optional close frame.
    Close(Option<CloseFrame<'a>>),
}

impl<'a> Message<'a> {
    /// Indicates whether a message is a text message.
    pub fn is_text(&self) -> bool {
        matches!(*self, Message::Text(_))
    }

    /// Indicates whether a message is a binary message.
    pub fn is_binary(&self) -> bool {
        matches!(*self, Message::Binary(_))
    }

    /// Indicates whether a message is a control message.
    pub fn is_control(&self) -> bool {
        self.opcode().is_control()
    }

    /// The opcode this message is sent with.
    pub const fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
            Message::Ping(_) => OpCode::Ping,
            Message::Pong(_) => OpCode::Pong,
            Message::Close(_) => OpCode::Close,
        }
    }

    /// Get the length of the WebSocket message.
    pub const fn len(&self) -> usize {
        match self {
            Message::Text(payload) => payload.len(),
            Message::Binary(payload) => payload.len(),
            Message::Ping(payload) => payload.len(),
            Message::Pong(payload) => payload.len(),
            Message::Close(Some(frame)) => 2 + frame.reason().len(),
            Message::Close(None) => 0,
        }
    }

    /// Returns true if the WebSocket message has no content.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A received data message.
    ///
    /// Text payloads must already be validated.
    pub(crate) fn data(opcode: OpCode, payload: &'a [u8]) -> Option<Self> {
        match opcode {
            OpCode::Text => core::str::from_utf8(payload).ok().map(Message::Text),
            OpCode::Binary => Some(Message::Binary(payload)),
            _ => None,
        }
    }
}
