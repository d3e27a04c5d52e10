//! Error types.

use crate::{CloseCode, ConnectionId};

/// A frame header that must not be accepted.
#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    /// RSV1, RSV2 or RSV3 is set. No extension is ever negotiated.
    #[error("Reserved bit used")]
    ReservedBitsNotZero,
    /// The opcode is reserved.
    #[error("Unknown op code")]
    InvalidOpCode,
    /// A client frame without a masking key.
    #[error("Clients must mask their payload")]
    Unmasked,
    /// A control frame without the FIN bit.
    #[error("Control op codes can't be fragmented")]
    ControlFrameFragmented,
    /// A control frame with more than 125 bytes of payload.
    #[error("Control op codes can't be more than 125 bytes")]
    ControlFrameTooLarge,
    /// The declared payload length exceeds the maximum message size.
    #[error("Message too large")]
    PayloadTooLarge,
}

impl FrameDecodeError {
    /// The close code sent to the peer for this violation.
    pub const fn close_code(&self) -> CloseCode {
        match self {
            Self::PayloadTooLarge => CloseCode::Size,
            _ => CloseCode::Protocol,
        }
    }
}

/// Reasons for rejecting an upgrade request with `400 Bad Request`.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The request line lacks the spaces around the path.
    #[error("Malformed request line")]
    MalformedRequestLine,
    /// A header line has no colon.
    #[error("Malformed header line")]
    MalformedHeader,
    /// More header lines than [`Options::max_headers`](crate::Options::max_headers).
    #[error("Too many headers")]
    TooManyHeaders,
    /// The request block is not valid UTF-8.
    #[error("Request is not UTF-8")]
    InvalidEncoding,
    /// The `Upgrade` header names something other than `websocket`.
    #[error("Unsupported upgrade")]
    InvalidUpgrade,
    /// Upgrades must be `GET`.
    #[error("Wrong http method")]
    WrongHttpMethod,
    /// `Connection` is missing or does not contain the `upgrade` token.
    #[error("Missing or invalid connection header")]
    MissingOrInvalidConnection,
    /// `Sec-WebSocket-Version` is missing.
    #[error("Missing sec-websocket-version header")]
    MissingSecVersion,
    /// `Sec-WebSocket-Key` is missing.
    #[error("Missing sec-websocket-key header")]
    MissingSecKey,
}

/// A violation detected after the handshake. Always fatal for the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame header was rejected.
    #[error(transparent)]
    Frame(#[from] FrameDecodeError),
    /// A continuation frame arrived with no fragmented message in progress.
    #[error("Unexpected continuation frame")]
    UnexpectedContinuation,
    /// A new data frame arrived while a fragmented message was in progress.
    #[error("Expected continuation frame")]
    ExpectedContinuation,
    /// The reassembled message would exceed the maximum message size.
    #[error("Message too large")]
    MessageTooLarge,
    /// The message is split into more frames than allowed.
    #[error("Too many frames in message")]
    TooManyFrames,
    /// A close frame with a 1-byte payload.
    #[error("Incomplete close code")]
    IncompleteCloseCode,
    /// A close frame carrying a code that must not be sent.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),
    /// The close reason is not valid UTF-8.
    #[error("Close reason is not UTF-8")]
    InvalidCloseReason,
    /// A text message is not valid UTF-8.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUTF8,
}

impl ProtocolError {
    /// The close code sent to the peer for this violation.
    pub const fn close_code(&self) -> CloseCode {
        match self {
            Self::Frame(err) => err.close_code(),
            Self::MessageTooLarge | Self::TooManyFrames => CloseCode::Size,
            Self::InvalidUTF8 => CloseCode::Invalid,
            _ => CloseCode::Protocol,
        }
    }
}

/// Errors returned to the application when driving a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The id does not name a connection of this server, or the slot was reclaimed.
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),
    /// The connection is closing or its transport was released.
    #[error("Connection closed")]
    ConnectionClosed,
    /// Ping, pong and close payloads are limited to 125 bytes.
    #[error("Control frame payload too large")]
    ControlFrameTooLarge,
    /// 1004, 1005, 1006, 1015 and codes outside `1000..5000` never go on the wire.
    #[error("Close code {0} must not be sent")]
    ReservedCloseCode(u16),
}
