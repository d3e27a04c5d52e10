//! Server configuration.

use crate::frame::MAX_HEADER_SIZE;

/// Limits and policies applied to every connection of a [`Server`](crate::Server).
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// The largest message, in bytes, after reassembly.
    pub max_message_size: usize,
    /// The most frames a single message may be split into. `None` is unlimited.
    pub max_frames_per_message: Option<usize>,
    /// The largest request block accepted before the handshake completes.
    pub max_handshake_size: usize,
    /// The number of header slots handed to the request parser.
    pub max_headers: usize,
    /// Whether unmasked client frames close the connection with `1002`.
    pub require_masked_frames: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl Options {
    /// The default options.
    pub const fn new() -> Self {
        Self {
            max_message_size: 16 * 1024,
            max_frames_per_message: None,
            max_handshake_size: 16 * 1024,
            max_headers: 64,
            require_masked_frames: true,
        }
    }

    /// Sets [`Options::max_message_size`].
    pub const fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Sets [`Options::max_frames_per_message`].
    pub const fn with_max_frames_per_message(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames_per_message = max_frames;
        self
    }

    /// Sets [`Options::max_handshake_size`].
    pub const fn with_max_handshake_size(mut self, max_handshake_size: usize) -> Self {
        self.max_handshake_size = max_handshake_size;
        self
    }

    /// Sets [`Options::max_headers`].
    pub const fn with_max_headers(mut self, max_headers: usize) -> Self {
        self.max_headers = max_headers;
        self
    }

    /// Sets [`Options::require_masked_frames`].
    pub const fn with_require_masked_frames(mut self, require_masked_frames: bool) -> Self {
        self.require_masked_frames = require_masked_frames;
        self
    }

    /// The most plaintext a connection holds once the handshake completed.
    pub(crate) const fn frame_buffer_limit(&self) -> usize {
        self.max_message_size.saturating_add(MAX_HEADER_SIZE)
    }

    /// The capacity each connection buffer is allocated with.
    pub(crate) const fn buffer_capacity(&self) -> usize {
        let frames = self.frame_buffer_limit();

        if frames > self.max_handshake_size {
            frames
        } else {
            self.max_handshake_size
        }
    }
}
