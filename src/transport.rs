//! The collaborators at the byte boundary: the transport and the optional secure channel.

use core::{convert::Infallible, fmt::Debug};

/// The outcome of a non-blocking write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// This many bytes were accepted. May be fewer than offered, including zero.
    Written(usize),
    /// Nothing could be written right now.
    WouldBlock,
}

/// A duplex byte stream driven by an event loop.
///
/// The server never assumes a write completes synchronously. Bytes the transport
/// does not take from [`Transport::try_write`] are handed to
/// [`Transport::queue_write`] and their completion is reported back through
/// [`Server::write_completed`](crate::Server::write_completed).
pub trait Transport {
    /// The error reported by a failed write.
    type Error: Debug;

    /// Writes as much of `bufs`, in order, as possible without blocking.
    fn try_write(&mut self, bufs: &[&[u8]]) -> Result<WriteStatus, Self::Error>;

    /// Submits owned bytes to be written after every previously queued write.
    fn queue_write(&mut self, buf: Vec<u8>) -> Result<(), Self::Error>;

    /// Hints that small writes should be coalesced until uncorked.
    fn set_cork(&mut self, corked: bool) {
        let _ = corked;
    }

    /// Starts closing the transport.
    ///
    /// Completion is reported through [`Server::shutdown_completed`](crate::Server::shutdown_completed).
    fn shutdown(&mut self);
}

/// A TLS session layered between the transport and the server.
pub trait SecureChannel {
    /// The error reported for corrupt or unexpected records.
    type Error: Debug;

    /// Feeds received ciphertext, appending any plaintext it yields to `plaintext`.
    fn decrypt(&mut self, ciphertext: &[u8], plaintext: &mut Vec<u8>) -> Result<(), Self::Error>;

    /// Feeds plaintext to be sent.
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<(), Self::Error>;

    /// Moves any pending ciphertext, handshake records included, into `ciphertext`.
    fn take_ciphertext(&mut self, ciphertext: &mut Vec<u8>);
}

/// Creates a [`SecureChannel`] for each connection that opens with a TLS record.
pub trait TlsContext {
    /// The per-connection channel.
    type Channel: SecureChannel;

    /// Creates the channel for a new connection.
    fn channel(&self) -> Result<Self::Channel, <Self::Channel as SecureChannel>::Error>;
}

/// The absence of a TLS context. Every connection is clear text.
#[derive(Debug, Clone, Copy)]
pub enum NoTls {}

impl SecureChannel for NoTls {
    type Error = Infallible;

    fn decrypt(&mut self, _: &[u8], _: &mut Vec<u8>) -> Result<(), Self::Error> {
        match *self {}
    }

    fn encrypt(&mut self, _: &[u8]) -> Result<(), Self::Error> {
        match *self {}
    }

    fn take_ciphertext(&mut self, _: &mut Vec<u8>) {
        match *self {}
    }
}

impl TlsContext for NoTls {
    type Channel = NoTls;

    fn channel(&self) -> Result<Self::Channel, Infallible> {
        match *self {}
    }
}

/// Returns `true` if `byte` opens a TLS handshake record, or an SSLv2 hello.
pub(crate) const fn is_tls_handshake(byte: u8) -> bool {
    matches!(byte, 0x16 | 0x80)
}
