//! Recording implementations of the transport and TLS traits for testing purposes.

use crate::transport::{SecureChannel, TlsContext, Transport, WriteStatus};

/// Records everything written to it.
#[derive(Debug, Default)]
pub struct MockTransport {
    written: Vec<u8>,
    queued: Vec<Vec<u8>>,
    corks: Vec<bool>,
    shutdowns: usize,
    /// Bytes accepted per `try_write`. `None` accepts everything.
    capacity: Option<usize>,
    would_block: bool,
    fail: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_would_block(mut self) -> Self {
        self.would_block = true;
        self
    }

    pub fn with_failing_writes(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
    }

    pub fn set_would_block(&mut self, would_block: bool) {
        self.would_block = would_block;
    }

    /// Bytes accepted by `try_write`.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Buffers handed to `queue_write`, oldest first.
    pub fn queued(&self) -> &[Vec<u8>] {
        &self.queued
    }

    /// Everything that reached the transport, in order, assuming queued writes complete.
    pub fn all(&self) -> Vec<u8> {
        let mut all = self.written.clone();

        for queued in &self.queued {
            all.extend_from_slice(queued);
        }

        all
    }

    pub fn take_written(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.written)
    }

    pub fn corks(&self) -> &[bool] {
        &self.corks
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdowns > 0
    }
}

impl Transport for MockTransport {
    type Error = ();

    fn try_write(&mut self, bufs: &[&[u8]]) -> Result<WriteStatus, Self::Error> {
        if self.fail {
            return Err(());
        }

        if self.would_block {
            return Ok(WriteStatus::WouldBlock);
        }

        let mut budget = self.capacity.unwrap_or(usize::MAX);
        let mut written = 0;

        for buf in bufs {
            let take = buf.len().min(budget);

            self.written.extend_from_slice(&buf[..take]);

            written += take;
            budget -= take;
        }

        Ok(WriteStatus::Written(written))
    }

    fn queue_write(&mut self, buf: Vec<u8>) -> Result<(), Self::Error> {
        if self.fail {
            return Err(());
        }

        self.queued.push(buf);

        Ok(())
    }

    fn set_cork(&mut self, corked: bool) {
        self.corks.push(corked);
    }

    fn shutdown(&mut self) {
        self.shutdowns += 1;
    }
}

const XOR_KEY: u8 = 0x5A;

/// A toy secure channel that XORs every byte.
///
/// A channel sends `HELLO` as its first record, like a TLS server answering a client hello.
#[derive(Debug, Default)]
pub struct XorChannel {
    ciphertext: Vec<u8>,
    greeted: bool,
}

impl XorChannel {
    pub const HELLO: &'static [u8] = b"\x16hello";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(bytes: &[u8]) -> Vec<u8> {
        bytes.iter().map(|byte| byte ^ XOR_KEY).collect()
    }
}

impl SecureChannel for XorChannel {
    type Error = ();

    fn decrypt(&mut self, ciphertext: &[u8], plaintext: &mut Vec<u8>) -> Result<(), Self::Error> {
        let mut ciphertext = ciphertext;

        if !self.greeted {
            // The first record is the client hello, it must start with a handshake byte.
            let (&first, rest) = ciphertext.split_first().ok_or(())?;

            if first != 0x16 {
                return Err(());
            }

            self.greeted = true;
            self.ciphertext.extend_from_slice(Self::HELLO);

            ciphertext = rest;
        }

        plaintext.extend(ciphertext.iter().map(|byte| byte ^ XOR_KEY));

        Ok(())
    }

    fn encrypt(&mut self, plaintext: &[u8]) -> Result<(), Self::Error> {
        self.ciphertext.extend(plaintext.iter().map(|byte| byte ^ XOR_KEY));

        Ok(())
    }

    fn take_ciphertext(&mut self, ciphertext: &mut Vec<u8>) {
        ciphertext.append(&mut self.ciphertext);
    }
}

/// Creates [`XorChannel`]s.
#[derive(Debug, Default)]
pub struct XorTls;

impl TlsContext for XorTls {
    type Channel = XorChannel;

    fn channel(&self) -> Result<Self::Channel, ()> {
        Ok(XorChannel::new())
    }
}
