//! The write side of a connection.

use core::{
    any::Any,
    ops::{Deref, DerefMut},
};

use crate::{
    CloseFrame, ConnectionId, Message, OpCode,
    error::{Error, ProtocolError},
    frame::FrameHeader,
    transport::{SecureChannel, Transport, WriteStatus},
};

const MAX_CONTROL_PAYLOAD: usize = 125;

/// Owns the transport and the secure channel of one connection.
///
/// Every write is tried without blocking first. Whatever the transport does not
/// take is copied and queued. While a queued write is pending, later writes are
/// queued behind it so bytes leave in submission order.
#[derive(Debug)]
pub(crate) struct Outbound<T, S> {
    id: ConnectionId,
    transport: T,
    secure: Option<S>,
    /// Cleared once the transport is being shut down.
    live: bool,
    closing: bool,
    cork_depth: usize,
    corked: bool,
    queued: usize,
    user_data: Option<Box<dyn Any>>,
}

impl<T, S> Outbound<T, S>
where
    T: Transport,
    S: SecureChannel,
{
    pub(crate) const fn new(id: ConnectionId, transport: T) -> Self {
        Self {
            id,
            transport,
            secure: None,
            live: true,
            closing: false,
            cork_depth: 0,
            corked: false,
            queued: 0,
            user_data: None,
        }
    }

    pub(crate) const fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) const fn is_live(&self) -> bool {
        self.live
    }

    pub(crate) const fn is_closing(&self) -> bool {
        self.closing
    }

    pub(crate) const fn is_secure(&self) -> bool {
        self.secure.is_some()
    }

    pub(crate) const fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub(crate) fn secure_mut(&mut self) -> Option<&mut S> {
        self.secure.as_mut()
    }

    pub(crate) fn set_secure(&mut self, channel: S) {
        self.secure = Some(channel);
    }

    pub(crate) fn user_data_mut(&mut self) -> &mut Option<Box<dyn Any>> {
        &mut self.user_data
    }

    pub(crate) fn into_parts(self) -> (T, Option<Box<dyn Any>>) {
        (self.transport, self.user_data)
    }

    /// Writes plaintext, through the secure channel if there is one.
    pub(crate) fn write(&mut self, bufs: &[&[u8]]) {
        if !self.live {
            return;
        }

        let Some(channel) = self.secure.as_mut() else {
            return self.write_raw(bufs);
        };

        for buf in bufs {
            if let Err(err) = channel.encrypt(buf) {
                tracing::warn!(connection = %self.id, ?err, "Failed to encrypt");

                return self.destroy();
            }
        }

        self.flush_secure();
    }

    /// Drains the ciphertext the secure channel produced so far.
    pub(crate) fn flush_secure(&mut self) {
        let Some(channel) = self.secure.as_mut() else {
            return;
        };

        let mut ciphertext = Vec::new();

        channel.take_ciphertext(&mut ciphertext);

        if !ciphertext.is_empty() {
            self.write_raw(&[&ciphertext]);
        }
    }

    fn write_raw(&mut self, bufs: &[&[u8]]) {
        if !self.live {
            return;
        }

        let total: usize = bufs.iter().map(|buf| buf.len()).sum();

        if total == 0 {
            return;
        }

        let written = match self.queued {
            0 => match self.transport.try_write(bufs) {
                Ok(WriteStatus::Written(written)) => written.min(total),
                Ok(WriteStatus::WouldBlock) => 0,
                Err(err) => {
                    tracing::warn!(connection = %self.id, ?err, "Failed to write");

                    return self.destroy();
                }
            },
            _ => 0,
        };

        if written == total {
            return;
        }

        let mut remainder = Vec::with_capacity(total - written);
        let mut skip = written;

        for buf in bufs {
            if skip >= buf.len() {
                skip -= buf.len();

                continue;
            }

            remainder.extend_from_slice(&buf[skip..]);
            skip = 0;
        }

        tracing::trace!(connection = %self.id, len = remainder.len(), "Queueing write");

        match self.transport.queue_write(remainder) {
            Ok(()) => self.queued += 1,
            Err(err) => {
                tracing::warn!(connection = %self.id, ?err, "Failed to queue write");

                self.destroy();
            }
        }
    }

    /// Reports the completion of the oldest queued write.
    pub(crate) fn write_completed(&mut self, result: Result<(), T::Error>) {
        if !self.live {
            return;
        }

        self.queued = self.queued.saturating_sub(1);

        if let Err(err) = result {
            tracing::warn!(connection = %self.id, ?err, "Queued write failed");

            self.destroy();
        }
    }

    /// Writes a single final frame made of `head` followed by `tail`.
    pub(crate) fn send_frame(&mut self, opcode: OpCode, head: &[u8], tail: &[u8]) {
        let (header, header_len) = FrameHeader::server(opcode, head.len() + tail.len()).encode();

        self.write(&[&header[..header_len], head, tail]);
    }

    pub(crate) fn send(&mut self, message: Message<'_>) -> Result<(), Error> {
        if !self.live || self.closing {
            return Err(Error::ConnectionClosed);
        }

        match message {
            Message::Text(payload) => self.send_frame(OpCode::Text, payload.as_bytes(), &[]),
            Message::Binary(payload) => self.send_frame(OpCode::Binary, payload, &[]),
            Message::Ping(payload) | Message::Pong(payload)
                if payload.len() > MAX_CONTROL_PAYLOAD =>
            {
                return Err(Error::ControlFrameTooLarge);
            }
            Message::Ping(payload) => self.send_frame(OpCode::Ping, payload, &[]),
            Message::Pong(payload) => self.send_frame(OpCode::Pong, payload, &[]),
            Message::Close(frame) => return self.close(frame),
        }

        Ok(())
    }

    /// Sends a close frame and shuts the transport down without waiting for the reply.
    pub(crate) fn close(&mut self, frame: Option<CloseFrame<'_>>) -> Result<(), Error> {
        if !self.live || self.closing {
            return Err(Error::ConnectionClosed);
        }

        if let Some(code) = frame.map(|frame| frame.code()).filter(|code| !code.is_allowed()) {
            return Err(Error::ReservedCloseCode(code.into_u16()));
        }

        self.closing = true;

        match frame {
            Some(frame) => {
                let code = frame.code().into_u16().to_be_bytes();

                tracing::debug!(connection = %self.id, code = frame.code().into_u16(), "Closing");

                self.send_frame(OpCode::Close, &code, frame.truncated_reason().as_bytes());
            }
            None => {
                tracing::debug!(connection = %self.id, "Closing");

                self.send_frame(OpCode::Close, &[], &[]);
            }
        }

        self.destroy();

        Ok(())
    }

    /// Answers a valid close frame with the same payload.
    pub(crate) fn echo_close(&mut self, payload: &[u8]) {
        tracing::debug!(connection = %self.id, "Peer closed");

        self.closing = true;
        self.send_frame(OpCode::Close, payload, &[]);
        self.destroy();
    }

    /// Closes with the code mapped from `err`.
    pub(crate) fn fail(&mut self, err: ProtocolError) {
        let code = err.close_code();

        tracing::warn!(connection = %self.id, code = code.into_u16(), %err, "Protocol violation");

        let reason = err.to_string();

        let _ = self.close(Some(CloseFrame::new(code, &reason)));
    }

    /// Starts shutting the transport down. Further calls do nothing.
    pub(crate) fn destroy(&mut self) {
        if !self.live {
            return;
        }

        self.live = false;

        if self.corked {
            self.corked = false;
            self.transport.set_cork(false);
        }

        tracing::debug!(connection = %self.id, "Shutting down");

        self.transport.shutdown();
    }

    /// Corks the transport until the returned guard and every other guard are dropped.
    pub(crate) fn cork(&mut self) -> Corked<'_, T, S> {
        if self.cork_depth == 0 && self.live {
            self.corked = true;
            self.transport.set_cork(true);
        }

        self.cork_depth += 1;

        Corked { outbound: self }
    }

    fn uncork(&mut self) {
        self.cork_depth = self.cork_depth.saturating_sub(1);

        if self.cork_depth == 0 && self.corked {
            self.corked = false;
            self.transport.set_cork(false);
        }
    }
}

/// Keeps the transport corked while alive.
#[derive(Debug)]
pub(crate) struct Corked<'a, T, S>
where
    T: Transport,
    S: SecureChannel,
{
    outbound: &'a mut Outbound<T, S>,
}

impl<T, S> Deref for Corked<'_, T, S>
where
    T: Transport,
    S: SecureChannel,
{
    type Target = Outbound<T, S>;

    fn deref(&self) -> &Self::Target {
        self.outbound
    }
}

impl<T, S> DerefMut for Corked<'_, T, S>
where
    T: Transport,
    S: SecureChannel,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.outbound
    }
}

impl<T, S> Drop for Corked<'_, T, S>
where
    T: Transport,
    S: SecureChannel,
{
    fn drop(&mut self) {
        self.outbound.uncork();
    }
}

/// The object-safe view of an [`Outbound`] handed to callbacks.
pub(crate) trait Outlet {
    fn id(&self) -> ConnectionId;

    fn send(&mut self, message: Message<'_>) -> Result<(), Error>;

    fn close(&mut self, frame: Option<CloseFrame<'_>>) -> Result<(), Error>;

    fn destroy(&mut self);

    fn is_secure(&self) -> bool;

    fn is_closing(&self) -> bool;

    fn user_data(&mut self) -> &mut Option<Box<dyn Any>>;
}

impl<T, S> Outlet for Outbound<T, S>
where
    T: Transport,
    S: SecureChannel,
{
    fn id(&self) -> ConnectionId {
        Outbound::id(self)
    }

    fn send(&mut self, message: Message<'_>) -> Result<(), Error> {
        Outbound::send(self, message)
    }

    fn close(&mut self, frame: Option<CloseFrame<'_>>) -> Result<(), Error> {
        Outbound::close(self, frame)
    }

    fn destroy(&mut self) {
        Outbound::destroy(self)
    }

    fn is_secure(&self) -> bool {
        Outbound::is_secure(self)
    }

    fn is_closing(&self) -> bool {
        self.closing || !self.live
    }

    fn user_data(&mut self) -> &mut Option<Box<dyn Any>> {
        self.user_data_mut()
    }
}
