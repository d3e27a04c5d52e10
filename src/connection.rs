//! The per-connection state machine.

use core::any::Any;

use crate::{
    CloseFrame, ConnectionId, Message, OpCode,
    codec::FramesCodec,
    error::ProtocolError,
    frame::Frame,
    handler::{Handler, Socket},
    handshake::{self, Handshake, HttpResponse},
    options::Options,
    outbound::Outbound,
    reassembly::Reassembler,
    transport::{SecureChannel, TlsContext, Transport, is_tls_handshake},
};

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing has been received yet.
    AwaitingFirstByte,
    /// Waiting for a complete upgrade request.
    Handshaking,
    /// Exchanging frames.
    Open,
    /// A close frame was sent and the transport is shutting down.
    Closing,
    /// The transport is shutting down without a close handshake.
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AwaitingFirstByte,
    Handshaking,
    Open,
}

/// What is left of a released connection.
pub(crate) struct Parts<T> {
    pub(crate) registered: bool,
    pub(crate) upgraded: bool,
    pub(crate) transport: T,
    pub(crate) user_data: Option<Box<dyn Any>>,
}

#[derive(Debug)]
pub(crate) struct Connection<T, S> {
    stage: Stage,
    /// Plaintext received and not consumed yet. Never grows past its initial capacity.
    buffer: Vec<u8>,
    codec: FramesCodec,
    reassembler: Reassembler,
    outbound: Outbound<T, S>,
    /// Counted as a member of the server.
    registered: bool,
}

impl<T, S> Connection<T, S>
where
    T: Transport,
    S: SecureChannel,
{
    pub(crate) fn new(id: ConnectionId, transport: T, options: &Options) -> Self {
        Self {
            stage: Stage::AwaitingFirstByte,
            buffer: Vec::with_capacity(options.buffer_capacity()),
            codec: FramesCodec::new(options.max_message_size)
                .with_require_mask(options.require_masked_frames),
            reassembler: Reassembler::new(
                options.max_message_size,
                options.max_frames_per_message,
            ),
            outbound: Outbound::new(id, transport),
            registered: true,
        }
    }

    pub(crate) fn state(&self) -> State {
        if self.outbound.is_closing() {
            return State::Closing;
        }

        if !self.outbound.is_live() {
            return State::Destroyed;
        }

        match self.stage {
            Stage::AwaitingFirstByte => State::AwaitingFirstByte,
            Stage::Handshaking => State::Handshaking,
            Stage::Open => State::Open,
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.outbound.is_live()
    }

    pub(crate) fn is_upgraded(&self) -> bool {
        self.stage == Stage::Open
    }

    pub(crate) const fn outbound(&self) -> &Outbound<T, S> {
        &self.outbound
    }

    pub(crate) fn outbound_mut(&mut self) -> &mut Outbound<T, S> {
        &mut self.outbound
    }

    /// Returns `true` the first time it is called after the transport stopped being live.
    pub(crate) fn unregister(&mut self) -> bool {
        if self.registered && !self.outbound.is_live() {
            self.registered = false;

            return true;
        }

        false
    }

    pub(crate) fn into_parts(self) -> Parts<T> {
        let upgraded = self.is_upgraded();
        let (transport, user_data) = self.outbound.into_parts();

        Parts {
            registered: self.registered,
            upgraded,
            transport,
            user_data,
        }
    }

    pub(crate) fn destroy(&mut self) {
        self.outbound.destroy();
        self.buffer.clear();
    }

    /// Handles bytes read from the transport.
    pub(crate) fn received<H, C>(
        &mut self,
        bytes: &[u8],
        handler: &mut H,
        options: &Options,
        tls: Option<&C>,
    ) where
        H: Handler,
        C: TlsContext<Channel = S>,
    {
        if !self.outbound.is_live() {
            return;
        }

        if self.stage == Stage::AwaitingFirstByte {
            let Some(&first) = bytes.first() else {
                return;
            };

            if let Some(tls) = tls.filter(|_| is_tls_handshake(first)) {
                match tls.channel() {
                    Ok(channel) => {
                        tracing::debug!(connection = %self.outbound.id(), "TLS detected");

                        self.outbound.set_secure(channel);
                    }
                    Err(err) => {
                        tracing::warn!(connection = %self.outbound.id(), ?err, "Failed to create TLS channel");

                        return self.destroy();
                    }
                }
            }

            self.stage = Stage::Handshaking;
        }

        let Some(channel) = self.outbound.secure_mut() else {
            return self.on_plaintext(bytes, handler, options);
        };

        let mut plaintext = Vec::new();

        let result = channel.decrypt(bytes, &mut plaintext);

        self.outbound.flush_secure();

        if let Err(err) = result {
            tracing::warn!(connection = %self.outbound.id(), ?err, "Failed to decrypt");

            return self.destroy();
        }

        if !plaintext.is_empty() {
            self.on_plaintext(&plaintext, handler, options);
        }
    }

    /// The transport reported end of stream or a read error.
    pub(crate) fn read_closed(&mut self) {
        tracing::debug!(connection = %self.outbound.id(), "Read side closed");

        self.destroy();
    }

    /// Appends `bytes` as far as the buffer limit allows, processing in between.
    fn on_plaintext<H: Handler>(&mut self, mut bytes: &[u8], handler: &mut H, options: &Options) {
        while !bytes.is_empty() && self.outbound.is_live() {
            let limit = match self.stage {
                Stage::Open => options.frame_buffer_limit(),
                _ => options.max_handshake_size,
            };

            let room = limit.saturating_sub(self.buffer.len());

            if room == 0 {
                match self.stage {
                    Stage::Open => self.outbound.fail(ProtocolError::MessageTooLarge),
                    _ => {
                        tracing::warn!(connection = %self.outbound.id(), "Handshake too large");

                        self.outbound.write(&[handshake::BAD_REQUEST]);
                        self.outbound.destroy();
                    }
                }

                return self.buffer.clear();
            }

            let (head, tail) = bytes.split_at(room.min(bytes.len()));

            self.buffer.extend_from_slice(head);
            bytes = tail;

            if self.stage == Stage::Handshaking {
                self.handshake(handler, options);
            }

            if self.stage == Stage::Open {
                self.process_frames(handler);
            }
        }

        if !self.outbound.is_live() {
            self.buffer.clear();
        }
    }

    fn handshake<H: Handler>(&mut self, handler: &mut H, options: &Options) {
        let Self {
            stage,
            buffer,
            outbound,
            ..
        } = self;

        let consumed = match handshake::classify(buffer, options.max_headers) {
            Handshake::Partial => return,
            Handshake::Malformed(err) => {
                tracing::debug!(connection = %outbound.id(), %err, "Rejecting request");

                outbound.write(&[handshake::BAD_REQUEST]);

                return outbound.destroy();
            }
            Handshake::Http(request) => {
                let mut response = HttpResponse::new();

                handler.on_http_request(&request, &mut response);

                tracing::debug!(
                    connection = %outbound.id(),
                    method = request.method(),
                    path = request.path(),
                    status = response.status_code(),
                    "Answered http request"
                );

                outbound.write(&[&response.to_bytes()]);

                return outbound.destroy();
            }
            Handshake::Upgrade(upgrade) => {
                if !handler.check_connection(upgrade.request()) {
                    tracing::debug!(connection = %outbound.id(), "Connection check failed");

                    outbound.write(&[handshake::FORBIDDEN]);

                    return outbound.destroy();
                }

                outbound.write(&[&upgrade.response()]);

                upgrade.request().len()
            }
        };

        buffer.drain(..consumed);

        if !outbound.is_live() {
            return;
        }

        *stage = Stage::Open;

        tracing::debug!(connection = %outbound.id(), "Upgraded");

        handler.on_connect(Socket::new(outbound));
    }

    /// Decodes every complete frame in the buffer, with the transport corked.
    fn process_frames<H: Handler>(&mut self, handler: &mut H) {
        let Self {
            buffer,
            codec,
            reassembler,
            outbound,
            ..
        } = self;

        let mut outbound = outbound.cork();
        let mut consumed = 0;

        while outbound.is_live() {
            let (frame, len) = match codec.decode(&mut buffer[consumed..]) {
                Ok(Some(decoded)) => decoded,
                Ok(None) => break,
                Err(err) => {
                    outbound.fail(err.into());

                    break;
                }
            };

            consumed += len;

            tracing::trace!(
                connection = %outbound.id(),
                opcode = ?frame.opcode(),
                fin = frame.is_final(),
                len = frame.payload().len(),
                "Frame"
            );

            if let Err(err) = on_frame(frame, reassembler, &mut outbound, handler) {
                outbound.fail(err);

                break;
            }
        }

        buffer.drain(..consumed);
    }
}

fn on_frame<T, S, H>(
    frame: Frame<'_>,
    reassembler: &mut Reassembler,
    outbound: &mut Outbound<T, S>,
    handler: &mut H,
) -> Result<(), ProtocolError>
where
    T: Transport,
    S: SecureChannel,
    H: Handler,
{
    match frame.opcode() {
        OpCode::Ping => {
            if !outbound.is_closing() {
                outbound.send_frame(OpCode::Pong, frame.payload(), &[]);
            }

            Ok(())
        }
        OpCode::Pong => Ok(()),
        OpCode::Close => {
            if outbound.is_closing() {
                outbound.destroy();

                return Ok(());
            }

            CloseFrame::parse(frame.payload())?;

            outbound.echo_close(frame.payload());

            Ok(())
        }
        _ => reassembler.push(frame, |opcode, payload| {
            if outbound.is_closing() {
                return Ok(());
            }

            let message = Message::data(opcode, payload).ok_or(ProtocolError::InvalidUTF8)?;

            handler.on_message(Socket::new(outbound), message);

            Ok(())
        }),
    }
}
