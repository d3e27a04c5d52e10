//! The registry of connections.

use core::fmt;

use crate::{
    CloseCode, CloseFrame, Message,
    connection::{Connection, Parts, State},
    error::Error,
    handler::{Handler, Socket},
    options::Options,
    transport::{NoTls, TlsContext, Transport},
};

/// Names a connection of a [`Server`].
///
/// Ids are never reused: a slot freed by [`Server::shutdown_completed`] gets a new
/// generation, so stale ids are recognized and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    index: u32,
    generation: u32,
}

impl ConnectionId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<X> {
    generation: u32,
    connection: Option<X>,
}

type ConnectionOf<T, C> = Connection<T, <C as TlsContext>::Channel>;

/// A WebSocket server engine for many connections, driven entirely by its caller.
///
/// The caller owns the sockets and the event loop. It registers each accepted
/// transport with [`Server::accept`] and reports what happens to it:
/// [`Server::received`] for bytes read, [`Server::read_closed`] for end of
/// stream, [`Server::write_completed`] for each queued write and
/// [`Server::shutdown_completed`] once the transport is closed. The server
/// answers through the [`Transport`] and calls into the [`Handler`].
pub struct Server<H, T, C = NoTls>
where
    C: TlsContext,
{
    handler: H,
    options: Options,
    tls: Option<C>,
    slots: Vec<Slot<ConnectionOf<T, C>>>,
    free: Vec<u32>,
    /// Connections whose transport is live.
    live: usize,
}

impl<H, T, C> fmt::Debug for Server<H, T, C>
where
    C: TlsContext,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("options", &self.options)
            .field("tls", &self.tls.is_some())
            .field("slots", &self.slots.len())
            .field("live", &self.live)
            .finish()
    }
}

impl<H, T> Server<H, T, NoTls>
where
    H: Handler,
    T: Transport,
{
    /// Creates a clear text server.
    pub fn new(handler: H, options: Options) -> Self {
        Self::build(handler, options, None)
    }
}

impl<H, T, C> Server<H, T, C>
where
    H: Handler,
    T: Transport,
    C: TlsContext,
{
    /// Creates a server that negotiates TLS on connections opening with a TLS record.
    ///
    /// Connections opening with anything else stay clear text.
    pub fn with_tls(handler: H, options: Options, tls: C) -> Self {
        Self::build(handler, options, Some(tls))
    }

    fn build(handler: H, options: Options, tls: Option<C>) -> Self {
        Self {
            handler,
            options,
            tls,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// The options every connection is created with.
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// The application handler.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// The application handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// The number of connections whose transport is live.
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no connection is live.
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// The ids of every connection whose transport is live.
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.connection
                .as_ref()
                .filter(|connection| connection.is_live())
                .map(|_| ConnectionId::new(index as u32, slot.generation))
        })
    }

    /// Registers a newly accepted transport.
    pub fn accept(&mut self, transport: T) -> ConnectionId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    connection: None,
                });

                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        let id = ConnectionId::new(index, slot.generation);

        slot.connection = Some(Connection::new(id, transport, &self.options));
        self.live += 1;

        tracing::debug!(connection = %id, "Accepted");

        id
    }

    fn slot_mut(&mut self, id: ConnectionId) -> Option<&mut Slot<ConnectionOf<T, C>>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }

    fn connection(&self, id: ConnectionId) -> Option<&ConnectionOf<T, C>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.connection.as_ref())
    }

    /// Runs `f` on a connection, then unregisters it if its transport stopped being live.
    fn with_connection<R>(
        &mut self,
        id: ConnectionId,
        f: impl FnOnce(&mut ConnectionOf<T, C>, &mut H, &Options, Option<&C>) -> R,
    ) -> Result<R, Error> {
        let Self {
            handler,
            options,
            tls,
            slots,
            live,
            ..
        } = self;

        let connection = slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.connection.as_mut())
            .ok_or(Error::UnknownConnection(id))?;

        let result = f(connection, handler, options, tls.as_ref());

        if connection.unregister() {
            *live -= 1;
        }

        Ok(result)
    }

    /// Handles bytes read from a connection's transport.
    pub fn received(&mut self, id: ConnectionId, bytes: &[u8]) {
        let _ = self.with_connection(id, |connection, handler, options, tls| {
            connection.received(bytes, handler, options, tls)
        });
    }

    /// The transport reached end of stream or failed to read.
    pub fn read_closed(&mut self, id: ConnectionId) {
        let _ = self.with_connection(id, |connection, _, _, _| connection.read_closed());
    }

    /// Reports the completion of the oldest queued write of a connection.
    ///
    /// Ignored once the connection is shutting down.
    pub fn write_completed(&mut self, id: ConnectionId, result: Result<(), T::Error>) {
        let _ = self.with_connection(id, |connection, _, _, _| {
            connection.outbound_mut().write_completed(result)
        });
    }

    /// Releases a connection once its transport is closed, returning the transport.
    ///
    /// Fires [`Handler::on_disconnect`] if the connection had been upgraded.
    pub fn shutdown_completed(&mut self, id: ConnectionId) -> Option<T> {
        let slot = self.slot_mut(id)?;
        let connection = slot.connection.take()?;

        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        let Parts {
            registered,
            upgraded,
            transport,
            user_data,
        } = connection.into_parts();

        // The transport closed on its own.
        if registered {
            self.live -= 1;
        }

        tracing::debug!(connection = %id, "Released");

        if upgraded {
            self.handler.on_disconnect(id, user_data);
        }

        Some(transport)
    }

    /// Sends a message as a single frame.
    pub fn send(&mut self, id: ConnectionId, message: Message<'_>) -> Result<(), Error> {
        self.with_connection(id, |connection, _, _, _| {
            connection.outbound_mut().send(message)
        })?
    }

    /// Sends a close frame and shuts the connection down.
    ///
    /// Codes that must not appear on the wire, such as 1005, are refused with
    /// [`Error::ReservedCloseCode`].
    pub fn close(&mut self, id: ConnectionId, code: CloseCode, reason: &str) -> Result<(), Error> {
        self.with_connection(id, |connection, _, _, _| {
            connection
                .outbound_mut()
                .close(Some(CloseFrame::new(code, reason)))
        })?
    }

    /// Shuts the connection down without a close frame. Repeated calls do nothing.
    pub fn destroy(&mut self, id: ConnectionId) -> Result<(), Error> {
        self.with_connection(id, |connection, _, _, _| connection.destroy())
    }

    /// Shuts every connection down.
    pub fn destroy_all(&mut self) {
        for slot in &mut self.slots {
            if let Some(connection) = slot.connection.as_mut() {
                connection.destroy();

                if connection.unregister() {
                    self.live -= 1;
                }
            }
        }
    }

    /// Runs `f` with a [`Socket`] for the connection.
    pub fn with_socket<R>(
        &mut self,
        id: ConnectionId,
        f: impl FnOnce(Socket<'_>) -> R,
    ) -> Result<R, Error> {
        self.with_connection(id, |connection, _, _, _| {
            f(Socket::new(connection.outbound_mut()))
        })
    }

    /// The state of a connection, `None` once released.
    pub fn state(&self, id: ConnectionId) -> Option<State> {
        self.connection(id).map(|connection| connection.state())
    }

    /// The transport of a connection, until it is released.
    pub fn transport(&self, id: ConnectionId) -> Option<&T> {
        self.connection(id)
            .map(|connection| connection.outbound().transport())
    }

    /// The transport of a connection, mutably.
    pub fn transport_mut(&mut self, id: ConnectionId) -> Option<&mut T> {
        self.slot_mut(id)
            .and_then(|slot| slot.connection.as_mut())
            .map(|connection| connection.outbound_mut().transport_mut())
    }
}
