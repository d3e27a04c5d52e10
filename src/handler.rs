use core::any::Any;

use crate::{
    CloseCode, CloseFrame, ConnectionId, Message,
    error::Error,
    handshake::{HttpResponse, Request, same_origin},
    outbound::Outlet,
};

/// The application side of a [`Server`](crate::Server).
///
/// Every callback runs synchronously inside the server call that triggered it.
pub trait Handler {
    /// Called once the `101 Switching Protocols` response has been written.
    fn on_connect(&mut self, socket: Socket<'_>) {
        let _ = socket;
    }

    /// Called when the transport of an upgraded connection has been released.
    ///
    /// Connections rejected during the handshake never get here.
    fn on_disconnect(&mut self, id: ConnectionId, user_data: Option<Box<dyn Any>>) {
        let _ = (id, user_data);
    }

    /// Called for every complete data message.
    ///
    /// `message` is [`Message::Text`] or [`Message::Binary`] and borrows from the
    /// connection buffer.
    fn on_message(&mut self, socket: Socket<'_>, message: Message<'_>);

    /// Answers a request without an `Upgrade` header.
    ///
    /// The connection is closed after the response is written. Leaving
    /// `response` untouched answers `404 Not Found`.
    fn on_http_request(&mut self, request: &Request<'_>, response: &mut HttpResponse) {
        let _ = (request, response);
    }

    /// Decides whether a valid upgrade request is accepted.
    ///
    /// Returning `false` answers `403 Forbidden`. Defaults to [`same_origin`].
    fn check_connection(&mut self, request: &Request<'_>) -> bool {
        same_origin(request)
    }
}

/// A connection, as seen from a [`Handler`] callback.
pub struct Socket<'a> {
    outlet: &'a mut (dyn Outlet + 'a),
}

impl core::fmt::Debug for Socket<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Socket")
            .field("id", &self.outlet.id())
            .field("secure", &self.outlet.is_secure())
            .field("closing", &self.outlet.is_closing())
            .finish()
    }
}

impl<'a> Socket<'a> {
    pub(crate) fn new(outlet: &'a mut (dyn Outlet + 'a)) -> Self {
        Self { outlet }
    }

    /// The id of the connection.
    pub fn id(&self) -> ConnectionId {
        self.outlet.id()
    }

    /// Sends a message as a single frame.
    pub fn send(&mut self, message: Message<'_>) -> Result<(), Error> {
        self.outlet.send(message)
    }

    /// Sends a close frame and shuts the connection down.
    ///
    /// Codes that must not appear on the wire, such as 1005, are refused with
    /// [`Error::ReservedCloseCode`].
    pub fn close(&mut self, code: CloseCode, reason: &str) -> Result<(), Error> {
        self.outlet.close(Some(CloseFrame::new(code, reason)))
    }

    /// Shuts the connection down without a close frame.
    pub fn destroy(&mut self) {
        self.outlet.destroy()
    }

    /// Returns `true` if the connection negotiated TLS.
    pub fn is_secure(&self) -> bool {
        self.outlet.is_secure()
    }

    /// Returns `true` once a close frame was sent or the transport is shutting down.
    pub fn is_closing(&self) -> bool {
        self.outlet.is_closing()
    }

    /// Attaches application state to the connection, returning the previous one.
    pub fn set_user_data<D: Any>(&mut self, data: D) -> Option<Box<dyn Any>> {
        self.outlet.user_data().replace(Box::new(data))
    }

    /// Returns the attached state if it is a `D`.
    pub fn user_data<D: Any>(&mut self) -> Option<&D> {
        self.outlet.user_data().as_deref().and_then(|data| data.downcast_ref())
    }

    /// Returns the attached state mutably if it is a `D`.
    pub fn user_data_mut<D: Any>(&mut self) -> Option<&mut D> {
        self.outlet
            .user_data()
            .as_deref_mut()
            .and_then(|data| data.downcast_mut())
    }

    /// Detaches the attached state.
    pub fn take_user_data(&mut self) -> Option<Box<dyn Any>> {
        self.outlet.user_data().take()
    }
}
