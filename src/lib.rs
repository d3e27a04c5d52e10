//! A sans-io, event-driven and [`RFC 6455`](https://datatracker.ietf.org/doc/html/rfc6455) compliant `websockets` server engine.

#![deny(missing_debug_implementations)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Overview
//!
//! A [`Server`] owns every connection's protocol state, but none of the sockets.
//! The caller accepts sockets, reads from them and tells the server what happened:
//!
//! - [`Server::accept`] registers a [`Transport`] and returns its [`ConnectionId`].
//! - [`Server::received`] feeds bytes read from it, in any fragmentation.
//! - [`Server::read_closed`] reports end of stream.
//! - [`Server::write_completed`] reports a finished [`Transport::queue_write`].
//! - [`Server::shutdown_completed`] releases the connection once its transport is closed.
//!
//! The server answers through the transport and calls into a [`Handler`]. Nothing blocks,
//! nothing spawns, and a server is never shared between threads.
//!
//! # Example
//!
//! An echo server, driven over any [`embedded_io_async`] stream by [`io::serve`].
//!
//! ```no_run
//! use websocketz_server::{Handler, Message, Options, Server, Socket, io::serve};
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     fn on_message(&mut self, mut socket: Socket<'_>, message: Message<'_>) {
//!         let _ = socket.send(message);
//!     }
//! }
//!
//! # async fn run(stream: impl embedded_io_async::Read + embedded_io_async::Write) {
//! let mut server = Server::new(
//!     Echo,
//!     Options::default().with_max_message_size(64 * 1024),
//! );
//!
//! let read_buffer = &mut [0u8; 4096];
//!
//! // An accepted stream.
//! // Impl embedded_io_async Read + Write.
//! if let Err(err) = serve(&mut server, stream, read_buffer).await {
//!     let _ = err;
//! }
//! # }
//! ```
//!
//! # Connections
//!
//! Bytes before the handshake are parsed as an HTTP/1.1 request. A request without an
//! `Upgrade` header goes to [`Handler::on_http_request`] and is answered once. An upgrade
//! request is checked with [`Handler::check_connection`] and answered with
//! `101 Switching Protocols`, after which every byte is a WebSocket frame.
//!
//! Pings are answered with pongs, close frames are validated and echoed. Any protocol
//! violation closes the connection with the matching [`CloseCode`]. There is no recovery.
//!
//! When a [`TlsContext`] is given, a connection whose first byte opens a TLS record is
//! routed through a [`SecureChannel`].

mod close_code;
pub use close_code::CloseCode;

mod close_frame;
pub use close_frame::CloseFrame;

pub mod codec;

mod connection;
pub use connection::State;

pub mod error;
pub use error::Error;

pub mod frame;

mod handler;
pub use handler::{Handler, Socket};

pub mod handshake;

pub mod io;

pub mod mask;

mod message;
pub use message::Message;

mod opcode;
pub use opcode::OpCode;

mod options;
pub use options::Options;

mod outbound;

mod reassembly;

mod server;
pub use server::{ConnectionId, Server};

mod transport;
pub use transport::{NoTls, SecureChannel, TlsContext, Transport, WriteStatus};

#[cfg(test)]
mod mock;
