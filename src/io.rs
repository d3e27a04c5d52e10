//! Driving a connection over an [`embedded_io_async`] stream.

use core::convert::Infallible;

use embedded_io_async::{Read, Write};

use crate::{
    ConnectionId, Server,
    handler::Handler,
    transport::{TlsContext, Transport, WriteStatus},
};

/// A [`Transport`] that collects outgoing bytes until [`serve`] writes them to the stream.
///
/// Every write is accepted in full.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<u8>,
    queued: usize,
    corked: bool,
    shutdown: bool,
}

impl Outbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes waiting to be written to the stream.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Returns `true` while the server asks for small writes to be coalesced.
    pub const fn is_corked(&self) -> bool {
        self.corked
    }

    /// Returns `true` once the server shut the connection down.
    pub const fn is_shutdown(&self) -> bool {
        self.shutdown
    }
}

impl Transport for Outbox {
    type Error = Infallible;

    fn try_write(&mut self, bufs: &[&[u8]]) -> Result<WriteStatus, Self::Error> {
        let mut written = 0;

        for buf in bufs {
            self.pending.extend_from_slice(buf);
            written += buf.len();
        }

        Ok(WriteStatus::Written(written))
    }

    fn queue_write(&mut self, buf: Vec<u8>) -> Result<(), Self::Error> {
        self.pending.extend_from_slice(&buf);
        self.queued += 1;

        Ok(())
    }

    fn set_cork(&mut self, corked: bool) {
        self.corked = corked;
    }

    fn shutdown(&mut self) {
        self.shutdown = true;
    }
}

/// Serves one connection over `stream` until either side closes it.
///
/// The connection is registered with `server` on entry and released on return.
/// `read_buffer` is the scratch space for each read.
pub async fn serve<H, C, S>(
    server: &mut Server<H, Outbox, C>,
    mut stream: S,
    read_buffer: &mut [u8],
) -> Result<(), S::Error>
where
    H: Handler,
    C: TlsContext,
    S: Read + Write,
{
    let id = server.accept(Outbox::new());

    let result = pump(server, id, &mut stream, read_buffer).await;

    if let Err(err) = &result {
        tracing::warn!(connection = %id, ?err, "Stream failed");

        let _ = server.destroy(id);
    }

    server.shutdown_completed(id);

    result
}

async fn pump<H, C, S>(
    server: &mut Server<H, Outbox, C>,
    id: ConnectionId,
    stream: &mut S,
    read_buffer: &mut [u8],
) -> Result<(), S::Error>
where
    H: Handler,
    C: TlsContext,
    S: Read + Write,
{
    loop {
        flush(server, id, stream).await?;

        if server
            .transport(id)
            .is_none_or(|outbox| outbox.is_shutdown())
        {
            return Ok(());
        }

        match stream.read(read_buffer).await? {
            0 => server.read_closed(id),
            read => server.received(id, &read_buffer[..read]),
        }
    }
}

async fn flush<H, C, S>(
    server: &mut Server<H, Outbox, C>,
    id: ConnectionId,
    stream: &mut S,
) -> Result<(), S::Error>
where
    H: Handler,
    C: TlsContext,
    S: Write,
{
    let Some(outbox) = server.transport_mut(id) else {
        return Ok(());
    };

    if outbox.pending.is_empty() {
        return Ok(());
    }

    let pending = core::mem::take(&mut outbox.pending);
    let queued = core::mem::take(&mut outbox.queued);

    stream.write_all(&pending).await?;
    stream.flush().await?;

    for _ in 0..queued {
        server.write_completed(id, Ok(()));
    }

    Ok(())
}
