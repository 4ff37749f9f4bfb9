//! `Connection`: one TCP endpoint.
//!
//! Owned exclusively by the connection manager. Rather than exposing
//! `connected`, `in_buffer`, and `out_buffer` as explicit fields the poller
//! drains by hand, the non-blocking socket, its read/write buffers, and the
//! codec that frames them are folded into a single Tokio
//! [`Framed`](tokio_util::codec::Framed) stream+sink, which is the
//! idiomatic equivalent — `Framed` *is* a buffered, non-blocking,
//! read-then-decode / encode-then-write pipe over an `AsyncRead +
//! AsyncWrite` socket.

use std::fmt;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::instrument;

use crate::config::ServerAddr;
use crate::errors::Error;
use crate::wire::protocol::AdminTerminator;
use crate::wire::{Codec, InboundFrame, OutboundFrame};

/// Identifies a connection within a single manager's connection list.
/// Stable for the connection's lifetime even as others connect/disconnect;
/// assigned once, in ascending order, at manager construction.
pub type ConnectionId = u64;

/// One Gearman job server endpoint.
pub struct Connection {
    pub id: ConnectionId,
    pub addr: ServerAddr,
    stream: Option<Framed<TcpStream, Codec>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Connection {
    pub fn new(id: ConnectionId, addr: ServerAddr) -> Self {
        Self { id, addr, stream: None }
    }

    /// Invariant: `connected` holds iff the socket exists and the last I/O
    /// on it didn't fail — once a read/write errors the manager tears the
    /// stream down via [`Connection::close`], so `stream.is_some()` alone
    /// is a faithful proxy.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Establishes the TCP connection. A no-op returning `Ok(())` if
    /// already connected.
    #[instrument(skip(self), fields(host = %self.addr.host, port = self.addr.port))]
    pub async fn connect(&mut self) -> Result<(), Error> {
        if self.stream.is_some() {
            return Ok(());
        }
        let tcp = TcpStream::connect((self.addr.host.as_str(), self.addr.port)).await?;
        tcp.set_nodelay(true).ok();
        self.stream = Some(Framed::new(tcp, Codec::default()));
        Ok(())
    }

    /// Drops the socket. Idempotent.
    pub fn close(&mut self) {
        self.stream = None;
    }

    /// Tells the codec that the next inbound item is a text-mode admin
    /// response, and which terminator completes it.
    pub fn expect_admin_response(&mut self, terminator: AdminTerminator) {
        if let Some(stream) = &mut self.stream {
            stream.codec_mut().expect_admin(terminator);
        }
    }

    /// Buffers one frame for sending; call [`Connection::flush`] to push it
    /// to the socket. Returns an error immediately if not connected.
    pub async fn send(&mut self, frame: OutboundFrame) -> Result<(), Error> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        stream.feed(frame).await.map_err(Error::from)
    }

    /// Drains any buffered outbound frames to the socket.
    pub async fn flush(&mut self) -> Result<(), Error> {
        let Some(stream) = &mut self.stream else {
            return Ok(());
        };
        stream.flush().await.map_err(Error::from)
    }

    /// Reads and frames the next inbound item, if any. `Ok(None)` means a
    /// clean EOF; the caller should treat the connection as dead.
    pub async fn next_frame(&mut self) -> Result<Option<InboundFrame>, Error> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        match stream.next().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(Error::from(e)),
            None => Ok(None),
        }
    }
}

fn not_connected() -> Error {
    Error::ConnectionFailed(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "connection is not established",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_connection_is_not_connected() {
        let conn = Connection::new(0, ServerAddr::new("127.0.0.1", 4730));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn send_before_connect_errors() {
        let mut conn = Connection::new(0, ServerAddr::new("127.0.0.1", 4730));
        let err = conn
            .send(OutboundFrame::AdminLine(bytes::Bytes::from_static(b"status")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed(_)));
    }
}
