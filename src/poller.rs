//! The connection poller: multiplexes reads and writes across a set of
//! connections for up to a bounded timeout.
//!
//! Contract: wait up to `timeout`, surface everything that became ready,
//! never block the caller longer than that. Built on `FuturesUnordered`
//! over each connection's next framed item plus `tokio::time::timeout`,
//! rather than hand-rolling `epoll`/`kqueue` bindings.

use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::time::{self, Instant};
use tracing::{instrument, warn};

use crate::conn::{Connection, ConnectionId};
use crate::wire::InboundFrame;

/// One observation from a poll wake.
#[derive(Debug)]
pub enum PollEvent {
    /// A connection produced a frame.
    Frame(ConnectionId, InboundFrame),
    /// A connection died: EOF, an I/O error, or a protocol error. The
    /// caller is expected to invoke the manager's `handle_error` for it.
    Dead(ConnectionId),
}

/// Drives one poll wake over `connections`: flushes pending writes, then
/// waits up to `timeout` for the first connection to produce a frame (or
/// die), and drains any further connections that are *already* ready
/// without waiting again. The caller (the connection manager) is
/// responsible for dispatching returned frames to handlers and for its own
/// predicate/timeout loop.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64))]
pub async fn poll_once<'a>(
    connections: impl Iterator<Item = (&'a ConnectionId, &'a mut Connection)>,
    timeout: Duration,
) -> Vec<PollEvent> {
    let mut events = Vec::new();
    let mut live: Vec<(&ConnectionId, &mut Connection)> = connections.collect();

    if live.is_empty() {
        time::sleep(timeout).await;
        return events;
    }

    for (id, conn) in live.iter_mut() {
        if let Err(error) = conn.flush().await {
            warn!(connection = **id, %error, "flush failed, marking dead");
            events.push(PollEvent::Dead(**id));
        }
    }

    let deadline = Instant::now() + timeout;

    let mut reads: FuturesUnordered<_> = live
        .into_iter()
        .map(|(id, conn)| {
            let id = *id;
            async move { (id, conn.next_frame().await) }
        })
        .collect();

    match time::timeout_at(deadline, reads.next()).await {
        Ok(Some((id, result))) => push_result(&mut events, id, result),
        Ok(None) | Err(_) => {}, // no connections left to read, or timed out
    }

    // Drain anything else that's already ready without waiting again —
    // mirrors "for every readable connection" rather than returning after
    // a single frame.
    while let Some(next) = reads.next().now_or_never() {
        match next {
            Some((id, result)) => push_result(&mut events, id, result),
            None => break,
        }
    }

    events
}

fn push_result(
    events: &mut Vec<PollEvent>,
    id: ConnectionId,
    result: Result<Option<InboundFrame>, crate::errors::Error>,
) {
    match result {
        Ok(Some(frame)) => events.push(PollEvent::Frame(id, frame)),
        Ok(None) => events.push(PollEvent::Dead(id)),
        Err(error) => {
            warn!(connection = id, %error, "read failed, marking dead");
            events.push(PollEvent::Dead(id));
        },
    }
}
