//! The connection manager core: owns the connection set and the
//! per-connection handler map, and drives one poll wake end-to-end —
//! dispatching inbound frames to handlers, sending whatever frames that
//! produces, and reporting what happened.
//!
//! Rather than a base class plus three subclasses that each fix a
//! `command_handler_class`, this is modeled as composition: one
//! `ConnectionManagerCore<F>` parameterized by a [`HandlerFactory`] (what
//! kind of handler a fresh connection gets) and a [`HandlerEvents`] hook
//! (subtype-specific connection-error cleanup, e.g. the worker releasing
//! its job lock). `client`, `worker`, and `admin` are thin front-ends that
//! inject their own factory/hook and expose domain-specific methods.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{instrument, warn};

use crate::conn::{Connection, ConnectionId};
use crate::config::ServerAddr;
use crate::handler::{self, CommandHandler, HandlerEvent};
use crate::poller::{self, PollEvent};
use crate::wire::OutboundFrame;

/// Builds a fresh per-connection handler of the right variant, and any
/// frames that must go out the moment it's attached (worker `CAN_DO`
/// registration).
pub trait HandlerFactory {
    fn new_handler(&self) -> CommandHandler;

    fn initial_frames(&self, _handler: &CommandHandler) -> Vec<OutboundFrame> {
        Vec::new()
    }
}

/// Cleanup hook invoked when a connection dies, before its handler is
/// dropped.
pub trait HandlerEvents {
    fn on_connection_error(&mut self, id: ConnectionId, handler: &CommandHandler);
}

/// A no-op hook for front-ends (client, admin) with nothing to clean up.
pub struct NoCleanup;

impl HandlerEvents for NoCleanup {
    fn on_connection_error(&mut self, _id: ConnectionId, _handler: &CommandHandler) {}
}

/// What one poll wake (or one `poll_until_stopped` call) observed.
pub struct PollSummary {
    pub activity: bool,
    pub dead: Vec<ConnectionId>,
    pub events: Vec<(ConnectionId, HandlerEvent)>,
}

pub struct ConnectionManagerCore<F: HandlerFactory> {
    next_id: ConnectionId,
    connections: BTreeMap<ConnectionId, Connection>,
    handlers: BTreeMap<ConnectionId, CommandHandler>,
    factory: F,
}

impl<F: HandlerFactory> ConnectionManagerCore<F> {
    pub fn new(servers: Vec<ServerAddr>, factory: F) -> Self {
        let mut connections = BTreeMap::new();
        let mut next_id = 0;
        for addr in servers {
            connections.insert(next_id, Connection::new(next_id, addr));
            next_id += 1;
        }
        Self { next_id, connections, handlers: BTreeMap::new(), factory }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// A stable, insertion-ordered snapshot of every configured connection
    /// id — `BTreeMap`'s key order is exactly insertion order here, since
    /// ids are assigned in ascending order and never reused.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.get(&id).map(Connection::is_connected).unwrap_or(false)
    }

    pub fn alive_connection_ids(&self) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, c)| c.is_connected())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn handler(&self, id: ConnectionId) -> Option<&CommandHandler> {
        self.handlers.get(&id)
    }

    pub fn handler_mut(&mut self, id: ConnectionId) -> Option<&mut CommandHandler> {
        self.handlers.get_mut(&id)
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    /// Connects (if not already), installs a fresh handler, and sends the
    /// handler's initial frames. Returns whether the connection ended up
    /// connected.
    #[instrument(skip(self))]
    pub async fn attempt_connect(&mut self, id: ConnectionId) -> bool {
        let Some(conn) = self.connections.get_mut(&id) else { return false };
        if conn.is_connected() {
            return true;
        }

        match conn.connect().await {
            Ok(()) => {
                let handler = self.factory.new_handler();
                let frames = self.factory.initial_frames(&handler);
                self.handlers.insert(id, handler);
                for frame in frames {
                    if conn.send(frame).await.is_err() {
                        break;
                    }
                }
                let _ = conn.flush().await;
                true
            },
            Err(error) => {
                warn!(connection = id, %error, "connect failed");
                false
            },
        }
    }

    /// Closes the connection, drops its handler (after the cleanup hook
    /// runs), and removes both map entries.
    pub fn handle_error(&mut self, id: ConnectionId, events: &mut impl HandlerEvents) {
        if let Some(handler) = self.handlers.get(&id) {
            events.on_connection_error(id, handler);
        }
        self.handlers.remove(&id);
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.close();
        }
    }

    pub fn shutdown(&mut self) {
        for conn in self.connections.values_mut() {
            conn.close();
        }
        self.handlers.clear();
    }

    /// One poll wake over the given connection subset: reads/dispatches
    /// everything ready, sends whatever the dispatch produced, and tears
    /// down any connection that died along the way.
    #[instrument(skip(self, handler_events))]
    pub async fn poll_once(
        &mut self,
        ids: &[ConnectionId],
        timeout: Duration,
        handler_events: &mut impl HandlerEvents,
    ) -> PollSummary {
        let raw = {
            let subset =
                self.connections.iter_mut().filter(|(id, _)| ids.contains(id));
            poller::poll_once(subset, timeout).await
        };

        let mut summary =
            PollSummary { activity: !raw.is_empty(), dead: Vec::new(), events: Vec::new() };

        for event in raw {
            match event {
                PollEvent::Dead(id) => summary.dead.push(id),
                PollEvent::Frame(id, frame) => {
                    let Some(handler) = self.handlers.get_mut(&id) else { continue };
                    match handler::dispatch(handler, id, frame) {
                        Ok((outbound, events)) => {
                            summary.events.extend(events.into_iter().map(|e| (id, e)));
                            if let Some(conn) = self.connections.get_mut(&id) {
                                let mut failed = false;
                                for frame in outbound {
                                    if conn.send(frame).await.is_err() {
                                        failed = true;
                                        break;
                                    }
                                }
                                if conn.flush().await.is_err() || failed {
                                    summary.dead.push(id);
                                }
                            }
                        },
                        Err(error) => {
                            warn!(connection = id, %error, "protocol/state error, dropping connection");
                            summary.dead.push(id);
                        },
                    }
                },
            }
        }

        summary.dead.sort_unstable();
        summary.dead.dedup();
        for id in summary.dead.clone() {
            self.handle_error(id, handler_events);
        }

        summary
    }

    /// Loops `poll_once` against `ids` until `predicate(activity)` returns
    /// `false` or `timeout` has fully elapsed, returning `true`; returns
    /// `false` immediately if every connection in `ids` is already dead.
    /// Handler events observed along the way are appended to `sink`.
    pub async fn poll_until_stopped(
        &mut self,
        ids: &[ConnectionId],
        predicate: &mut impl FnMut(bool) -> bool,
        timeout: Duration,
        handler_events: &mut impl HandlerEvents,
        sink: &mut Vec<(ConnectionId, HandlerEvent)>,
    ) -> bool {
        if !ids.is_empty() && ids.iter().all(|id| !self.is_connected(*id)) {
            return false;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                predicate(false);
                return true;
            }

            let summary = self.poll_once(ids, remaining, handler_events).await;
            sink.extend(summary.events);

            if !ids.is_empty() && ids.iter().all(|id| !self.is_connected(*id)) {
                return false;
            }

            if !predicate(summary.activity) {
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ClientHandler;

    struct StubFactory;
    impl HandlerFactory for StubFactory {
        fn new_handler(&self) -> CommandHandler {
            CommandHandler::Client(ClientHandler::new())
        }
    }

    #[test]
    fn connection_ids_are_stable_insertion_order() {
        let manager = ConnectionManagerCore::new(
            vec![
                ServerAddr::new("a", 4730),
                ServerAddr::new("b", 4730),
                ServerAddr::new("c", 4730),
            ],
            StubFactory,
        );
        assert_eq!(manager.connection_ids(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn attempt_connect_to_unreachable_host_returns_false() {
        let mut manager =
            ConnectionManagerCore::new(vec![ServerAddr::new("127.0.0.1", 1)], StubFactory);
        let id = manager.connection_ids()[0];
        assert!(!manager.attempt_connect(id).await);
        assert!(!manager.is_connected(id));
    }
}
