//! `GearmanAdminClient`: the administrative text-protocol front-end.
//!
//! Unlike the client/worker front-ends this one talks to a single server:
//! the constructor takes the (usually one-element) host list, truncates it
//! to the first entry, and eagerly connects, failing immediately if that
//! doesn't succeed — there's no round-robin or reconnect-on-demand for an
//! admin session.

use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::config::GearmanConfig;
use crate::conn::ConnectionId;
use crate::errors::Error;
use crate::handler::{self, AdminHandler, CommandHandler};
use crate::manager::{ConnectionManagerCore, HandlerFactory, NoCleanup};
use crate::wire::protocol::{AdminCommand, AdminResponse, AdminResponseKind};

/// Echoed back verbatim by `ECHO_REQ`/`ECHO_RES`; used by
/// [`GearmanAdminClient::ping_server`].
pub const ECHO_PAYLOAD: &[u8] = b"ping? pong!";

struct AdminFactory;

impl HandlerFactory for AdminFactory {
    fn new_handler(&self) -> CommandHandler {
        CommandHandler::Admin(AdminHandler::new())
    }
}

pub struct GearmanAdminClient {
    manager: ConnectionManagerCore<AdminFactory>,
    connection: ConnectionId,
    timeout: Duration,
}

impl GearmanAdminClient {
    /// Connects to the first server in `config.servers` immediately,
    /// returning [`Error::ServerUnavailable`] if it can't be reached.
    pub async fn connect(config: GearmanConfig) -> Result<Self, Error> {
        let timeout = config.admin_timeout();
        let mut servers = config.servers;
        servers.truncate(1);
        if servers.is_empty() {
            return Err(Error::ServerUnavailable("no server configured".into()));
        }

        let mut manager = ConnectionManagerCore::new(servers, AdminFactory);
        let connection = manager.connection_ids()[0];
        if !manager.attempt_connect(connection).await {
            return Err(Error::ServerUnavailable(format!(
                "could not connect to configured admin server (connection {connection})"
            )));
        }

        Ok(Self { manager, connection, timeout })
    }

    /// Sends `ECHO_REQ` with [`ECHO_PAYLOAD`] and returns the round-trip
    /// time. Errors if the echoed payload doesn't match.
    pub async fn ping_server(&mut self) -> Result<Duration, Error> {
        let start = Instant::now();
        let handler = self.admin_handler_mut()?;
        let frame = handler::send_echo_request(handler, Bytes::from_static(ECHO_PAYLOAD));
        self.send(frame).await?;

        match self.wait_for_response(AdminResponseKind::Echo).await? {
            AdminResponse::Echo(data) if data.as_ref() == ECHO_PAYLOAD => Ok(start.elapsed()),
            AdminResponse::Echo(data) => Err(Error::InvalidAdminClientState(format!(
                "echo string mismatch: got {data:?}, expected {ECHO_PAYLOAD:?}"
            ))),
            _ => unreachable!("wait_for_response guarantees Echo"),
        }
    }

    pub async fn send_maxqueue(&mut self, task: impl Into<Bytes>, max_size: i64) -> Result<(), Error> {
        self.run_command(AdminCommand::MaxQueue { task: task.into(), max_size }).await?;
        Ok(())
    }

    pub async fn send_shutdown(&mut self, graceful: bool) -> Result<(), Error> {
        self.run_command(AdminCommand::Shutdown { graceful }).await?;
        Ok(())
    }

    pub async fn get_status(&mut self) -> Result<Vec<crate::wire::protocol::StatusLine>, Error> {
        match self.run_command(AdminCommand::Status).await? {
            AdminResponse::Status(lines) => Ok(lines),
            _ => unreachable!("run_command guarantees the matching response kind"),
        }
    }

    pub async fn get_version(&mut self) -> Result<Bytes, Error> {
        match self.run_command(AdminCommand::Version).await? {
            AdminResponse::Version(v) => Ok(v),
            _ => unreachable!("run_command guarantees the matching response kind"),
        }
    }

    pub async fn get_workers(&mut self) -> Result<Vec<crate::wire::protocol::WorkerLine>, Error> {
        match self.run_command(AdminCommand::Workers).await? {
            AdminResponse::Workers(lines) => Ok(lines),
            _ => unreachable!("run_command guarantees the matching response kind"),
        }
    }

    async fn run_command(&mut self, command: AdminCommand) -> Result<AdminResponse, Error> {
        let terminator = command.expected_terminator();
        let kind = command.response_kind();

        let handler = self.admin_handler_mut()?;
        let frame = handler::send_admin_command(handler, &command);

        let Some(conn) = self.manager.connection_mut(self.connection) else {
            return Err(Error::ServerUnavailable("admin connection is gone".into()));
        };
        conn.expect_admin_response(terminator);
        conn.send(frame).await?;
        conn.flush().await?;

        self.wait_for_response(kind).await
    }

    async fn send(&mut self, frame: crate::wire::OutboundFrame) -> Result<(), Error> {
        let Some(conn) = self.manager.connection_mut(self.connection) else {
            return Err(Error::ServerUnavailable("admin connection is gone".into()));
        };
        conn.send(frame).await?;
        conn.flush().await
    }

    /// Polls until a response is queued or `self.timeout` elapses.
    async fn wait_for_response(&mut self, expected: AdminResponseKind) -> Result<AdminResponse, Error> {
        let connection = self.connection;
        let response_ready = |manager: &ConnectionManagerCore<AdminFactory>| {
            matches!(manager.handler(connection), Some(CommandHandler::Admin(h)) if h.response_ready)
        };

        let mut cleanup = NoCleanup;
        let mut sink = Vec::new();
        let connections = [connection];
        let mut predicate = |_activity: bool| !response_ready(&self.manager);
        self.manager
            .poll_until_stopped(&connections, &mut predicate, self.timeout, &mut cleanup, &mut sink)
            .await;

        if !response_ready(&self.manager) {
            return Err(Error::InvalidAdminClientState(format!(
                "admin client timed out after {} second(s)",
                self.timeout.as_secs_f64()
            )));
        }

        let Some(CommandHandler::Admin(handler)) = self.manager.handler_mut(connection) else {
            return Err(Error::ServerUnavailable("admin connection is gone".into()));
        };
        let (kind, response) = handler
            .pop_response()
            .ok_or_else(|| Error::InvalidAdminClientState("response marked ready but queue empty".into()))?;

        if kind != expected {
            return Err(Error::InvalidAdminClientState(format!(
                "received an unexpected response... got {kind:?}, expecting {expected:?}"
            )));
        }
        Ok(response)
    }

    fn admin_handler_mut(&mut self) -> Result<&mut AdminHandler, Error> {
        match self.manager.handler_mut(self.connection) {
            Some(CommandHandler::Admin(h)) => Ok(h),
            _ => Err(Error::ServerUnavailable("admin connection is gone".into())),
        }
    }

    pub fn shutdown(&mut self) {
        self.manager.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_unreachable_host_errors() {
        let config = GearmanConfig::new(vec![crate::config::ServerAddr::new("127.0.0.1", 1)]);
        let err = GearmanAdminClient::connect(config).await.unwrap_err();
        assert!(matches!(err, Error::ServerUnavailable(_)));
    }

    #[test]
    fn echo_payload_is_stable() {
        assert_eq!(ECHO_PAYLOAD, b"ping? pong!");
    }
}
