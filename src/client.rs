//! `GearmanClient`: the client front-end.
//!
//! Round-robins submissions across the configured servers; once a
//! [`JobRequest`](crate::types::JobRequest) is bound to a connection it
//! stays there for its lifetime (handles are server-local: no transparent
//! reconnection of in-flight handles).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::codec::{self, PayloadCodec};
use crate::config::GearmanConfig;
use crate::conn::ConnectionId;
use crate::errors::Error;
use crate::handler::{ClientHandler, CommandHandler, RequestId};
use crate::manager::{ConnectionManagerCore, HandlerFactory, NoCleanup};
use crate::types::states::{Priority, RequestState};
use crate::types::{JobRequest, JobRequestView};

struct ClientFactory {
    codec: Arc<dyn PayloadCodec>,
}

impl HandlerFactory for ClientFactory {
    fn new_handler(&self) -> CommandHandler {
        CommandHandler::Client(ClientHandler::with_codec(self.codec.clone()))
    }
}

/// A handle to a submission: which connection it lives on and its id
/// within that connection's handler. Round-robin submission means this is
/// the only way to find a request again later (`JobRequest` is owned
/// exclusively by the handler, not shared with the caller).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JobHandle {
    connection: ConnectionId,
    request: RequestId,
}

pub struct GearmanClient {
    manager: ConnectionManagerCore<ClientFactory>,
    next_server: usize,
}

impl GearmanClient {
    pub fn new(config: GearmanConfig) -> Self {
        Self::with_codec(config, codec::identity())
    }

    /// As [`GearmanClient::new`], but with a caller-supplied payload codec
    /// applied to every job's data, result, and update payloads instead of
    /// the pass-through default.
    pub fn with_codec(config: GearmanConfig, codec: Arc<dyn PayloadCodec>) -> Self {
        Self {
            manager: ConnectionManagerCore::new(config.servers, ClientFactory { codec }),
            next_server: 0,
        }
    }

    fn pick_server(&mut self) -> ConnectionId {
        let ids = self.manager.connection_ids();
        let id = ids[self.next_server % ids.len()];
        self.next_server = (self.next_server + 1) % ids.len().max(1);
        id
    }

    /// Submits one job, round-robining across the configured servers. If
    /// `wait_until_complete` is set, polls (up to `poll_timeout`) until the
    /// request reaches a terminal state or `background` is set (background
    /// jobs only ever reach `QUEUED`).
    pub async fn submit_job(
        &mut self,
        task: impl Into<Bytes>,
        data: impl Into<Bytes>,
        unique: impl Into<Bytes>,
        priority: Priority,
        background: bool,
        wait_until_complete: bool,
        poll_timeout: Duration,
    ) -> Result<JobHandle, Error> {
        let id = self.pick_server();
        if !self.manager.attempt_connect(id).await {
            return Err(Error::ServerUnavailable(format!("connection {id} unavailable")));
        }

        let req = JobRequest::new(task.into(), unique.into(), data.into(), background, priority);

        let Some(CommandHandler::Client(handler)) = self.manager.handler_mut(id) else {
            return Err(Error::ServerUnavailable(format!("connection {id} has no client handler")));
        };
        let (request_id, frame) = handler.send_job_request(req);

        let Some(conn) = self.manager.connection_mut(id) else {
            return Err(Error::ServerUnavailable(format!("connection {id} vanished")));
        };
        conn.send(frame).await?;
        conn.flush().await?;

        let handle = JobHandle { connection: id, request: request_id };

        if wait_until_complete && !background {
            self.wait_until_jobs_completed(&[handle], poll_timeout).await;
        } else {
            self.wait_until_jobs_accepted(&[handle], poll_timeout).await;
        }

        Ok(handle)
    }

    /// Submits every request, round-robining each across the server list,
    /// then polls (up to `poll_timeout`) until all reach a terminal state
    /// (or are accepted, if `wait_until_complete` is false). Returns a
    /// snapshot per request regardless of whether it finished — callers
    /// inspect `state` for partial results.
    pub async fn submit_multiple_jobs(
        &mut self,
        specs: Vec<(Bytes, Bytes, Bytes, Priority, bool)>,
        wait_until_complete: bool,
        poll_timeout: Duration,
    ) -> Vec<(JobHandle, JobRequestView)> {
        let mut handles = Vec::with_capacity(specs.len());
        for (task, data, unique, priority, background) in specs {
            let id = self.pick_server();
            if !self.manager.attempt_connect(id).await {
                continue;
            }
            let req = JobRequest::new(task, unique, data, background, priority);
            let Some(CommandHandler::Client(handler)) = self.manager.handler_mut(id) else {
                continue;
            };
            let (request_id, frame) = handler.send_job_request(req);
            if let Some(conn) = self.manager.connection_mut(id) {
                let _ = conn.send(frame).await;
                let _ = conn.flush().await;
            }
            handles.push(JobHandle { connection: id, request: request_id });
        }

        if wait_until_complete {
            self.wait_until_jobs_completed(&handles, poll_timeout).await;
        } else {
            self.wait_until_jobs_accepted(&handles, poll_timeout).await;
        }

        handles.iter().filter_map(|h| self.view(*h).map(|v| (*h, v))).collect()
    }

    /// Polls until every handle has at least a server handle (state !=
    /// `PENDING`) or `poll_timeout` elapses.
    pub async fn wait_until_jobs_accepted(&mut self, handles: &[JobHandle], poll_timeout: Duration) {
        self.poll_while(handles, poll_timeout, |state| state != RequestState::Pending).await;
    }

    /// Polls until every handle is in a terminal state or `poll_timeout`
    /// elapses.
    pub async fn wait_until_jobs_completed(&mut self, handles: &[JobHandle], poll_timeout: Duration) {
        self.poll_while(handles, poll_timeout, RequestState::is_terminal).await;
    }

    async fn poll_while(
        &mut self,
        handles: &[JobHandle],
        poll_timeout: Duration,
        done: impl Fn(RequestState) -> bool,
    ) {
        let connections: Vec<ConnectionId> =
            handles.iter().map(|h| h.connection).collect::<std::collections::BTreeSet<_>>().into_iter().collect();

        let mut cleanup = NoCleanup;
        let mut sink = Vec::new();
        let all_done = |manager: &ConnectionManagerCore<ClientFactory>| {
            handles.iter().all(|h| {
                manager
                    .handler(h.connection)
                    .and_then(|ch| match ch {
                        CommandHandler::Client(c) => c.requests.get(&h.request),
                        _ => None,
                    })
                    .map(|r| done(r.state))
                    .unwrap_or(true)
            })
        };

        let mut predicate = |_activity: bool| !all_done(&self.manager);
        if !all_done(&self.manager) {
            self.manager
                .poll_until_stopped(&connections, &mut predicate, poll_timeout, &mut cleanup, &mut sink)
                .await;
        }
    }

    /// A read-only snapshot of a submitted request's current state.
    pub fn view(&self, handle: JobHandle) -> Option<JobRequestView> {
        match self.manager.handler(handle.connection)? {
            CommandHandler::Client(c) => c.requests.get(&handle.request).map(JobRequestView::from),
            _ => None,
        }
    }

    /// Sends `GET_STATUS` for a queued request and polls for the
    /// `STATUS_RES` reply.
    pub async fn get_job_status(
        &mut self,
        handle: JobHandle,
        poll_timeout: Duration,
    ) -> Result<(), Error> {
        let request_handle = self
            .view(handle)
            .and_then(|v| v.handle)
            .ok_or_else(|| Error::InvalidClientState("request has no server handle yet".into()))?;

        let Some(conn) = self.manager.connection_mut(handle.connection) else {
            return Err(Error::ServerUnavailable("connection unavailable".into()));
        };
        conn.send(crate::wire::OutboundFrame::Command(crate::wire::Command::GetStatus {
            handle: request_handle,
        }))
        .await?;
        conn.flush().await?;

        // STATUS_RES is the only reply expected on this connection for the
        // duration of this call, so the first activity observed is it.
        let mut cleanup = NoCleanup;
        let mut sink = Vec::new();
        let connections = [handle.connection];
        let mut seen = false;
        let mut predicate = |activity: bool| {
            if activity {
                seen = true;
            }
            !seen
        };
        self.manager
            .poll_until_stopped(&connections, &mut predicate, poll_timeout, &mut cleanup, &mut sink)
            .await;
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.manager.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_handle_is_copy_and_comparable() {
        let a = JobHandle { connection: 0, request: 1 };
        let b = a;
        assert_eq!(a, b);
    }
}
