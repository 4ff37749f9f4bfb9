//! `GearmanWorker`: the worker front-end.
//!
//! Owns the ability set, the optional client id, and the worker-wide job
//! lock (at most one job executing across every connection at a time).
//! `work()` loops: take a shuffled list of alive connections, poll until
//! the caller's `after_poll` hook says stop or every connection dies,
//! repeat — reshuffling each iteration balances GRAB fairness across
//! servers.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use rand::seq::SliceRandom;
use tracing::{debug, instrument};

use crate::codec::{self, PayloadCodec};
use crate::config::GearmanConfig;
use crate::conn::ConnectionId;
use crate::errors::Error;
use crate::handler::{CommandHandler, HandlerEvent, WorkerHandler};
use crate::manager::{ConnectionManagerCore, HandlerFactory, HandlerEvents};
use crate::types::job::{Job, JobOutcome};
use crate::wire::OutboundFrame;

/// A registered task callback. Runs synchronously on the polling task — it
/// must not block indefinitely or the worker becomes unresponsive.
pub type Callback =
    Box<dyn Fn(Job) -> Pin<Box<dyn Future<Output = JobOutcome> + Send>> + Send + Sync>;

/// The worker-wide single-job invariant: at most one connection's handler
/// may hold this at a time.
#[derive(Default)]
struct JobLock {
    holder: Option<ConnectionId>,
}

impl JobLock {
    fn acquire(&mut self, id: ConnectionId) -> bool {
        if self.holder.is_some() {
            return false;
        }
        self.holder = Some(id);
        true
    }

    fn release(&mut self, id: ConnectionId) -> bool {
        if self.holder != Some(id) {
            return false;
        }
        self.holder = None;
        true
    }

    fn force_release(&mut self, id: ConnectionId) {
        if self.holder == Some(id) {
            self.holder = None;
        }
    }
}

/// Ability set and client id a freshly (re)connected handler should start
/// with, shared with the front-end so `register_task`/`set_client_id`
/// update what the next `attempt_connect` sees, not just already-live
/// handlers.
#[derive(Default)]
struct WorkerInitialState {
    abilities: BTreeSet<Bytes>,
    client_id: Option<Bytes>,
}

struct WorkerFactory {
    initial_state: Arc<Mutex<WorkerInitialState>>,
    codec: Arc<dyn PayloadCodec>,
}

impl HandlerFactory for WorkerFactory {
    fn new_handler(&self) -> CommandHandler {
        let state = self.initial_state.lock().unwrap();
        CommandHandler::Worker(WorkerHandler::with_codec(
            state.abilities.clone(),
            state.client_id.clone(),
            self.codec.clone(),
        ))
    }

    fn initial_frames(&self, handler: &CommandHandler) -> Vec<OutboundFrame> {
        match handler {
            CommandHandler::Worker(w) => w.initial_frames(),
            _ => Vec::new(),
        }
    }
}

/// Releases the job lock when a connection dies mid-job: the manager
/// force-releases if that connection held the lock.
struct WorkerCleanup<'a> {
    lock: &'a mut JobLock,
}

impl HandlerEvents for WorkerCleanup<'_> {
    fn on_connection_error(&mut self, id: ConnectionId, _handler: &CommandHandler) {
        self.lock.force_release(id);
    }
}

pub struct GearmanWorker {
    manager: ConnectionManagerCore<WorkerFactory>,
    initial_state: Arc<Mutex<WorkerInitialState>>,
    callbacks: std::collections::HashMap<Bytes, Callback>,
    lock: JobLock,
}

impl GearmanWorker {
    pub fn new(config: GearmanConfig) -> Self {
        Self::with_codec(config, codec::identity())
    }

    /// As [`GearmanWorker::new`], but with a caller-supplied payload codec:
    /// decodes inbound job data before a callback sees it, and encodes a
    /// callback's output before it goes on the wire.
    pub fn with_codec(config: GearmanConfig, codec: Arc<dyn PayloadCodec>) -> Self {
        let initial_state = Arc::new(Mutex::new(WorkerInitialState::default()));
        let factory = WorkerFactory { initial_state: initial_state.clone(), codec };
        Self {
            manager: ConnectionManagerCore::new(config.servers, factory),
            initial_state,
            callbacks: std::collections::HashMap::new(),
            lock: JobLock::default(),
        }
    }

    /// Registers a task handler and tells every live connection's handler
    /// about the new ability set: re-sent as `RESET_ABILITIES` + full
    /// re-registration, over a snapshotted connection-id list so a
    /// mid-iteration disconnect can't corrupt the fan-out. Also updates the
    /// shared initial state so a connection established later (including a
    /// reconnect) registers the current ability set instead of the one in
    /// effect when the worker was constructed.
    pub async fn register_task(&mut self, task: impl Into<Bytes>, callback: Callback) {
        let task = task.into();
        self.initial_state.lock().unwrap().abilities.insert(task.clone());
        self.callbacks.insert(task, callback);
        self.broadcast_abilities().await;
    }

    pub async fn unregister_task(&mut self, task: &[u8]) {
        self.initial_state.lock().unwrap().abilities.remove(task);
        self.callbacks.remove(task);
        self.broadcast_abilities().await;
    }

    pub async fn set_client_id(&mut self, client_id: impl Into<Bytes>) {
        let client_id = client_id.into();
        self.initial_state.lock().unwrap().client_id = Some(client_id.clone());
        let ids = self.manager.connection_ids();
        for id in ids {
            if let Some(CommandHandler::Worker(h)) = self.manager.handler_mut(id) {
                let frame = h.set_client_id(client_id.clone());
                if let Some(conn) = self.manager.connection_mut(id) {
                    let _ = conn.send(frame).await;
                    let _ = conn.flush().await;
                }
            }
        }
    }

    async fn broadcast_abilities(&mut self) {
        let abilities = self.initial_state.lock().unwrap().abilities.clone();
        let ids = self.manager.connection_ids();
        for id in ids {
            if let Some(CommandHandler::Worker(h)) = self.manager.handler_mut(id) {
                let frames = h.set_abilities(abilities.clone());
                if let Some(conn) = self.manager.connection_mut(id) {
                    for frame in frames {
                        let _ = conn.send(frame).await;
                    }
                    let _ = conn.flush().await;
                }
            }
        }
    }

    /// Returns a shuffled list of connections that are alive, attempting to
    /// (re)connect any that are dead first.
    async fn alive_connections_shuffled(&mut self) -> Vec<ConnectionId> {
        let mut ids = self.manager.connection_ids();
        ids.shuffle(&mut rand::thread_rng());

        let mut alive = Vec::with_capacity(ids.len());
        for id in ids {
            if self.manager.attempt_connect(id).await {
                alive.push(id);
            }
        }
        alive
    }

    /// Drives the worker loop for one `poll_timeout` window across every
    /// alive connection: each idle connection attempts `GRAB_JOB(_UNIQ)`,
    /// and any `JOB_ASSIGN` that lands runs its callback before the
    /// connection returns to `IDLE`. Call repeatedly (e.g. in a loop) to
    /// keep working; returns `false` once every connection has died.
    #[instrument(skip(self))]
    pub async fn work(&mut self, poll_timeout: Duration) -> bool {
        let alive = self.alive_connections_shuffled().await;
        if alive.is_empty() {
            return false;
        }

        for &id in &alive {
            if let Some(CommandHandler::Worker(h)) = self.manager.handler_mut(id) {
                if h.state == crate::handler::WorkerState::Idle {
                    let frame = h.grab_job(true);
                    if let Some(conn) = self.manager.connection_mut(id) {
                        let _ = conn.send(frame).await;
                        let _ = conn.flush().await;
                    }
                }
            }
        }

        let mut cleanup = WorkerCleanup { lock: &mut self.lock };
        // One bounded wake per call; callers loop `work()` themselves to
        // drive repeated single poll-and-dispatch passes.
        let summary = self.manager.poll_once(&alive, poll_timeout, &mut cleanup).await;

        for (id, event) in summary.events {
            if let HandlerEvent::JobReady(job) = event {
                self.run_job(id, job).await;
            }
        }

        true
    }

    async fn run_job(&mut self, connection: ConnectionId, job: Job) {
        if !self.lock.acquire(connection) {
            // Another connection already holds the lock; decline this
            // cycle and go back to sleep.
            if let Some(CommandHandler::Worker(h)) = self.manager.handler_mut(connection) {
                let frame = OutboundFrame::Command(crate::wire::Command::PreSleep);
                h.state = crate::handler::WorkerState::Sleeping;
                if let Some(conn) = self.manager.connection_mut(connection) {
                    let _ = conn.send(frame).await;
                    let _ = conn.flush().await;
                }
            }
            return;
        }

        let handle = job.handle.clone();
        let outcome = match self.callbacks.get(&job.task) {
            Some(callback) => callback(job).await,
            None => JobOutcome::Fail,
        };

        self.lock.release(connection);

        if let Some(CommandHandler::Worker(h)) = self.manager.handler_mut(connection) {
            let frames = h.complete_job(handle, outcome);
            if let Some(conn) = self.manager.connection_mut(connection) {
                for frame in frames {
                    let _ = conn.send(frame).await;
                }
                let _ = conn.flush().await;
            }
        }
        debug!(connection, "job finished, returning to idle");
    }

    /// Emits `WORK_DATA` on the connection the job came from. Callbacks may
    /// send these synchronously while the job is running; the poller
    /// flushes them on the same or next wake (here: immediately, since
    /// `Connection::send` buffers and `flush` drains to the socket).
    pub async fn send_job_data(&mut self, job: &Job, data: impl Into<Bytes>) -> Result<(), Error> {
        self.send_update(job, |h| h.send_job_data(job.handle.clone(), data.into())).await
    }

    pub async fn send_job_warning(&mut self, job: &Job, data: impl Into<Bytes>) -> Result<(), Error> {
        self.send_update(job, |h| h.send_job_warning(job.handle.clone(), data.into())).await
    }

    pub async fn send_job_status(
        &mut self,
        job: &Job,
        numerator: f64,
        denominator: f64,
    ) -> Result<(), Error> {
        self.send_update(job, |h| h.send_job_status(job.handle.clone(), numerator, denominator))
            .await
    }

    async fn send_update(
        &mut self,
        job: &Job,
        build: impl FnOnce(&WorkerHandler) -> OutboundFrame,
    ) -> Result<(), Error> {
        let Some(CommandHandler::Worker(h)) = self.manager.handler(job.connection) else {
            return Err(Error::InvalidWorkerState("connection for job is gone".into()));
        };
        let frame = build(h);
        let Some(conn) = self.manager.connection_mut(job.connection) else {
            return Err(Error::InvalidWorkerState("connection for job is gone".into()));
        };
        conn.send(frame).await?;
        conn.flush().await?;
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.lock = JobLock::default();
        self.manager.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_lock_excludes_concurrent_holders() {
        let mut lock = JobLock::default();
        assert!(lock.acquire(1));
        assert!(!lock.acquire(2));
        assert!(lock.release(1));
        assert!(lock.acquire(2));
    }

    #[test]
    fn job_lock_release_requires_matching_holder() {
        let mut lock = JobLock::default();
        lock.acquire(1);
        assert!(!lock.release(2));
        assert!(lock.release(1));
    }

    #[test]
    fn force_release_only_clears_matching_holder() {
        let mut lock = JobLock::default();
        lock.acquire(1);
        lock.force_release(2);
        assert!(!lock.acquire(3)); // still held by 1
        lock.force_release(1);
        assert!(lock.acquire(3));
    }
}
