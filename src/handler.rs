//! The three `CommandHandler` variants: per-connection protocol state
//! machines that turn inbound frames into state changes (and sometimes
//! outbound frames), and outbound calls into frames to send.
//!
//! Rather than a class hierarchy with a `recv_<command>` dispatch table
//! built from dynamic method lookup, this is a single enum plus a
//! `dispatch` function with a compile-time exhaustive match.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use bytes::Bytes;

use crate::codec::{self, PayloadCodec};
use crate::conn::ConnectionId;
use crate::errors::Error;
use crate::types::job::{Job, JobOutcome};
use crate::types::request::{JobRequest, ServerStatus};
use crate::types::states::RequestState;
use crate::wire::protocol::{self, AdminCommand, AdminResponse, AdminResponseKind, Command};
use crate::wire::{InboundFrame, OutboundFrame};

/// Identifies one client-side [`JobRequest`] within a single
/// [`ClientHandler`]; assigned at `submit` time, before the server has
/// handed back a handle.
pub type RequestId = u64;

/// Per-connection protocol state: exactly one of the three variants is
/// live on a given connection, selected by which front-end created it.
pub enum CommandHandler {
    Client(ClientHandler),
    Worker(WorkerHandler),
    Admin(AdminHandler),
}

/// Side effects of dispatching one inbound frame that the manager/front-end
/// must act on beyond just updating handler state.
pub enum HandlerEvent {
    /// A job was assigned to the worker and is ready for its callback.
    JobReady(Job),
    /// An admin response is ready for the caller to pop.
    AdminResponseReady,
}

/// Dispatches one inbound frame to the right handler-specific logic.
/// Returns any frames that must be sent back immediately (e.g. a worker's
/// `PRE_SLEEP` after `NO_JOB`) plus any [`HandlerEvent`]s for the caller.
pub fn dispatch(
    handler: &mut CommandHandler,
    connection: ConnectionId,
    frame: InboundFrame,
) -> Result<(Vec<OutboundFrame>, Vec<HandlerEvent>), Error> {
    match handler {
        CommandHandler::Client(h) => h.on_frame(frame),
        CommandHandler::Worker(h) => h.on_frame(connection, frame),
        CommandHandler::Admin(h) => h.on_frame(frame),
    }
}

// ---------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------

/// Client-side state machine: a FIFO of submissions awaiting their
/// server-assigned handle, plus a handle-keyed index once assigned.
pub struct ClientHandler {
    next_id: RequestId,
    pub requests: BTreeMap<RequestId, JobRequest>,
    pub requests_awaiting_handle: VecDeque<RequestId>,
    pub handle_to_request: BTreeMap<Bytes, RequestId>,
    codec: Arc<dyn PayloadCodec>,
}

impl Default for ClientHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientHandler {
    pub fn new() -> Self {
        Self::with_codec(codec::identity())
    }

    /// As [`ClientHandler::new`], but with a caller-supplied payload codec
    /// instead of the pass-through default.
    pub fn with_codec(codec: Arc<dyn PayloadCodec>) -> Self {
        Self {
            next_id: 0,
            requests: BTreeMap::new(),
            requests_awaiting_handle: VecDeque::new(),
            handle_to_request: BTreeMap::new(),
            codec,
        }
    }

    /// Selects the right `SUBMIT_JOB*` variant, enqueues the request as
    /// `PENDING`, and returns its id plus the frame to send. The outbound
    /// payload is run through the configured codec's `encode`; the
    /// request's stored `data` keeps the original, un-encoded bytes.
    pub fn send_job_request(&mut self, req: JobRequest) -> (RequestId, OutboundFrame) {
        let id = self.next_id;
        self.next_id += 1;

        let command = protocol::submit_command_for(
            req.background,
            req.priority,
            req.task.clone(),
            req.unique.clone(),
            self.codec.encode(req.data.clone()),
        );

        self.requests.insert(id, req);
        self.requests_awaiting_handle.push_back(id);

        (id, OutboundFrame::Command(command))
    }

    fn on_frame(
        &mut self,
        frame: InboundFrame,
    ) -> Result<(Vec<OutboundFrame>, Vec<HandlerEvent>), Error> {
        let InboundFrame::Command(command) = frame else {
            return Err(Error::InvalidClientState(
                "client connection received a text admin frame".into(),
            ));
        };

        match command {
            Command::JobCreated { handle } => self.recv_job_created(handle)?,
            Command::WorkData { handle, data } => self.recv_work_data(handle, data)?,
            Command::WorkWarning { handle, data } => self.recv_work_warning(handle, data)?,
            Command::WorkStatus { handle, numerator, denominator } => {
                self.recv_work_status(handle, numerator, denominator)?
            },
            Command::WorkComplete { handle, data } => self.recv_work_complete(handle, data)?,
            Command::WorkFail { handle } => self.recv_work_fail(handle)?,
            Command::WorkException { handle, data } => {
                self.recv_work_exception(handle, data)?
            },
            Command::StatusRes { handle, known, running, numerator, denominator } => {
                self.recv_status_res(handle, known, running, numerator, denominator)?
            },
            Command::Error { name, text } => {
                return Err(Error::InvalidClientState(format!(
                    "server error: {} ({})",
                    String::from_utf8_lossy(&name),
                    String::from_utf8_lossy(&text)
                )));
            },
            other => {
                return Err(Error::InvalidClientState(format!(
                    "unexpected command for client connection: {:?}",
                    other.code()
                )));
            },
        }

        Ok((Vec::new(), Vec::new()))
    }

    /// The FIFO must match server reply order — the head of
    /// `requests_awaiting_handle` is always the next request to receive a
    /// handle.
    fn recv_job_created(&mut self, handle: Bytes) -> Result<(), Error> {
        let id = self
            .requests_awaiting_handle
            .pop_front()
            .ok_or_else(|| Error::InvalidClientState("JOB_CREATED with no pending submit".into()))?;

        let req = self.requests.get_mut(&id).expect("request id always present");
        req.handle = Some(handle.clone());
        req.transition(RequestState::Queued);
        self.handle_to_request.insert(handle, id);
        Ok(())
    }

    fn queued_request(&mut self, handle: &Bytes) -> Result<&mut JobRequest, Error> {
        let id = *self
            .handle_to_request
            .get(handle)
            .ok_or_else(|| Error::InvalidClientState(format!("unknown handle {handle:?}")))?;
        let req = self.requests.get_mut(&id).expect("request id always present");
        if req.state != RequestState::Queued {
            return Err(Error::InvalidClientState(format!(
                "received update for request in state {:?}",
                req.state
            )));
        }
        Ok(req)
    }

    fn recv_work_data(&mut self, handle: Bytes, data: Bytes) -> Result<(), Error> {
        let data = self.codec.decode(data);
        self.queued_request(&handle)?.data_updates.push(data);
        Ok(())
    }

    fn recv_work_warning(&mut self, handle: Bytes, data: Bytes) -> Result<(), Error> {
        let data = self.codec.decode(data);
        self.queued_request(&handle)?.warning_updates.push(data);
        Ok(())
    }

    fn recv_work_status(
        &mut self,
        handle: Bytes,
        numerator: Bytes,
        denominator: Bytes,
    ) -> Result<(), Error> {
        let num = parse_f64(&numerator);
        let den = parse_f64(&denominator);
        self.queued_request(&handle)?.status_updates.push((num, den));
        Ok(())
    }

    fn recv_work_complete(&mut self, handle: Bytes, data: Bytes) -> Result<(), Error> {
        let data = self.codec.decode(data);
        let req = self.queued_request(&handle)?;
        req.result = Some(data);
        req.transition(RequestState::Complete);
        Ok(())
    }

    fn recv_work_fail(&mut self, handle: Bytes) -> Result<(), Error> {
        self.queued_request(&handle)?.transition(RequestState::Failed);
        Ok(())
    }

    /// Stores the exception payload but does not change state — a
    /// `WORK_COMPLETE`/`WORK_FAIL` is expected to follow.
    fn recv_work_exception(&mut self, handle: Bytes, data: Bytes) -> Result<(), Error> {
        let data = self.codec.decode(data);
        self.queued_request(&handle)?.exception = Some(data);
        Ok(())
    }

    fn recv_status_res(
        &mut self,
        handle: Bytes,
        known: Bytes,
        running: Bytes,
        numerator: Bytes,
        denominator: Bytes,
    ) -> Result<(), Error> {
        let req = self.queued_request(&handle)?;
        req.server_status = Some(ServerStatus {
            known: known.as_ref() == b"1",
            running: running.as_ref() == b"1",
            numerator: parse_f64(&numerator),
            denominator: parse_f64(&denominator),
            numerator_raw: numerator,
            denominator_raw: denominator,
            time_received: std::time::Instant::now(),
        });
        Ok(())
    }
}

fn parse_f64(b: &Bytes) -> f64 {
    std::str::from_utf8(b).ok().and_then(|s| s.parse().ok()).unwrap_or(0.0)
}

// ---------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------

/// A worker connection's position in the GRAB cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerState {
    Idle,
    GrabTry,
    Sleeping,
    /// Holds the job lock and is awaiting callback completion; the manager
    /// drives the callback, then calls back into the handler to send
    /// `WORK_COMPLETE`/`WORK_FAIL` and release the lock.
    Working,
}

/// Worker-side per-connection state.
pub struct WorkerHandler {
    pub abilities: BTreeSet<Bytes>,
    pub client_id: Option<Bytes>,
    pub state: WorkerState,
    codec: Arc<dyn PayloadCodec>,
}

impl WorkerHandler {
    pub fn new(abilities: BTreeSet<Bytes>, client_id: Option<Bytes>) -> Self {
        Self::with_codec(abilities, client_id, codec::identity())
    }

    /// As [`WorkerHandler::new`], but with a caller-supplied payload codec.
    pub fn with_codec(
        abilities: BTreeSet<Bytes>,
        client_id: Option<Bytes>,
        codec: Arc<dyn PayloadCodec>,
    ) -> Self {
        Self { abilities, client_id, state: WorkerState::Idle, codec }
    }

    /// Frames to send once this handler is attached to a freshly
    /// established connection: `CAN_DO` per ability, then `SET_CLIENT_ID`
    /// if configured.
    pub fn initial_frames(&self) -> Vec<OutboundFrame> {
        let mut frames: Vec<OutboundFrame> = self
            .abilities
            .iter()
            .map(|task| OutboundFrame::Command(Command::CanDo { task: task.clone() }))
            .collect();
        if let Some(client_id) = &self.client_id {
            frames.push(OutboundFrame::Command(Command::SetClientId {
                client_id: client_id.clone(),
            }));
        }
        frames
    }

    /// Sends `RESET_ABILITIES` followed by `CAN_DO` for every ability in
    /// the new set.
    pub fn set_abilities(&mut self, abilities: BTreeSet<Bytes>) -> Vec<OutboundFrame> {
        self.abilities = abilities;
        let mut frames = vec![OutboundFrame::Command(Command::ResetAbilities)];
        frames.extend(
            self.abilities
                .iter()
                .map(|task| OutboundFrame::Command(Command::CanDo { task: task.clone() })),
        );
        frames
    }

    pub fn set_client_id(&mut self, client_id: Bytes) -> OutboundFrame {
        self.client_id = Some(client_id.clone());
        OutboundFrame::Command(Command::SetClientId { client_id })
    }

    /// IDLE -> GRAB_TRY: attempt to grab a job.
    pub fn grab_job(&mut self, unique: bool) -> OutboundFrame {
        self.state = WorkerState::GrabTry;
        OutboundFrame::Command(if unique { Command::GrabJobUniq } else { Command::GrabJob })
    }

    fn on_frame(
        &mut self,
        connection: ConnectionId,
        frame: InboundFrame,
    ) -> Result<(Vec<OutboundFrame>, Vec<HandlerEvent>), Error> {
        let InboundFrame::Command(command) = frame else {
            return Err(Error::InvalidWorkerState(
                "worker connection received a text admin frame".into(),
            ));
        };

        match command {
            Command::NoJob => self.recv_no_job(),
            Command::Noop => self.recv_noop(),
            Command::JobAssign { handle, task, data } => {
                Ok(self.recv_job_assign(connection, handle, task, Bytes::new(), data))
            },
            Command::JobAssignUniq { handle, task, unique, data } => {
                Ok(self.recv_job_assign(connection, handle, task, unique, data))
            },
            Command::Error { name, text } => Err(Error::InvalidWorkerState(format!(
                "server error: {} ({})",
                String::from_utf8_lossy(&name),
                String::from_utf8_lossy(&text)
            ))),
            other => Err(Error::InvalidWorkerState(format!(
                "unexpected command for worker connection: {:?}",
                other.code()
            ))),
        }
    }

    /// GRAB_TRY on `NO_JOB` -> send `PRE_SLEEP` -> SLEEPING.
    fn recv_no_job(&mut self) -> Result<(Vec<OutboundFrame>, Vec<HandlerEvent>), Error> {
        if self.state != WorkerState::GrabTry {
            return Err(Error::InvalidWorkerState(format!(
                "NO_JOB received while in state {:?}",
                self.state
            )));
        }
        self.state = WorkerState::Sleeping;
        Ok((vec![OutboundFrame::Command(Command::PreSleep)], Vec::new()))
    }

    /// SLEEPING on `NOOP` -> IDLE (caller re-attempts `GRAB_JOB`).
    fn recv_noop(&mut self) -> Result<(Vec<OutboundFrame>, Vec<HandlerEvent>), Error> {
        if self.state != WorkerState::Sleeping {
            return Err(Error::InvalidWorkerState(format!(
                "NOOP received while in state {:?}",
                self.state
            )));
        }
        self.state = WorkerState::Idle;
        Ok((Vec::new(), Vec::new()))
    }

    /// GRAB_TRY on `JOB_ASSIGN(_UNIQ)` -> WORKING; surfaces the job for the
    /// manager to run the callback on. Acquiring the worker-wide job lock
    /// is the front-end's responsibility since the lock spans every
    /// connection, not just this one.
    fn recv_job_assign(
        &mut self,
        connection: ConnectionId,
        handle: Bytes,
        task: Bytes,
        unique: Bytes,
        data: Bytes,
    ) -> (Vec<OutboundFrame>, Vec<HandlerEvent>) {
        self.state = WorkerState::Working;
        let data = self.codec.decode(data);
        let job = Job { connection, handle, task, unique, data };
        (Vec::new(), vec![HandlerEvent::JobReady(job)])
    }

    /// Sends the `WORK_*` frames for a finished job and returns to IDLE. The
    /// callback's output bytes are run through the configured codec's
    /// `encode` before going on the wire.
    pub fn complete_job(&mut self, handle: Bytes, outcome: JobOutcome) -> Vec<OutboundFrame> {
        self.state = WorkerState::Idle;
        match outcome {
            JobOutcome::Complete(data) => {
                let data = self.codec.encode(data);
                vec![OutboundFrame::Command(Command::WorkComplete { handle, data })]
            },
            JobOutcome::Exception(data) => {
                let data = self.codec.encode(data);
                vec![
                    OutboundFrame::Command(Command::WorkException { handle: handle.clone(), data }),
                    OutboundFrame::Command(Command::WorkFail { handle }),
                ]
            },
            JobOutcome::Fail => vec![OutboundFrame::Command(Command::WorkFail { handle })],
        }
    }

    pub fn send_job_data(&self, handle: Bytes, data: Bytes) -> OutboundFrame {
        OutboundFrame::Command(Command::WorkData { handle, data: self.codec.encode(data) })
    }

    pub fn send_job_warning(&self, handle: Bytes, data: Bytes) -> OutboundFrame {
        OutboundFrame::Command(Command::WorkWarning { handle, data: self.codec.encode(data) })
    }

    pub fn send_job_status(&self, handle: Bytes, numerator: f64, denominator: f64) -> OutboundFrame {
        OutboundFrame::Command(Command::WorkStatus {
            handle,
            numerator: numerator.to_string().into_bytes().into(),
            denominator: denominator.to_string().into_bytes().into(),
        })
    }
}

// ---------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------

/// Admin-side per-connection state: a blocking request/response pattern,
/// one command in flight at a time in practice but modeled as a FIFO.
#[derive(Default)]
pub struct AdminHandler {
    pending: VecDeque<AdminResponseKind>,
    pub response_ready: bool,
    pub response_queue: VecDeque<(AdminResponseKind, AdminResponse)>,
}

impl AdminHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a response of `kind` is now expected; the caller is
    /// responsible for also telling the connection's codec which
    /// terminator applies (`Connection::expect_admin_response`) and for
    /// actually sending the command frame.
    pub fn expect(&mut self, kind: AdminResponseKind) {
        self.pending.push_back(kind);
        self.response_ready = false;
    }

    pub fn pop_response(&mut self) -> Option<(AdminResponseKind, AdminResponse)> {
        let popped = self.response_queue.pop_front();
        self.response_ready = !self.response_queue.is_empty();
        popped
    }

    fn on_frame(
        &mut self,
        frame: InboundFrame,
    ) -> Result<(Vec<OutboundFrame>, Vec<HandlerEvent>), Error> {
        let expected = self.pending.pop_front().ok_or_else(|| {
            Error::InvalidAdminClientState("received a response with nothing pending".into())
        })?;

        let response = match (expected, frame) {
            (AdminResponseKind::Echo, InboundFrame::Command(Command::EchoRes { data })) => {
                AdminResponse::Echo(data)
            },
            (AdminResponseKind::Status, InboundFrame::AdminLines(lines)) => {
                AdminResponse::Status(lines.iter().filter_map(|l| protocol::parse_status_line(l)).collect())
            },
            (AdminResponseKind::Workers, InboundFrame::AdminLines(lines)) => {
                AdminResponse::Workers(lines.iter().filter_map(|l| protocol::parse_worker_line(l)).collect())
            },
            (AdminResponseKind::Version, InboundFrame::AdminLines(lines)) => {
                AdminResponse::Version(lines.into_iter().next().unwrap_or_default())
            },
            (AdminResponseKind::MaxQueue, InboundFrame::AdminLines(_)) => AdminResponse::MaxQueue,
            (AdminResponseKind::Shutdown, InboundFrame::AdminLines(_)) => AdminResponse::Shutdown,
            (expected, _) => {
                return Err(Error::InvalidAdminClientState(format!(
                    "received a response of unexpected kind, expecting {expected:?}"
                )));
            },
        };

        self.response_queue.push_back((expected, response));
        self.response_ready = true;
        Ok((Vec::new(), vec![HandlerEvent::AdminResponseReady]))
    }
}

/// Builds the outbound frame(s) plus the expected-response bookkeeping for
/// one admin command — a thin helper so `GearmanAdminClient` doesn't need
/// to know codec/terminator details.
pub fn send_admin_command(
    handler: &mut AdminHandler,
    command: &AdminCommand,
) -> OutboundFrame {
    handler.expect(command.response_kind());
    OutboundFrame::AdminLine(command.to_line().into_bytes().into())
}

pub fn send_echo_request(handler: &mut AdminHandler, payload: Bytes) -> OutboundFrame {
    handler.expect(AdminResponseKind::Echo);
    OutboundFrame::Command(Command::EchoReq { data: payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::states::Priority;

    fn req(task: &str) -> JobRequest {
        JobRequest::new(
            Bytes::copy_from_slice(task.as_bytes()),
            Bytes::new(),
            Bytes::from_static(b"data"),
            false,
            Priority::Normal,
        )
    }

    #[test]
    fn submit_ordering_matches_job_created_order() {
        let mut h = ClientHandler::new();
        let (id1, _) = h.send_job_request(req("a"));
        let (id2, _) = h.send_job_request(req("b"));

        h.recv_job_created(Bytes::from_static(b"H:1")).unwrap();
        h.recv_job_created(Bytes::from_static(b"H:2")).unwrap();

        assert_eq!(h.requests[&id1].handle, Some(Bytes::from_static(b"H:1")));
        assert_eq!(h.requests[&id2].handle, Some(Bytes::from_static(b"H:2")));
    }

    #[test]
    fn job_created_without_pending_submit_errors() {
        let mut h = ClientHandler::new();
        assert!(h.recv_job_created(Bytes::from_static(b"H:1")).is_err());
    }

    #[test]
    fn full_client_lifecycle() {
        let mut h = ClientHandler::new();
        let (id, _) = h.send_job_request(req("reverse"));
        h.recv_job_created(Bytes::from_static(b"H:1")).unwrap();
        h.recv_work_status(Bytes::from_static(b"H:1"), Bytes::from_static(b"3"), Bytes::from_static(b"10"))
            .unwrap();
        h.recv_work_data(Bytes::from_static(b"H:1"), Bytes::from_static(b"part")).unwrap();
        h.recv_work_complete(Bytes::from_static(b"H:1"), Bytes::from_static(b"done")).unwrap();

        let r = &h.requests[&id];
        assert_eq!(r.state, RequestState::Complete);
        assert_eq!(r.status_updates, vec![(3.0, 10.0)]);
        assert_eq!(r.data_updates, vec![Bytes::from_static(b"part")]);
        assert_eq!(r.result, Some(Bytes::from_static(b"done")));
    }

    struct ReverseCodec;
    impl PayloadCodec for ReverseCodec {
        fn encode(&self, data: Bytes) -> Bytes {
            data.iter().rev().copied().collect::<Vec<u8>>().into()
        }
        fn decode(&self, data: Bytes) -> Bytes {
            self.encode(data)
        }
    }

    #[test]
    fn custom_codec_encodes_outbound_and_decodes_inbound() {
        let mut h = ClientHandler::with_codec(Arc::new(ReverseCodec));
        let (id, frame) = h.send_job_request(req("reverse"));
        let OutboundFrame::Command(Command::SubmitJob { data, .. }) = frame else {
            panic!("expected SubmitJob");
        };
        assert_eq!(data, Bytes::from_static(b"atad")); // "data" reversed

        h.recv_job_created(Bytes::from_static(b"H:1")).unwrap();
        h.recv_work_complete(Bytes::from_static(b"H:1"), Bytes::from_static(b"enod")).unwrap();
        assert_eq!(h.requests[&id].result, Some(Bytes::from_static(b"done")));
    }

    #[test]
    fn work_exception_does_not_change_state() {
        let mut h = ClientHandler::new();
        let (id, _) = h.send_job_request(req("reverse"));
        h.recv_job_created(Bytes::from_static(b"H:1")).unwrap();
        h.recv_work_exception(Bytes::from_static(b"H:1"), Bytes::from_static(b"boom")).unwrap();
        assert_eq!(h.requests[&id].state, RequestState::Queued);
        assert_eq!(h.requests[&id].exception, Some(Bytes::from_static(b"boom")));
    }

    #[test]
    fn worker_grab_sleep_wake_cycle() {
        let mut w = WorkerHandler::new(BTreeSet::new(), None);
        w.grab_job(false);
        assert_eq!(w.state, WorkerState::GrabTry);

        let (out, _) = w.recv_no_job().unwrap();
        assert_eq!(w.state, WorkerState::Sleeping);
        assert!(matches!(out[0], OutboundFrame::Command(Command::PreSleep)));

        w.recv_noop().unwrap();
        assert_eq!(w.state, WorkerState::Idle);
    }

    #[test]
    fn worker_job_assign_reaches_working_and_surfaces_job() {
        let mut w = WorkerHandler::new(BTreeSet::new(), None);
        w.grab_job(true);
        let (_, events) = w
            .on_frame(
                7,
                InboundFrame::Command(Command::JobAssignUniq {
                    handle: Bytes::from_static(b"H:1"),
                    task: Bytes::from_static(b"reverse"),
                    unique: Bytes::from_static(b"u"),
                    data: Bytes::from_static(b"abc"),
                }),
            )
            .unwrap();
        assert_eq!(w.state, WorkerState::Working);
        assert!(matches!(events[0], HandlerEvent::JobReady(_)));
    }

    #[test]
    fn admin_kind_mismatch_errors() {
        // Echo expects a binary EchoRes frame, not text admin lines.
        let mut h = AdminHandler::new();
        h.expect(AdminResponseKind::Echo);
        assert!(h
            .on_frame(InboundFrame::AdminLines(vec![Bytes::from_static(b"x")]))
            .is_err());
    }

    #[test]
    fn admin_response_with_nothing_pending_errors() {
        let mut h = AdminHandler::new();
        assert!(h.on_frame(InboundFrame::AdminLines(vec![])).is_err());
    }

    #[test]
    fn admin_status_response_parses_lines() {
        let mut h = AdminHandler::new();
        h.expect(AdminResponseKind::Status);
        h.on_frame(InboundFrame::AdminLines(vec![Bytes::from_static(b"reverse\t1\t0\t2")]))
            .unwrap();
        assert!(h.response_ready);
        let (kind, response) = h.pop_response().unwrap();
        assert_eq!(kind, AdminResponseKind::Status);
        assert!(matches!(response, AdminResponse::Status(lines) if lines.len() == 1));
    }
}
