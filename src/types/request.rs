//! Client-side job request: the object a `submit_job` call returns a handle
//! to, and that the client command handler mutates as server replies arrive.

use std::time::Instant;

use bytes::Bytes;

use super::states::{Priority, RequestState};

/// A status snapshot from `STATUS_RES`, in response to `GET_STATUS`.
#[derive(Clone, Debug)]
pub struct ServerStatus {
    pub known: bool,
    pub running: bool,
    pub numerator: f64,
    pub denominator: f64,
    /// Raw wire bytes, preserved for callers that don't trust the `f64` cast.
    pub numerator_raw: Bytes,
    pub denominator_raw: Bytes,
    pub time_received: Instant,
}

/// A single client-side job submission and everything the handler has
/// learned about it since.
///
/// Owned exclusively by the client command handler of the connection it was
/// submitted on; the manager hands callers read-only snapshots rather than a
/// live reference, so there is no caller/handler aliasing.
#[derive(Clone, Debug)]
pub struct JobRequest {
    pub task: Bytes,
    pub unique: Bytes,
    pub data: Bytes,
    pub background: bool,
    pub priority: Priority,

    pub state: RequestState,
    pub handle: Option<Bytes>,

    pub data_updates: Vec<Bytes>,
    pub warning_updates: Vec<Bytes>,
    pub status_updates: Vec<(f64, f64)>,

    pub result: Option<Bytes>,
    pub exception: Option<Bytes>,
    pub server_status: Option<ServerStatus>,
}

impl JobRequest {
    pub fn new(
        task: Bytes,
        unique: Bytes,
        data: Bytes,
        background: bool,
        priority: Priority,
    ) -> Self {
        Self {
            task,
            unique,
            data,
            background,
            priority,
            state: RequestState::Pending,
            handle: None,
            data_updates: Vec::new(),
            warning_updates: Vec::new(),
            status_updates: Vec::new(),
            result: None,
            exception: None,
            server_status: None,
        }
    }

    /// Moves to `next`, panicking if the transition isn't legal. The command
    /// handler is the only code path that calls this, and it only ever does
    /// so after validating the precondition implied by the wire event that
    /// triggered the call (e.g. a `handle_to_request` lookup succeeding) —
    /// an illegal transition here is a bug in the handler, not a condition
    /// a caller needs to recover from.
    pub(crate) fn transition(&mut self, next: RequestState) {
        assert!(
            self.state.can_transition_to(next),
            "illegal job request transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}

/// A read-only snapshot of a `JobRequest`, returned to application code by
/// the manager's query methods. Cloned out of the live request so the
/// caller can inspect state without holding a reference into handler-owned
/// data.
#[derive(Clone, Debug)]
pub struct JobRequestView {
    pub task: Bytes,
    pub unique: Bytes,
    pub background: bool,
    pub priority: Priority,
    pub state: RequestState,
    pub handle: Option<Bytes>,
    pub data_updates: Vec<Bytes>,
    pub warning_updates: Vec<Bytes>,
    pub status_updates: Vec<(f64, f64)>,
    pub result: Option<Bytes>,
    pub exception: Option<Bytes>,
    pub server_status: Option<ServerStatus>,
}

impl From<&JobRequest> for JobRequestView {
    fn from(r: &JobRequest) -> Self {
        Self {
            task: r.task.clone(),
            unique: r.unique.clone(),
            background: r.background,
            priority: r.priority,
            state: r.state,
            handle: r.handle.clone(),
            data_updates: r.data_updates.clone(),
            warning_updates: r.warning_updates.clone(),
            status_updates: r.status_updates.clone(),
            result: r.result.clone(),
            exception: r.exception.clone(),
            server_status: r.server_status.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "illegal job request transition")]
    fn transition_panics_on_illegal_move() {
        let mut req = JobRequest::new(
            Bytes::from_static(b"reverse"),
            Bytes::new(),
            Bytes::from_static(b"abc"),
            false,
            Priority::Normal,
        );
        req.transition(RequestState::Complete);
    }

    #[test]
    fn transition_follows_lifecycle() {
        let mut req = JobRequest::new(
            Bytes::from_static(b"reverse"),
            Bytes::new(),
            Bytes::from_static(b"abc"),
            false,
            Priority::Normal,
        );
        req.transition(RequestState::Queued);
        req.transition(RequestState::Complete);
        assert_eq!(req.state, RequestState::Complete);
    }
}
