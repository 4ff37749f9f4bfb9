//! Worker-side job representation.

use bytes::Bytes;

use crate::conn::ConnectionId;

/// A job assigned to a worker by `JOB_ASSIGN`/`JOB_ASSIGN_UNIQ`.
///
/// Lives only for the duration of the user callback and the subsequent
/// `WORK_COMPLETE`/`WORK_FAIL` emission; the worker command handler
/// constructs one per grab, hands a reference to the registered callback,
/// and discards it once the outcome has been sent.
#[derive(Clone, Debug)]
pub struct Job {
    /// Which connection this job was assigned on — sending `WORK_*` updates
    /// for this job must go out on this same connection.
    pub connection: ConnectionId,
    pub handle: Bytes,
    pub task: Bytes,
    /// Empty if the job was assigned via plain `JOB_ASSIGN` rather than
    /// `JOB_ASSIGN_UNIQ`.
    pub unique: Bytes,
    pub data: Bytes,
}

/// The outcome of a worker callback, used by the worker command handler to
/// decide which `WORK_*` command(s) to send after a job is run.
#[derive(Clone, Debug)]
pub enum JobOutcome {
    Complete(Bytes),
    /// An exception payload followed by failure. `WORK_EXCEPTION` is sent
    /// first, then `WORK_FAIL`, treating the exception as informational
    /// rather than a distinct terminal state.
    Exception(Bytes),
    Fail,
}
