//! The error taxonomy from the spec: connection failures are absorbed by the
//! manager and never surface mid-poll, while protocol and state errors
//! propagate to the caller.

use std::{error, fmt, io};

use crate::wire::{decoder, encoder};

/// Errors that can surface from the public client/worker/admin front-ends.
#[derive(Debug)]
pub enum Error {
    /// TCP connect or I/O error. The manager marks the connection dead and
    /// invokes its error-cleanup hook; this variant is not raised mid-poll,
    /// only from calls that require an established connection up front
    /// (e.g. the admin client's constructor).
    ConnectionFailed(io::Error),
    /// No connection in the host list could be established when one was
    /// required immediately (admin client constructor).
    ServerUnavailable(String),
    /// A malformed frame, unknown command code, or over-long payload.
    Protocol(decoder::Error),
    /// The remote sent a message that's semantically impossible for a
    /// client-side job request's current state.
    InvalidClientState(String),
    /// The remote sent a message that's semantically impossible for the
    /// worker's current grab-cycle state.
    InvalidWorkerState(String),
    /// An admin response arrived of a different kind than expected, or the
    /// admin poll exceeded its timeout.
    InvalidAdminClientState(String),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::ConnectionFailed(e) => Some(e),
            Error::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConnectionFailed(e) => write!(f, "connection failed: {e}"),
            Error::ServerUnavailable(msg) => write!(f, "server unavailable: {msg}"),
            Error::Protocol(e) => write!(f, "protocol error: {e}"),
            Error::InvalidClientState(msg) => write!(f, "invalid client state: {msg}"),
            Error::InvalidWorkerState(msg) => write!(f, "invalid worker state: {msg}"),
            Error::InvalidAdminClientState(msg) => {
                write!(f, "invalid admin client state: {msg}")
            },
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::ConnectionFailed(value)
    }
}

impl From<decoder::Error> for Error {
    fn from(value: decoder::Error) -> Self {
        Self::Protocol(value)
    }
}

impl From<encoder::Error> for Error {
    fn from(value: encoder::Error) -> Self {
        match value {
            encoder::Error::Io(e) => Self::ConnectionFailed(e),
        }
    }
}
