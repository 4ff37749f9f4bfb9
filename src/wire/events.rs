//! The items the codec produces and consumes: a frame in each direction.
//!
//! Binary frames and admin text lines share one connection but are
//! disjoint at the protocol level, so both directions are modeled as a
//! two-variant enum rather than forcing admin text through the binary
//! `Command` schema.

use bytes::Bytes;

use super::protocol::Command;

/// An item decoded off the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InboundFrame {
    /// A fully framed binary command.
    Command(Command),
    /// The lines of a completed text-mode admin response, with the
    /// terminator (a lone `.`, if any) already stripped.
    AdminLines(Vec<Bytes>),
}

/// An item to write to the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OutboundFrame {
    /// Encoded as a binary frame regardless of whether the connection is
    /// otherwise in admin-text mode (e.g. `ECHO_REQ` for `ping_server`).
    Command(Command),
    /// One text line, written followed by `\n`.
    AdminLine(Bytes),
}

impl From<Command> for OutboundFrame {
    fn from(command: Command) -> Self {
        OutboundFrame::Command(command)
    }
}
