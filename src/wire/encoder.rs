//! Encodes [`OutboundFrame`]s to the wire: binary command packets, or raw
//! admin text lines.

use std::{error, fmt, io};

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec;

use super::events::OutboundFrame;
use super::protocol::Command;

#[derive(Debug, Default)]
pub struct Encoder;

impl codec::Encoder<OutboundFrame> for Encoder {
    type Error = Error;

    fn encode(&mut self, item: OutboundFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            OutboundFrame::Command(command) => encode_command(&command, dst),
            OutboundFrame::AdminLine(line) => {
                dst.reserve(line.len() + 1);
                dst.put_slice(&line);
                dst.put_u8(b'\n');
            },
        }
        Ok(())
    }
}

fn encode_command(command: &Command, dst: &mut BytesMut) {
    let magic = command.default_magic();
    let code = command.code();
    let fields = command_fields(command);

    let payload_len: usize =
        fields.iter().map(|f| f.len()).sum::<usize>() + fields.len().saturating_sub(1);

    dst.reserve(12 + payload_len);
    dst.put_slice(&magic.as_bytes());
    dst.put_u32(code.as_u32());
    dst.put_u32(payload_len as u32);
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            dst.put_u8(0);
        }
        dst.put_slice(field);
    }
}

/// Field values in wire order, per the per-command schema in
/// `wire::protocol::Command`.
fn command_fields(command: &Command) -> Vec<Bytes> {
    use Command::*;

    match command {
        CanDo { task } | CantDo { task } => vec![task.clone()],
        CanDoTimeout { task, timeout } => vec![task.clone(), timeout.clone()],
        ResetAbilities | PreSleep | Noop | GrabJob | GrabJobUniq | NoJob | AllYours => vec![],
        SetClientId { client_id } => vec![client_id.clone()],
        JobAssign { handle, task, data } => vec![handle.clone(), task.clone(), data.clone()],
        JobAssignUniq { handle, task, unique, data } => {
            vec![handle.clone(), task.clone(), unique.clone(), data.clone()]
        },
        SubmitJob { task, unique, data }
        | SubmitJobBg { task, unique, data }
        | SubmitJobHigh { task, unique, data }
        | SubmitJobHighBg { task, unique, data }
        | SubmitJobLow { task, unique, data }
        | SubmitJobLowBg { task, unique, data } => {
            vec![task.clone(), unique.clone(), data.clone()]
        },
        SubmitJobSched {
            task,
            unique,
            minute,
            hour,
            day_of_month,
            month,
            day_of_week,
            data,
        } => vec![
            task.clone(),
            unique.clone(),
            minute.clone(),
            hour.clone(),
            day_of_month.clone(),
            month.clone(),
            day_of_week.clone(),
            data.clone(),
        ],
        SubmitJobEpoch { task, unique, epoch, data } => {
            vec![task.clone(), unique.clone(), epoch.clone(), data.clone()]
        },
        JobCreated { handle } => vec![handle.clone()],
        WorkData { handle, data }
        | WorkWarning { handle, data }
        | WorkComplete { handle, data }
        | WorkException { handle, data } => vec![handle.clone(), data.clone()],
        WorkStatus { handle, numerator, denominator } => {
            vec![handle.clone(), numerator.clone(), denominator.clone()]
        },
        WorkFail { handle } => vec![handle.clone()],
        GetStatus { handle } => vec![handle.clone()],
        StatusRes { handle, known, running, numerator, denominator } => {
            vec![
                handle.clone(),
                known.clone(),
                running.clone(),
                numerator.clone(),
                denominator.clone(),
            ]
        },
        EchoReq { data } | EchoRes { data } => vec![data.clone()],
        OptionReq { option } | OptionRes { option } => vec![option.clone()],
        Error { name, text } => vec![name.clone(), text.clone()],
    }
}

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::codec::Encoder as _;

    use super::*;

    #[test]
    fn encodes_can_do_as_req_frame() {
        let mut dst = BytesMut::new();
        let mut enc = Encoder;
        enc.encode(
            OutboundFrame::Command(Command::CanDo { task: Bytes::from_static(b"reverse") }),
            &mut dst,
        )
        .unwrap();

        assert_eq!(&dst[0..4], b"\0REQ");
        assert_eq!(u32::from_be_bytes(dst[4..8].try_into().unwrap()), 1);
        assert_eq!(u32::from_be_bytes(dst[8..12].try_into().unwrap()), 7);
        assert_eq!(&dst[12..], b"reverse");
    }

    #[test]
    fn encodes_job_assign_as_res_frame() {
        let mut dst = BytesMut::new();
        let mut enc = Encoder;
        enc.encode(
            OutboundFrame::Command(Command::JobCreated { handle: Bytes::from_static(b"H:1") }),
            &mut dst,
        )
        .unwrap();

        assert_eq!(&dst[0..4], b"\0RES");
    }

    #[test]
    fn encodes_admin_line_with_trailing_newline() {
        let mut dst = BytesMut::new();
        let mut enc = Encoder;
        enc.encode(OutboundFrame::AdminLine(Bytes::from_static(b"status")), &mut dst).unwrap();
        assert_eq!(&dst[..], b"status\n");
    }

    #[test]
    fn encodes_multi_field_payload_nul_separated() {
        let mut dst = BytesMut::new();
        let mut enc = Encoder;
        enc.encode(
            OutboundFrame::Command(Command::SubmitJob {
                task: Bytes::from_static(b"reverse"),
                unique: Bytes::from_static(b"uniq"),
                data: Bytes::from_static(b"abc"),
            }),
            &mut dst,
        )
        .unwrap();
        assert_eq!(&dst[12..], b"reverse\0uniq\0abc");
    }
}
