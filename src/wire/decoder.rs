//! Frames the byte stream into [`InboundFrame`]s: binary command packets by
//! default, or text-mode admin responses once the admin handler tells the
//! codec which terminator to expect next.
//!
//! A malformed binary frame (bad magic, unknown command code, or an
//! over-long payload) is an unrecoverable framing error — the connection
//! is closed rather than resynchronized, since there's no reliable
//! resynchronization point in a binary protocol.

use std::{error, fmt, io};

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec;

use super::events::InboundFrame;
use super::protocol::{AdminTerminator, Command, CommandCode, Magic};

/// 64 MiB, the implementation-defined max payload size.
const MAX_PAYLOAD: u32 = 64 * 1024 * 1024;
const HEADER_LEN: usize = 12; // magic(4) + code(4, BE) + length(4, BE)

/// The decoder half of the wire codec. Alternates between binary framing
/// and the two text-mode admin terminators.
#[derive(Debug, Default)]
pub enum Decoder {
    #[default]
    Binary,
    AdminOneLine,
    AdminDotTerminated {
        lines: Vec<Bytes>,
    },
}

impl Decoder {
    /// Called by the admin handler before sending a text command: the next
    /// response should be parsed as a line block rather than a binary
    /// frame.
    pub fn expect_admin(&mut self, terminator: AdminTerminator) {
        *self = match terminator {
            AdminTerminator::OneLine => Decoder::AdminOneLine,
            AdminTerminator::DotTerminated => Decoder::AdminDotTerminated { lines: Vec::new() },
        };
    }
}

impl codec::Decoder for Decoder {
    type Item = InboundFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self {
            Decoder::Binary => decode_binary(src),
            Decoder::AdminOneLine => match take_line(src) {
                Some(line) => {
                    *self = Decoder::Binary;
                    Ok(Some(InboundFrame::AdminLines(vec![line])))
                },
                None => Ok(None),
            },
            Decoder::AdminDotTerminated { lines } => loop {
                match take_line(src) {
                    Some(line) => {
                        if &line[..] == b"." {
                            let collected = std::mem::take(lines);
                            *self = Decoder::Binary;
                            return Ok(Some(InboundFrame::AdminLines(collected)));
                        }
                        lines.push(line);
                    },
                    None => return Ok(None),
                }
            },
        }
    }
}

/// Pulls one `\n`-terminated line out of `src`, leaving the rest. Tolerates
/// either `\n` or `\r\n` line endings, since Gearman's admin protocol is
/// commonly driven by `telnet`/`nc` clients that send either.
fn take_line(src: &mut BytesMut) -> Option<Bytes> {
    let idx = src.iter().position(|&b| b == b'\n')?;
    let mut line = src.split_to(idx);
    src.advance(1); // the \n itself
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    Some(line.freeze())
}

fn decode_binary(src: &mut BytesMut) -> Result<Option<InboundFrame>, Error> {
    if src.len() < HEADER_LEN {
        return Ok(None);
    }

    let magic_bytes: [u8; 4] = src[0..4].try_into().unwrap();
    let magic = Magic::from_bytes(magic_bytes).ok_or(Error::BadMagic(magic_bytes))?;
    let code = u32::from_be_bytes(src[4..8].try_into().unwrap());
    let len = u32::from_be_bytes(src[8..12].try_into().unwrap());

    if len > MAX_PAYLOAD {
        return Err(Error::PayloadTooLarge(len));
    }

    let frame_len = HEADER_LEN + len as usize;
    if src.len() < frame_len {
        src.reserve(frame_len - src.len());
        return Ok(None);
    }

    let command_code = CommandCode::from_u32(code).ok_or(Error::UnknownCommand(code))?;
    src.advance(HEADER_LEN);
    let payload = src.split_to(len as usize).freeze();

    // Direction isn't re-validated here: a handler receiving a command with
    // the wrong magic for its role will reject it as InvalidClientState /
    // InvalidWorkerState, which is the more informative error.
    let _ = magic;

    let command = parse_command(command_code, payload)?;
    Ok(Some(InboundFrame::Command(command)))
}

/// Splits `payload` into exactly `n` NUL-separated fields; the last field
/// consumes the remainder verbatim, so only it may contain embedded NULs.
fn split_fields(mut payload: Bytes, n: usize) -> Result<Vec<Bytes>, Error> {
    if n == 0 {
        return if payload.is_empty() { Ok(Vec::new()) } else { Err(Error::WrongArity) };
    }

    let mut fields = Vec::with_capacity(n);
    for _ in 0..n - 1 {
        let pos = payload.iter().position(|&b| b == 0).ok_or(Error::WrongArity)?;
        let field = payload.split_to(pos);
        payload.advance(1);
        fields.push(field);
    }
    fields.push(payload);
    Ok(fields)
}

fn parse_command(code: CommandCode, payload: Bytes) -> Result<Command, Error> {
    use CommandCode::*;

    Ok(match code {
        CanDo => {
            let [task] = one(payload)?;
            Command::CanDo { task }
        },
        CantDo => {
            let [task] = one(payload)?;
            Command::CantDo { task }
        },
        CanDoTimeout => {
            let [task, timeout] = two(payload)?;
            Command::CanDoTimeout { task, timeout }
        },
        ResetAbilities => {
            zero(payload)?;
            Command::ResetAbilities
        },
        SetClientId => {
            let [client_id] = one(payload)?;
            Command::SetClientId { client_id }
        },
        PreSleep => {
            zero(payload)?;
            Command::PreSleep
        },
        Noop => {
            zero(payload)?;
            Command::Noop
        },
        GrabJob => {
            zero(payload)?;
            Command::GrabJob
        },
        GrabJobUniq => {
            zero(payload)?;
            Command::GrabJobUniq
        },
        NoJob => {
            zero(payload)?;
            Command::NoJob
        },
        JobAssign => {
            let [handle, task, data] = three(payload)?;
            Command::JobAssign { handle, task, data }
        },
        JobAssignUniq => {
            let [handle, task, unique, data] = four(payload)?;
            Command::JobAssignUniq { handle, task, unique, data }
        },
        AllYours => {
            zero(payload)?;
            Command::AllYours
        },
        SubmitJob => {
            let [task, unique, data] = three(payload)?;
            Command::SubmitJob { task, unique, data }
        },
        SubmitJobBg => {
            let [task, unique, data] = three(payload)?;
            Command::SubmitJobBg { task, unique, data }
        },
        SubmitJobHigh => {
            let [task, unique, data] = three(payload)?;
            Command::SubmitJobHigh { task, unique, data }
        },
        SubmitJobHighBg => {
            let [task, unique, data] = three(payload)?;
            Command::SubmitJobHighBg { task, unique, data }
        },
        SubmitJobLow => {
            let [task, unique, data] = three(payload)?;
            Command::SubmitJobLow { task, unique, data }
        },
        SubmitJobLowBg => {
            let [task, unique, data] = three(payload)?;
            Command::SubmitJobLowBg { task, unique, data }
        },
        SubmitJobSched => {
            let fields = split_fields(payload, 8)?;
            let [task, unique, minute, hour, day_of_month, month, day_of_week, data] =
                fields.try_into().map_err(|_| Error::WrongArity)?;
            Command::SubmitJobSched {
                task,
                unique,
                minute,
                hour,
                day_of_month,
                month,
                day_of_week,
                data,
            }
        },
        SubmitJobEpoch => {
            let [task, unique, epoch, data] = four(payload)?;
            Command::SubmitJobEpoch { task, unique, epoch, data }
        },
        JobCreated => {
            let [handle] = one(payload)?;
            Command::JobCreated { handle }
        },
        WorkData => {
            let [handle, data] = two(payload)?;
            Command::WorkData { handle, data }
        },
        WorkWarning => {
            let [handle, data] = two(payload)?;
            Command::WorkWarning { handle, data }
        },
        WorkStatus => {
            let [handle, numerator, denominator] = three(payload)?;
            Command::WorkStatus { handle, numerator, denominator }
        },
        WorkComplete => {
            let [handle, data] = two(payload)?;
            Command::WorkComplete { handle, data }
        },
        WorkFail => {
            let [handle] = one(payload)?;
            Command::WorkFail { handle }
        },
        WorkException => {
            let [handle, data] = two(payload)?;
            Command::WorkException { handle, data }
        },
        GetStatus => {
            let [handle] = one(payload)?;
            Command::GetStatus { handle }
        },
        StatusRes => {
            let [handle, known, running, numerator, denominator] = five(payload)?;
            Command::StatusRes { handle, known, running, numerator, denominator }
        },
        EchoReq => {
            let [data] = one(payload)?;
            Command::EchoReq { data }
        },
        EchoRes => {
            let [data] = one(payload)?;
            Command::EchoRes { data }
        },
        OptionReq => {
            let [option] = one(payload)?;
            Command::OptionReq { option }
        },
        OptionRes => {
            let [option] = one(payload)?;
            Command::OptionRes { option }
        },
        Error => {
            let [name, text] = two(payload)?;
            Command::Error { name, text }
        },
    })
}

fn zero(payload: Bytes) -> Result<(), Error> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(Error::WrongArity)
    }
}

fn one(payload: Bytes) -> Result<[Bytes; 1], Error> {
    split_fields(payload, 1)?.try_into().map_err(|_| Error::WrongArity)
}

fn two(payload: Bytes) -> Result<[Bytes; 2], Error> {
    split_fields(payload, 2)?.try_into().map_err(|_| Error::WrongArity)
}

fn three(payload: Bytes) -> Result<[Bytes; 3], Error> {
    split_fields(payload, 3)?.try_into().map_err(|_| Error::WrongArity)
}

fn four(payload: Bytes) -> Result<[Bytes; 4], Error> {
    split_fields(payload, 4)?.try_into().map_err(|_| Error::WrongArity)
}

fn five(payload: Bytes) -> Result<[Bytes; 5], Error> {
    split_fields(payload, 5)?.try_into().map_err(|_| Error::WrongArity)
}

/// The `ProtocolError` family: any of these closes the connection.
#[derive(Debug)]
pub enum Error {
    BadMagic([u8; 4]),
    UnknownCommand(u32),
    PayloadTooLarge(u32),
    WrongArity,
    Io(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadMagic(bytes) => write!(f, "bad magic bytes: {bytes:?}"),
            Error::UnknownCommand(code) => write!(f, "unknown command code: {code}"),
            Error::PayloadTooLarge(len) => write!(f, "payload too large: {len} bytes"),
            Error::WrongArity => write!(f, "wrong number of fields for command"),
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
    use tokio_stream::StreamExt;
    use tokio_util::codec::FramedRead;

    use super::*;

    fn binary_frame(code: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"\0REQ");
        buf.extend_from_slice(&code.to_be_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[tokio::test]
    async fn decodes_can_do_and_submit_job() {
        let mut stream = binary_frame(1, b"reverse");
        stream.extend(binary_frame(7, b"reverse\0uniq\0somedata"));

        let mut framed = FramedRead::new(stream.as_slice(), Decoder::default());

        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            InboundFrame::Command(Command::CanDo { task: Bytes::from_static(b"reverse") })
        );
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            InboundFrame::Command(Command::SubmitJob {
                task: Bytes::from_static(b"reverse"),
                unique: Bytes::from_static(b"uniq"),
                data: Bytes::from_static(b"somedata"),
            })
        );
    }

    #[tokio::test]
    async fn last_field_may_contain_embedded_nul() {
        let stream = binary_frame(7, b"task\0uniq\0da\0ta");
        let mut framed = FramedRead::new(stream.as_slice(), Decoder::default());
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            InboundFrame::Command(Command::SubmitJob {
                task: Bytes::from_static(b"task"),
                unique: Bytes::from_static(b"uniq"),
                data: Bytes::from_static(b"da\0ta"),
            })
        );
    }

    #[tokio::test]
    async fn rejects_bad_magic() {
        let mut stream = Vec::new();
        stream.extend_from_slice(b"XXXX");
        stream.extend_from_slice(&1u32.to_be_bytes());
        stream.extend_from_slice(&0u32.to_be_bytes());

        let mut framed = FramedRead::new(stream.as_slice(), Decoder::default());
        assert!(matches!(framed.next().await, Some(Err(Error::BadMagic(_)))));
    }

    #[tokio::test]
    async fn rejects_unknown_command_code() {
        let stream = binary_frame(999, b"");
        let mut framed = FramedRead::new(stream.as_slice(), Decoder::default());
        assert!(matches!(framed.next().await, Some(Err(Error::UnknownCommand(999)))));
    }

    #[tokio::test]
    async fn rejects_oversized_payload() {
        let mut stream = Vec::new();
        stream.extend_from_slice(b"\0REQ");
        stream.extend_from_slice(&1u32.to_be_bytes());
        stream.extend_from_slice(&(MAX_PAYLOAD + 1).to_be_bytes());

        let mut framed = FramedRead::new(stream.as_slice(), Decoder::default());
        assert!(matches!(framed.next().await, Some(Err(Error::PayloadTooLarge(_)))));
    }

    #[tokio::test]
    async fn admin_one_line_response() {
        let mut decoder = Decoder::default();
        decoder.expect_admin(AdminTerminator::OneLine);
        let stream = b"OK\n".to_vec();
        let mut framed = FramedRead::new(stream.as_slice(), decoder);
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            InboundFrame::AdminLines(vec![Bytes::from_static(b"OK")])
        );
    }

    #[tokio::test]
    async fn admin_dot_terminated_response() {
        let mut decoder = Decoder::default();
        decoder.expect_admin(AdminTerminator::DotTerminated);
        let stream = b"reverse\t0\t0\t1\nsort\t2\t1\t1\n.\n".to_vec();
        let mut framed = FramedRead::new(stream.as_slice(), decoder);
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            InboundFrame::AdminLines(vec![
                Bytes::from_static(b"reverse\t0\t0\t1"),
                Bytes::from_static(b"sort\t2\t1\t1"),
            ])
        );
    }
}
