//! The Gearman binary command set: command codes, field schemas, and the
//! `Command` type that the codec encodes/decodes.
//!
//! On the wire, a binary packet is `magic(4) ++ code(4, big-endian)
//! ++ payload_len(4, big-endian) ++ payload`, where `payload` is an ordered
//! list of NUL-separated fields. The last field of any command is the only
//! one allowed to contain embedded NULs (it consumes the remainder of the
//! payload).

use bytes::Bytes;

use crate::types::Priority;

/// Which half of a request/response pair a frame belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Magic {
    Req,
    Res,
}

impl Magic {
    pub const REQ_BYTES: [u8; 4] = *b"\0REQ";
    pub const RES_BYTES: [u8; 4] = *b"\0RES";

    pub fn as_bytes(self) -> [u8; 4] {
        match self {
            Magic::Req => Self::REQ_BYTES,
            Magic::Res => Self::RES_BYTES,
        }
    }

    pub fn from_bytes(b: [u8; 4]) -> Option<Self> {
        match b {
            Self::REQ_BYTES => Some(Magic::Req),
            Self::RES_BYTES => Some(Magic::Res),
            _ => None,
        }
    }
}

/// The command code table from gearman.org's binary protocol.
///
/// Values match the published protocol, plus the handful of neighboring
/// codes (`CAN_DO_TIMEOUT`, `ALL_YOURS`, `OPTION_REQ`/`OPTION_RES`, the
/// scheduled-submit variants) needed so the dispatch table in
/// `wire::decoder` covers the whole contiguous code range rather than
/// leaving silent gaps.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum CommandCode {
    CanDo = 1,
    CantDo = 2,
    ResetAbilities = 3,
    PreSleep = 4,
    Noop = 6,
    SubmitJob = 7,
    JobCreated = 8,
    GrabJob = 9,
    NoJob = 10,
    JobAssign = 11,
    WorkStatus = 12,
    WorkComplete = 13,
    WorkFail = 14,
    GetStatus = 15,
    EchoReq = 16,
    EchoRes = 17,
    SubmitJobBg = 18,
    Error = 19,
    StatusRes = 20,
    SubmitJobHigh = 21,
    SetClientId = 22,
    CanDoTimeout = 23,
    AllYours = 24,
    WorkException = 25,
    OptionReq = 26,
    OptionRes = 27,
    WorkData = 28,
    WorkWarning = 29,
    GrabJobUniq = 30,
    JobAssignUniq = 31,
    SubmitJobHighBg = 32,
    SubmitJobLow = 33,
    SubmitJobLowBg = 34,
    SubmitJobSched = 35,
    SubmitJobEpoch = 36,
}

impl CommandCode {
    pub fn from_u32(code: u32) -> Option<Self> {
        use CommandCode::*;
        Some(match code {
            1 => CanDo,
            2 => CantDo,
            3 => ResetAbilities,
            4 => PreSleep,
            6 => Noop,
            7 => SubmitJob,
            8 => JobCreated,
            9 => GrabJob,
            10 => NoJob,
            11 => JobAssign,
            12 => WorkStatus,
            13 => WorkComplete,
            14 => WorkFail,
            15 => GetStatus,
            16 => EchoReq,
            17 => EchoRes,
            18 => SubmitJobBg,
            19 => Error,
            20 => StatusRes,
            21 => SubmitJobHigh,
            22 => SetClientId,
            23 => CanDoTimeout,
            24 => AllYours,
            25 => WorkException,
            26 => OptionReq,
            27 => OptionRes,
            28 => WorkData,
            29 => WorkWarning,
            30 => GrabJobUniq,
            31 => JobAssignUniq,
            32 => SubmitJobHighBg,
            33 => SubmitJobLow,
            34 => SubmitJobLowBg,
            35 => SubmitJobSched,
            36 => SubmitJobEpoch,
            _ => return None,
        })
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// A parsed Gearman binary command, with fields decoded from their
/// NUL-separated wire representation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    // Worker ability registration
    CanDo { task: Bytes },
    CantDo { task: Bytes },
    CanDoTimeout { task: Bytes, timeout: Bytes },
    ResetAbilities,
    SetClientId { client_id: Bytes },

    // Worker grab/sleep/wake cycle
    PreSleep,
    Noop,
    GrabJob,
    GrabJobUniq,
    NoJob,
    JobAssign { handle: Bytes, task: Bytes, data: Bytes },
    JobAssignUniq { handle: Bytes, task: Bytes, unique: Bytes, data: Bytes },
    AllYours,

    // Client job submission (9 variants across background x priority)
    SubmitJob { task: Bytes, unique: Bytes, data: Bytes },
    SubmitJobBg { task: Bytes, unique: Bytes, data: Bytes },
    SubmitJobHigh { task: Bytes, unique: Bytes, data: Bytes },
    SubmitJobHighBg { task: Bytes, unique: Bytes, data: Bytes },
    SubmitJobLow { task: Bytes, unique: Bytes, data: Bytes },
    SubmitJobLowBg { task: Bytes, unique: Bytes, data: Bytes },
    SubmitJobSched {
        task: Bytes,
        unique: Bytes,
        minute: Bytes,
        hour: Bytes,
        day_of_month: Bytes,
        month: Bytes,
        day_of_week: Bytes,
        data: Bytes,
    },
    SubmitJobEpoch { task: Bytes, unique: Bytes, epoch: Bytes, data: Bytes },
    JobCreated { handle: Bytes },

    // Job progress and completion
    WorkData { handle: Bytes, data: Bytes },
    WorkWarning { handle: Bytes, data: Bytes },
    WorkStatus { handle: Bytes, numerator: Bytes, denominator: Bytes },
    WorkComplete { handle: Bytes, data: Bytes },
    WorkFail { handle: Bytes },
    WorkException { handle: Bytes, data: Bytes },

    // Status polling
    GetStatus { handle: Bytes },
    StatusRes {
        handle: Bytes,
        known: Bytes,
        running: Bytes,
        numerator: Bytes,
        denominator: Bytes,
    },

    // Liveness and misc
    EchoReq { data: Bytes },
    EchoRes { data: Bytes },
    OptionReq { option: Bytes },
    OptionRes { option: Bytes },
    Error { name: Bytes, text: Bytes },
}

impl Command {
    pub fn code(&self) -> CommandCode {
        use Command::*;
        match self {
            CanDo { .. } => CommandCode::CanDo,
            CantDo { .. } => CommandCode::CantDo,
            CanDoTimeout { .. } => CommandCode::CanDoTimeout,
            ResetAbilities => CommandCode::ResetAbilities,
            SetClientId { .. } => CommandCode::SetClientId,
            PreSleep => CommandCode::PreSleep,
            Noop => CommandCode::Noop,
            GrabJob => CommandCode::GrabJob,
            GrabJobUniq => CommandCode::GrabJobUniq,
            NoJob => CommandCode::NoJob,
            JobAssign { .. } => CommandCode::JobAssign,
            JobAssignUniq { .. } => CommandCode::JobAssignUniq,
            AllYours => CommandCode::AllYours,
            SubmitJob { .. } => CommandCode::SubmitJob,
            SubmitJobBg { .. } => CommandCode::SubmitJobBg,
            SubmitJobHigh { .. } => CommandCode::SubmitJobHigh,
            SubmitJobHighBg { .. } => CommandCode::SubmitJobHighBg,
            SubmitJobLow { .. } => CommandCode::SubmitJobLow,
            SubmitJobLowBg { .. } => CommandCode::SubmitJobLowBg,
            SubmitJobSched { .. } => CommandCode::SubmitJobSched,
            SubmitJobEpoch { .. } => CommandCode::SubmitJobEpoch,
            JobCreated { .. } => CommandCode::JobCreated,
            WorkData { .. } => CommandCode::WorkData,
            WorkWarning { .. } => CommandCode::WorkWarning,
            WorkStatus { .. } => CommandCode::WorkStatus,
            WorkComplete { .. } => CommandCode::WorkComplete,
            WorkFail { .. } => CommandCode::WorkFail,
            WorkException { .. } => CommandCode::WorkException,
            GetStatus { .. } => CommandCode::GetStatus,
            StatusRes { .. } => CommandCode::StatusRes,
            EchoReq { .. } => CommandCode::EchoReq,
            EchoRes { .. } => CommandCode::EchoRes,
            OptionReq { .. } => CommandCode::OptionReq,
            OptionRes { .. } => CommandCode::OptionRes,
            Error { .. } => CommandCode::Error,
        }
    }

    /// Whether this command, as framed on the wire, carries REQ (client or
    /// worker to server) or RES (server to client or worker) magic. Gearman
    /// reuses the same command codes in both directions; the direction is
    /// determined by which role sends a given variant, not by the code
    /// itself.
    pub fn default_magic(&self) -> Magic {
        use Command::*;
        match self {
            JobCreated { .. }
            | NoJob
            | JobAssign { .. }
            | JobAssignUniq { .. }
            | WorkData { .. }
            | WorkWarning { .. }
            | WorkStatus { .. }
            | WorkComplete { .. }
            | WorkFail { .. }
            | WorkException { .. }
            | StatusRes { .. }
            | EchoRes { .. }
            | OptionRes { .. }
            | Error { .. }
            | Noop => Magic::Res,
            _ => Magic::Req,
        }
    }
}

/// Selects the `SUBMIT_JOB*` variant for the 3x3 cross product of
/// `(background, priority)`, mirroring
/// `gearman.protocol.submit_cmd_for_background_priority` in the original
/// Python implementation.
pub fn submit_command_for(
    background: bool,
    priority: Priority,
    task: Bytes,
    unique: Bytes,
    data: Bytes,
) -> Command {
    match (priority, background) {
        (Priority::Normal, false) => Command::SubmitJob { task, unique, data },
        (Priority::Normal, true) => Command::SubmitJobBg { task, unique, data },
        (Priority::High, false) => Command::SubmitJobHigh { task, unique, data },
        (Priority::High, true) => Command::SubmitJobHighBg { task, unique, data },
        (Priority::Low, false) => Command::SubmitJobLow { task, unique, data },
        (Priority::Low, true) => Command::SubmitJobLowBg { task, unique, data },
    }
}

/// Text-mode administrative commands.
///
/// These share the connection with binary frames but are disjoint at the
/// protocol level: the admin handler tells the codec which terminator to
/// expect for each command's response before sending it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdminCommand {
    Status,
    Workers,
    Version,
    MaxQueue { task: Bytes, max_size: i64 },
    Shutdown { graceful: bool },
}

impl AdminCommand {
    /// Renders the command as the line sent to the server, without a
    /// trailing newline (the encoder appends one).
    pub fn to_line(&self) -> String {
        match self {
            AdminCommand::Status => "status".to_owned(),
            AdminCommand::Workers => "workers".to_owned(),
            AdminCommand::Version => "version".to_owned(),
            AdminCommand::MaxQueue { task, max_size } => {
                format!("maxqueue {} {max_size}", String::from_utf8_lossy(task))
            },
            AdminCommand::Shutdown { graceful: true } => "shutdown graceful".to_owned(),
            AdminCommand::Shutdown { graceful: false } => "shutdown".to_owned(),
        }
    }

    /// Which terminator the codec should watch for on this command's
    /// response: `status`/`workers` are multi-line blocks ended by a lone
    /// `.`; everything else completes on one line.
    pub fn expected_terminator(&self) -> AdminTerminator {
        match self {
            AdminCommand::Status | AdminCommand::Workers => AdminTerminator::DotTerminated,
            AdminCommand::Version
            | AdminCommand::MaxQueue { .. }
            | AdminCommand::Shutdown { .. } => AdminTerminator::OneLine,
        }
    }

    pub fn response_kind(&self) -> AdminResponseKind {
        match self {
            AdminCommand::Status => AdminResponseKind::Status,
            AdminCommand::Workers => AdminResponseKind::Workers,
            AdminCommand::Version => AdminResponseKind::Version,
            AdminCommand::MaxQueue { .. } => AdminResponseKind::MaxQueue,
            AdminCommand::Shutdown { .. } => AdminResponseKind::Shutdown,
        }
    }
}

/// How the codec knows a text-mode admin response is complete.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdminTerminator {
    /// Completes as soon as one line arrives (`version`, `maxqueue`).
    OneLine,
    /// Completes on a line containing a single `.` (`status`, `workers`).
    DotTerminated,
}

/// One line of `status`'s response: `<task>\t<total>\t<running>\t<available>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StatusLine {
    pub task: Bytes,
    pub queued: u64,
    pub running: u64,
    pub available_workers: u64,
}

/// One line of `workers`' response: `<fd> <ip> <client_id> : <ability> ...`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerLine {
    pub fd: Bytes,
    pub ip: Bytes,
    pub client_id: Bytes,
    pub abilities: Vec<Bytes>,
}

/// The kind of an `AdminResponse`, used to validate that a reply matches
/// what the caller was waiting for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdminResponseKind {
    Status,
    Workers,
    Version,
    MaxQueue,
    Shutdown,
    Echo,
}

/// A parsed admin response, ready to hand back to the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdminResponse {
    Status(Vec<StatusLine>),
    Workers(Vec<WorkerLine>),
    Version(Bytes),
    MaxQueue,
    Shutdown,
    Echo(Bytes),
}

impl AdminResponse {
    pub fn kind(&self) -> AdminResponseKind {
        match self {
            AdminResponse::Status(_) => AdminResponseKind::Status,
            AdminResponse::Workers(_) => AdminResponseKind::Workers,
            AdminResponse::Version(_) => AdminResponseKind::Version,
            AdminResponse::MaxQueue => AdminResponseKind::MaxQueue,
            AdminResponse::Shutdown => AdminResponseKind::Shutdown,
            AdminResponse::Echo(_) => AdminResponseKind::Echo,
        }
    }
}

/// Parses one `status` line. Malformed lines (wrong field count, or
/// non-numeric counters) are skipped rather than failing the whole
/// response — a single confused line shouldn't sink a working poll loop.
pub fn parse_status_line(line: &[u8]) -> Option<StatusLine> {
    let mut fields = line.split(|&b| b == b'\t');
    let task = fields.next()?;
    let queued = parse_u64(fields.next()?)?;
    let running = parse_u64(fields.next()?)?;
    let available_workers = parse_u64(fields.next()?)?;
    Some(StatusLine {
        task: Bytes::copy_from_slice(task),
        queued,
        running,
        available_workers,
    })
}

/// Parses one `workers` line: `<fd> <ip> <client_id> : <ability> <ability>`.
pub fn parse_worker_line(line: &[u8]) -> Option<WorkerLine> {
    let sep = line.windows(2).position(|w| w == b" :")?;
    let (head, tail) = (&line[..sep], &line[sep + 2..]);
    let tail = tail.strip_prefix(b" ").unwrap_or(tail);
    let mut head_fields = head.splitn(3, |&b| b == b' ');
    let fd = head_fields.next()?;
    let ip = head_fields.next()?;
    let client_id = head_fields.next()?;
    let abilities = tail
        .split(|&b| b == b' ')
        .filter(|s| !s.is_empty())
        .map(Bytes::copy_from_slice)
        .collect();
    Some(WorkerLine {
        fd: Bytes::copy_from_slice(fd),
        ip: Bytes::copy_from_slice(ip),
        client_id: Bytes::copy_from_slice(client_id),
        abilities,
    })
}

fn parse_u64(s: &[u8]) -> Option<u64> {
    std::str::from_utf8(s).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_roundtrips_through_u32() {
        for code in 1u32..=36 {
            if let Some(c) = CommandCode::from_u32(code) {
                assert_eq!(c.as_u32(), code);
            }
        }
        assert!(CommandCode::from_u32(5).is_none()); // gap in the real table
        assert!(CommandCode::from_u32(0).is_none());
        assert!(CommandCode::from_u32(37).is_none());
    }

    #[test]
    fn submit_command_for_covers_all_nine_variants() {
        let t = || Bytes::from_static(b"task");
        let u = || Bytes::from_static(b"uniq");
        let d = || Bytes::from_static(b"data");

        assert!(matches!(
            submit_command_for(false, Priority::Normal, t(), u(), d()),
            Command::SubmitJob { .. }
        ));
        assert!(matches!(
            submit_command_for(true, Priority::High, t(), u(), d()),
            Command::SubmitJobHighBg { .. }
        ));
        assert!(matches!(
            submit_command_for(true, Priority::Low, t(), u(), d()),
            Command::SubmitJobLowBg { .. }
        ));
    }

    #[test]
    fn admin_command_lines_and_terminators() {
        assert_eq!(AdminCommand::Status.to_line(), "status");
        assert_eq!(
            AdminCommand::Shutdown { graceful: true }.to_line(),
            "shutdown graceful"
        );
        assert_eq!(
            AdminCommand::MaxQueue { task: Bytes::from_static(b"reverse"), max_size: 100 }
                .to_line(),
            "maxqueue reverse 100"
        );
        assert_eq!(
            AdminCommand::Status.expected_terminator(),
            AdminTerminator::DotTerminated
        );
        assert_eq!(
            AdminCommand::Version.expected_terminator(),
            AdminTerminator::OneLine
        );
    }

    #[test]
    fn parses_status_line() {
        let line = parse_status_line(b"reverse\t3\t1\t2").unwrap();
        assert_eq!(line.task, Bytes::from_static(b"reverse"));
        assert_eq!(line.queued, 3);
        assert_eq!(line.running, 1);
        assert_eq!(line.available_workers, 2);

        assert!(parse_status_line(b"reverse\t3\t1").is_none());
    }

    #[test]
    fn parses_worker_line() {
        let line = parse_worker_line(b"3 127.0.0.1 client1 : reverse sort").unwrap();
        assert_eq!(line.fd, Bytes::from_static(b"3"));
        assert_eq!(line.ip, Bytes::from_static(b"127.0.0.1"));
        assert_eq!(line.client_id, Bytes::from_static(b"client1"));
        assert_eq!(
            line.abilities,
            vec![Bytes::from_static(b"reverse"), Bytes::from_static(b"sort")]
        );

        let no_abilities = parse_worker_line(b"3 127.0.0.1 client1 :").unwrap();
        assert!(no_abilities.abilities.is_empty());
    }
}
