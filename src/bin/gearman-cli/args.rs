use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(about, long_about = None, version)]
pub struct Args {
    /// Gearman job server, as `host[:port]`. May be repeated to configure
    /// several servers for `submit`/`work` (round-robin / try-each).
    #[arg(short = 's', long = "server", required = true)]
    pub servers: Vec<String>,
    /// Timeout (seconds) for a single poll/admin round trip.
    #[arg(short, long, default_value_t = 10.0)]
    pub timeout: f64,
    /// Enables human-friendly logging.
    #[arg(short, long, default_value_t)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submits one job and waits for it to finish (or be accepted, with
    /// `--background`).
    Submit {
        task: String,
        data: String,
        #[arg(short, long, default_value = "")]
        unique: String,
        #[arg(short, long, value_enum, default_value_t = CliPriority::Normal)]
        priority: CliPriority,
        #[arg(short, long, default_value_t)]
        background: bool,
    },
    /// Runs a worker that echoes each job's payload back as its result —
    /// useful for exercising a server by hand.
    Work {
        /// Ability to register; the worker only accepts jobs for this task
        /// name.
        task: String,
    },
    /// Administrative commands (text protocol).
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    Ping,
    Status,
    Version,
    Workers,
    Maxqueue { task: String, max_size: i64 },
    Shutdown {
        #[arg(short, long, default_value_t)]
        graceful: bool,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum CliPriority {
    Low,
    Normal,
    High,
}

impl From<CliPriority> for gearman_rs::types::Priority {
    fn from(p: CliPriority) -> Self {
        match p {
            CliPriority::Low => gearman_rs::types::Priority::Low,
            CliPriority::Normal => gearman_rs::types::Priority::Normal,
            CliPriority::High => gearman_rs::types::Priority::High,
        }
    }
}
