mod args;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, Level};

use args::{AdminCommand, Args, Command};
use gearman_rs::config::{GearmanConfig, ServerAddr, DEFAULT_PORT};
use gearman_rs::{GearmanAdminClient, GearmanClient, GearmanWorker};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.debug {
        tracing_subscriber::fmt().with_max_level(Level::TRACE).init();
    } else {
        tracing_subscriber::fmt().json().init();
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "command failed");
            ExitCode::FAILURE
        },
    }
}

fn parse_server(spec: &str) -> Result<ServerAddr> {
    match spec.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().with_context(|| format!("invalid port in {spec:?}"))?;
            Ok(ServerAddr::new(host, port))
        },
        None => Ok(ServerAddr::new(spec, DEFAULT_PORT)),
    }
}

fn config(args: &Args) -> Result<GearmanConfig> {
    let servers = args.servers.iter().map(|s| parse_server(s)).collect::<Result<Vec<_>>>()?;
    let mut cfg = GearmanConfig::new(servers);
    cfg.admin_timeout_secs = args.timeout;
    cfg.worker_poll_timeout_secs = args.timeout;
    Ok(cfg)
}

async fn run(args: Args) -> Result<()> {
    let timeout = Duration::from_secs_f64(args.timeout);
    let cfg = config(&args)?;

    match args.command {
        Command::Submit { task, data, unique, priority, background } => {
            submit(cfg, task, data, unique, priority.into(), background, timeout).await
        },
        Command::Work { task } => work(cfg, task, timeout).await,
        Command::Admin { command } => admin(cfg, command).await,
    }
}

async fn submit(
    cfg: GearmanConfig,
    task: String,
    data: String,
    unique: String,
    priority: gearman_rs::types::Priority,
    background: bool,
    timeout: Duration,
) -> Result<()> {
    let mut client = GearmanClient::new(cfg);
    let handle = client
        .submit_job(task, data, unique, priority, background, !background, timeout)
        .await
        .context("submitting job")?;

    let view = client.view(handle).context("job vanished after submit")?;
    info!(state = ?view.state, handle = ?view.handle, result = ?view.result, "job finished");
    client.shutdown();
    Ok(())
}

async fn work(cfg: GearmanConfig, task: String, timeout: Duration) -> Result<()> {
    let mut worker = GearmanWorker::new(cfg);
    worker
        .register_task(
            task.clone(),
            Box::new(|job: gearman_rs::types::Job| {
                Box::pin(async move {
                    info!(task = %String::from_utf8_lossy(&job.task), "running job, echoing payload back");
                    gearman_rs::types::JobOutcome::Complete(job.data)
                }) as std::pin::Pin<Box<dyn std::future::Future<Output = gearman_rs::types::JobOutcome> + Send>>
            }),
        )
        .await;

    info!(%task, "worker ready");
    loop {
        tokio::select! {
            alive = worker.work(timeout) => {
                if !alive {
                    info!("all connections dead, exiting");
                    break;
                }
            },
            _ = signal::ctrl_c() => {
                info!("shutting down");
                worker.shutdown();
                break;
            },
        }
    }
    Ok(())
}

async fn admin(cfg: GearmanConfig, command: AdminCommand) -> Result<()> {
    let mut client = GearmanAdminClient::connect(cfg).await.context("connecting to admin server")?;

    match command {
        AdminCommand::Ping => {
            let elapsed = client.ping_server().await.context("pinging server")?;
            info!(elapsed_secs = elapsed.as_secs_f64(), "pong");
        },
        AdminCommand::Status => {
            for line in client.get_status().await.context("fetching status")? {
                info!(
                    task = %String::from_utf8_lossy(&line.task),
                    queued = line.queued,
                    running = line.running,
                    available_workers = line.available_workers,
                    "status"
                );
            }
        },
        AdminCommand::Version => {
            let version = client.get_version().await.context("fetching version")?;
            info!(version = %String::from_utf8_lossy(&version), "server version");
        },
        AdminCommand::Workers => {
            for worker in client.get_workers().await.context("fetching workers")? {
                info!(
                    fd = %String::from_utf8_lossy(&worker.fd),
                    ip = %String::from_utf8_lossy(&worker.ip),
                    client_id = %String::from_utf8_lossy(&worker.client_id),
                    abilities = worker.abilities.len(),
                    "worker"
                );
            }
        },
        AdminCommand::Maxqueue { task, max_size } => {
            client.send_maxqueue(task, max_size).await.context("setting max queue size")?;
            info!("max queue size updated");
        },
        AdminCommand::Shutdown { graceful } => {
            client.send_shutdown(graceful).await.context("requesting shutdown")?;
            info!(graceful, "shutdown requested");
        },
    }

    client.shutdown();
    Ok(())
}
