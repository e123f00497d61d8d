#![forbid(unsafe_code)]

//! `shipctl`: dev-process supervisor binary.
//!
//! Runs either as a browser native messaging host (one framed request on
//! stdio per launch) or as a long-lived local HTTP API. Both transports share
//! the same [`Supervisor`].

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use shipctl::transport::{http, native};
use shipctl::{AppError, HostConfig, Result, Supervisor};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "shipctl",
    about = "Local dev-process supervisor",
    version,
    long_about = None,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Path to an optional TOML host configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (text or json). Logs always go to stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,

    /// Arguments appended by a browser launching the host directly.
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    caller: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer one native messaging request on stdin/stdout.
    Native {
        /// Caller origin and window handle; ignored.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        caller: Vec<String>,
    },
    /// Run the HTTP API until interrupted.
    Serve {
        /// Address to bind (defaults to the configured `bind`).
        #[arg(long)]
        bind: Option<String>,
        /// Port to bind (defaults to the configured `http_port`).
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => HostConfig::load_from_path(path)?,
        None => HostConfig::default(),
    };
    let supervisor = Supervisor::new(config);

    match args.command {
        Some(Command::Serve { bind, port }) => {
            let addr = format!(
                "{}:{}",
                bind.unwrap_or_else(|| supervisor.config().bind.clone()),
                port.unwrap_or(supervisor.config().http_port)
            );
            serve(Arc::new(supervisor), &addr).await
        }
        Some(Command::Native { caller }) => one_shot(&supervisor, &caller).await,
        None => one_shot(&supervisor, &args.caller).await,
    }
}

async fn one_shot(supervisor: &Supervisor, caller: &[String]) -> Result<()> {
    if let Some(origin) = caller.first() {
        info!(origin, "native host launched");
    }
    let answered = native::serve_stdio(supervisor).await?;
    info!(answered, "native host exiting");
    Ok(())
}

async fn serve(supervisor: Arc<Supervisor>, addr: &str) -> Result<()> {
    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    let addr = addr.to_owned();
    let mut handle =
        tokio::spawn(async move { http::bind_and_serve(supervisor, &addr, server_ct).await });

    let joined = tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received");
            ct.cancel();
            handle.await
        }
        joined = &mut handle => joined,
    };

    let result = joined.map_err(|err| AppError::Io(format!("http api task failed: {err}")))?;
    if let Err(err) = &result {
        error!(%err, "http api failed");
    }
    result
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(err) => {
            tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
            let _ = ctrl_c.await;
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries native messaging frames.
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
