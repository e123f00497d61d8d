//! Detached process launcher.
//!
//! Starts the target command in a new process group with its output
//! appended to the target log, waits out a short grace window to catch
//! immediate failures, then records the pid. The child handle is dropped
//! afterwards; later invocations reach the process only through the pid in
//! the state record.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::process::Command;
use tracing::{info, info_span, warn, Instrument};

use super::liveness::{LivenessProbe, Signaller};
use super::log_sink;
use super::state_store::StateStore;
use super::target::{Target, TargetKind};
use crate::models::record::StateRecord;
use crate::{AppError, Result};

/// What to run for a target.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Executable, resolved through `PATH`.
    pub program: String,
    /// Arguments after the executable.
    pub args: Vec<String>,
    /// Working directory of the child.
    pub cwd: PathBuf,
    /// Shell command recorded for project targets.
    pub command: Option<String>,
    /// Mode recorded for repo targets.
    pub mode: Option<String>,
    /// Lines written under the log section header.
    pub header: Vec<String>,
    /// Replacement `PATH` for the child; inherited when `None`.
    pub search_path: Option<OsString>,
}

impl LaunchSpec {
    /// Run `command` through `sh -c` in `cwd`.
    #[must_use]
    pub fn shell(command: &str, cwd: PathBuf) -> Self {
        Self {
            program: "sh".into(),
            args: vec!["-c".into(), command.to_owned()],
            header: vec![
                format!("command: {command}"),
                format!("cwd: {}", cwd.display()),
            ],
            cwd,
            command: Some(command.to_owned()),
            mode: None,
            search_path: None,
        }
    }

    /// Run an allow-listed mode argv in `cwd`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `argv` is empty.
    pub fn mode(mode: &str, argv: &[String], cwd: PathBuf) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| AppError::Config(format!("mode {mode} has an empty command")))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            header: vec![
                format!("mode={mode}"),
                format!("command: {}", argv.join(" ")),
                format!("cwd: {}", cwd.display()),
            ],
            cwd,
            command: None,
            mode: Some(mode.to_owned()),
            search_path: None,
        })
    }
}

/// Outcome of a successful start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Launched {
    /// Pid, and process group id, of the live child.
    pub pid: i32,
    /// The recorded process was still alive; nothing was spawned.
    pub already_running: bool,
}

/// Fixed parameters of a start.
#[derive(Debug, Clone, Copy)]
pub struct LaunchSettings {
    /// Delay used to detect immediate exits.
    pub grace: Duration,
    /// Log lines attached to an immediate-exit failure.
    pub tail_lines: usize,
}

/// Start `spec` for `target` unless its recorded process is still alive.
///
/// # Errors
///
/// - `AppError::SpawnFailed` when the OS refuses to create the process; the
///   state record is untouched.
/// - `AppError::ImmediateExit` when the child exits inside the grace
///   window; carries the log tail.
/// - `AppError::Io` when the log or state file cannot be written. A child
///   whose record cannot be written is killed with its group first, so no
///   unrecorded process is left behind.
pub async fn start(
    store: &dyn StateStore,
    probe: &dyn LivenessProbe,
    signaller: &dyn Signaller,
    target: &Target,
    spec: &LaunchSpec,
    settings: LaunchSettings,
) -> Result<Launched> {
    let span = info_span!("start", target = %target.label());
    async move {
        if let Some(pid) = store.read(target).pid {
            if probe.is_alive(pid) {
                info!(pid, "already running");
                return Ok(Launched {
                    pid,
                    already_running: true,
                });
            }
        }

        let mut log = log_sink::open_section(&target.log_path, "start", &spec.header)?;
        let stdout = log
            .try_clone()
            .map_err(|err| AppError::Io(format!("failed to duplicate log handle: {err}")))?;
        let stderr = log
            .try_clone()
            .map_err(|err| AppError::Io(format!("failed to duplicate log handle: {err}")))?;

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .process_group(0)
            .kill_on_drop(false);
        if let Some(path) = &spec.search_path {
            cmd.env("PATH", path);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                log_sink::note(&mut log, &format!("failed to spawn {}: {err}", spec.program));
                warn!(program = %spec.program, %err, "spawn failed");
                return Err(AppError::SpawnFailed(format!("Failed to start: {err}")));
            }
        };

        let pid = child
            .id()
            .and_then(|id| i32::try_from(id).ok())
            .ok_or_else(|| AppError::SpawnFailed("child has no pid".into()))?;
        info!(pid, program = %spec.program, cwd = %spec.cwd.display(), "spawned");

        tokio::time::sleep(settings.grace).await;

        match child.try_wait() {
            Ok(Some(status)) => {
                log_sink::note(&mut log, &format!("process exited during startup: {status}"));
                warn!(pid, %status, "exited inside grace window");
                let message = match target.kind {
                    TargetKind::Repo { .. } => "Backend failed to start",
                    TargetKind::Project { .. } => "Process exited immediately",
                };
                return Err(AppError::ImmediateExit {
                    message: message.into(),
                    log_tail: log_sink::tail(&target.log_path, settings.tail_lines),
                });
            }
            Ok(None) => {}
            Err(err) => warn!(pid, %err, "could not poll child after grace window"),
        }

        let record = StateRecord::launched(
            pid,
            spec.command.clone(),
            spec.mode.clone(),
            Some(spec.cwd.display().to_string()),
        );
        if let Err(err) = store.write(target, &record) {
            log_sink::note(&mut log, &format!("could not record pid {pid}, killing it: {err}"));
            warn!(pid, %err, "state write failed, killing unrecorded process group");
            if let Err(errno) = signaller.signal_group(pid, Signal::SIGKILL) {
                warn!(pid, %errno, "group kill failed, killing child only");
                if let Err(kill_err) = child.start_kill() {
                    warn!(pid, err = %kill_err, "child kill failed");
                }
            }
            if let Err(wait_err) = child.wait().await {
                warn!(pid, err = %wait_err, "could not reap killed child");
            }
            return Err(err);
        }
        info!(pid, "running");

        Ok(Launched {
            pid,
            already_running: false,
        })
    }
    .instrument(span)
    .await
}
