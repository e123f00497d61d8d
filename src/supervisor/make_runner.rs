//! Synchronous allow-listed build runs.
//!
//! Unlike `start`, a build runs to completion in the foreground with its
//! output appended to a per-target make log. A missing prerequisite tool is
//! reported before anything is executed, distinct from the build's own
//! non-zero exit.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, info_span, warn, Instrument};

use super::log_sink;
use super::tool_resolver::ToolResolver;
use crate::{AppError, Result};

/// One build invocation.
#[derive(Debug, Clone)]
pub struct MakeJob {
    /// Allow-listed make target.
    pub target: String,
    /// Directory the build runs in.
    pub working_dir: PathBuf,
    /// Log file receiving the build output.
    pub log_path: PathBuf,
    /// Tool that must resolve on the search path first.
    pub requires: Option<String>,
    /// Log lines returned with the result.
    pub tail_lines: usize,
}

/// Completed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeOutcome {
    /// Exit code, `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// Bounded tail of the make log.
    pub log_tail: String,
}

impl MakeOutcome {
    /// Whether the build exited with status zero.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run `make <target>` for `job` and wait for it to finish.
///
/// # Errors
///
/// - `AppError::ToolNotFound` if `job.requires` is not on the augmented
///   search path.
/// - `AppError::SpawnFailed` if `make` itself cannot be started.
/// - `AppError::Io` if the log cannot be opened.
pub async fn run(job: &MakeJob, resolver: &dyn ToolResolver) -> Result<MakeOutcome> {
    let span = info_span!("make", target = %job.target);
    async move {
        let mut log = log_sink::open_section(
            &job.log_path,
            &format!("make {}", job.target),
            &[format!("Working directory: {}", job.working_dir.display())],
        )?;

        let search_path = resolver.search_path();
        if let Some(tool) = &job.requires {
            let Some(found) = resolver.resolve(tool) else {
                let message = format!(
                    "{tool} not found in PATH for the native host. \
                     Install it and re-run the native-host install script so the browser picks it up."
                );
                log_sink::note(&mut log, &message);
                log_sink::note(&mut log, &format!("PATH={}", search_path.to_string_lossy()));
                warn!(tool = %tool, "required tool missing");
                return Err(AppError::ToolNotFound {
                    message,
                    log_tail: log_sink::tail(&job.log_path, job.tail_lines),
                });
            };
            log_sink::note(&mut log, &format!("Using {tool} at: {}", found.display()));
        }

        let stdout = log
            .try_clone()
            .map_err(|err| AppError::Io(format!("failed to duplicate log handle: {err}")))?;
        let stderr = log
            .try_clone()
            .map_err(|err| AppError::Io(format!("failed to duplicate log handle: {err}")))?;

        let status = Command::new("make")
            .arg(&job.target)
            .current_dir(&job.working_dir)
            .env("PATH", &search_path)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()
            .await
            .map_err(|err| {
                log_sink::note(&mut log, &format!("failed to run make: {err}"));
                AppError::SpawnFailed(format!("Failed to run make {}: {err}", job.target))
            })?;

        info!(code = ?status.code(), "make finished");
        Ok(MakeOutcome {
            exit_code: status.code(),
            log_tail: log_sink::tail(&job.log_path, job.tail_lines),
        })
    }
    .instrument(span)
    .await
}
