//! Escalating shutdown of a recorded process group.
//!
//! `SIGTERM` to the group (falling back to the bare pid), poll liveness
//! until the deadline, then `SIGKILL` the same way. After the kill the pid
//! is re-polled once; a survivor is reported as
//! [`StopOutcome::ForceKillUnconfirmed`] rather than success.

use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use super::liveness::{LivenessProbe, Signaller};
use super::state_store::StateStore;
use super::target::Target;
use crate::{AppError, Result};

/// Fixed parameters of a stop.
#[derive(Debug, Clone, Copy)]
pub struct StopSettings {
    /// How long to wait for a graceful exit.
    pub deadline: Duration,
    /// Interval between liveness polls.
    pub poll_interval: Duration,
    /// Delay before the post-kill liveness check.
    pub kill_confirm: Duration,
}

/// Result of a stop attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No pid was recorded.
    NotRunning,
    /// A pid was recorded but the process was already gone.
    AlreadyExited {
        /// Stale pid that was cleared.
        pid: i32,
    },
    /// The process exited after the terminate signal.
    Terminated {
        /// Stopped pid.
        pid: i32,
    },
    /// The process ignored the deadline and was killed.
    Killed {
        /// Stopped pid.
        pid: i32,
    },
    /// The kill signal was accepted but the process is still visible.
    ForceKillUnconfirmed {
        /// Surviving pid.
        pid: i32,
    },
    /// The deadline elapsed and the kill signal itself was refused.
    KillFailed {
        /// Surviving pid.
        pid: i32,
    },
}

impl StopOutcome {
    /// Whether the stop is reported as successful.
    #[must_use]
    pub fn is_success(self) -> bool {
        !matches!(
            self,
            Self::ForceKillUnconfirmed { .. } | Self::KillFailed { .. }
        )
    }

    /// Pid reported to the caller, if the process was alive when stop began.
    #[must_use]
    pub fn pid(self) -> Option<i32> {
        match self {
            Self::NotRunning | Self::AlreadyExited { .. } => None,
            Self::Terminated { pid }
            | Self::Killed { pid }
            | Self::ForceKillUnconfirmed { pid }
            | Self::KillFailed { pid } => Some(pid),
        }
    }
}

/// Stop the process recorded for `target` and clear its record.
///
/// The record is cleared in every outcome except a refused terminate
/// signal, where nothing about the process changed.
///
/// # Errors
///
/// - `AppError::TerminationFailed` if neither the group nor the pid accepts
///   `SIGTERM`; the record is left intact.
/// - `AppError::Io` if the cleared record cannot be written.
pub async fn stop(
    store: &dyn StateStore,
    probe: &dyn LivenessProbe,
    signaller: &dyn Signaller,
    target: &Target,
    settings: StopSettings,
) -> Result<StopOutcome> {
    let span = info_span!("stop", target = %target.label());
    async move {
        let Some(pid) = store.read(target).pid else {
            info!("no pid recorded");
            return Ok(StopOutcome::NotRunning);
        };

        if !probe.is_alive(pid) {
            info!(pid, "recorded process already exited");
            store.clear(target)?;
            return Ok(StopOutcome::AlreadyExited { pid });
        }

        if let Err(errno) = deliver(signaller, pid, Signal::SIGTERM) {
            warn!(pid, %errno, "terminate refused");
            return Err(AppError::TerminationFailed(format!(
                "could not signal pid {pid}: {errno}"
            )));
        }

        let outcome = if wait_for_exit(probe, pid, settings.deadline, settings.poll_interval).await
        {
            info!(pid, "terminated");
            StopOutcome::Terminated { pid }
        } else {
            escalate(probe, signaller, pid, settings.kill_confirm).await
        };

        store.clear(target)?;
        Ok(outcome)
    }
    .instrument(span)
    .await
}

async fn escalate(
    probe: &dyn LivenessProbe,
    signaller: &dyn Signaller,
    pid: i32,
    confirm: Duration,
) -> StopOutcome {
    warn!(pid, "still alive after deadline, sending SIGKILL");
    if let Err(errno) = deliver(signaller, pid, Signal::SIGKILL) {
        warn!(pid, %errno, "kill refused");
        return StopOutcome::KillFailed { pid };
    }

    tokio::time::sleep(confirm).await;
    if probe.is_alive(pid) {
        warn!(pid, "process survived SIGKILL");
        StopOutcome::ForceKillUnconfirmed { pid }
    } else {
        info!(pid, "killed");
        StopOutcome::Killed { pid }
    }
}

/// Signal the group led by `pid`, falling back to `pid` alone.
fn deliver(signaller: &dyn Signaller, pid: i32, signal: Signal) -> std::result::Result<(), Errno> {
    signaller.signal_group(pid, signal).or_else(|group_err| {
        warn!(pid, signal = ?signal, %group_err, "group signal failed, trying pid");
        signaller.signal_pid(pid, signal)
    })
}

/// Poll until `pid` disappears or `deadline` elapses.
async fn wait_for_exit(
    probe: &dyn LivenessProbe,
    pid: i32,
    deadline: Duration,
    interval: Duration,
) -> bool {
    let until = Instant::now() + deadline;
    while Instant::now() < until {
        if !probe.is_alive(pid) {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    !probe.is_alive(pid)
}
