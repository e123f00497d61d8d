//! OS-level liveness probing and signal delivery by bare pid.
//!
//! The host never owns the processes it inspects: a later invocation only
//! has the pid from the state record. Liveness uses the null signal, which
//! checks existence and permission without delivering anything.

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use tracing::debug;

/// Answers whether a pid currently names a live process.
pub trait LivenessProbe: Send + Sync {
    /// `false` only when the OS reports that no such process exists.
    fn is_alive(&self, pid: i32) -> bool;
}

/// Delivers signals to a process group or a single pid.
pub trait Signaller: Send + Sync {
    /// Signal every member of the process group led by `pgid`.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the group cannot be signalled.
    fn signal_group(&self, pgid: i32, signal: Signal) -> Result<(), Errno>;

    /// Signal the single process `pid`.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the process cannot be signalled.
    fn signal_pid(&self, pid: i32, signal: Signal) -> Result<(), Errno>;
}

/// Real probe and signaller backed by `kill(2)` / `killpg(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcess;

impl LivenessProbe for OsProcess {
    fn is_alive(&self, pid: i32) -> bool {
        if pid <= 0 {
            return false;
        }
        match kill(Pid::from_raw(pid), None) {
            Ok(()) => !is_zombie(pid),
            Err(Errno::ESRCH) => false,
            // EPERM and anything unexpected: something holds this pid.
            Err(errno) => {
                debug!(pid, %errno, "liveness probe inconclusive, assuming alive");
                true
            }
        }
    }
}

impl Signaller for OsProcess {
    fn signal_group(&self, pgid: i32, signal: Signal) -> Result<(), Errno> {
        if pgid <= 1 {
            return Err(Errno::EINVAL);
        }
        killpg(Pid::from_raw(pgid), signal)
    }

    fn signal_pid(&self, pid: i32, signal: Signal) -> Result<(), Errno> {
        if pid <= 0 {
            return Err(Errno::EINVAL);
        }
        kill(Pid::from_raw(pid), signal)
    }
}

/// An exited child that has not been reaped still answers the null signal.
#[cfg(target_os = "linux")]
fn is_zombie(pid: i32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // `pid (comm) S ...`; comm may itself contain parentheses.
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .is_some_and(|state| state == "Z")
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: i32) -> bool {
    false
}
