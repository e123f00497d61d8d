//! Persisted per-target state record.

use serde::{Deserialize, Serialize};

/// Last known process for a target.
///
/// A recorded `pid` is a claim, not a guarantee: the process may have exited
/// or the pid may have been recycled. Consumers re-check liveness before
/// trusting it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    /// Process id (and process group id) of the launched child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    /// Shell command for project targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Allow-listed mode for repo targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Directory the child was started in.
    #[serde(default, alias = "cwd", skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// Launch time, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
}

impl StateRecord {
    /// Record describing a freshly launched child.
    #[must_use]
    pub fn launched(
        pid: i32,
        command: Option<String>,
        mode: Option<String>,
        working_directory: Option<String>,
    ) -> Self {
        Self {
            pid: Some(pid),
            command,
            mode,
            working_directory,
            started_at: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// Whether this record holds no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
