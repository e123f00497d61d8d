//! Request and response envelopes shared by both transports.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Supervision action named by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Launch the target process.
    Start,
    /// Terminate the target process group.
    Stop,
    /// Report liveness and optional health.
    Status,
    /// Return a bounded log tail.
    Logs,
    /// Run an allow-listed build target to completion.
    Make,
    /// Detect local configuration values.
    GetConfig,
    /// Persist the external settings file.
    SaveConfig,
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "status" => Ok(Self::Status),
            "logs" => Ok(Self::Logs),
            "make" => Ok(Self::Make),
            "get_config" => Ok(Self::GetConfig),
            "save_config" => Ok(Self::SaveConfig),
            other => Err(AppError::InvalidRequest(format!("Unknown action: {other}"))),
        }
    }
}

/// Inbound request envelope.
///
/// Every field is optional on the wire; each action validates the ones it
/// needs.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Action verb; absent over HTTP, where the route names it.
    #[serde(default)]
    pub action: Option<String>,
    /// Project target identifier.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Explicit repository root.
    #[serde(default)]
    pub repo_path: Option<String>,
    /// Shell command for project starts.
    #[serde(default)]
    pub command: Option<String>,
    /// Allow-listed mode for repo starts.
    #[serde(default)]
    pub mode: Option<String>,
    /// Make target name.
    #[serde(default)]
    pub target: Option<String>,
    /// Working directory for project starts.
    #[serde(default)]
    pub cwd: Option<String>,
    /// Base URL whose `/health` endpoint is probed by `status`.
    #[serde(default)]
    pub chat_api_base_url: Option<String>,
    /// Full health URL, taking precedence over `chat_api_base_url`.
    #[serde(default)]
    pub health_url: Option<String>,
    /// Interpreter path persisted by `save_config`.
    #[serde(default)]
    pub python_path: Option<String>,
}

impl Request {
    /// Parse the `action` field.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRequest` for a missing or unknown action.
    pub fn action(&self) -> Result<Action> {
        self.action.as_deref().unwrap_or_default().parse()
    }
}

/// Action-specific success payload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ReplyBody {
    /// Result of `start`.
    #[serde(rename_all = "camelCase")]
    Start {
        /// Always `"running"`.
        status: &'static str,
        /// Pid of the live process.
        pid: i32,
        /// The process was already alive and nothing was spawned.
        already_running: bool,
    },
    /// Result of `stop`.
    Stop {
        /// `"stopped"` or `"error"`.
        status: &'static str,
        /// Pid that was targeted, when one was recorded and alive.
        #[serde(skip_serializing_if = "Option::is_none")]
        pid: Option<i32>,
        /// Why the stop is reported as failed.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Result of `status`.
    #[serde(rename_all = "camelCase")]
    Status {
        /// `"running"` or `"stopped"`.
        status: &'static str,
        /// Live pid, `null` when stopped.
        pid: Option<i32>,
        /// URL probed for health, if any.
        health_url: Option<String>,
        /// Application health, `null` when not probed.
        healthy: Option<bool>,
        /// Recorded mode.
        mode: Option<String>,
        /// Recorded command.
        command: Option<String>,
        /// Recorded launch time.
        started_at: Option<i64>,
    },
    /// Result of `logs`.
    #[serde(rename_all = "camelCase")]
    Logs {
        /// Bounded tail of the target log.
        log_tail: String,
    },
    /// Result of `make`.
    #[serde(rename_all = "camelCase")]
    Make {
        /// `"success"` or `"error"`.
        status: &'static str,
        /// Exit code, `null` when killed by a signal.
        exit_code: Option<i32>,
        /// Bounded tail of the build log.
        log_tail: String,
    },
    /// Result of `get_config`.
    #[serde(rename_all = "camelCase")]
    DetectedConfig {
        /// Resolved repository root.
        repo_path: String,
        /// Python interpreter found on the search path.
        #[serde(skip_serializing_if = "Option::is_none")]
        python_path: Option<String>,
        /// GitHub owner parsed from the git remote.
        #[serde(skip_serializing_if = "Option::is_none")]
        github_repo_owner: Option<String>,
        /// GitHub repository name parsed from the git remote.
        #[serde(skip_serializing_if = "Option::is_none")]
        github_repo_name: Option<String>,
    },
    /// Result of `save_config`.
    Saved {
        /// Always `"saved"`.
        status: &'static str,
        /// Path of the written settings file.
        path: String,
    },
}

/// Outbound response envelope.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Reply {
    /// Whether the action succeeded.
    pub ok: bool,
    /// Action-specific fields.
    #[serde(flatten)]
    pub body: ReplyBody,
}

impl Reply {
    /// Successful reply.
    #[must_use]
    pub fn success(body: ReplyBody) -> Self {
        Self { ok: true, body }
    }

    /// Reply carrying a body but reporting failure.
    #[must_use]
    pub fn failed(body: ReplyBody) -> Self {
        Self { ok: false, body }
    }
}

/// Failure envelope for requests that could not be carried out.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    /// Always `false`.
    pub ok: bool,
    /// Caller-facing message.
    pub error: String,
    /// Log tail for launch and build failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_tail: Option<String>,
}

impl From<&AppError> for Failure {
    fn from(err: &AppError) -> Self {
        Self {
            ok: false,
            error: err.caller_message(),
            log_tail: err.log_tail().map(str::to_owned),
        }
    }
}
