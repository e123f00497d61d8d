//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all supervision failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Host configuration file parsing or validation failure.
    Config(String),
    /// Target working directory could not be resolved.
    ConfigInvalid(String),
    /// Request envelope is malformed or names something not allow-listed.
    InvalidRequest(String),
    /// The OS refused to create the child process.
    SpawnFailed(String),
    /// The child exited inside the grace window.
    ImmediateExit {
        /// Caller-facing summary, which depends on the target kind.
        message: String,
        /// Bounded tail of the target log file.
        log_tail: String,
    },
    /// Neither the process group nor the pid accepted a termination signal.
    TerminationFailed(String),
    /// A required external build tool is absent from the search path.
    ToolNotFound {
        /// Human-readable guidance naming the missing tool.
        message: String,
        /// Bounded tail of the build log file.
        log_tail: String,
    },
    /// Native messaging framing failure.
    Ipc(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// HTTP status code used when this error reaches the HTTP transport.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            _ => 500,
        }
    }

    /// Log tail attached to launch or build failures, if any.
    #[must_use]
    pub fn log_tail(&self) -> Option<&str> {
        match self {
            Self::ImmediateExit { log_tail, .. } | Self::ToolNotFound { log_tail, .. } => {
                Some(log_tail)
            }
            _ => None,
        }
    }

    /// Message reported to remote callers, without the kind prefix.
    #[must_use]
    pub fn caller_message(&self) -> String {
        match self {
            Self::Config(msg)
            | Self::ConfigInvalid(msg)
            | Self::InvalidRequest(msg)
            | Self::SpawnFailed(msg)
            | Self::TerminationFailed(msg)
            | Self::Ipc(msg)
            | Self::Io(msg)
            | Self::ImmediateExit { message: msg, .. }
            | Self::ToolNotFound { message: msg, .. } => msg.clone(),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::ConfigInvalid(msg) => write!(f, "config invalid: {msg}"),
            Self::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            Self::SpawnFailed(msg) => write!(f, "spawn failed: {msg}"),
            Self::ImmediateExit { message, .. } => write!(f, "immediate exit: {message}"),
            Self::TerminationFailed(msg) => write!(f, "termination failed: {msg}"),
            Self::ToolNotFound { message, .. } => write!(f, "tool not found: {message}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRequest(format!("invalid json: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
