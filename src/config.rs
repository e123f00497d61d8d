//! Host configuration parsing and validation.
//!
//! Every key has a default, so the host runs without a config file. A TOML
//! file passed via `--config` overrides individual keys.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Upper bound for the post-launch grace window.
const MAX_GRACE_MS: u64 = 5_000;

/// Fixed waits used by the launcher, terminator and health checker.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct TimingConfig {
    /// Delay after spawn used to detect immediate exits.
    pub grace_ms: u64,
    /// Deadline for the graceful-termination poll loop.
    pub stop_timeout_ms: u64,
    /// Interval between liveness polls while stopping.
    pub poll_interval_ms: u64,
    /// Delay before re-checking liveness after a force kill.
    pub kill_confirm_ms: u64,
    /// Timeout for the outbound health probe.
    pub health_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            grace_ms: 500,
            stop_timeout_ms: 3_000,
            poll_interval_ms: 100,
            kill_confirm_ms: 200,
            health_timeout_ms: 1_500,
        }
    }
}

impl TimingConfig {
    /// Grace window as a [`Duration`].
    #[must_use]
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Stop deadline as a [`Duration`].
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Post-kill confirmation delay as a [`Duration`].
    #[must_use]
    pub fn kill_confirm(&self) -> Duration {
        Duration::from_millis(self.kill_confirm_ms)
    }

    /// Health probe timeout as a [`Duration`].
    #[must_use]
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

/// Number of log lines returned by each operation.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct TailConfig {
    /// Lines returned when a start fails inside the grace window.
    pub start_lines: usize,
    /// Lines returned by the `logs` action.
    pub logs_lines: usize,
    /// Lines returned by the `make` action.
    pub make_lines: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            start_lines: 60,
            logs_lines: 120,
            make_lines: 120,
        }
    }
}

/// Directory a make target runs in.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MakeDir {
    /// The resolved repository root.
    Repo,
    /// The configured extension source directory.
    Extension,
}

/// One allow-listed make target.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MakeTargetConfig {
    /// Where the target runs.
    pub dir: MakeDir,
    /// External tool that must resolve before the build starts.
    #[serde(default)]
    pub requires: Option<String>,
}

fn default_modes() -> BTreeMap<String, Vec<String>> {
    ["dev-chat", "dev-interface-local"]
        .into_iter()
        .map(|mode| (mode.to_owned(), vec!["make".to_owned(), mode.to_owned()]))
        .collect()
}

fn default_make_targets() -> BTreeMap<String, MakeTargetConfig> {
    BTreeMap::from([
        (
            "build-playground".to_owned(),
            MakeTargetConfig {
                dir: MakeDir::Repo,
                requires: Some("npm".into()),
            },
        ),
        (
            "build-extension".to_owned(),
            MakeTargetConfig {
                dir: MakeDir::Extension,
                requires: Some("npm".into()),
            },
        ),
    ])
}

fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".shipctl")
}

fn default_env_file() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_default()
        .join(".shipctl.env")
}

/// Host configuration parsed from an optional `shipctl.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct HostConfig {
    /// Root for project targets (`<state_dir>/<id>.json`).
    pub state_dir: PathBuf,
    /// External `KEY=VALUE` file holding `REPO_PATH` and friends.
    pub env_file: PathBuf,
    /// HTTP bind address.
    pub bind: String,
    /// HTTP port.
    pub http_port: u16,
    /// Origins the HTTP API answers cross-origin requests from. A trailing
    /// `*` matches any suffix.
    pub allowed_origins: Vec<String>,
    /// Files that must exist for a directory to count as a repo root.
    pub repo_markers: Vec<String>,
    /// Allow-listed start modes for repo targets, name to argv.
    pub modes: BTreeMap<String, Vec<String>>,
    /// Mode used when a repo start names none.
    pub default_mode: String,
    /// Allow-listed make targets.
    pub make_targets: BTreeMap<String, MakeTargetConfig>,
    /// Apply the toolchain search path to `start` commands as well.
    pub augment_start_path: bool,
    /// Fixed waits.
    pub timing: TimingConfig,
    /// Log tail sizes.
    pub tail: TailConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            env_file: default_env_file(),
            bind: "127.0.0.1".into(),
            http_port: 9876,
            allowed_origins: vec!["chrome-extension://*".into(), "moz-extension://*".into()],
            repo_markers: vec!["Makefile".into()],
            modes: default_modes(),
            default_mode: "dev-chat".into(),
            make_targets: default_make_targets(),
            augment_start_path: false,
            timing: TimingConfig::default(),
            tail: TailConfig::default(),
        }
    }
}

impl HostConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Argv for an allow-listed start mode.
    #[must_use]
    pub fn mode_argv(&self, mode: &str) -> Option<&[String]> {
        self.modes.get(mode).map(Vec::as_slice)
    }

    fn validate(&self) -> Result<()> {
        let t = &self.timing;
        if [
            t.grace_ms,
            t.stop_timeout_ms,
            t.poll_interval_ms,
            t.kill_confirm_ms,
            t.health_timeout_ms,
        ]
        .contains(&0)
        {
            return Err(AppError::Config(
                "timing values must be greater than zero".into(),
            ));
        }
        if t.grace_ms > MAX_GRACE_MS {
            return Err(AppError::Config(format!(
                "grace_ms must not exceed {MAX_GRACE_MS}"
            )));
        }
        if self.modes.is_empty() {
            return Err(AppError::Config("at least one mode is required".into()));
        }
        if let Some((name, _)) = self.modes.iter().find(|(_, argv)| argv.is_empty()) {
            return Err(AppError::Config(format!("mode {name} has an empty command")));
        }
        if !self.modes.contains_key(&self.default_mode) {
            return Err(AppError::Config(format!(
                "default_mode {} is not a configured mode",
                self.default_mode
            )));
        }
        Ok(())
    }

    /// Whether `origin` matches one of [`HostConfig::allowed_origins`].
    #[must_use]
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|pattern| match pattern.strip_suffix('*') {
                Some(prefix) => origin.starts_with(prefix),
                None => origin == pattern,
            })
    }
}
