//! External `KEY=VALUE` settings file (`.shipctl.env`).
//!
//! Written by the extension install script and by `save_config`; read to
//! locate the repository and the extension source directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{AppError, Result};

/// Interpreter used to launch the native host.
pub const PYTHON_PATH: &str = "PYTHON_PATH";
/// Repository the backend operations run in.
pub const REPO_PATH: &str = "REPO_PATH";
/// Extension source directory, set only by the install script.
pub const EXTENSION_DIR: &str = "EXTENSION_DIR";

/// Parsed view of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    values: HashMap<String, String>,
}

impl EnvFile {
    /// Read `path`, returning an empty file when it is absent or unreadable.
    #[must_use]
    pub fn read(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw),
            Err(err) => {
                debug!(path = %path.display(), %err, "env file not readable");
                Self::default()
            }
        }
    }

    /// Parse `KEY=VALUE` lines. Blank lines, `#` comments and lines without
    /// `=` are skipped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let values = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_owned(), value.trim().to_owned()))
            .collect();
        Self { values }
    }

    /// Non-empty value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Non-empty value for `key`, with `~` expanded, as a path.
    #[must_use]
    pub fn path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(expand_home)
    }
}

/// Rewrite the settings file, keeping whatever `EXTENSION_DIR` it held.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be written.
pub fn save(path: &Path, python_path: &str, repo_path: &str) -> Result<()> {
    let existing = EnvFile::read(path);
    let extension_dir = existing.get(EXTENSION_DIR).unwrap_or_default();
    let content = format!(
        "# shipctl configuration\n\
         # Auto-generated by extension settings / install script\n\
         \n\
         # Path to Python interpreter (for native host)\n\
         {PYTHON_PATH}={}\n\
         \n\
         # Path to the repository (for backend operations)\n\
         {REPO_PATH}={}\n\
         \n\
         # Path to extension source directory (set by install script)\n\
         {EXTENSION_DIR}={extension_dir}\n",
        python_path.trim(),
        repo_path.trim(),
    );
    std::fs::write(path, content)
        .map_err(|err| AppError::Io(format!("Failed to save config: {err}")))
}

/// Expand a leading `~` to the home directory.
#[must_use]
pub fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => dirs::home_dir()
            .map_or_else(|| PathBuf::from(raw), |home| home.join(rest.trim_start_matches('/'))),
        _ => PathBuf::from(raw),
    }
}
