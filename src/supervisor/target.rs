//! Target identities and the on-disk layout derived from them.
//!
//! A project target lives under the host state directory
//! (`<state_dir>/<id>.json` + `<id>.log`); a repo target keeps its files in
//! `<repo>/.native-host/`.

use std::path::{Path, PathBuf};

use crate::env_file::{self, EnvFile};
use crate::{AppError, Result};

/// Directory holding repo-target state and logs.
pub const REPO_STATE_DIR: &str = ".native-host";

/// Files that identify an extension source directory.
const EXTENSION_MARKERS: &[&str] = &["Makefile", "package.json"];

/// Which layout a target uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    /// Arbitrary shell command keyed by project id.
    Project {
        /// Caller-supplied identifier.
        id: String,
    },
    /// Allow-listed mode run inside a repository.
    Repo {
        /// Canonical repository root.
        root: PathBuf,
    },
}

/// A supervised process identity with its resolved file paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Layout discriminator.
    pub kind: TargetKind,
    /// State record file.
    pub state_path: PathBuf,
    /// Combined output log of the child.
    pub log_path: PathBuf,
}

impl Target {
    /// Project target under `state_dir`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRequest` if `id` could escape `state_dir`.
    pub fn project(id: &str, state_dir: &Path) -> Result<Self> {
        validate_project_id(id)?;
        Ok(Self {
            kind: TargetKind::Project { id: id.to_owned() },
            state_path: state_dir.join(format!("{id}.json")),
            log_path: state_dir.join(format!("{id}.log")),
        })
    }

    /// Repo target rooted at `root`.
    #[must_use]
    pub fn repo(root: PathBuf) -> Self {
        let dir = root.join(REPO_STATE_DIR);
        Self {
            state_path: dir.join("state.json"),
            log_path: dir.join("backend.log"),
            kind: TargetKind::Repo { root },
        }
    }

    /// Short label for log fields.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.kind {
            TargetKind::Project { id } => id.clone(),
            TargetKind::Repo { root } => root.display().to_string(),
        }
    }

    /// Create the directory holding the state and log files.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory cannot be created.
    pub fn ensure_dirs(&self) -> Result<()> {
        for path in [&self.state_path, &self.log_path] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    AppError::Io(format!(
                        "failed to create state directory {}: {err}",
                        parent.display()
                    ))
                })?;
            }
        }
        Ok(())
    }
}

/// Log file for a make target run inside `dir`.
#[must_use]
pub fn make_log_path(dir: &Path, target: &str) -> PathBuf {
    dir.join(REPO_STATE_DIR).join(format!("make-{target}.log"))
}

fn validate_project_id(id: &str) -> Result<()> {
    let well_formed = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if well_formed {
        Ok(())
    } else {
        Err(AppError::InvalidRequest(format!("Invalid project id: {id}")))
    }
}

/// Where repo roots are looked up.
#[derive(Debug, Clone)]
pub struct RepoLocator<'a> {
    /// Files that must all exist in a repo root.
    pub markers: &'a [String],
    /// External settings consulted for `REPO_PATH`.
    pub env: &'a EnvFile,
    /// Directory whose ancestors are searched last.
    pub search_from: Option<PathBuf>,
}

impl RepoLocator<'_> {
    /// Resolve the repo root: explicit path, then `REPO_PATH`, then the
    /// first qualifying ancestor of `search_from`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigInvalid` when an explicit path is not a repo
    /// root or no candidate qualifies.
    pub fn resolve(&self, custom: Option<&str>) -> Result<PathBuf> {
        if let Some(raw) = custom.map(str::trim).filter(|p| !p.is_empty()) {
            return self.qualify(&env_file::expand_home(raw)).ok_or_else(|| {
                AppError::ConfigInvalid(format!(
                    "Custom repo path invalid: {raw} (expected {})",
                    self.markers.join(", ")
                ))
            });
        }

        if let Some(root) = self
            .env
            .path(env_file::REPO_PATH)
            .and_then(|candidate| self.qualify(&candidate))
        {
            return Ok(root);
        }

        if let Some(start) = &self.search_from {
            if let Some(root) = start.ancestors().find_map(|dir| self.qualify(dir)) {
                return Ok(root);
            }
        }

        Err(AppError::ConfigInvalid(format!(
            "Could not locate repo root (expected {}). Set {} in the settings file or extension options.",
            self.markers.join(", "),
            env_file::REPO_PATH
        )))
    }

    fn qualify(&self, candidate: &Path) -> Option<PathBuf> {
        let root = candidate.canonicalize().ok()?;
        self.markers
            .iter()
            .all(|marker| root.join(marker).exists())
            .then_some(root)
    }
}

/// Resolve the extension source directory from `EXTENSION_DIR`.
///
/// # Errors
///
/// Returns `AppError::ConfigInvalid` if the variable is unset or the
/// directory lacks a `Makefile` and `package.json`.
pub fn resolve_extension_dir(env: &EnvFile) -> Result<PathBuf> {
    env.path(env_file::EXTENSION_DIR)
        .and_then(|dir| dir.canonicalize().ok())
        .filter(|dir| EXTENSION_MARKERS.iter().all(|m| dir.join(m).exists()))
        .ok_or_else(|| {
            AppError::ConfigInvalid(
                "Extension directory not configured. Re-run the native host install script."
                    .into(),
            )
        })
}
