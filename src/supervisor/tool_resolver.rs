//! Discovery of external build tools.
//!
//! Hosts launched by a browser inherit a minimal `PATH`, so well-known
//! toolchain install locations are probed and prepended before a build tool
//! is resolved.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Resolves external tools against a search path.
pub trait ToolResolver: Send + Sync {
    /// Search path handed to build children.
    fn search_path(&self) -> OsString;

    /// Absolute path of the first executable `tool` on
    /// [`ToolResolver::search_path`].
    fn resolve(&self, tool: &str) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        which::which_in(tool, Some(self.search_path()), cwd).ok()
    }
}

/// Prioritized list of toolchain directories ahead of the inherited `PATH`.
#[derive(Debug, Clone)]
pub struct ToolchainPath {
    candidates: Vec<PathBuf>,
    inherited: Option<OsString>,
}

impl ToolchainPath {
    /// Standard package-manager and version-manager locations under `home`,
    /// followed by the given inherited `PATH`.
    #[must_use]
    pub fn standard(home: Option<&Path>, inherited: Option<OsString>) -> Self {
        let mut candidates: Vec<PathBuf> = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin", "/bin"]
            .into_iter()
            .map(PathBuf::from)
            .collect();

        if let Some(home) = home {
            for rel in [
                ".local/bin",
                ".bun/bin",
                ".volta/bin",
                ".asdf/shims",
                ".local/share/mise/shims",
                ".fnm",
                ".fnm/current/bin",
            ] {
                candidates.push(home.join(rel));
            }
            candidates.extend(nvm_bins(&home.join(".nvm/versions/node")));
        }

        Self {
            candidates,
            inherited,
        }
    }

    /// Resolver for the current user and process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::standard(dirs::home_dir().as_deref(), std::env::var_os("PATH"))
    }

    /// Explicit search list with no inherited `PATH`.
    #[must_use]
    pub fn with_dirs(candidates: Vec<PathBuf>) -> Self {
        Self {
            candidates,
            inherited: None,
        }
    }
}

impl ToolResolver for ToolchainPath {
    fn search_path(&self) -> OsString {
        let existing: Vec<PathBuf> = self
            .candidates
            .iter()
            .filter(|dir| dir.is_dir())
            .cloned()
            .collect();
        let inherited = self
            .inherited
            .iter()
            .flat_map(std::env::split_paths)
            .filter(|p| !p.as_os_str().is_empty());
        std::env::join_paths(existing.into_iter().chain(inherited)).unwrap_or_default()
    }
}

/// Installed node versions, newest name first.
fn nvm_bins(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    let mut versions: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    versions.sort_unstable_by(|a, b| b.cmp(a));
    versions.into_iter().map(|v| v.join("bin")).collect()
}
