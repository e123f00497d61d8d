//! Auto-detection of local settings reported by `get_config`.

use std::path::{Path, PathBuf};

use regex::Regex;

/// First `python3` or `python` on the inherited `PATH`.
#[must_use]
pub fn python_interpreter() -> Option<PathBuf> {
    ["python3", "python"]
        .into_iter()
        .find_map(|name| which::which(name).ok())
}

/// `(owner, name)` of the first GitHub remote in `<repo>/.git/config`.
#[must_use]
pub fn github_remote(repo_root: &Path) -> Option<(String, String)> {
    let raw = std::fs::read_to_string(repo_root.join(".git").join("config")).ok()?;
    parse_github_remote(&raw)
}

fn parse_github_remote(git_config: &str) -> Option<(String, String)> {
    let re = Regex::new(
        r"(?m)url\s*=\s*(?:git@github\.com:|https://github\.com/)([^/\s]+)/([^/\s]+?)(?:\.git)?\s*$",
    )
    .ok()?;
    let caps = re.captures(git_config)?;
    Some((caps[1].to_owned(), caps[2].to_owned()))
}
