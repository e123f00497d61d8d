//! Shared construction of isolated supervisors for integration tests.

use std::path::{Path, PathBuf};

use serde_json::Value;

use shipctl::models::envelope::{Failure, Request};
use shipctl::{HostConfig, Supervisor};

/// Config whose state and settings files live under `root`.
pub fn test_config(root: &Path) -> HostConfig {
    let mut config = HostConfig::default();
    config.state_dir = root.join("state");
    config.env_file = root.join(".shipctl.env");
    config
}

/// Supervisor that never searches the test binary's ancestors for a repo.
pub fn test_supervisor(config: HostConfig) -> Supervisor {
    Supervisor::new(config).with_search_from(None)
}

/// Directory that qualifies as a repo root.
pub fn make_repo(root: &Path) -> PathBuf {
    let repo = root.join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    std::fs::write(repo.join("Makefile"), "all:\n\t@true\n").unwrap();
    repo.canonicalize().unwrap()
}

/// Run one request and render the reply or failure as JSON, as the native
/// transport does.
pub async fn call(supervisor: &Supervisor, request: Value) -> Value {
    let request: Request = serde_json::from_value(request).unwrap();
    match supervisor.handle(&request).await {
        Ok(reply) => serde_json::to_value(reply).unwrap(),
        Err(err) => serde_json::to_value(Failure::from(&err)).unwrap(),
    }
}

/// Pid field of a reply.
pub fn pid_of(reply: &Value) -> i32 {
    i32::try_from(reply["pid"].as_i64().expect("reply has a pid")).unwrap()
}
