//! `get_config` detection and `save_config` persistence.

use serde_json::json;

use shipctl::env_file::{EnvFile, EXTENSION_DIR, PYTHON_PATH, REPO_PATH};

use super::test_helpers::{call, make_repo, test_config, test_supervisor};

#[tokio::test]
async fn detects_repo_and_github_remote() {
    let temp = tempfile::tempdir().unwrap();
    let repo = make_repo(temp.path());
    std::fs::create_dir_all(repo.join(".git")).unwrap();
    std::fs::write(
        repo.join(".git/config"),
        "[core]\n\tbare = false\n[remote \"origin\"]\n\turl = git@github.com:octo-org/side-panel.git\n\tfetch = +refs/heads/*:refs/remotes/origin/*\n",
    )
    .unwrap();
    let sup = test_supervisor(test_config(temp.path()));

    let reply = call(
        &sup,
        json!({"action": "get_config", "repoPath": repo.to_str().unwrap()}),
    )
    .await;

    assert_eq!(reply["ok"], true, "{reply}");
    assert_eq!(reply["repoPath"], repo.to_str().unwrap());
    assert_eq!(reply["githubRepoOwner"], "octo-org");
    assert_eq!(reply["githubRepoName"], "side-panel");
}

#[tokio::test]
async fn repo_without_git_has_no_remote_fields() {
    let temp = tempfile::tempdir().unwrap();
    let repo = make_repo(temp.path());
    let sup = test_supervisor(test_config(temp.path()));

    let reply = call(
        &sup,
        json!({"action": "get_config", "repoPath": repo.to_str().unwrap()}),
    )
    .await;

    assert_eq!(reply["ok"], true);
    assert!(reply.get("githubRepoOwner").is_none());
    assert!(reply.get("githubRepoName").is_none());
}

#[tokio::test]
async fn save_config_writes_settings_and_keeps_extension_dir() {
    let temp = tempfile::tempdir().unwrap();
    let config = test_config(temp.path());
    let env_path = config.env_file.clone();
    std::fs::write(&env_path, "EXTENSION_DIR=/opt/extension\n").unwrap();
    let sup = test_supervisor(config);

    let reply = call(
        &sup,
        json!({
            "action": "save_config",
            "pythonPath": "/usr/bin/python3",
            "repoPath": "/home/dev/app"
        }),
    )
    .await;

    assert_eq!(
        reply,
        json!({"ok": true, "status": "saved", "path": env_path.to_str().unwrap()})
    );
    let env = EnvFile::read(&env_path);
    assert_eq!(env.get(PYTHON_PATH), Some("/usr/bin/python3"));
    assert_eq!(env.get(REPO_PATH), Some("/home/dev/app"));
    assert_eq!(env.get(EXTENSION_DIR), Some("/opt/extension"));
}

#[tokio::test]
async fn saved_repo_path_is_used_for_later_requests() {
    let temp = tempfile::tempdir().unwrap();
    let repo = make_repo(temp.path());
    let sup = test_supervisor(test_config(temp.path()));

    let saved = call(
        &sup,
        json!({"action": "save_config", "repoPath": repo.to_str().unwrap()}),
    )
    .await;
    assert_eq!(saved["ok"], true);

    let detected = call(&sup, json!({"action": "get_config"})).await;
    assert_eq!(detected["repoPath"], repo.to_str().unwrap());
}
