use shipctl::config::{HostConfig, MakeDir};
use shipctl::AppError;

#[test]
fn empty_file_yields_defaults() {
    let config = HostConfig::from_toml_str("").expect("defaults are valid");
    assert_eq!(config.http_port, 9876);
    assert_eq!(config.bind, "127.0.0.1");
    assert_eq!(config.default_mode, "dev-chat");
    assert_eq!(config.repo_markers, vec!["Makefile".to_owned()]);
    assert!(!config.augment_start_path);
    assert_eq!(config.timing.grace_ms, 500);
    assert_eq!(config.timing.stop_timeout_ms, 3_000);
    assert_eq!(config.tail.logs_lines, 120);
}

#[test]
fn default_modes_run_make() {
    let config = HostConfig::default();
    assert_eq!(
        config.mode_argv("dev-chat"),
        Some(&["make".to_owned(), "dev-chat".to_owned()][..])
    );
    assert!(config.mode_argv("dev-interface-local").is_some());
    assert!(config.mode_argv("rm -rf").is_none());
}

#[test]
fn default_make_targets_require_npm() {
    let config = HostConfig::default();
    let playground = &config.make_targets["build-playground"];
    assert_eq!(playground.dir, MakeDir::Repo);
    assert_eq!(playground.requires.as_deref(), Some("npm"));
    assert_eq!(config.make_targets["build-extension"].dir, MakeDir::Extension);
}

#[test]
fn overrides_individual_keys() {
    let config = HostConfig::from_toml_str(
        r#"
http_port = 4000
repo_markers = ["Makefile", "pyproject.toml"]
default_mode = "serve"

[modes]
serve = ["python3", "-m", "http.server"]

[make_targets.lint]
dir = "repo"

[timing]
stop_timeout_ms = 1000
"#,
    )
    .expect("valid config");

    assert_eq!(config.http_port, 4000);
    assert_eq!(config.repo_markers.len(), 2);
    assert_eq!(config.mode_argv("serve").map(<[String]>::len), Some(3));
    assert!(config.mode_argv("dev-chat").is_none());
    assert_eq!(config.make_targets["lint"].requires, None);
    assert_eq!(config.timing.stop_timeout_ms, 1_000);
    assert_eq!(config.timing.grace_ms, 500);
}

#[test]
fn zero_timing_is_rejected() {
    let err = HostConfig::from_toml_str("[timing]\npoll_interval_ms = 0\n").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn zero_kill_and_health_timings_are_rejected() {
    for key in ["health_timeout_ms", "kill_confirm_ms"] {
        let err = HostConfig::from_toml_str(&format!("[timing]\n{key} = 0\n")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)), "{key}: {err}");
    }
}

#[test]
fn extension_origins_are_allowed_by_default() {
    let config = HostConfig::default();
    assert!(config.origin_allowed("chrome-extension://abcdefghijklmnop"));
    assert!(config.origin_allowed("moz-extension://0b1c2d3e"));
    assert!(!config.origin_allowed("http://evil.example"));
    assert!(!config.origin_allowed("null"));
}

#[test]
fn exact_origins_match_whole_value() {
    let config =
        HostConfig::from_toml_str("allowed_origins = [\"http://localhost:5173\"]\n").unwrap();
    assert!(config.origin_allowed("http://localhost:5173"));
    assert!(!config.origin_allowed("http://localhost:5173.evil.example"));
    assert!(!config.origin_allowed("chrome-extension://abc"));
}

#[test]
fn excessive_grace_is_rejected() {
    let err = HostConfig::from_toml_str("[timing]\ngrace_ms = 60000\n").unwrap_err();
    assert!(err.to_string().contains("grace_ms"));
}

#[test]
fn default_mode_must_exist() {
    let err = HostConfig::from_toml_str("default_mode = \"nope\"\n").unwrap_err();
    assert!(err.to_string().contains("nope"));
}

#[test]
fn empty_mode_command_is_rejected() {
    let err = HostConfig::from_toml_str("[modes]\ndev-chat = []\n").unwrap_err();
    assert!(err.to_string().contains("empty command"));
}

#[test]
fn malformed_toml_is_config_error() {
    let err = HostConfig::from_toml_str("http_port = \"not a number\"").unwrap_err();
    assert!(err.to_string().starts_with("config:"));
}

#[test]
fn missing_file_is_config_error() {
    let err = HostConfig::load_from_path("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}
