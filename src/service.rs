//! Request dispatch shared by the native and HTTP transports.
//!
//! [`Supervisor`] resolves the target named by a [`Request`], runs the
//! supervision operation against its injected collaborators, and builds the
//! [`Reply`]. It keeps no state between requests.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, info_span, Instrument};

use crate::config::{HostConfig, MakeDir};
use crate::detect;
use crate::env_file::{self, EnvFile};
use crate::models::envelope::{Action, Reply, ReplyBody, Request};
use crate::supervisor::health::{self, HealthChecker};
use crate::supervisor::launcher::{self, LaunchSettings, LaunchSpec};
use crate::supervisor::liveness::{LivenessProbe, OsProcess, Signaller};
use crate::supervisor::log_sink;
use crate::supervisor::make_runner::{self, MakeJob};
use crate::supervisor::state_store::{FileStateStore, StateStore};
use crate::supervisor::target::{self, RepoLocator, Target};
use crate::supervisor::terminator::{self, StopOutcome, StopSettings};
use crate::supervisor::tool_resolver::{ToolResolver, ToolchainPath};
use crate::{AppError, Result};

/// Stateless request handler with injected collaborators.
#[derive(Clone)]
pub struct Supervisor {
    config: Arc<HostConfig>,
    store: Arc<dyn StateStore>,
    probe: Arc<dyn LivenessProbe>,
    signaller: Arc<dyn Signaller>,
    resolver: Arc<dyn ToolResolver>,
    health: HealthChecker,
    search_from: Option<PathBuf>,
}

impl Supervisor {
    /// Handler backed by state files, real signals and the toolchain path.
    #[must_use]
    pub fn new(config: HostConfig) -> Self {
        let health = HealthChecker::new(config.timing.health_timeout());
        let search_from = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(std::path::Path::to_path_buf));
        Self {
            config: Arc::new(config),
            store: Arc::new(FileStateStore),
            probe: Arc::new(OsProcess),
            signaller: Arc::new(OsProcess),
            resolver: Arc::new(ToolchainPath::from_env()),
            health,
            search_from,
        }
    }

    /// Replace the state store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    /// Replace the liveness probe and signaller.
    #[must_use]
    pub fn with_process_control(
        mut self,
        probe: Arc<dyn LivenessProbe>,
        signaller: Arc<dyn Signaller>,
    ) -> Self {
        self.probe = probe;
        self.signaller = signaller;
        self
    }

    /// Replace the build tool resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ToolResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Directory whose ancestors are searched for a repo root last.
    #[must_use]
    pub fn with_search_from(mut self, dir: Option<PathBuf>) -> Self {
        self.search_from = dir;
        self
    }

    /// Host configuration in use.
    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Dispatch on the request's `action` field.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRequest` for an unknown action, otherwise
    /// whatever the action handler returns.
    pub async fn handle(&self, request: &Request) -> Result<Reply> {
        let action = request.action()?;
        self.dispatch(action, request).await
    }

    /// Run `action` for `request`.
    ///
    /// # Errors
    ///
    /// Returns the domain error of the failed operation.
    pub async fn dispatch(&self, action: Action, request: &Request) -> Result<Reply> {
        let span = info_span!("request", action = ?action);
        async move {
            match action {
                Action::Start => self.start(request).await,
                Action::Stop => self.stop(request).await,
                Action::Status => self.status(request).await,
                Action::Logs => self.logs(request),
                Action::Make => self.make(request).await,
                Action::GetConfig => self.get_config(request),
                Action::SaveConfig => self.save_config(request),
            }
        }
        .instrument(span)
        .await
    }

    fn env(&self) -> EnvFile {
        EnvFile::read(&self.config.env_file)
    }

    fn locate_repo(&self, env: &EnvFile, custom: Option<&str>) -> Result<PathBuf> {
        RepoLocator {
            markers: &self.config.repo_markers,
            env,
            search_from: self.search_from.clone(),
        }
        .resolve(custom)
    }

    /// Project target when `projectId` is present, repo target otherwise.
    fn resolve_target(&self, request: &Request) -> Result<Target> {
        let target = match request.project_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => Target::project(id, &self.config.state_dir)?,
            None => Target::repo(self.locate_repo(&self.env(), request.repo_path.as_deref())?),
        };
        target.ensure_dirs()?;
        Ok(target)
    }

    async fn start(&self, request: &Request) -> Result<Reply> {
        let is_project = request.project_id.as_deref().is_some_and(|id| !id.is_empty());
        let mode = if is_project {
            None
        } else {
            let mode = request
                .mode
                .clone()
                .unwrap_or_else(|| self.config.default_mode.clone());
            if self.config.mode_argv(&mode).is_none() {
                return Err(AppError::InvalidRequest(format!("Unknown mode: {mode}")));
            }
            Some(mode)
        };

        let target = self.resolve_target(request)?;
        let mut spec = match (&target.kind, mode) {
            (target::TargetKind::Repo { root }, Some(mode)) => {
                let argv = self.config.mode_argv(&mode).unwrap_or_default();
                LaunchSpec::mode(&mode, argv, root.clone())?
            }
            _ => {
                let command = request
                    .command
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| AppError::InvalidRequest("No command provided".into()))?;
                LaunchSpec::shell(command, project_cwd(request.cwd.as_deref())?)
            }
        };
        if self.config.augment_start_path {
            spec.search_path = Some(self.resolver.search_path());
        }

        let launched = launcher::start(
            self.store.as_ref(),
            self.probe.as_ref(),
            self.signaller.as_ref(),
            &target,
            &spec,
            LaunchSettings {
                grace: self.config.timing.grace(),
                tail_lines: self.config.tail.start_lines,
            },
        )
        .await?;

        Ok(Reply::success(ReplyBody::Start {
            status: "running",
            pid: launched.pid,
            already_running: launched.already_running,
        }))
    }

    async fn stop(&self, request: &Request) -> Result<Reply> {
        let target = self.resolve_target(request)?;
        let timing = &self.config.timing;
        let outcome = terminator::stop(
            self.store.as_ref(),
            self.probe.as_ref(),
            self.signaller.as_ref(),
            &target,
            StopSettings {
                deadline: timing.stop_timeout(),
                poll_interval: timing.poll_interval(),
                kill_confirm: timing.kill_confirm(),
            },
        )
        .await?;

        info!(outcome = ?outcome, "stop finished");
        let pid = outcome.pid();
        Ok(if outcome.is_success() {
            Reply::success(ReplyBody::Stop {
                status: "stopped",
                pid,
                error: None,
            })
        } else {
            let reason = match outcome {
                StopOutcome::KillFailed { pid } => format!("could not send SIGKILL to pid {pid}"),
                _ => format!("pid {} did not exit after SIGKILL", pid.unwrap_or_default()),
            };
            Reply::failed(ReplyBody::Stop {
                status: "error",
                pid,
                error: Some(reason),
            })
        })
    }

    async fn status(&self, request: &Request) -> Result<Reply> {
        let target = self.resolve_target(request)?;
        let record = self.store.read(&target);
        let live_pid = record.pid.filter(|&pid| self.probe.is_alive(pid));

        let health_url = health::health_url(
            request.health_url.as_deref(),
            request.chat_api_base_url.as_deref(),
        );
        let healthy = match &health_url {
            Some(url) => Some(self.health.check(url).await),
            None => None,
        };

        Ok(Reply::success(ReplyBody::Status {
            status: if live_pid.is_some() { "running" } else { "stopped" },
            pid: live_pid,
            health_url,
            healthy,
            mode: record.mode,
            command: record.command,
            started_at: record.started_at,
        }))
    }

    fn logs(&self, request: &Request) -> Result<Reply> {
        let target = self.resolve_target(request)?;
        Ok(Reply::success(ReplyBody::Logs {
            log_tail: log_sink::tail(&target.log_path, self.config.tail.logs_lines),
        }))
    }

    async fn make(&self, request: &Request) -> Result<Reply> {
        let name = request
            .target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::InvalidRequest("Missing make target".into()))?;
        let spec = self
            .config
            .make_targets
            .get(name)
            .ok_or_else(|| AppError::InvalidRequest(format!("Unsupported make target: {name}")))?;

        let env = self.env();
        let working_dir = match spec.dir {
            MakeDir::Repo => self.locate_repo(&env, request.repo_path.as_deref())?,
            MakeDir::Extension => target::resolve_extension_dir(&env)?,
        };

        let job = MakeJob {
            target: name.to_owned(),
            log_path: target::make_log_path(&working_dir, name),
            working_dir,
            requires: spec.requires.clone(),
            tail_lines: self.config.tail.make_lines,
        };
        let outcome = make_runner::run(&job, self.resolver.as_ref()).await?;

        let body = ReplyBody::Make {
            status: if outcome.succeeded() { "success" } else { "error" },
            exit_code: outcome.exit_code,
            log_tail: outcome.log_tail.clone(),
        };
        Ok(if outcome.succeeded() {
            Reply::success(body)
        } else {
            Reply::failed(body)
        })
    }

    fn get_config(&self, request: &Request) -> Result<Reply> {
        let root = self.locate_repo(&self.env(), request.repo_path.as_deref())?;
        let (github_repo_owner, github_repo_name) = detect::github_remote(&root).unzip();
        Ok(Reply::success(ReplyBody::DetectedConfig {
            repo_path: root.display().to_string(),
            python_path: detect::python_interpreter().map(|p| p.display().to_string()),
            github_repo_owner,
            github_repo_name,
        }))
    }

    fn save_config(&self, request: &Request) -> Result<Reply> {
        let path = &self.config.env_file;
        env_file::save(
            path,
            request.python_path.as_deref().unwrap_or_default(),
            request.repo_path.as_deref().unwrap_or_default(),
        )?;
        info!(path = %path.display(), "settings saved");
        Ok(Reply::success(ReplyBody::Saved {
            status: "saved",
            path: path.display().to_string(),
        }))
    }
}

/// Working directory for a project start; the home directory by default.
///
/// # Errors
///
/// Returns `AppError::ConfigInvalid` if the directory does not exist.
fn project_cwd(cwd: Option<&str>) -> Result<PathBuf> {
    let dir = cwd
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(env_file::expand_home)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("/"));
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(AppError::ConfigInvalid(format!(
            "Working directory not found: {}",
            dir.display()
        )))
    }
}
