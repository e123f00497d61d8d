//! HTTP API transport.
//!
//! Mirrors the native messaging envelope over JSON routes:
//! `POST /api/{start,stop,status,logs,make}`, `POST /api/config` (save) and
//! `GET /api/config` (detect). `repoPath` and `projectId` may also be given
//! as query parameters. Failures carry a `detail` string with status 400 for
//! rejected input, 403 for starts that only the native host may perform, 415
//! for non-JSON bodies and 500 otherwise.
//!
//! Web pages can reach a loopback port, so the surface is narrower than the
//! native host's: only allow-listed repo modes can be started, every `POST`
//! must declare `application/json` (which forces a CORS preflight), and
//! cross-origin responses are limited to the configured origins.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, request::Parts, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::models::envelope::{Action, Reply, Request};
use crate::service::Supervisor;
use crate::{AppError, Result};

/// Target selectors accepted in the query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetQuery {
    repo_path: Option<String>,
    project_id: Option<String>,
}

/// Failure rendered as an HTTP error response.
enum ApiError {
    /// Domain error from the supervisor.
    App(AppError),
    /// Request reaching a capability reserved for the native host.
    Forbidden(&'static str),
    /// `POST` body not declared as JSON.
    UnsupportedMediaType,
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::App(err) => {
                let status = StatusCode::from_u16(err.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    warn!(%err, "request failed");
                }
                let detail = match &err {
                    AppError::ImmediateExit { message, log_tail } => {
                        format!("{message}: {log_tail}")
                    }
                    other => other.caller_message(),
                };
                (status, detail)
            }
            Self::Forbidden(reason) => {
                warn!(reason, "rejected native-only request");
                (StatusCode::FORBIDDEN, reason.to_owned())
            }
            Self::UnsupportedMediaType => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Content-Type must be application/json".to_owned(),
            ),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

/// Handler for `GET /health`: liveness of the host itself.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `true` when the request declares a JSON body, parameters ignored.
fn declares_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

/// Decode an optional JSON body and fold in query selectors.
fn build_request(query: TargetQuery, body: &Bytes) -> Result<Request> {
    let mut request = if body.iter().all(u8::is_ascii_whitespace) {
        Request::default()
    } else {
        serde_json::from_slice::<Request>(body)?
    };
    if request.repo_path.is_none() {
        request.repo_path = query.repo_path;
    }
    if request.project_id.is_none() {
        request.project_id = query.project_id;
    }
    Ok(request)
}

/// Free-form shell commands run only for the native host, which the browser
/// restricts to the extension itself.
fn ensure_allow_listed_start(request: &Request) -> std::result::Result<(), ApiError> {
    let names_project = request.project_id.as_deref().is_some_and(|id| !id.is_empty());
    if names_project || request.command.is_some() {
        return Err(ApiError::Forbidden(
            "Project commands can only be started through the native host",
        ));
    }
    Ok(())
}

async fn run(
    supervisor: &Supervisor,
    action: Action,
    query: TargetQuery,
    body: &Bytes,
) -> std::result::Result<Json<Reply>, ApiError> {
    let request = build_request(query, body)?;
    if action == Action::Start {
        ensure_allow_listed_start(&request)?;
    }
    Ok(Json(supervisor.dispatch(action, &request).await?))
}

macro_rules! action_handler {
    ($name:ident, $action:expr) => {
        async fn $name(
            State(supervisor): State<Arc<Supervisor>>,
            Query(query): Query<TargetQuery>,
            headers: HeaderMap,
            body: Bytes,
        ) -> std::result::Result<Json<Reply>, ApiError> {
            if !declares_json(&headers) {
                return Err(ApiError::UnsupportedMediaType);
            }
            run(&supervisor, $action, query, &body).await
        }
    };
}

action_handler!(start, Action::Start);
action_handler!(stop, Action::Stop);
action_handler!(status, Action::Status);
action_handler!(logs, Action::Logs);
action_handler!(make, Action::Make);
action_handler!(save_config, Action::SaveConfig);

/// Handler for `GET /api/config`; takes selectors from the query only.
async fn get_config(
    State(supervisor): State<Arc<Supervisor>>,
    Query(query): Query<TargetQuery>,
) -> std::result::Result<Json<Reply>, ApiError> {
    run(&supervisor, Action::GetConfig, query, &Bytes::new()).await
}

/// CORS policy answering only the configured origins.
fn cors(supervisor: &Arc<Supervisor>) -> CorsLayer {
    let supervisor = Arc::clone(supervisor);
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| supervisor.config().origin_allowed(origin))
            },
        ))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Router exposing the supervision API.
#[must_use]
pub fn router(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/start", post(start))
        .route("/api/stop", post(stop))
        .route("/api/status", post(status))
        .route("/api/logs", post(logs))
        .route("/api/make", post(make))
        .route("/api/config", post(save_config).get(get_config))
        .layer(cors(&supervisor))
        .with_state(supervisor)
}

/// Serve the API on `listener` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails while accepting connections.
pub async fn serve(
    supervisor: Arc<Supervisor>,
    listener: TcpListener,
    ct: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "http api listening");
    }
    axum::serve(listener, router(supervisor))
        .with_graceful_shutdown(ct.cancelled_owned())
        .await
        .map_err(|err| AppError::Io(format!("http server failed: {err}")))?;
    info!("http api stopped");
    Ok(())
}

/// Bind `addr` and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the address cannot be bound.
pub async fn bind_and_serve(
    supervisor: Arc<Supervisor>,
    addr: &str,
    ct: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind http api on {addr}: {err}")))?;
    serve(supervisor, listener, ct).await
}
