//! `status` health probing against a local HTTP endpoint.

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;

use super::test_helpers::{call, test_config, test_supervisor};

async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/booting", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn healthy_backend_reports_true() {
    let base = spawn_backend().await;
    let temp = tempfile::tempdir().unwrap();
    let sup = test_supervisor(test_config(temp.path()));

    let status = call(
        &sup,
        json!({"action": "status", "projectId": "web", "chatApiBaseUrl": base}),
    )
    .await;

    assert_eq!(status["status"], "stopped");
    assert_eq!(status["healthUrl"], format!("{base}/health"));
    assert_eq!(status["healthy"], true);
}

#[tokio::test]
async fn non_success_status_reports_false() {
    let base = spawn_backend().await;
    let temp = tempfile::tempdir().unwrap();
    let sup = test_supervisor(test_config(temp.path()));

    let status = call(
        &sup,
        json!({
            "action": "status",
            "projectId": "web",
            "chatApiBaseUrl": base,
            "healthUrl": format!("{base}/booting")
        }),
    )
    .await;

    assert_eq!(status["healthUrl"], format!("{base}/booting"));
    assert_eq!(status["healthy"], false);
}

#[tokio::test]
async fn unreachable_backend_reports_false() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let temp = tempfile::tempdir().unwrap();
    let sup = test_supervisor(test_config(temp.path()));

    let status = call(
        &sup,
        json!({"action": "status", "projectId": "web", "healthUrl": format!("http://{addr}/health")}),
    )
    .await;

    assert_eq!(status["ok"], true);
    assert_eq!(status["healthy"], false);
}

#[tokio::test]
async fn no_url_means_not_probed() {
    let temp = tempfile::tempdir().unwrap();
    let sup = test_supervisor(test_config(temp.path()));
    let status = call(&sup, json!({"action": "status", "projectId": "web"})).await;
    assert!(status["healthUrl"].is_null());
    assert!(status["healthy"].is_null());
}
