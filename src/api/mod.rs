//! HTTP API
//!
//! `/health`, `/services`, `/scan`, `/tools` and `/metrics`, with permissive
//! CORS for the browser UI.

mod error;
mod handlers;
mod models;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use models::{HealthResponse, ScanRequest, ScanResponse, ServiceStatus, ToolInfo, SCAN_ID};

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::runtime::ContainerRuntime;
use crate::tools::Toolbox;

/// Shared, read-only handler state
pub struct AppState {
    /// `None` when the runtime client failed to initialize at startup
    pub runtime: Option<Arc<dyn ContainerRuntime>>,
    pub toolbox: Arc<Toolbox>,
    /// Container names reported by `/services`
    pub expected_services: Vec<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/services", get(handlers::services))
        .route("/scan", post(handlers::scan))
        .route("/tools", get(handlers::tools))
        .route("/metrics", get(handlers::prometheus_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    crate::metrics::init().context("Failed to initialize metrics")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    info!("API listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContainerSummary, RuntimeError};
    use crate::tools::{
        CommandValidator, ExecutionTarget, ProcessRunner, RunnerConfig, ToolTimeouts,
    };
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    #[derive(Default)]
    struct MockRuntime {
        containers: Vec<ContainerSummary>,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ContainerRuntime for MockRuntime {
        async fn ping(&self) -> Result<(), RuntimeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RuntimeError::CommandFailed {
                    command: "ps".to_string(),
                    stderr: "daemon went away".to_string(),
                });
            }
            Ok(self.containers.clone())
        }
    }

    fn toolbox(tool_dir: Option<&Path>) -> Arc<Toolbox> {
        let mut config = RunnerConfig::default();
        config.tool_dir = tool_dir.map(Path::to_path_buf);
        let runner = ProcessRunner::new(ExecutionTarget::Host, config)
            .with_validator(CommandValidator::default());
        Arc::new(Toolbox::new(runner, ToolTimeouts::default()))
    }

    fn state(runtime: Option<Arc<MockRuntime>>, tool_dir: Option<&Path>) -> Arc<AppState> {
        Arc::new(AppState {
            runtime: runtime.map(|r| r as Arc<dyn ContainerRuntime>),
            toolbox: toolbox(tool_dir),
            expected_services: crate::config::DEFAULT_EXPECTED_SERVICES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        })
    }

    async fn call(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn container(id: &str, name: &str, state: &str) -> ContainerSummary {
        ContainerSummary {
            id: id.to_string(),
            name: name.to_string(),
            state: state.to_string(),
        }
    }

    #[tokio::test]
    async fn test_health_ok_and_degraded() {
        let (status, body) = call(state(Some(Arc::default()), None), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "docker": true, "database": true}));

        let (status, body) = call(state(None, None), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "degraded", "docker": false, "database": true}));
    }

    #[tokio::test]
    async fn test_services_reports_missing_containers() {
        let runtime = Arc::new(MockRuntime {
            containers: vec![
                container("0123456789abcdef", "kalidocker-api-1", "running"),
                container("fedcba9876543210", "kalidocker-kali-1", "exited"),
                container("aaaaaaaaaaaa", "unrelated", "running"),
            ],
            ..Default::default()
        });

        let (status, body) = call(state(Some(runtime), None), get("/services")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {"name": "postgres", "status": "not found", "container_id": null},
                {"name": "api", "status": "running", "container_id": "0123456789ab"},
                {"name": "ui", "status": "not found", "container_id": null},
                {"name": "kali", "status": "exited", "container_id": "fedcba987654"},
            ])
        );
    }

    #[tokio::test]
    async fn test_services_without_runtime_is_503() {
        let (status, body) = call(state(None, None), get("/services")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "service_unavailable");
    }

    #[tokio::test]
    async fn test_services_runtime_error_is_500() {
        let runtime = Arc::new(MockRuntime {
            fail: true,
            ..Default::default()
        });
        let (status, body) = call(state(Some(runtime), None), get("/services")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"].as_str().unwrap().contains("daemon went away"));
    }

    #[tokio::test]
    async fn test_scan_unknown_tool_is_400_without_runtime_calls() {
        let runtime = Arc::new(MockRuntime::default());
        let (status, body) = call(
            state(Some(runtime.clone()), None),
            post_json("/scan", json!({"tool": "unknown", "target": "10.0.0.1"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Unknown tool: unknown");
        assert_eq!(runtime.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scan_without_runtime_is_503() {
        let (status, _) = call(
            state(None, None),
            post_json("/scan", json!({"tool": "nmap", "target": "10.0.0.1"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scan_runs_tool() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let nikto = dir.path().join("nikto");
        std::fs::write(&nikto, "#!/bin/sh\necho \"nikto $@\"\n").unwrap();
        std::fs::set_permissions(&nikto, std::fs::Permissions::from_mode(0o755)).unwrap();

        let (status, body) = call(
            state(Some(Arc::default()), Some(dir.path())),
            post_json(
                "/scan",
                json!({"tool": "nikto", "target": "http://10.0.0.5", "options": "-Tuning 1"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "id": "scan-1",
                "status": "completed",
                "output": "nikto -h http://10.0.0.5 -Tuning 1\n",
            })
        );
    }

    #[tokio::test]
    async fn test_scan_rejected_options_report_error() {
        let (status, body) = call(
            state(Some(Arc::default()), None),
            post_json(
                "/scan",
                json!({"tool": "nmap", "target": "10.0.0.1", "options": "-sV; id"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "scan-1");
        assert_eq!(body["status"], "error");
        assert!(body["output"].as_str().unwrap().contains("metacharacter"));
    }

    #[tokio::test]
    async fn test_tools_catalog() {
        let (status, body) = call(state(None, None), get("/tools")).await;
        assert_eq!(status, StatusCode::OK);

        let names: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["nmap", "nuclei", "nikto", "dirb", "sqlmap", "metasploit"]);
        assert_eq!(body[0]["description"], "Network discovery and security auditing");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        crate::metrics::init().unwrap();
        let response = router(state(None, None)).oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let request = Request::get("/tools")
            .header("origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = router(state(None, None)).oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
    }
}
