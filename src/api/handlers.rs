use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::error::{ApiError, ApiResult};
use super::models::{
    display_name, short_id, HealthResponse, ScanRequest, ScanResponse, ServiceStatus, ToolInfo,
    SCAN_ID, TOOL_CATALOG,
};
use super::AppState;
use crate::metrics;
use crate::tools::{ToolInvocation, ToolKind};

/// `docker` reflects whether the runtime client initialized at startup
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let docker = state.runtime.is_some();
    Json(HealthResponse {
        status: if docker { "ok" } else { "degraded" }.to_string(),
        docker,
        database: true,
    })
}

/// One entry per expected container, present or not
#[instrument(skip_all)]
pub async fn services(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ServiceStatus>>> {
    let runtime = state.runtime.as_ref().ok_or_else(ApiError::docker_unavailable)?;

    let containers = runtime.list_containers().await?;
    let by_name: HashMap<&str, _> = containers.iter().map(|c| (c.name.as_str(), c)).collect();

    let statuses = state
        .expected_services
        .iter()
        .map(|name| match by_name.get(name.as_str()) {
            Some(container) => ServiceStatus {
                name: display_name(name).to_string(),
                status: container.state.clone(),
                container_id: Some(short_id(&container.id)),
            },
            None => ServiceStatus {
                name: display_name(name).to_string(),
                status: "not found".to_string(),
                container_id: None,
            },
        })
        .collect();

    Ok(Json(statuses))
}

#[instrument(skip_all, fields(tool = %request.tool, target = %request.target))]
pub async fn scan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScanRequest>,
) -> ApiResult<Json<ScanResponse>> {
    let kind = ToolKind::from_name(&request.tool)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown tool: {}", request.tool)))?;
    if state.runtime.is_none() {
        return Err(ApiError::docker_unavailable());
    }

    let invocation = ToolInvocation::from_target(kind, request.target, request.options);
    let result = state.toolbox.run(invocation).await;
    info!(success = result.success, "Scan finished");

    let output = if result.success {
        result.output
    } else {
        result
            .error
            .filter(|e| !e.is_empty())
            .unwrap_or(result.output)
    };

    Ok(Json(ScanResponse {
        id: SCAN_ID.to_string(),
        status: if result.success { "completed" } else { "error" }.to_string(),
        output: Some(output),
    }))
}

pub async fn tools() -> Json<Vec<ToolInfo>> {
    Json(
        TOOL_CATALOG
            .iter()
            .map(|(name, description)| ToolInfo {
                name: name.to_string(),
                description: description.to_string(),
            })
            .collect(),
    )
}

/// Prometheus text exposition
pub async fn prometheus_metrics() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}
