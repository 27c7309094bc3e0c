//! Operational endpoints: health, probes, history, healing administration

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::background::{HealthMonitor, SelfHealer};
use crate::config::defaults::DEFAULT_QUERY_LIMIT;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct HealthApiState {
    pub monitor: Arc<HealthMonitor>,
    pub healer: Arc<SelfHealer>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub component: Option<String>,
    pub limit: Option<usize>,
}

/// Resolve a requested limit against a cap; `0` is rejected.
fn resolve_limit(requested: Option<usize>, cap: usize) -> Result<usize, Response> {
    match requested {
        Some(0) => Err(ApiErrorResponse::bad_request("limit must be > 0")),
        Some(n) => Ok(n.min(cap)),
        None => Ok(DEFAULT_QUERY_LIMIT.min(cap)),
    }
}

// ============================================================================
// Probe endpoints (bare JSON)
// ============================================================================

/// GET /health - Run a health cycle and return the system report
pub async fn get_system_health(State(state): State<HealthApiState>) -> Response {
    Json(state.monitor.get_system_health().await).into_response()
}

/// GET /health/live - Liveness probe
pub async fn get_liveness(State(state): State<HealthApiState>) -> Response {
    Json(state.monitor.get_liveness()).into_response()
}

/// GET /health/ready - Readiness probe, 503 when a critical component is failing
pub async fn get_readiness(State(state): State<HealthApiState>) -> Response {
    let readiness = state.monitor.get_readiness().await;
    let code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(readiness)).into_response()
}

// ============================================================================
// History
// ============================================================================

/// GET /api/v1/health - Latest report, running a cycle if none exists yet
pub async fn get_latest_health(State(state): State<HealthApiState>) -> Response {
    let report = match state.monitor.latest_health().await {
        Some(report) => report,
        None => state.monitor.get_system_health().await,
    };
    ApiResponse::ok(report)
}

/// GET /api/v1/health/history/:component?limit=N
pub async fn get_health_history(
    State(state): State<HealthApiState>,
    Path(component): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let limit = match resolve_limit(query.limit, state.monitor.max_history().await) {
        Ok(limit) => limit,
        Err(resp) => return resp,
    };

    let history = state.monitor.get_health_history(&component, limit).await;
    if history.is_empty() && !state.monitor.checker_names().await.contains(&component) {
        return ApiErrorResponse::not_found(format!("unknown component: {component}"));
    }
    ApiResponse::ok(history)
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

/// POST /api/v1/health/history/cleanup
pub async fn cleanup_history(State(state): State<HealthApiState>) -> Response {
    let removed = state.monitor.cleanup_old_history().await;
    ApiResponse::ok(CleanupResponse { removed })
}

// ============================================================================
// Healing
// ============================================================================

/// GET /api/v1/healing/history?component=&limit=N
pub async fn get_healing_history(
    State(state): State<HealthApiState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let limit = match resolve_limit(query.limit, state.healer.max_log_entries()) {
        Ok(limit) => limit,
        Err(resp) => return resp,
    };
    let entries = state
        .healer
        .get_healing_history(query.component.as_deref(), limit)
        .await;
    ApiResponse::ok(entries)
}

/// POST /api/v1/healing/:component/trigger
pub async fn trigger_healing(
    State(state): State<HealthApiState>,
    Path(component): Path<String>,
) -> Response {
    info!(component = %component, "Manual healing requested via API");
    ApiResponse::ok(state.monitor.trigger_healing(&component).await)
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub component: String,
    pub reset: bool,
}

/// POST /api/v1/healing/:component/reset
pub async fn reset_healing(
    State(state): State<HealthApiState>,
    Path(component): Path<String>,
) -> Response {
    state.healer.reset_attempts(&component).await;
    ApiResponse::ok(ResetResponse {
        component,
        reset: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(resolve_limit(None, 100).ok(), Some(50));
        assert_eq!(resolve_limit(None, 10).ok(), Some(10));
        assert_eq!(resolve_limit(Some(500), 100).ok(), Some(100));
        assert_eq!(resolve_limit(Some(5), 100).ok(), Some(5));
    }

    #[test]
    fn zero_limit_is_rejected() {
        let resp = resolve_limit(Some(0), 100).unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
