//! API route definitions
//!
//! - /health, /health/live, /health/ready - bare JSON probe endpoints
//! - /api/v1/health/... - health report and history
//! - /api/v1/healing/... - healing log, manual trigger, retry reset

use axum::{routing::{get, post}, Router};

use super::handlers::{self, HealthApiState};

/// Probe endpoints at root level
pub fn probe_routes(state: HealthApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_system_health))
        .route("/health/live", get(handlers::get_liveness))
        .route("/health/ready", get(handlers::get_readiness))
        .with_state(state)
}

/// Administrative endpoints, nested under /api/v1
pub fn api_routes(state: HealthApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_latest_health))
        .route("/health/history/cleanup", post(handlers::cleanup_history))
        .route("/health/history/:component", get(handlers::get_health_history))
        .route("/healing/history", get(handlers::get_healing_history))
        .route("/healing/:component/trigger", post(handlers::trigger_healing))
        .route("/healing/:component/reset", post(handlers::reset_healing))
        .with_state(state)
}
