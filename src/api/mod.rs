//! REST API module using Axum
//!
//! Exposes the health monitor and self-healer to operators and orchestrators:
//! - bare liveness/readiness/health probes at the root
//! - `/api/v1` administrative endpoints with a consistent envelope

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::HealthApiState;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the complete application router.
pub fn create_app(state: HealthApiState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(routes::probe_routes(state))
        .layer(TraceLayer::new_for_http())
}
