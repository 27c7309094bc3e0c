//! Homewatch: health monitoring and self-healing for the home assistant
//!
//! ## Architecture
//!
//! - **Health Monitor**: runs registered checkers each tick, keeps bounded history,
//!   alerts on status transitions, answers liveness/readiness probes
//! - **Self Healer**: per-component remediation actions under cooldowns and a retry budget
//! - **Driver**: the single periodic ticker that ties the two together
//! - **API**: axum endpoints for probes, history and manual healing

pub mod api;
pub mod background;
pub mod config;

pub use background::{
    run_health_loop, Alert, AlertSeverity, Checker, ComponentHealth, DriverConfig,
    HealingAction, HealingOutcome, HealingResult, HealthMonitor, HealthStatus, Notifier,
    SelfHealer, SystemHealth,
};
pub use config::HomewatchConfig;
