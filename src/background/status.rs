//! Health status values shared by the monitor and the healer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form snapshot details, serialized as a JSON object.
pub type Details = HashMap<String, serde_json::Value>;

/// Component health status, ordered by severity.
///
/// `Healthy < Degraded < Unhealthy`, so the worst status of a set is its `max()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Component is operating normally
    Healthy,
    /// Component is running but with reduced capability
    Degraded,
    /// Component is not operational
    Unhealthy,
}

impl HealthStatus {
    /// Worst status over a set of statuses. An empty set is `Healthy`.
    pub fn worst<I: IntoIterator<Item = Self>>(statuses: I) -> Self {
        statuses.into_iter().max().unwrap_or(Self::Healthy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one health check. Created per check and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Outcome of the check
    pub status: HealthStatus,
    /// Human-readable summary
    pub message: String,
    /// When the check ran
    pub timestamp: DateTime<Utc>,
    /// Check-specific data (capacity ratios, latencies, error text, ...)
    #[serde(default)]
    pub details: Details,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            timestamp: Utc::now(),
            details: Details::new(),
        }
    }

    pub fn healthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, HealthStatus::Healthy, message)
    }

    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, HealthStatus::Degraded, message)
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, HealthStatus::Unhealthy, message)
    }

    /// Builder-style detail insertion, used while constructing a snapshot.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Numeric detail lookup.
    pub fn detail_f64(&self, key: &str) -> Option<f64> {
        self.details.get(key).and_then(serde_json::Value::as_f64)
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Aggregated result of one monitor cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub timestamp: DateTime<Utc>,
    /// Worst status over all components
    pub status: HealthStatus,
    /// Snapshots in checker registration order
    pub components: Vec<ComponentHealth>,
}

impl SystemHealth {
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        Self {
            timestamp: Utc::now(),
            status: HealthStatus::worst(components.iter().map(|c| c.status)),
            components,
        }
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// Liveness probe body. Only proves the process can answer.
#[derive(Debug, Clone, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Readiness probe body.
#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub ready: bool,
    /// Critical components currently Unhealthy (or never observed)
    pub failing: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_totally_ordered() {
        assert!(HealthStatus::Healthy < HealthStatus::Degraded);
        assert!(HealthStatus::Degraded < HealthStatus::Unhealthy);
        assert!(HealthStatus::Healthy < HealthStatus::Unhealthy);
    }

    #[test]
    fn worst_of_empty_set_is_healthy() {
        assert_eq!(HealthStatus::worst(Vec::new()), HealthStatus::Healthy);
    }

    #[test]
    fn worst_picks_maximum_severity() {
        use HealthStatus::*;
        assert_eq!(HealthStatus::worst([Healthy, Degraded, Healthy]), Degraded);
        assert_eq!(HealthStatus::worst([Degraded, Unhealthy, Healthy]), Unhealthy);
        assert_eq!(HealthStatus::worst([Healthy]), Healthy);
    }

    #[test]
    fn system_health_aggregates_mixed_components() {
        let report = SystemHealth::from_components(vec![
            ComponentHealth::healthy("a", "ok"),
            ComponentHealth::degraded("b", "slow"),
            ComponentHealth::unhealthy("c", "down"),
        ]);
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.component("b").map(|c| c.status), Some(HealthStatus::Degraded));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&HealthStatus::Unhealthy).unwrap();
        assert_eq!(json, "\"unhealthy\"");
    }

    #[test]
    fn detail_f64_reads_numbers_only() {
        let c = ComponentHealth::degraded("cache", "full")
            .with_detail("capacity_ratio", 0.95)
            .with_detail("label", "x");
        assert_eq!(c.detail_f64("capacity_ratio"), Some(0.95));
        assert_eq!(c.detail_f64("label"), None);
        assert_eq!(c.detail_f64("missing"), None);
    }
}
