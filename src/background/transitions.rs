//! Status transition detection and consecutive-failure counting.

use serde::Serialize;
use std::collections::HashMap;

use super::notifier::{Alert, AlertSeverity};
use super::status::{ComponentHealth, Details, HealthStatus};

/// Classification of a status change, used to pick the alert wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Non-Healthy to Healthy
    Recovery,
    /// Into Degraded from any other status
    Degradation,
    /// Into Unhealthy from any other status
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub previous: HealthStatus,
    pub current: HealthStatus,
    pub kind: TransitionKind,
}

impl Transition {
    fn classify(previous: HealthStatus, current: HealthStatus) -> Self {
        let kind = match current {
            HealthStatus::Healthy => TransitionKind::Recovery,
            HealthStatus::Degraded => TransitionKind::Degradation,
            HealthStatus::Unhealthy => TransitionKind::Failure,
        };
        Self {
            previous,
            current,
            kind,
        }
    }

    /// Build the alert for this transition of `health`.
    pub fn to_alert(&self, health: &ComponentHealth, consecutive_failures: u32) -> Alert {
        let (title, severity) = match self.kind {
            TransitionKind::Recovery => ("Component Recovered", AlertSeverity::Info),
            TransitionKind::Degradation => ("Component Degraded", AlertSeverity::Warning),
            TransitionKind::Failure => ("Component Unhealthy", AlertSeverity::Error),
        };
        let message = format!(
            "{} changed from {} to {}: {}",
            health.name, self.previous, self.current, health.message
        );

        let mut details = Details::new();
        details.insert("component".into(), health.name.clone().into());
        details.insert("previous_status".into(), self.previous.as_str().into());
        details.insert("new_status".into(), self.current.as_str().into());
        details.insert("message".into(), health.message.clone().into());
        details.insert("consecutive_failures".into(), consecutive_failures.into());

        Alert::new(title, message, severity, details)
    }
}

/// Last-known status and consecutive Unhealthy count per component.
#[derive(Debug, Default)]
pub struct TransitionTracker {
    last_status: HashMap<String, HealthStatus>,
    consecutive_failures: HashMap<String, u32>,
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new observation.
    ///
    /// Returns the transition if the status differs from the previous one.
    /// The first observation of a component never yields a transition.
    pub fn observe(&mut self, component: &str, status: HealthStatus) -> Option<Transition> {
        let counter = self.consecutive_failures.entry(component.to_string()).or_insert(0);
        if status == HealthStatus::Unhealthy {
            *counter += 1;
        } else {
            *counter = 0;
        }

        match self.last_status.insert(component.to_string(), status) {
            Some(previous) if previous != status => Some(Transition::classify(previous, status)),
            _ => None,
        }
    }

    pub fn last_status(&self, component: &str) -> Option<HealthStatus> {
        self.last_status.get(component).copied()
    }

    pub fn consecutive_failures(&self, component: &str) -> u32 {
        self.consecutive_failures.get(component).copied().unwrap_or(0)
    }

    pub fn reset(&mut self, component: &str) {
        self.last_status.remove(component);
        self.consecutive_failures.remove(component);
    }
}
