//! Health Monitor: runs checkers, aggregates a system verdict, keeps history
//!
//! Each cycle runs every registered checker in registration order. For every
//! snapshot the monitor appends to history, updates the consecutive-failure
//! counter, and alerts when the component's status changed since the last
//! cycle. The public surface never fails: checker and notifier errors are
//! logged and turned into data.
//!
//! Monitor state is guarded by one mutex held for a whole cycle, so
//! administrative reads observe complete cycles only.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::checker::{run_checker, Checker};
use super::history::HistoryStore;
use super::notifier::{deliver, Notifier};
use super::self_healer::{HealingOutcome, SelfHealer};
use super::status::{ComponentHealth, HealthStatus, Liveness, Readiness, SystemHealth};
use super::transitions::{TransitionKind, TransitionTracker};
use crate::config::MonitorConfig;

struct MonitorState {
    checkers: Vec<Arc<dyn Checker>>,
    history: HistoryStore,
    transitions: TransitionTracker,
    latest: Option<SystemHealth>,
    healer: Option<Arc<SelfHealer>>,
}

pub struct HealthMonitor {
    check_timeout: Duration,
    notify_timeout: Duration,
    critical_components: Vec<String>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<MonitorState>,
}

impl HealthMonitor {
    pub fn new(config: &MonitorConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            check_timeout: config.check_timeout(),
            notify_timeout: config.notify_timeout(),
            critical_components: config.critical_components.clone(),
            notifier,
            state: Mutex::new(MonitorState {
                checkers: Vec::new(),
                history: HistoryStore::new(config.max_history, config.retention_days),
                transitions: TransitionTracker::new(),
                latest: None,
                healer: None,
            }),
        }
    }

    /// Append a checker. Names are not required to be unique; duplicates all run.
    pub async fn register(&self, checker: Arc<dyn Checker>) {
        let mut state = self.state.lock().await;
        if state.checkers.iter().any(|c| c.name() == checker.name()) {
            warn!(component = checker.name(), "Checker registered twice, both will run");
        }
        info!(component = checker.name(), "Health checker registered");
        state.checkers.push(checker);
    }

    pub async fn checker_names(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.checkers.iter().map(|c| c.name().to_string()).collect()
    }

    /// Critical components that no registered checker reports on.
    ///
    /// Such a component is never observed, so readiness could never pass.
    pub async fn unmonitored_critical_components(&self) -> Vec<String> {
        let state = self.state.lock().await;
        self.critical_components
            .iter()
            .filter(|name| !state.checkers.iter().any(|c| c.name() == name.as_str()))
            .cloned()
            .collect()
    }

    /// Run one full health cycle and return the aggregated report.
    pub async fn get_system_health(&self) -> SystemHealth {
        let mut state = self.state.lock().await;
        let checkers = state.checkers.clone();
        let mut components = Vec::with_capacity(checkers.len());

        for checker in &checkers {
            let health = run_checker(checker, self.check_timeout).await;

            match health.status {
                HealthStatus::Unhealthy => {
                    error!(component = %health.name, message = %health.message, "Component unhealthy");
                }
                HealthStatus::Degraded => {
                    warn!(component = %health.name, message = %health.message, "Component degraded");
                }
                HealthStatus::Healthy => debug!(component = %health.name, "Component healthy"),
            }

            state.history.record(&health);
            if let Some(transition) = state.transitions.observe(&health.name, health.status) {
                let failures = state.transitions.consecutive_failures(&health.name);
                match transition.kind {
                    TransitionKind::Recovery => {
                        info!(component = %health.name, from = %transition.previous, "Component recovered");
                    }
                    TransitionKind::Degradation | TransitionKind::Failure => {
                        warn!(
                            component = %health.name,
                            from = %transition.previous,
                            to = %transition.current,
                            "Component status changed"
                        );
                    }
                }
                let alert = transition.to_alert(&health, failures);
                deliver(self.notifier.as_ref(), alert, self.notify_timeout).await;
            }

            components.push(health);
        }

        let report = SystemHealth::from_components(components);
        debug!(status = %report.status, components = report.components.len(), "Health cycle complete");
        state.latest = Some(report.clone());
        report
    }

    /// Report from the most recent cycle, without running checkers.
    pub async fn latest_health(&self) -> Option<SystemHealth> {
        self.state.lock().await.latest.clone()
    }

    /// Most-recent-first snapshots for a component.
    pub async fn get_health_history(&self, component: &str, limit: usize) -> Vec<ComponentHealth> {
        self.state.lock().await.history.recent(component, limit)
    }

    pub async fn get_consecutive_failures(&self, component: &str) -> u32 {
        self.state.lock().await.transitions.consecutive_failures(component)
    }

    pub async fn max_history(&self) -> usize {
        self.state.lock().await.history.max_history()
    }

    /// The process is alive if this runs at all; dependencies are not consulted.
    pub fn get_liveness(&self) -> Liveness {
        Liveness {
            status: "ok",
            timestamp: Utc::now(),
        }
    }

    /// Ready when every critical component was last seen non-Unhealthy.
    ///
    /// A critical component that has not been observed yet counts as failing.
    pub async fn get_readiness(&self) -> Readiness {
        let state = self.state.lock().await;
        let failing: Vec<String> = self
            .critical_components
            .iter()
            .filter(|name| {
                state
                    .transitions
                    .last_status(name)
                    .map_or(true, |status| status == HealthStatus::Unhealthy)
            })
            .cloned()
            .collect();
        Readiness {
            ready: failing.is_empty(),
            failing,
        }
    }

    /// Purge history entries past the retention window. Returns the count removed.
    pub async fn cleanup_old_history(&self) -> usize {
        let removed = self.state.lock().await.history.cleanup(Utc::now());
        if removed > 0 {
            info!(removed, "Purged expired health history");
        }
        removed
    }

    /// Forget history, last status and failure count for one component.
    pub async fn reset_component(&self, component: &str) {
        let mut state = self.state.lock().await;
        state.history.clear_component(component);
        state.transitions.reset(component);
        info!(component, "Component health state reset");
    }

    pub async fn set_healer(&self, healer: Arc<SelfHealer>) {
        self.state.lock().await.healer = Some(healer);
    }

    pub async fn healer(&self) -> Option<Arc<SelfHealer>> {
        self.state.lock().await.healer.clone()
    }

    /// Hand every non-Healthy snapshot of `report` to the healer.
    pub async fn heal_unhealthy(&self, report: &SystemHealth) -> Vec<HealingOutcome> {
        let Some(healer) = self.healer().await else {
            return Vec::new();
        };

        let mut outcomes = Vec::new();
        for health in report.components.iter().filter(|c| !c.is_healthy()) {
            let outcome = healer.attempt_healing(&health.name, health).await;
            if outcome.attempted {
                info!(
                    component = %health.name,
                    success = outcome.success,
                    actions = outcome.actions.len(),
                    "Healing attempt finished"
                );
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Manually trigger healing for a component.
    ///
    /// Uses a fresh check from the component's checker when one is registered,
    /// otherwise its newest history entry. The healer's outcome is returned as is.
    pub async fn trigger_healing(&self, component: &str) -> HealingOutcome {
        let (healer, checker, last_seen) = {
            let state = self.state.lock().await;
            (
                state.healer.clone(),
                state.checkers.iter().find(|c| c.name() == component).cloned(),
                state.history.latest(component).cloned(),
            )
        };

        let Some(healer) = healer else {
            return HealingOutcome::not_attempted(component, "no healer configured");
        };

        let health = match (checker, last_seen) {
            (Some(checker), _) => run_checker(&checker, self.check_timeout).await,
            (None, Some(health)) => health,
            (None, None) => {
                return HealingOutcome::not_attempted(
                    component,
                    format!("unknown component {component}: no checker or health history"),
                );
            }
        };

        info!(component, status = %health.status, "Manual healing triggered");
        healer.attempt_healing(component, &health).await
    }
}
