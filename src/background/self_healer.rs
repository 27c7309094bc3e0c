//! Self-Healer: bounded, cooldown-gated remediation
//!
//! For each component the healer runs every registered action whose
//! condition matches the current snapshot, subject to:
//! - a per-component cooldown between healing runs
//! - a retry budget of consecutive failed actions, after which the
//!   component only raises "retries exceeded" alerts until reset
//!
//! All healer state sits behind one mutex held for the whole attempt, so
//! concurrent triggers for a component serialize and observe each other's
//! cooldown.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::actions::{ActionError, HealingAction, HealingResult};
use super::notifier::{deliver, Alert, AlertSeverity, Notifier};
use super::status::{ComponentHealth, Details};
use crate::config::HealerConfig;

/// One executed action inside a healing attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub action: String,
    pub success: bool,
    pub details: Details,
    pub error: Option<String>,
}

/// Result of [`SelfHealer::attempt_healing`].
#[derive(Debug, Clone, Serialize)]
pub struct HealingOutcome {
    pub component: String,
    pub attempted: bool,
    /// True only if every executed action succeeded
    pub success: bool,
    pub actions: Vec<ActionOutcome>,
    /// Why nothing ran, when `attempted` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HealingOutcome {
    pub fn not_attempted(component: &str, reason: impl Into<String>) -> Self {
        Self {
            component: component.to_string(),
            attempted: false,
            success: false,
            actions: Vec::new(),
            reason: Some(reason.into()),
        }
    }
}

/// Healing log record, kept in a bounded ring.
#[derive(Debug, Clone, Serialize)]
pub struct HealingLogEntry {
    pub component: String,
    pub action: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub details: Details,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Retry bookkeeping for one component, for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryState {
    pub consecutive_failures: u32,
    pub max_retries: u32,
    pub exhausted: bool,
}

#[derive(Default)]
struct HealerState {
    actions: HashMap<String, Vec<Arc<dyn HealingAction>>>,
    cooldowns: HashMap<String, Duration>,
    last_healing: HashMap<String, Instant>,
    consecutive_failures: HashMap<String, u32>,
    last_exhausted_alert: HashMap<String, Instant>,
    log: VecDeque<HealingLogEntry>,
}

pub struct SelfHealer {
    max_retries: u32,
    default_cooldown: Duration,
    action_timeout: Duration,
    notify_timeout: Duration,
    max_log_entries: usize,
    retry_alert_cooldown: Option<Duration>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<HealerState>,
}

impl SelfHealer {
    pub fn new(config: &HealerConfig, notifier: Arc<dyn Notifier>) -> Self {
        let cooldowns = config
            .cooldowns
            .iter()
            .map(|(component, secs)| (component.clone(), Duration::from_secs(*secs)))
            .collect();

        Self {
            max_retries: config.max_retries,
            default_cooldown: config.default_cooldown(),
            action_timeout: config.action_timeout(),
            notify_timeout: config.notify_timeout(),
            max_log_entries: config.max_log_entries.max(1),
            retry_alert_cooldown: config.retry_alert_cooldown(),
            notifier,
            state: Mutex::new(HealerState {
                cooldowns,
                ..HealerState::default()
            }),
        }
    }

    /// Register an action for a component. Actions run in registration order.
    pub async fn register_action(&self, component: impl Into<String>, action: Arc<dyn HealingAction>) {
        let component = component.into();
        info!(component = %component, action = action.name(), "Healing action registered");
        self.state
            .lock()
            .await
            .actions
            .entry(component)
            .or_default()
            .push(action);
    }

    /// Override the cooldown for one component.
    pub async fn set_cooldown(&self, component: impl Into<String>, cooldown: Duration) {
        self.state.lock().await.cooldowns.insert(component.into(), cooldown);
    }

    pub async fn registered_components(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().await.actions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn max_log_entries(&self) -> usize {
        self.max_log_entries
    }

    /// Evaluate and run healing for `component` given its current snapshot.
    ///
    /// Never fails: every refusal or failure is reported in the outcome.
    pub async fn attempt_healing(&self, component: &str, health: &ComponentHealth) -> HealingOutcome {
        let mut state = self.state.lock().await;

        let actions = match state.actions.get(component) {
            Some(actions) if !actions.is_empty() => actions.clone(),
            _ => {
                debug!(component, "No healing actions registered");
                return HealingOutcome::not_attempted(
                    component,
                    format!("no healing actions registered for {component}"),
                );
            }
        };

        // Cooldown gates everything else, whatever the severity
        let cooldown = state
            .cooldowns
            .get(component)
            .copied()
            .unwrap_or(self.default_cooldown);
        if let Some(last) = state.last_healing.get(component) {
            // A cooldown too large to represent never expires
            let remaining = match last.checked_add(cooldown) {
                Some(ready_at) => ready_at.checked_duration_since(Instant::now()),
                None => Some(cooldown.saturating_sub(last.elapsed())),
            };
            if let Some(remaining) = remaining.filter(|r| !r.is_zero()) {
                debug!(component, remaining_secs = remaining.as_secs(), "Healing skipped, in cooldown");
                return HealingOutcome::not_attempted(
                    component,
                    format!("cooldown active, {}s remaining", remaining.as_secs()),
                );
            }
        }

        let failures = state.consecutive_failures.get(component).copied().unwrap_or(0);
        if failures >= self.max_retries {
            if self.should_alert_exhausted(&mut state, component) {
                error!(component, failures, "Healing retries exceeded, manual intervention required");
                let mut details = Details::new();
                details.insert("component".into(), component.into());
                details.insert("consecutive_failures".into(), failures.into());
                details.insert("max_retries".into(), self.max_retries.into());
                details.insert("status".into(), health.status.as_str().into());
                let alert = Alert::new(
                    "Healing Retries Exceeded",
                    format!(
                        "{component} failed healing {failures} times in a row (max {}), manual intervention required",
                        self.max_retries
                    ),
                    AlertSeverity::Critical,
                    details,
                );
                deliver(self.notifier.as_ref(), alert, self.notify_timeout).await;
            }
            return HealingOutcome::not_attempted(
                component,
                format!(
                    "retries exceeded ({failures}/{}), manual intervention required",
                    self.max_retries
                ),
            );
        }

        let mut executed = Vec::new();
        for action in actions.iter().filter(|a| a.condition(health)) {
            info!(component, action = action.name(), status = %health.status, "Running healing action");

            let result = match tokio::time::timeout(self.action_timeout, action.run(health)).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => HealingResult::failed(e.to_string()),
                Err(_) => HealingResult::failed(ActionError::Timeout(self.action_timeout).to_string()),
            };

            state.last_healing.insert(component.to_string(), Instant::now());
            self.push_log(&mut state, component, action.name(), &result);

            if result.success {
                info!(component, action = action.name(), "Healing action succeeded");
                state.consecutive_failures.insert(component.to_string(), 0);
                state.last_exhausted_alert.remove(component);
            } else {
                let count = state.consecutive_failures.entry(component.to_string()).or_insert(0);
                *count += 1;
                let count = *count;
                let error_text = result.error.clone().unwrap_or_else(|| "unknown error".to_string());
                warn!(component, action = action.name(), error = %error_text, failures = count, "Healing action failed");

                let mut details = Details::new();
                details.insert("component".into(), component.into());
                details.insert("action".into(), action.name().into());
                details.insert("error".into(), error_text.clone().into());
                details.insert("consecutive_failures".into(), count.into());
                let alert = Alert::new(
                    "Healing Action Failed",
                    format!("{} on {component} failed: {error_text}", action.name()),
                    AlertSeverity::Error,
                    details,
                );
                deliver(self.notifier.as_ref(), alert, self.notify_timeout).await;
            }

            executed.push(ActionOutcome {
                action: action.name().to_string(),
                success: result.success,
                details: result.details,
                error: result.error,
            });
        }

        if executed.is_empty() {
            debug!(component, status = %health.status, "No healing action condition matched");
            return HealingOutcome::not_attempted(
                component,
                format!("no healing action matched the current {} state", health.status),
            );
        }

        HealingOutcome {
            component: component.to_string(),
            attempted: true,
            success: executed.iter().all(|a| a.success),
            actions: executed,
            reason: None,
        }
    }

    fn should_alert_exhausted(&self, state: &mut HealerState, component: &str) -> bool {
        let now = Instant::now();
        if let (Some(window), Some(last)) = (
            self.retry_alert_cooldown,
            state.last_exhausted_alert.get(component),
        ) {
            if last.checked_add(window).map_or(true, |until| now < until) {
                return false;
            }
        }
        state.last_exhausted_alert.insert(component.to_string(), now);
        true
    }

    fn push_log(&self, state: &mut HealerState, component: &str, action: &str, result: &HealingResult) {
        state.log.push_back(HealingLogEntry {
            component: component.to_string(),
            action: action.to_string(),
            success: result.success,
            timestamp: Utc::now(),
            details: result.details.clone(),
            error: result.error.clone(),
        });
        while state.log.len() > self.max_log_entries {
            state.log.pop_front();
        }
    }

    /// Most-recent-first healing log, optionally filtered by component.
    pub async fn get_healing_history(&self, component: Option<&str>, limit: usize) -> Vec<HealingLogEntry> {
        let state = self.state.lock().await;
        state
            .log
            .iter()
            .rev()
            .filter(|entry| component.map_or(true, |c| entry.component == c))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Clear cooldown and retry state for a component.
    pub async fn reset_attempts(&self, component: &str) {
        let mut state = self.state.lock().await;
        state.last_healing.remove(component);
        state.consecutive_failures.remove(component);
        state.last_exhausted_alert.remove(component);
        info!(component, "Healing attempts reset");
    }

    pub async fn retry_state(&self, component: &str) -> RetryState {
        let failures = self
            .state
            .lock()
            .await
            .consecutive_failures
            .get(component)
            .copied()
            .unwrap_or(0);
        RetryState {
            consecutive_failures: failures,
            max_retries: self.max_retries,
            exhausted: failures >= self.max_retries,
        }
    }

    pub async fn is_exhausted(&self, component: &str) -> bool {
        self.retry_state(component).await.exhausted
    }
}
