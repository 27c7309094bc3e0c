//! Healing actions and the built-in remediation policies.
//!
//! An action pairs a `condition` over the current snapshot with an async
//! `run`. The healer runs every action whose condition holds, so policies for
//! the same component must be safe to apply together.

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::status::{ComponentHealth, Details, HealthStatus};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action failed: {0}")]
    Failed(String),

    #[error("action timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome reported by an action body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealingResult {
    pub success: bool,
    pub details: Details,
    pub error: Option<String>,
}

impl HealingResult {
    pub fn ok(details: Details) -> Self {
        Self {
            success: true,
            details,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            details: Details::new(),
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait HealingAction: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Whether this action applies to the given snapshot.
    fn condition(&self, health: &ComponentHealth) -> bool;

    async fn run(&self, health: &ComponentHealth) -> Result<HealingResult, ActionError>;
}

type ConditionFn = Box<dyn Fn(&ComponentHealth) -> bool + Send + Sync>;
type ActionFuture = Pin<Box<dyn Future<Output = Result<HealingResult, ActionError>> + Send>>;
type RunFn = Box<dyn Fn(ComponentHealth) -> ActionFuture + Send + Sync>;

/// Closure-backed [`HealingAction`].
pub struct FnAction {
    name: String,
    description: String,
    condition: ConditionFn,
    run: RunFn,
}

impl FnAction {
    pub fn new<C, F, Fut>(name: impl Into<String>, description: impl Into<String>, condition: C, run: F) -> Self
    where
        C: Fn(&ComponentHealth) -> bool + Send + Sync + 'static,
        F: Fn(ComponentHealth) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HealingResult, ActionError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            condition: Box::new(condition),
            run: Box::new(move |health| Box::pin(run(health))),
        }
    }
}

#[async_trait]
impl HealingAction for FnAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn condition(&self, health: &ComponentHealth) -> bool {
        (self.condition)(health)
    }

    async fn run(&self, health: &ComponentHealth) -> Result<HealingResult, ActionError> {
        (self.run)(health.clone()).await
    }
}

// ============================================================================
// Capacity-bounded cache
// ============================================================================

/// A cache that can be emptied on demand.
#[async_trait]
pub trait ClearableCache: Send + Sync {
    /// Drop all entries, returning how many were removed.
    async fn clear(&self) -> Result<usize, ActionError>;
}

/// Clears a cache that is non-Healthy and at or above a capacity ratio.
///
/// The ratio is read from `details.capacity_ratio` of the snapshot.
pub struct CacheClearAction {
    cache: Arc<dyn ClearableCache>,
    capacity_threshold: f64,
}

impl CacheClearAction {
    pub fn new(cache: Arc<dyn ClearableCache>, capacity_threshold: f64) -> Self {
        Self {
            cache,
            capacity_threshold,
        }
    }
}

#[async_trait]
impl HealingAction for CacheClearAction {
    fn name(&self) -> &str {
        "clear_cache"
    }

    fn description(&self) -> &str {
        "Clear the cache when it is unhealthy and near capacity"
    }

    fn condition(&self, health: &ComponentHealth) -> bool {
        !health.is_healthy()
            && health
                .detail_f64("capacity_ratio")
                .is_some_and(|ratio| ratio >= self.capacity_threshold)
    }

    async fn run(&self, health: &ComponentHealth) -> Result<HealingResult, ActionError> {
        let cleared = self.cache.clear().await?;
        info!(component = %health.name, cleared, "Cache cleared");

        let mut details = Details::new();
        details.insert("cleared_entries".into(), cleared.into());
        if let Some(ratio) = health.detail_f64("capacity_ratio") {
            details.insert("capacity_ratio_before".into(), ratio.into());
        }
        Ok(HealingResult::ok(details))
    }
}

// ============================================================================
// External connectivity hub
// ============================================================================

/// Flags an unreachable hub for investigation. There is no autonomous fix.
#[derive(Debug, Default)]
pub struct HubInvestigationAction;

#[async_trait]
impl HealingAction for HubInvestigationAction {
    fn name(&self) -> &str {
        "log_hub_failure"
    }

    fn description(&self) -> &str {
        "Log hub connectivity failure for investigation"
    }

    fn condition(&self, health: &ComponentHealth) -> bool {
        health.status == HealthStatus::Unhealthy
    }

    async fn run(&self, health: &ComponentHealth) -> Result<HealingResult, ActionError> {
        warn!(component = %health.name, message = %health.message, "Hub unreachable, flagged for investigation");
        let mut details = Details::new();
        details.insert("recommendation".into(), "check hub power and network link".into());
        Ok(HealingResult::ok(details))
    }
}

// ============================================================================
// Local persistence store
// ============================================================================

/// Logs failing stores for a manual fix.
///
/// Store names are read from `details.failing_stores` when present.
#[derive(Debug, Default)]
pub struct StoreRepairNoticeAction;

#[async_trait]
impl HealingAction for StoreRepairNoticeAction {
    fn name(&self) -> &str {
        "log_store_failure"
    }

    fn description(&self) -> &str {
        "Log failing persistence stores for manual repair"
    }

    fn condition(&self, health: &ComponentHealth) -> bool {
        health.status == HealthStatus::Unhealthy
    }

    async fn run(&self, health: &ComponentHealth) -> Result<HealingResult, ActionError> {
        let failing: Vec<String> = health
            .details
            .get("failing_stores")
            .and_then(serde_json::Value::as_array)
            .map(|stores| {
                stores
                    .iter()
                    .filter_map(|s| s.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        warn!(component = %health.name, stores = ?failing, "Persistence store needs manual repair");

        let mut details = Details::new();
        details.insert("failing_stores".into(), failing.into());
        details.insert("manual_fix_required".into(), true.into());
        Ok(HealingResult::ok(details))
    }
}

// ============================================================================
// Metered external API
// ============================================================================

/// Records a backoff recommendation for a metered API.
///
/// Degraded yields the base backoff, Unhealthy doubles it.
#[derive(Debug)]
pub struct ApiBackoffAction {
    base_backoff: Duration,
}

impl ApiBackoffAction {
    pub fn new(base_backoff: Duration) -> Self {
        Self { base_backoff }
    }
}

impl Default for ApiBackoffAction {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl HealingAction for ApiBackoffAction {
    fn name(&self) -> &str {
        "recommend_backoff"
    }

    fn description(&self) -> &str {
        "Recommend request backoff for a strained metered API"
    }

    fn condition(&self, health: &ComponentHealth) -> bool {
        matches!(health.status, HealthStatus::Degraded | HealthStatus::Unhealthy)
    }

    async fn run(&self, health: &ComponentHealth) -> Result<HealingResult, ActionError> {
        let backoff = if health.status == HealthStatus::Unhealthy {
            self.base_backoff * 2
        } else {
            self.base_backoff
        };
        info!(component = %health.name, backoff_secs = backoff.as_secs(), "Recommending API backoff");

        let mut details = Details::new();
        details.insert("backoff_secs".into(), backoff.as_secs().into());
        Ok(HealingResult::ok(details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCache {
        clears: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ClearableCache for CountingCache {
        async fn clear(&self) -> Result<usize, ActionError> {
            if self.fail {
                return Err(ActionError::Failed("cache locked".to_string()));
            }
            self.clears.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        }
    }

    fn cache(fail: bool) -> Arc<CountingCache> {
        Arc::new(CountingCache {
            clears: AtomicUsize::new(0),
            fail,
        })
    }

    #[test]
    fn cache_condition_requires_non_healthy_and_capacity() {
        let action = CacheClearAction::new(cache(false), 0.9);
        let full_degraded = ComponentHealth::degraded("cache", "full").with_detail("capacity_ratio", 0.95);
        let full_healthy = ComponentHealth::healthy("cache", "ok").with_detail("capacity_ratio", 0.95);
        let roomy_degraded = ComponentHealth::degraded("cache", "slow").with_detail("capacity_ratio", 0.5);
        let unknown_ratio = ComponentHealth::unhealthy("cache", "down");
        let at_threshold = ComponentHealth::unhealthy("cache", "full").with_detail("capacity_ratio", 0.9);

        assert!(action.condition(&full_degraded));
        assert!(!action.condition(&full_healthy));
        assert!(!action.condition(&roomy_degraded));
        assert!(!action.condition(&unknown_ratio));
        assert!(action.condition(&at_threshold));
    }

    #[tokio::test]
    async fn cache_clear_reports_cleared_entries() {
        let backing = cache(false);
        let action = CacheClearAction::new(backing.clone(), 0.9);
        let health = ComponentHealth::degraded("cache", "full").with_detail("capacity_ratio", 0.95);
        let result = action.run(&health).await.unwrap();
        assert!(result.success);
        assert_eq!(result.details["cleared_entries"], 42);
        assert_eq!(backing.clears.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_clear_propagates_failure() {
        let action = CacheClearAction::new(cache(true), 0.9);
        let health = ComponentHealth::degraded("cache", "full").with_detail("capacity_ratio", 0.95);
        assert!(action.run(&health).await.is_err());
    }

    #[tokio::test]
    async fn hub_and_store_actions_always_succeed_when_unhealthy() {
        let hub = HubInvestigationAction;
        let store = StoreRepairNoticeAction;
        let down = ComponentHealth::unhealthy("database", "integrity check failed")
            .with_detail("failing_stores", serde_json::json!(["timers", "automations"]));

        assert!(hub.condition(&down));
        assert!(!hub.condition(&ComponentHealth::degraded("hub", "slow")));
        assert!(hub.run(&down).await.unwrap().success);

        let result = store.run(&down).await.unwrap();
        assert!(result.success);
        assert_eq!(result.details["failing_stores"], serde_json::json!(["timers", "automations"]));
    }

    #[tokio::test]
    async fn api_backoff_doubles_when_unhealthy() {
        let action = ApiBackoffAction::new(Duration::from_secs(30));
        assert!(!action.condition(&ComponentHealth::healthy("llm_api", "ok")));

        let degraded = action.run(&ComponentHealth::degraded("llm_api", "quota 80%")).await.unwrap();
        assert_eq!(degraded.details["backoff_secs"], 30);

        let unhealthy = action.run(&ComponentHealth::unhealthy("llm_api", "quota exhausted")).await.unwrap();
        assert_eq!(unhealthy.details["backoff_secs"], 60);
    }

    #[tokio::test]
    async fn fn_action_uses_closures() {
        let action = FnAction::new(
            "restart",
            "restart the bridge",
            |h| h.status == HealthStatus::Unhealthy,
            |_h| async { Ok(HealingResult::failed("bridge refused restart")) },
        );
        assert_eq!(action.name(), "restart");
        assert!(action.condition(&ComponentHealth::unhealthy("bridge", "down")));
        let result = action.run(&ComponentHealth::unhealthy("bridge", "down")).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("bridge refused restart"));
    }
}
