//! Health Loop Integration Tests
//!
//! Drives the monitor, healer and built-in remediation policies together
//! through `run_health_loop` on paused tokio time.

use homewatch::background::{
    run_health_loop, ActionError, ApiBackoffAction, CacheClearAction, CheckError,
    ClearableCache, ComponentHealth, DiskSpaceChecker, DriverConfig, FnAction, FnChecker,
    HealingResult,
    HealthMonitor, HealthStatus, HubInvestigationAction, RecordingNotifier, SelfHealer,
    StoreRepairNoticeAction,
};
use homewatch::config::{HealerConfig, HomewatchConfig, MonitorConfig};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CountingCache {
    clears: AtomicUsize,
}

#[async_trait]
impl ClearableCache for CountingCache {
    async fn clear(&self) -> Result<usize, ActionError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(42)
    }
}

/// Checker that replays a fixed status sequence, repeating the last entry.
fn scripted(name: &'static str, script: Vec<HealthStatus>) -> Arc<FnChecker> {
    let calls = Arc::new(AtomicUsize::new(0));
    Arc::new(FnChecker::new(name, move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        let status = script[n.min(script.len() - 1)];
        async move { Ok(ComponentHealth::new(name, status, format!("{name} is {status}"))) }
    }))
}

fn monitor_config() -> MonitorConfig {
    MonitorConfig {
        interval_secs: 60,
        critical_components: vec!["database".to_string(), "cache".to_string()],
        ..MonitorConfig::default()
    }
}

fn driver_config() -> DriverConfig {
    DriverConfig {
        interval: Duration::from_secs(60),
        auto_heal: true,
        cleanup_every_ticks: 60,
    }
}

/// Four ticks of a home with a flapping hub and a full cache.
#[tokio::test(start_paused = true)]
async fn test_flapping_hub_and_full_cache() {
    let notifier = Arc::new(RecordingNotifier::new());
    let monitor = Arc::new(HealthMonitor::new(&monitor_config(), notifier.clone()));
    let healer = Arc::new(SelfHealer::new(&HealerConfig::default(), notifier.clone()));

    let cache = Arc::new(CountingCache::default());
    healer
        .register_action("cache", Arc::new(CacheClearAction::new(cache.clone(), 0.9)))
        .await;
    healer.register_action("hub", Arc::new(HubInvestigationAction)).await;
    monitor.set_healer(healer.clone()).await;

    use HealthStatus::{Degraded, Healthy, Unhealthy};
    monitor
        .register(scripted("hub", vec![Healthy, Unhealthy, Unhealthy, Healthy]))
        .await;
    monitor
        .register(Arc::new(FnChecker::new("cache", || async {
            Ok(ComponentHealth::degraded("cache", "near capacity").with_detail("capacity_ratio", 0.95))
        })))
        .await;
    monitor
        .register(scripted("database", vec![Healthy]))
        .await;

    let token = CancellationToken::new();
    let handle = tokio::spawn(run_health_loop(monitor.clone(), driver_config(), token.clone()));

    // ticks at t=0, 60, 120, 180
    tokio::time::sleep(Duration::from_secs(200)).await;
    token.cancel();
    assert_eq!(handle.await.unwrap(), 4);

    // One alert per transition; the first observation and repeats are silent
    assert_eq!(
        notifier.titles(),
        vec!["Component Unhealthy".to_string(), "Component Recovered".to_string()]
    );

    // Cache cleared on the first tick, then held back by the 300 s cooldown
    assert_eq!(cache.clears.load(Ordering::SeqCst), 1);
    let cache_log = healer.get_healing_history(Some("cache"), 10).await;
    assert_eq!(cache_log.len(), 1);
    assert_eq!(cache_log[0].action, "clear_cache");
    assert!(cache_log[0].success);

    // Hub investigated once at t=60, cooldown covers t=120
    let hub_log = healer.get_healing_history(Some("hub"), 10).await;
    assert_eq!(hub_log.len(), 1);
    assert_eq!(hub_log[0].action, "log_hub_failure");

    let history = monitor.get_health_history("hub", 10).await;
    let statuses: Vec<HealthStatus> = history.iter().map(|h| h.status).collect();
    assert_eq!(statuses, vec![Healthy, Unhealthy, Unhealthy, Healthy]);

    assert_eq!(monitor.get_consecutive_failures("hub").await, 0);
    let latest = monitor.latest_health().await.unwrap();
    assert_eq!(latest.status, Degraded);

    // Degraded cache does not take readiness down
    assert!(monitor.get_readiness().await.ready);
}

/// A failing store action exhausts the retry budget, then only alerts.
#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhaustion_through_the_loop() {
    let notifier = Arc::new(RecordingNotifier::new());
    let monitor = Arc::new(HealthMonitor::new(&monitor_config(), notifier.clone()));
    let healer = Arc::new(SelfHealer::new(
        &HealerConfig {
            max_retries: 3,
            default_cooldown_secs: 0,
            ..HealerConfig::default()
        },
        notifier.clone(),
    ));
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    healer
        .register_action(
            "database",
            Arc::new(FnAction::new(
                "reopen_store",
                "reopen the persistence store",
                |h| h.status == HealthStatus::Unhealthy,
                move |_h| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err::<HealingResult, _>(ActionError::Failed("store locked".into())) }
                },
            )),
        )
        .await;
    monitor.set_healer(healer.clone()).await;
    monitor
        .register(Arc::new(FnChecker::new("database", || async {
            Err(CheckError::Failed("disk I/O error".into()))
        })))
        .await;

    let token = CancellationToken::new();
    let handle = tokio::spawn(run_health_loop(monitor.clone(), driver_config(), token.clone()));
    // ticks at t=0, 60, 120, 180, 240
    tokio::time::sleep(Duration::from_secs(250)).await;
    token.cancel();
    assert_eq!(handle.await.unwrap(), 5);

    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert!(healer.is_exhausted("database").await);

    let titles = notifier.titles();
    assert_eq!(titles.iter().filter(|t| *t == "Healing Action Failed").count(), 3);
    assert_eq!(titles.iter().filter(|t| *t == "Healing Retries Exceeded").count(), 2);
    // Checker error converted to Unhealthy; first observation never alerts
    assert!(!titles.iter().any(|t| t == "Component Unhealthy"));

    let readiness = monitor.get_readiness().await;
    assert!(!readiness.ready);
    assert!(readiness.failing.contains(&"database".to_string()));
    assert!(readiness.failing.contains(&"cache".to_string()));

    healer.reset_attempts("database").await;
    assert!(!healer.is_exhausted("database").await);
}

/// Built-in policies only act on the states they are meant for.
#[tokio::test]
async fn test_builtin_policies_match_their_states() {
    let notifier = Arc::new(RecordingNotifier::new());
    let healer = SelfHealer::new(&HealerConfig::default(), notifier);
    healer.register_action("database", Arc::new(StoreRepairNoticeAction)).await;
    healer
        .register_action("llm_api", Arc::new(ApiBackoffAction::new(Duration::from_secs(60))))
        .await;

    // Degraded store: nothing matches, no cooldown started
    let degraded_store = ComponentHealth::degraded("database", "slow writes");
    let outcome = healer.attempt_healing("database", &degraded_store).await;
    assert!(!outcome.attempted);

    let failed_store = ComponentHealth::unhealthy("database", "read-only filesystem")
        .with_detail("failing_stores", vec!["devices".to_string(), "scenes".to_string()]);
    let outcome = healer.attempt_healing("database", &failed_store).await;
    assert!(outcome.attempted && outcome.success);
    assert_eq!(
        outcome.actions[0].details["failing_stores"],
        serde_json::json!(["devices", "scenes"])
    );

    let strained_api = ComponentHealth::unhealthy("llm_api", "rate limited");
    let outcome = healer.attempt_healing("llm_api", &strained_api).await;
    assert!(outcome.success);
    assert_eq!(outcome.actions[0].details["backoff_secs"], 120);
}

/// Manual trigger runs a fresh check and hands it to the healer.
#[tokio::test]
async fn test_manual_trigger_uses_fresh_check() {
    let notifier = Arc::new(RecordingNotifier::new());
    let monitor = HealthMonitor::new(&monitor_config(), notifier.clone());
    let healer = Arc::new(SelfHealer::new(&HealerConfig::default(), notifier));
    healer.register_action("hub", Arc::new(HubInvestigationAction)).await;
    monitor.set_healer(healer.clone()).await;
    monitor
        .register(Arc::new(FnChecker::new("hub", || async {
            Ok(ComponentHealth::unhealthy("hub", "no route to host"))
        })))
        .await;

    let outcome = monitor.trigger_healing("hub").await;
    assert!(outcome.attempted);
    assert!(outcome.success);
    // Manual checks are not recorded in history
    assert!(monitor.get_health_history("hub", 10).await.is_empty());

    let outcome = monitor.trigger_healing("sprinklers").await;
    assert!(!outcome.attempted);
}

/// A default install with only the built-in disk check becomes ready.
#[tokio::test]
async fn test_default_config_becomes_ready() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = HomewatchConfig::default();
    let disk = config.probes.disk.as_mut().unwrap();
    disk.path = dir.path().to_string_lossy().into_owned();
    disk.min_free_mb = 0;

    let monitor = HealthMonitor::new(&config.monitor, Arc::new(RecordingNotifier::new()));
    monitor
        .register(Arc::new(DiskSpaceChecker::new(config.probes.disk.as_ref().unwrap())))
        .await;
    assert!(monitor.unmonitored_critical_components().await.is_empty());

    for _ in 0..3 {
        monitor.get_system_health().await;
    }
    let readiness = monitor.get_readiness().await;
    assert!(readiness.ready, "failing: {:?}", readiness.failing);
}
