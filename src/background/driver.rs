//! Periodic driver for the health monitor.
//!
//! One ticker, one cycle per tick. Shutdown takes effect at tick boundaries:
//! a cycle that has started always completes.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::monitor::HealthMonitor;
use super::status::HealthStatus;
use crate::config::MonitorConfig;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub interval: Duration,
    /// Hand non-Healthy components to the healer after each cycle
    pub auto_heal: bool,
    /// Run history cleanup every N cycles
    pub cleanup_every_ticks: u64,
}

impl From<&MonitorConfig> for DriverConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            interval: config.interval(),
            auto_heal: config.auto_heal,
            cleanup_every_ticks: config.cleanup_every_ticks.max(1),
        }
    }
}

/// Run health cycles until `cancel_token` fires. Returns the completed cycle count.
///
/// The first cycle runs immediately.
pub async fn run_health_loop(
    monitor: Arc<HealthMonitor>,
    config: DriverConfig,
    cancel_token: CancellationToken,
) -> u64 {
    info!(
        interval_secs = config.interval.as_secs(),
        auto_heal = config.auto_heal,
        "[HealthLoop] Task starting"
    );

    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycles = 0u64;

    loop {
        tokio::select! {
            biased;
            () = cancel_token.cancelled() => {
                info!("[HealthLoop] Received shutdown signal after {} cycles", cycles);
                return cycles;
            }
            _ = interval.tick() => {
                let report = monitor.get_system_health().await;
                if report.status != HealthStatus::Healthy {
                    warn!(status = %report.status, "[HealthLoop] System not healthy");
                }

                if config.auto_heal && report.status != HealthStatus::Healthy {
                    monitor.heal_unhealthy(&report).await;
                }

                cycles += 1;
                if cycles % config.cleanup_every_ticks == 0 {
                    monitor.cleanup_old_history().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::actions::{FnAction, HealingResult};
    use crate::background::checker::FnChecker;
    use crate::background::notifier::RecordingNotifier;
    use crate::background::self_healer::SelfHealer;
    use crate::background::status::{ComponentHealth, Details};
    use crate::config::HealerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn driver_config(auto_heal: bool) -> DriverConfig {
        DriverConfig {
            interval: Duration::from_secs(30),
            auto_heal,
            cleanup_every_ticks: 2,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn loop_ticks_until_cancelled() {
        let notifier = Arc::new(RecordingNotifier::new());
        let monitor = Arc::new(HealthMonitor::new(&MonitorConfig::default(), notifier));
        let checks = Arc::new(AtomicUsize::new(0));
        let counter = checks.clone();
        monitor
            .register(Arc::new(FnChecker::new("hub", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(ComponentHealth::healthy("hub", "ok")) }
            })))
            .await;

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_health_loop(monitor.clone(), driver_config(false), token.clone()));

        // ticks at t=0, 30, 60
        tokio::time::sleep(Duration::from_secs(75)).await;
        token.cancel();
        let cycles = handle.await.unwrap();
        assert_eq!(cycles, 3);
        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_auto_heals_unhealthy_components() {
        let notifier = Arc::new(RecordingNotifier::new());
        let monitor = Arc::new(HealthMonitor::new(&MonitorConfig::default(), notifier.clone()));
        let healer = Arc::new(SelfHealer::new(
            &HealerConfig {
                default_cooldown_secs: 0,
                ..HealerConfig::default()
            },
            notifier,
        ));
        let heals = Arc::new(AtomicUsize::new(0));
        let counter = heals.clone();
        healer
            .register_action(
                "hub",
                Arc::new(FnAction::new("reconnect", "reconnect hub", |_| true, move |_h| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(HealingResult::ok(Details::new())) }
                })),
            )
            .await;
        monitor.set_healer(healer.clone()).await;
        monitor
            .register(Arc::new(FnChecker::new("hub", || async {
                Ok(ComponentHealth::unhealthy("hub", "offline"))
            })))
            .await;

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_health_loop(monitor, driver_config(true), token.clone()));
        tokio::time::sleep(Duration::from_secs(45)).await;
        token.cancel();
        assert_eq!(handle.await.unwrap(), 2);
        assert_eq!(heals.load(Ordering::SeqCst), 2);
        assert_eq!(healer.get_healing_history(Some("hub"), 10).await.len(), 2);
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let monitor = Arc::new(HealthMonitor::new(
            &MonitorConfig::default(),
            Arc::new(RecordingNotifier::new()),
        ));
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(run_health_loop(monitor, driver_config(false), token).await, 0);
    }
}
