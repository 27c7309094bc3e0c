//! Homewatch - health monitoring and self-healing for the home assistant
//!
//! # Usage
//!
//! ```bash
//! # Run the monitor loop and HTTP endpoints with ./homewatch.toml or defaults
//! cargo run --release
//!
//! # Explicit config, faster ticks, no automatic healing
//! ./homewatch --config /etc/homewatch.toml --interval 15 --no-auto-heal
//!
//! # One-shot check for cron or CI (exit code 1 when Unhealthy)
//! ./homewatch --once
//! ```
//!
//! # Environment Variables
//!
//! - `HOMEWATCH_CONFIG`: Path to the TOML config file
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use axum::Router;
use homewatch::api::{create_app, HealthApiState};
use homewatch::background::{
    run_health_loop, ApiBackoffAction, CacheClearAction, DiskSpaceChecker, DriverConfig,
    FanoutNotifier, HealthMonitor, HealthStatus, HttpProbeChecker, HubInvestigationAction,
    LogNotifier, Notifier, RemoteCacheClearer, SelfHealer, StoreRepairNoticeAction,
    WebhookNotifier,
};
use homewatch::config::{ConfigError, HomewatchConfig, PolicyConfig, ProbesConfig};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "homewatch")]
#[command(about = "Health monitoring and self-healing for the home assistant")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config file (overrides $HOMEWATCH_CONFIG)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// HTTP server address (overrides [server] addr)
    #[arg(long, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Seconds between health cycles (overrides [monitor] interval_secs)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Observe only: never hand unhealthy components to the healer
    #[arg(long)]
    no_auto_heal: bool,

    /// Run a single health cycle, print the report as JSON and exit
    #[arg(long)]
    once: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl CliArgs {
    fn apply_overrides(&self, config: &mut HomewatchConfig) {
        if let Some(addr) = &self.addr {
            config.server.addr.clone_from(addr);
        }
        if let Some(interval) = self.interval {
            config.monitor.interval_secs = interval;
        }
        if self.no_auto_heal {
            config.monitor.auto_heal = false;
        }
    }
}

// ============================================================================
// Task Identity
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    HealthLoop,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::HealthLoop => write!(f, "HealthLoop"),
        }
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Log-only by default; add the webhook when one is configured.
fn build_notifier(config: &HomewatchConfig) -> Result<Arc<dyn Notifier>> {
    let Some(url) = &config.alerts.webhook_url else {
        info!("Alerts: log only");
        return Ok(Arc::new(LogNotifier));
    };
    let webhook = WebhookNotifier::new(url.clone(), config.monitor.notify_timeout())
        .context("Failed to build webhook notifier")?;
    info!(url = %url, "Alerts: log + webhook");
    Ok(Arc::new(FanoutNotifier::new(vec![
        Box::new(LogNotifier),
        Box::new(webhook),
    ])))
}

async fn register_probes(monitor: &HealthMonitor, probes: &ProbesConfig) -> Result<()> {
    if let Some(disk) = &probes.disk {
        std::fs::create_dir_all(&disk.path)
            .with_context(|| format!("Failed to create data directory {}", disk.path))?;
        monitor.register(Arc::new(DiskSpaceChecker::new(disk))).await;
        info!(component = %disk.name, path = %disk.path, "Registered disk space probe");
    }
    for http in &probes.http {
        let checker = HttpProbeChecker::new(http)
            .with_context(|| format!("Failed to build HTTP probe for {}", http.name))?;
        monitor.register(Arc::new(checker)).await;
        info!(component = %http.name, url = %http.url, "Registered HTTP probe");
    }
    Ok(())
}

async fn register_policies(
    healer: &SelfHealer,
    policies: &PolicyConfig,
    action_timeout: Duration,
) -> Result<()> {
    if let Some(component) = &policies.cache_component {
        match &policies.cache_clear_url {
            Some(url) => {
                let cache = RemoteCacheClearer::new(url.clone(), action_timeout)
                    .context("Failed to build cache clear client")?;
                healer
                    .register_action(
                        component.clone(),
                        Arc::new(CacheClearAction::new(
                            Arc::new(cache),
                            policies.cache_capacity_threshold,
                        )),
                    )
                    .await;
            }
            None => warn!(component = %component, "No cache_clear_url configured, cache policy disabled"),
        }
    }
    if let Some(component) = &policies.hub_component {
        healer
            .register_action(component.clone(), Arc::new(HubInvestigationAction))
            .await;
    }
    if let Some(component) = &policies.store_component {
        healer
            .register_action(component.clone(), Arc::new(StoreRepairNoticeAction))
            .await;
    }
    if let Some(component) = &policies.api_component {
        healer
            .register_action(
                component.clone(),
                Arc::new(ApiBackoffAction::new(Duration::from_secs(policies.api_backoff_secs))),
            )
            .await;
    }
    info!(components = ?healer.registered_components().await, "Registered healing policies");
    Ok(())
}

// ============================================================================
// Task Spawning
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Spawn the periodic health loop into the JoinSet.
fn spawn_health_loop(
    task_set: &mut JoinSet<Result<TaskName>>,
    monitor: Arc<HealthMonitor>,
    driver: DriverConfig,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        let cycles = run_health_loop(monitor, driver, cancel_token).await;
        info!("[HealthLoop] Stopped after {} cycles", cycles);
        Ok(TaskName::HealthLoop)
    });
}

// ============================================================================
// Supervisor
// ============================================================================

/// Watch the task set until shutdown or the first task failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring...");

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let in-flight cycles and connections finish
    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task_name)) => info!("Supervisor: task {} stopped", task_name),
            Ok(Err(e)) => warn!("Supervisor: task error during shutdown: {}", e),
            Err(e) => warn!("Supervisor: task panicked during shutdown: {}", e),
        }
    }

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let mut config = HomewatchConfig::load(args.config.as_deref());
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Homewatch - health monitoring and self-healing");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        interval_secs = config.monitor.interval_secs,
        auto_heal = config.monitor.auto_heal,
        critical = ?config.monitor.critical_components,
        "Monitor configured"
    );

    let notifier = build_notifier(&config)?;
    let monitor = Arc::new(HealthMonitor::new(&config.monitor, notifier.clone()));
    let healer = Arc::new(SelfHealer::new(&config.healer, notifier));

    register_probes(&monitor, &config.probes).await?;
    let unmonitored = monitor.unmonitored_critical_components().await;
    if !unmonitored.is_empty() {
        let errors = unmonitored
            .iter()
            .map(|name| format!("monitor.critical_components: no probe reports on '{name}'"))
            .collect();
        return Err(ConfigError::Validation(errors)).context("Invalid configuration");
    }
    register_policies(&healer, &config.healer.policies, config.healer.action_timeout()).await?;
    monitor.set_healer(healer.clone()).await;

    if args.once {
        let report = monitor.get_system_health().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        if report.status == HealthStatus::Unhealthy {
            std::process::exit(1);
        }
        return Ok(());
    }

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.addr))?;
    info!("HTTP endpoints on http://{}", config.server.addr);

    let app = create_app(HealthApiState {
        monitor: monitor.clone(),
        healer,
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());
    spawn_health_loop(
        &mut task_set,
        monitor,
        DriverConfig::from(&config.monitor),
        cancel_token.clone(),
    );

    run_supervisor(&mut task_set, cancel_token).await?;

    info!("Homewatch shutdown complete");
    Ok(())
}
