//! Homewatch Configuration - monitor, healer, probe and alert settings as TOML
//!
//! Every struct implements `Default` with the values in [`super::defaults`],
//! so a missing file or a partial file yields a complete configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "HOMEWATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "homewatch.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `HomewatchConfig::load()` which searches:
/// 1. `$HOMEWATCH_CONFIG`
/// 2. `./homewatch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomewatchConfig {
    /// HTTP server for the operational endpoints
    #[serde(default)]
    pub server: ServerConfig,

    /// Health monitor and periodic driver
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Self-healer budgets and remediation policies
    #[serde(default)]
    pub healer: HealerConfig,

    /// Built-in component probes
    #[serde(default)]
    pub probes: ProbesConfig,

    /// Alert delivery
    #[serde(default)]
    pub alerts: AlertsConfig,
}

impl HomewatchConfig {
    /// Load configuration using the standard search order.
    ///
    /// An explicit path (from the CLI) takes the place of `$HOMEWATCH_CONFIG`.
    /// Files that fail to load are logged and skipped.
    pub fn load(explicit: Option<&Path>) -> Self {
        // 1. Explicit path or env var
        let requested = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));
        if let Some(p) = requested {
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded homewatch config");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config, falling back");
                    }
                }
            } else {
                warn!(path = %p.display(), "Config path does not exist, falling back");
            }
        }

        // 2. Local file
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded homewatch config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No homewatch.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all settings, collecting every problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let m = &self.monitor;
        if m.interval_secs == 0 {
            errors.push("monitor.interval_secs must be > 0".to_string());
        }
        if m.max_history == 0 {
            errors.push("monitor.max_history must be > 0".to_string());
        }
        if m.retention_days == 0 {
            errors.push("monitor.retention_days must be > 0".to_string());
        }
        if m.check_timeout_secs == 0 {
            errors.push("monitor.check_timeout_secs must be > 0".to_string());
        }
        if m.notify_timeout_secs == 0 {
            errors.push("monitor.notify_timeout_secs must be > 0".to_string());
        }
        if m.cleanup_every_ticks == 0 {
            errors.push("monitor.cleanup_every_ticks must be > 0".to_string());
        }

        let h = &self.healer;
        if h.max_retries == 0 {
            errors.push("healer.max_retries must be > 0".to_string());
        }
        if h.action_timeout_secs == 0 {
            errors.push("healer.action_timeout_secs must be > 0".to_string());
        }
        if h.notify_timeout_secs == 0 {
            errors.push("healer.notify_timeout_secs must be > 0".to_string());
        }
        if h.max_log_entries == 0 {
            errors.push("healer.max_log_entries must be > 0".to_string());
        }
        let ratio = h.policies.cache_capacity_threshold;
        if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
            errors.push(format!(
                "healer.policies.cache_capacity_threshold must be in (0, 1], got {ratio}"
            ));
        }

        for probe in &self.probes.http {
            if probe.name.trim().is_empty() {
                errors.push("probes.http entries need a name".to_string());
            }
            if !(probe.url.starts_with("http://") || probe.url.starts_with("https://")) {
                errors.push(format!("probes.http '{}': url must be http(s), got '{}'", probe.name, probe.url));
            }
            if probe.timeout_secs == 0 {
                errors.push(format!("probes.http '{}': timeout_secs must be > 0", probe.name));
            }
        }

        if let Some(url) = &self.alerts.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("alerts.webhook_url must be http(s), got '{url}'"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({path}): {1}", path = .0.display())]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({path}): {1}", path = .0.display())]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed:\n  - {errors}", errors = .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the operational HTTP endpoints
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Monitor
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between health check cycles
    pub interval_secs: u64,
    /// Snapshots kept per component
    pub max_history: usize,
    /// History retention window in days
    pub retention_days: u32,
    /// Per-checker timeout
    pub check_timeout_secs: u64,
    /// Per-alert delivery timeout
    pub notify_timeout_secs: u64,
    /// Components whose Unhealthy status makes the process not ready
    pub critical_components: Vec<String>,
    /// Hand non-Healthy snapshots to the healer after each cycle
    pub auto_heal: bool,
    /// Run history cleanup every N cycles
    pub cleanup_every_ticks: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::CHECK_INTERVAL_SECS,
            max_history: defaults::MAX_HISTORY,
            retention_days: defaults::RETENTION_DAYS,
            check_timeout_secs: defaults::CHECK_TIMEOUT_SECS,
            notify_timeout_secs: defaults::NOTIFY_TIMEOUT_SECS,
            critical_components: defaults::CRITICAL_COMPONENTS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            auto_heal: true,
            cleanup_every_ticks: defaults::CLEANUP_EVERY_TICKS,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

// ============================================================================
// Self-Healer
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealerConfig {
    /// Consecutive failed actions before a component is exhausted
    pub max_retries: u32,
    /// Cooldown for components without an entry in `cooldowns`
    pub default_cooldown_secs: u64,
    /// Per-component cooldown overrides (seconds)
    pub cooldowns: HashMap<String, u64>,
    /// Per-action timeout
    pub action_timeout_secs: u64,
    /// Per-alert delivery timeout
    pub notify_timeout_secs: u64,
    /// Healing log capacity
    pub max_log_entries: usize,
    /// Suppress repeated "retries exceeded" alerts within this window.
    /// Unset means alert on every attempt while exhausted.
    pub retry_alert_cooldown_secs: Option<u64>,
    /// Built-in remediation policies
    pub policies: PolicyConfig,
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            default_cooldown_secs: defaults::HEALING_COOLDOWN_SECS,
            cooldowns: HashMap::new(),
            action_timeout_secs: defaults::ACTION_TIMEOUT_SECS,
            notify_timeout_secs: defaults::NOTIFY_TIMEOUT_SECS,
            max_log_entries: defaults::MAX_HEALING_LOG_ENTRIES,
            retry_alert_cooldown_secs: None,
            policies: PolicyConfig::default(),
        }
    }
}

impl HealerConfig {
    pub fn default_cooldown(&self) -> Duration {
        Duration::from_secs(self.default_cooldown_secs)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    pub fn retry_alert_cooldown(&self) -> Option<Duration> {
        self.retry_alert_cooldown_secs.map(Duration::from_secs)
    }
}

/// Which component names the built-in remediation policies attach to.
/// A `None` name disables that policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Capacity-bounded cache (clear when full and non-Healthy)
    pub cache_component: Option<String>,
    pub cache_capacity_threshold: f64,
    /// Endpoint that empties the cache (POST)
    pub cache_clear_url: Option<String>,
    /// External connectivity hub (log for investigation)
    pub hub_component: Option<String>,
    /// Local persistence store (log failing stores)
    pub store_component: Option<String>,
    /// Metered external API (recommend backoff)
    pub api_component: Option<String>,
    pub api_backoff_secs: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            cache_component: Some("cache".to_string()),
            cache_capacity_threshold: defaults::CACHE_CAPACITY_THRESHOLD,
            cache_clear_url: None,
            hub_component: Some("hub".to_string()),
            store_component: Some("database".to_string()),
            api_component: Some("llm_api".to_string()),
            api_backoff_secs: defaults::API_BACKOFF_SECS,
        }
    }
}

// ============================================================================
// Probes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbesConfig {
    /// Free-space check on the data directory
    pub disk: Option<DiskProbeConfig>,
    /// Remote health endpoints
    pub http: Vec<HttpProbeConfig>,
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            disk: Some(DiskProbeConfig::default()),
            http: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskProbeConfig {
    pub name: String,
    pub path: String,
    pub min_free_mb: u64,
}

impl Default for DiskProbeConfig {
    fn default() -> Self {
        Self {
            name: "database".to_string(),
            path: defaults::DATA_DIR.to_string(),
            min_free_mb: defaults::DISK_MIN_FREE_MB,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProbeConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_http_probe_timeout")]
    pub timeout_secs: u64,
    /// Latency above which the component is Degraded
    #[serde(default = "default_http_probe_slow_ms")]
    pub slow_ms: u64,
}

fn default_http_probe_timeout() -> u64 {
    defaults::HTTP_PROBE_TIMEOUT_SECS
}

fn default_http_probe_slow_ms() -> u64 {
    defaults::HTTP_PROBE_SLOW_MS
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// POST alerts as JSON to this URL in addition to logging them
    pub webhook_url: Option<String>,
}
