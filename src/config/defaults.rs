//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery. Every `*Config::default()` in
//! [`super::homewatch_config`] draws from here.

// ============================================================================
// Monitor
// ============================================================================

/// Interval between health check cycles (seconds).
pub const CHECK_INTERVAL_SECS: u64 = 60;

/// Snapshots retained per component.
pub const MAX_HISTORY: usize = 100;

/// Age after which history entries are purged by cleanup (days).
pub const RETENTION_DAYS: u32 = 7;

/// Per-checker timeout (seconds).
pub const CHECK_TIMEOUT_SECS: u64 = 10;

/// Per-alert delivery timeout (seconds).
pub const NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Run history cleanup every N ticks. 60 ticks at the default interval = hourly.
pub const CLEANUP_EVERY_TICKS: u64 = 60;

/// Components that must be non-Unhealthy for the process to be ready.
pub const CRITICAL_COMPONENTS: &[&str] = &["database"];

// ============================================================================
// Self-Healer
// ============================================================================

/// Consecutive failed healing actions before a component is left to a human.
pub const MAX_RETRIES: u32 = 3;

/// Minimum time between healing runs for one component (seconds).
pub const HEALING_COOLDOWN_SECS: u64 = 300;

/// Per-action timeout (seconds).
pub const ACTION_TIMEOUT_SECS: u64 = 30;

/// Healing log ring-buffer capacity.
pub const MAX_HEALING_LOG_ENTRIES: usize = 1_000;

/// Cache capacity ratio at or above which a non-Healthy cache is cleared.
pub const CACHE_CAPACITY_THRESHOLD: f64 = 0.9;

/// Base backoff recommended for a strained metered API (seconds).
pub const API_BACKOFF_SECS: u64 = 60;

// ============================================================================
// Probes
// ============================================================================

/// Minimum free disk space for the data directory (MB).
pub const DISK_MIN_FREE_MB: u64 = 500;

/// Data directory checked by the disk probe.
pub const DATA_DIR: &str = "./data";

/// HTTP probe timeout (seconds).
pub const HTTP_PROBE_TIMEOUT_SECS: u64 = 5;

/// HTTP probe latency above which a component is Degraded (ms).
pub const HTTP_PROBE_SLOW_MS: u64 = 2_000;

// ============================================================================
// Server
// ============================================================================

/// HTTP bind address for the operational endpoints.
pub const SERVER_ADDR: &str = "0.0.0.0:8090";

/// Default `limit` for history queries.
pub const DEFAULT_QUERY_LIMIT: usize = 50;
