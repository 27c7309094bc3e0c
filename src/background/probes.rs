//! Built-in component probes
//!
//! - Disk space: free space under the data directory (local persistence store)
//! - HTTP: a remote component's health endpoint (connectivity hub, metered API, cache)
//!
//! Also provides [`RemoteCacheClearer`], the cache-clear hook used by the
//! cache remediation policy when the cache lives in another process.

use async_trait::async_trait;
use std::time::{Duration, Instant};

use super::actions::{ActionError, ClearableCache};
use super::checker::{CheckError, Checker};
use super::status::{ComponentHealth, HealthStatus};
use crate::config::{DiskProbeConfig, HttpProbeConfig};

// ============================================================================
// Disk space
// ============================================================================

/// Free disk space check for a data directory.
pub struct DiskSpaceChecker {
    name: String,
    data_path: String,
    /// Minimum free space before Unhealthy (bytes); Degraded below twice this
    min_free_bytes: u64,
}

impl DiskSpaceChecker {
    pub fn new(config: &DiskProbeConfig) -> Self {
        Self {
            name: config.name.clone(),
            data_path: config.path.clone(),
            min_free_bytes: config.min_free_mb.saturating_mul(1024 * 1024),
        }
    }

    fn classify(&self, free_bytes: u64) -> ComponentHealth {
        let free_mb = free_bytes as f64 / 1_048_576.0;
        let min_mb = self.min_free_bytes as f64 / 1_048_576.0;
        let health = if free_bytes < self.min_free_bytes {
            ComponentHealth::unhealthy(
                &self.name,
                format!("Only {free_mb:.0} MB free (minimum {min_mb:.0} MB)"),
            )
            .with_detail("failing_stores", vec![self.data_path.clone()])
        } else if free_bytes < self.min_free_bytes.saturating_mul(2) {
            ComponentHealth::degraded(&self.name, format!("{free_mb:.0} MB free, approaching minimum"))
        } else {
            ComponentHealth::healthy(&self.name, format!("{free_mb:.0} MB free"))
        };
        health
            .with_detail("path", self.data_path.clone())
            .with_detail("free_bytes", free_bytes)
    }
}

#[async_trait]
impl Checker for DiskSpaceChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<ComponentHealth, CheckError> {
        let free = check_disk_free(&self.data_path)?;
        Ok(self.classify(free))
    }
}

/// Free bytes available to unprivileged users on the filesystem holding `path`.
#[allow(unsafe_code, clippy::unnecessary_cast)]
fn check_disk_free(path: &str) -> Result<u64, CheckError> {
    use std::mem::MaybeUninit;

    let c_path = std::ffi::CString::new(path)
        .map_err(|e| CheckError::Failed(format!("invalid path {path}: {e}")))?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    let result = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };

    if result == 0 {
        let stat = unsafe { stat.assume_init() };
        Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
    } else {
        Err(CheckError::Io(std::io::Error::last_os_error()))
    }
}

// ============================================================================
// HTTP health endpoint
// ============================================================================

/// Probes a remote health endpoint.
///
/// Transport errors are returned as `Err` (the monitor records them as
/// Unhealthy). 5xx is Unhealthy, other non-2xx is Degraded. A 2xx JSON body
/// with a `status` field of `healthy`/`degraded`/`unhealthy` sets the status,
/// and its other fields are copied into the snapshot details. A response
/// slower than `slow_ms` is at least Degraded.
pub struct HttpProbeChecker {
    name: String,
    url: String,
    slow: Duration,
    http: reqwest::Client,
}

impl HttpProbeChecker {
    pub fn new(config: &HttpProbeConfig) -> Result<Self, CheckError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            name: config.name.clone(),
            url: config.url.clone(),
            slow: Duration::from_millis(config.slow_ms),
            http,
        })
    }
}

/// Map a reported status string onto a [`HealthStatus`].
fn parse_reported_status(raw: &str) -> Option<HealthStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "healthy" | "ok" | "up" => Some(HealthStatus::Healthy),
        "degraded" | "warning" => Some(HealthStatus::Degraded),
        "unhealthy" | "down" | "error" => Some(HealthStatus::Unhealthy),
        _ => None,
    }
}

#[async_trait]
impl Checker for HttpProbeChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<ComponentHealth, CheckError> {
        let started = Instant::now();
        let response = self.http.get(&self.url).send().await?;
        let latency = started.elapsed();
        let code = response.status();

        let mut health = if code.is_server_error() {
            ComponentHealth::unhealthy(&self.name, format!("{} returned {code}", self.url))
        } else if !code.is_success() {
            ComponentHealth::degraded(&self.name, format!("{} returned {code}", self.url))
        } else {
            let body = response.json::<serde_json::Value>().await.ok();
            let mut health = ComponentHealth::healthy(&self.name, "reachable");
            if let Some(serde_json::Value::Object(fields)) = body {
                for (key, value) in fields {
                    if key == "status" {
                        if let Some(status) = value.as_str().and_then(parse_reported_status) {
                            health.status = status;
                        }
                    } else if key == "message" {
                        if let Some(message) = value.as_str() {
                            health.message = message.to_string();
                        }
                    } else {
                        health.details.insert(key, value);
                    }
                }
            }
            health
        };

        if latency > self.slow && health.status == HealthStatus::Healthy {
            health.status = HealthStatus::Degraded;
            health.message = format!("slow response ({} ms)", latency.as_millis());
        }

        Ok(health
            .with_detail("url", self.url.clone())
            .with_detail("http_status", code.as_u16())
            .with_detail("latency_ms", u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)))
    }
}

// ============================================================================
// Remote cache clear hook
// ============================================================================

/// Empties a cache owned by another process by POSTing to its clear endpoint.
///
/// A JSON response of the form `{"cleared": N}` reports the removed count.
pub struct RemoteCacheClearer {
    url: String,
    http: reqwest::Client,
}

impl RemoteCacheClearer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ActionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ActionError::Failed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { url: url.into(), http })
    }
}

#[async_trait]
impl ClearableCache for RemoteCacheClearer {
    async fn clear(&self) -> Result<usize, ActionError> {
        let response = self
            .http
            .post(&self.url)
            .send()
            .await
            .map_err(|e| ActionError::Failed(format!("cache clear request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ActionError::Failed(format!(
                "cache clear endpoint returned {}",
                response.status()
            )));
        }
        let cleared = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("cleared").and_then(serde_json::Value::as_u64))
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        Ok(cleared)
    }
}
