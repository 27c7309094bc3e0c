//! Pluggable component checks.
//!
//! Implement [`Checker`] for each component that should be monitored. A failed
//! check is an ordinary `Err` value; the monitor turns it into an Unhealthy
//! snapshot so one broken checker never aborts a cycle.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use super::status::ComponentHealth;

/// Why a check could not produce a snapshot.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("check failed: {0}")]
    Failed(String),

    #[error("check timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A named health check for one component.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Component name reported in snapshots and history
    fn name(&self) -> &str;

    /// Run the check once.
    async fn check(&self) -> Result<ComponentHealth, CheckError>;
}

type CheckFuture = Pin<Box<dyn Future<Output = Result<ComponentHealth, CheckError>> + Send>>;

/// Adapter that turns a closure into a [`Checker`].
pub struct FnChecker {
    name: String,
    check: Box<dyn Fn() -> CheckFuture + Send + Sync>,
}

impl FnChecker {
    pub fn new<F, Fut>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ComponentHealth, CheckError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            check: Box::new(move || Box::pin(check())),
        }
    }
}

#[async_trait]
impl Checker for FnChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<ComponentHealth, CheckError> {
        (self.check)().await
    }
}

/// Run a checker under a timeout and always return a snapshot.
///
/// Errors and timeouts become Unhealthy snapshots carrying `details.error`.
pub async fn run_checker(checker: &Arc<dyn Checker>, timeout: Duration) -> ComponentHealth {
    let result = match tokio::time::timeout(timeout, checker.check()).await {
        Ok(result) => result,
        Err(_) => Err(CheckError::Timeout(timeout)),
    };

    match result {
        Ok(health) => health,
        Err(e) => {
            warn!(component = checker.name(), error = %e, "Health check failed");
            ComponentHealth::unhealthy(checker.name(), format!("Health check failed: {e}"))
                .with_detail("error", e.to_string())
        }
    }
}
