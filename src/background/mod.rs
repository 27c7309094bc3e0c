//! Background services: health monitoring and self-healing
//!
//! A periodic driver runs the [`HealthMonitor`] once per tick. The monitor runs
//! every registered [`Checker`], keeps bounded history, alerts on status
//! transitions, and hands non-Healthy components to the [`SelfHealer`], which
//! runs matching [`HealingAction`]s under per-component cooldowns and a retry
//! budget before escalating to a human.

pub mod actions;
pub mod checker;
pub mod driver;
pub mod history;
pub mod monitor;
pub mod notifier;
pub mod probes;
pub mod self_healer;
pub mod status;
pub mod transitions;

pub use actions::{
    ActionError, ApiBackoffAction, CacheClearAction, ClearableCache, FnAction, HealingAction,
    HealingResult, HubInvestigationAction, StoreRepairNoticeAction,
};
pub use checker::{CheckError, Checker, FnChecker};
pub use driver::{run_health_loop, DriverConfig};
pub use history::HistoryStore;
pub use monitor::HealthMonitor;
pub use notifier::{
    Alert, AlertSeverity, FanoutNotifier, LogNotifier, Notifier, NotifyError, RecordingNotifier,
    WebhookNotifier,
};
pub use probes::{DiskSpaceChecker, HttpProbeChecker, RemoteCacheClearer};
pub use self_healer::{ActionOutcome, HealingLogEntry, HealingOutcome, RetryState, SelfHealer};
pub use status::{ComponentHealth, Details, HealthStatus, Liveness, Readiness, SystemHealth};
pub use transitions::{Transition, TransitionKind, TransitionTracker};
