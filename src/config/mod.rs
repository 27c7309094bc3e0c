//! Homewatch Configuration Module
//!
//! Operator-tunable settings for the health monitor, self-healer, probes and
//! alert delivery, loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config` CLI flag / `HOMEWATCH_CONFIG` environment variable
//! 2. `homewatch.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! The loaded config is passed explicitly to the monitor, healer and driver
//! constructors; there is no process-wide accessor.

mod homewatch_config;
pub mod defaults;

pub use homewatch_config::*;
