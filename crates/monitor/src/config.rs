//! Monitor configuration
//!
//! Settings come from `WEMOL_*` environment variables with serde
//! defaults; the command line can override the interval and log level.

use anyhow::{bail, Result};
use serde::Deserialize;

/// Monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Sampling interval in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Log verbosity: debug, info, warning or error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding the per-module time series
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Root of the worker trees holding task.json metadata
    #[serde(default = "default_rcall_root")]
    pub rcall_root: String,

    /// Container name prefix identifying workload containers
    #[serde(default = "default_container_prefix")]
    pub container_prefix: String,
}

fn default_interval() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_output_dir() -> String {
    monitor_lib::store::DEFAULT_OUTPUT_DIR.to_string()
}

fn default_rcall_root() -> String {
    monitor_lib::metadata::DEFAULT_RCALL_ROOT.to_string()
}

fn default_container_prefix() -> String {
    "wemol_rc_task".to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            log_level: default_log_level(),
            output_dir: default_output_dir(),
            rcall_root: default_rcall_root(),
            container_prefix: default_container_prefix(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from `WEMOL_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("WEMOL"))
            .build()?;

        let config: MonitorConfig = config.try_deserialize().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("sampling interval must be a positive number of seconds");
        }
        Ok(())
    }
}
