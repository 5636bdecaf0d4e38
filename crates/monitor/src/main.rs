//! wemol-monitor - workload container resource recorder
//!
//! Long-running daemon that samples resource usage of wemol workload
//! containers every cycle, attributes GPU telemetry to them, resolves the
//! owning job's module name and appends per-task CSV time series
//! partitioned by module.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use monitor_lib::{
    DockerCliRuntime, MetadataResolver, ModuleStore, NvidiaSmiTelemetry, Recorder, RecorderConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

/// Workload container resource monitor
#[derive(Parser)]
#[command(name = "wemol-monitor")]
#[command(author, version, about = "Records wemol workload container resource usage", long_about = None)]
struct Cli {
    /// Sampling interval in seconds (overrides WEMOL_INTERVAL_SECS)
    #[arg(long)]
    interval: Option<u64>,

    /// Log verbosity (overrides WEMOL_LOG_LEVEL)
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Map the configured level name onto a tracing filter directive
fn filter_directive(level: &str) -> String {
    match level.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        other => other.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::MonitorConfig::load()?;
    if let Some(interval) = cli.interval {
        config.interval_secs = interval;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.as_filter().to_string();
    }
    config.validate()?;

    // RUST_LOG takes precedence over the configured level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(filter_directive(&config.log_level))),
        )
        .with(fmt::layer().json())
        .init();

    info!(
        interval_secs = config.interval_secs,
        output_dir = %config.output_dir,
        prefix = %config.container_prefix,
        "starting wemol-monitor"
    );

    let recorder = Recorder::new(
        Arc::new(DockerCliRuntime::new()),
        Arc::new(NvidiaSmiTelemetry::new()),
        MetadataResolver::new(&config.rcall_root),
        ModuleStore::new(&config.output_dir),
        RecorderConfig {
            interval: Duration::from_secs(config.interval_secs),
            container_prefix: config.container_prefix.clone(),
        },
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let loop_handle = tokio::spawn(recorder.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("termination signal received, stopping after current cycle");
    let _ = shutdown_tx.send(());

    loop_handle.await?;
    info!("shutdown complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_directive_maps_warning() {
        assert_eq!(filter_directive("WARNING"), "warn");
        assert_eq!(filter_directive("info"), "info");
        assert_eq!(filter_directive("debug"), "debug");
    }
}
