//! The monitoring cycle loop
//!
//! Drives fixed-cadence cycles: discover containers, capture the global
//! GPU snapshot once, then sample/enrich/persist per container. Pacing is
//! drift-compensated: the sleep budget is the interval minus the cycle's
//! execution time, and an overrunning cycle skips the sleep entirely and
//! logs a drift warning. Missed ticks are never caught up. A stop request
//! is honored only between cycles, so no row is ever left half-written.

use super::{discover_workload_containers, ContainerRuntime};
use crate::error::MonitorError;
use crate::gpu::{correlate, GpuCycleSnapshot, GpuTelemetry};
use crate::metadata::MetadataResolver;
use crate::models::{ContainerGpuUsage, MonitoringRecord, WorkloadContainer};
use crate::store::ModuleStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Configuration for the monitoring loop
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Target cycle periodicity
    pub interval: Duration,
    /// Container name prefix identifying workload containers
    pub container_prefix: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            container_prefix: "wemol_rc_task".to_string(),
        }
    }
}

/// Owns the per-cycle pipeline and all process-lifetime state
pub struct Recorder {
    runtime: Arc<dyn ContainerRuntime>,
    telemetry: Arc<dyn GpuTelemetry>,
    resolver: MetadataResolver,
    store: ModuleStore,
    config: RecorderConfig,
}

impl Recorder {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        telemetry: Arc<dyn GpuTelemetry>,
        resolver: MetadataResolver,
        store: ModuleStore,
        config: RecorderConfig,
    ) -> Self {
        Self {
            runtime,
            telemetry,
            resolver,
            store,
            config,
        }
    }

    /// Run cycles until a stop is requested, then flush and close sinks
    pub async fn run(mut self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs_f64(),
            prefix = %self.config.container_prefix,
            "starting monitoring loop"
        );

        loop {
            let start = Instant::now();
            self.run_cycle().await;
            let elapsed = start.elapsed();

            match sleep_budget(self.config.interval, elapsed) {
                Some(budget) => {
                    debug!(
                        elapsed_ms = elapsed.as_millis(),
                        sleep_ms = budget.as_millis(),
                        "cycle complete"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(budget) => {}
                        _ = shutdown.recv() => break,
                    }
                }
                None => {
                    warn!(
                        elapsed_ms = elapsed.as_millis(),
                        interval_ms = self.config.interval.as_millis(),
                        "cycle overran the configured interval"
                    );
                    // Still honor a pending stop before starting over.
                    if shutdown.try_recv().is_ok() {
                        break;
                    }
                }
            }
        }

        self.store.flush_all();
        info!("monitoring loop stopped");
    }

    /// One complete discovery -> collect -> enrich -> persist pass
    pub async fn run_cycle(&mut self) {
        let containers = match discover_workload_containers(
            self.runtime.as_ref(),
            &self.config.container_prefix,
        )
        .await
        {
            Ok(containers) => containers,
            Err(e) => {
                error!(error = %e, "discovery failed, skipping cycle");
                return;
            }
        };

        if containers.is_empty() {
            warn!("no workload containers running, waiting for next cycle");
            return;
        }

        // Captured once and shared read-only by every container below.
        let gpu_snapshot = self.capture_gpu_snapshot().await;

        for container in &containers {
            if let Err(e) = self.record_container(container, gpu_snapshot.as_ref()).await {
                warn!(
                    container = %container.name,
                    error = %e,
                    "container skipped this cycle"
                );
            }
        }
    }

    /// Query both global GPU lists; either failing degrades the whole
    /// cycle to the "N/A" sentinel without touching CPU/memory fields
    async fn capture_gpu_snapshot(&self) -> Option<GpuCycleSnapshot> {
        let processes = match self.telemetry.compute_processes().await {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "gpu process query unavailable this cycle");
                return None;
            }
        };
        let devices = match self.telemetry.devices().await {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "gpu device query unavailable this cycle");
                return None;
            }
        };
        Some(GpuCycleSnapshot { processes, devices })
    }

    /// Build and persist the record for one container
    async fn record_container(
        &mut self,
        container: &WorkloadContainer,
        gpu_snapshot: Option<&GpuCycleSnapshot>,
    ) -> Result<(), MonitorError> {
        let sample = self.runtime.sample_stats(&container.name).await?;

        let gpu = match gpu_snapshot {
            Some(snapshot) => {
                let pids = match self.runtime.list_pids(&container.name).await {
                    Ok(pids) => pids,
                    Err(e) => {
                        debug!(container = %container.name, error = %e, "pid listing failed");
                        HashSet::new()
                    }
                };
                correlate(&pids, snapshot)
            }
            None => ContainerGpuUsage::none(),
        };

        let module_name = self.resolver.resolve(container.task_id).await;

        let record = MonitoringRecord {
            task_id: container.task_id,
            job_id: container.job_id,
            module_name,
            sample,
            gpu,
        };

        self.store.append(&record)
    }
}

/// Remaining sleep budget for a cycle, or `None` when the cycle overran
/// the interval and the next one should start immediately
pub fn sleep_budget(interval: Duration, elapsed: Duration) -> Option<Duration> {
    if elapsed >= interval {
        None
    } else {
        Some(interval - elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_budget_is_interval_minus_elapsed() {
        let budget = sleep_budget(Duration::from_secs(5), Duration::from_millis(1200));
        assert_eq!(budget, Some(Duration::from_millis(3800)));
    }

    #[test]
    fn sleep_budget_zero_elapsed() {
        let budget = sleep_budget(Duration::from_secs(5), Duration::ZERO);
        assert_eq!(budget, Some(Duration::from_secs(5)));
    }

    #[test]
    fn overrun_skips_the_sleep() {
        assert_eq!(
            sleep_budget(Duration::from_secs(5), Duration::from_secs(5)),
            None
        );
        assert_eq!(
            sleep_budget(Duration::from_secs(5), Duration::from_secs(7)),
            None
        );
    }
}
