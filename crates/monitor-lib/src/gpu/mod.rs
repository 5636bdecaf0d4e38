//! GPU telemetry source and container attribution
//!
//! The telemetry tool is queried exactly once per cycle for two global
//! lists: compute-process associations (pid -> device) and per-device
//! telemetry. Both are shared read-only by every container in the cycle;
//! attribution is a pure set intersection over pids.

mod nvidia;

pub use nvidia::NvidiaSmiTelemetry;

use crate::error::MonitorError;
use crate::models::{ContainerGpuUsage, GpuDeviceSnapshot, GpuProcess};
use async_trait::async_trait;
use std::collections::HashSet;

/// Global GPU state captured once per monitoring cycle
#[derive(Debug, Clone, Default)]
pub struct GpuCycleSnapshot {
    pub processes: Vec<GpuProcess>,
    pub devices: Vec<GpuDeviceSnapshot>,
}

/// Source of global GPU telemetry
#[async_trait]
pub trait GpuTelemetry: Send + Sync {
    /// List compute-process associations across all devices
    async fn compute_processes(&self) -> Result<Vec<GpuProcess>, MonitorError>;

    /// List per-device telemetry for all devices
    async fn devices(&self) -> Result<Vec<GpuDeviceSnapshot>, MonitorError>;
}

/// Attribute the cycle's GPU state to one container by pid intersection
///
/// Associations whose pid belongs to the container are resolved to their
/// device snapshots, deduplicated by device index and sorted ascending so
/// multi-device output is reproducible. Child processes may surface the
/// same pid through several associations; membership alone decides.
pub fn correlate(
    container_pids: &HashSet<u32>,
    snapshot: &GpuCycleSnapshot,
) -> ContainerGpuUsage {
    let mut matched: Vec<&GpuDeviceSnapshot> = Vec::new();
    let mut seen_indexes: HashSet<u32> = HashSet::new();

    for assoc in snapshot
        .processes
        .iter()
        .filter(|a| container_pids.contains(&a.pid))
    {
        if let Some(device) = snapshot.devices.iter().find(|d| d.uuid == assoc.gpu_uuid) {
            if seen_indexes.insert(device.index) {
                matched.push(device);
            }
        }
    }

    if matched.is_empty() {
        return ContainerGpuUsage::none();
    }

    matched.sort_by_key(|d| d.index);

    ContainerGpuUsage {
        count: matched.len(),
        ids: matched
            .iter()
            .map(|d| d.index.to_string())
            .collect::<Vec<_>>()
            .join(","),
        names: join_field(&matched, |d| d.name.as_str()),
        memory_used: join_field(&matched, |d| d.memory_used.as_str()),
        memory_total: join_field(&matched, |d| d.memory_total.as_str()),
        utilization: join_field(&matched, |d| d.utilization_gpu.as_str()),
        memory_utilization: join_field(&matched, |d| d.utilization_memory.as_str()),
        temperature: join_field(&matched, |d| d.temperature.as_str()),
        fan_speed: join_field(&matched, |d| d.fan_speed.as_str()),
        power_draw: join_field(&matched, |d| d.power_draw.as_str()),
        power_limit: join_field(&matched, |d| d.power_limit.as_str()),
    }
}

/// Comma-join one field across the sorted matched devices
fn join_field<'a>(
    devices: &[&'a GpuDeviceSnapshot],
    field: impl Fn(&'a GpuDeviceSnapshot) -> &'a str,
) -> String {
    devices
        .iter()
        .map(|d| field(d))
        .collect::<Vec<_>>()
        .join(",")
}
