//! Core data models for the wemol resource monitor

use serde::{Deserialize, Serialize};

/// A running workload container whose name carries task and job identifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadContainer {
    /// Runtime container id (short form)
    pub container_id: String,
    /// Full container name as reported by the runtime
    pub name: String,
    /// First numeric segment after the name prefix
    pub task_id: u64,
    /// Second numeric segment after the name prefix
    pub job_id: u64,
}

/// Point-in-time resource statistics for one container
///
/// The compound fields (`mem_usage`, `net_io`, `block_io`) keep the raw
/// "x / y" text reported by the runtime; they are part of the on-disk
/// contract and are never decomposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSample {
    pub container: String,
    pub cpu_percent: String,
    pub mem_usage: String,
    pub mem_percent: String,
    pub net_io: String,
    pub block_io: String,
    pub pid_count: u64,
    /// Local wall-clock time of the sample, `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
}

/// Telemetry for one physical GPU, captured once per cycle
///
/// All telemetry values keep the exact `nounits` text reported by the
/// driver tool, including non-numeric readings such as "N/A".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuDeviceSnapshot {
    pub index: u32,
    pub uuid: String,
    pub name: String,
    pub memory_total: String,
    pub memory_used: String,
    pub utilization_gpu: String,
    pub utilization_memory: String,
    pub temperature: String,
    pub fan_speed: String,
    pub power_draw: String,
    pub power_limit: String,
}

/// One GPU compute process association (pid -> device), captured once per cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuProcess {
    pub pid: u32,
    pub gpu_uuid: String,
    pub used_memory: String,
}

/// Sentinel for GPU fields with no matched device
pub const GPU_FIELD_NA: &str = "N/A";

/// Aggregated GPU usage attributed to one container
///
/// Multi-device values are comma-joined in ascending device-index order.
/// When no device matched, every field holds the "N/A" sentinel and
/// `count` is zero; that is the normal state for non-GPU workloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerGpuUsage {
    pub count: usize,
    pub ids: String,
    pub names: String,
    pub memory_used: String,
    pub memory_total: String,
    pub utilization: String,
    pub memory_utilization: String,
    pub temperature: String,
    pub fan_speed: String,
    pub power_draw: String,
    pub power_limit: String,
}

impl ContainerGpuUsage {
    /// The empty sentinel state: no GPU attributable to the container
    pub fn none() -> Self {
        Self {
            count: 0,
            ids: GPU_FIELD_NA.to_string(),
            names: GPU_FIELD_NA.to_string(),
            memory_used: GPU_FIELD_NA.to_string(),
            memory_total: GPU_FIELD_NA.to_string(),
            utilization: GPU_FIELD_NA.to_string(),
            memory_utilization: GPU_FIELD_NA.to_string(),
            temperature: GPU_FIELD_NA.to_string(),
            fan_speed: GPU_FIELD_NA.to_string(),
            power_draw: GPU_FIELD_NA.to_string(),
            power_limit: GPU_FIELD_NA.to_string(),
        }
    }
}

impl Default for ContainerGpuUsage {
    fn default() -> Self {
        Self::none()
    }
}

/// Module name used when task metadata cannot be resolved
pub const UNKNOWN_MODULE: &str = "Unknown";

/// Column order of the persisted time series; append-only, never reordered
pub const RECORD_HEADER: [&str; 22] = [
    "task_id",
    "job_id",
    "module_name",
    "timestamp",
    "container",
    "cpu_percent",
    "mem_usage",
    "mem_percent",
    "net_io",
    "block_io",
    "pids",
    "gpu_count",
    "gpu_ids",
    "gpu_names",
    "gpu_memory_used",
    "gpu_memory_total",
    "gpu_utilization",
    "gpu_memory_utilization",
    "gpu_temperature",
    "gpu_fan_speed",
    "gpu_power_draw",
    "gpu_power_limit",
];

/// One fully enriched time-series row: container identity + resource
/// sample + resolved module + attributed GPU usage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringRecord {
    pub task_id: u64,
    pub job_id: u64,
    pub module_name: String,
    pub sample: ResourceSample,
    pub gpu: ContainerGpuUsage,
}

impl MonitoringRecord {
    /// Render the record as the 22 column values in `RECORD_HEADER` order
    pub fn to_row(&self) -> [String; 22] {
        [
            self.task_id.to_string(),
            self.job_id.to_string(),
            self.module_name.clone(),
            self.sample.timestamp.clone(),
            self.sample.container.clone(),
            self.sample.cpu_percent.clone(),
            self.sample.mem_usage.clone(),
            self.sample.mem_percent.clone(),
            self.sample.net_io.clone(),
            self.sample.block_io.clone(),
            self.sample.pid_count.to_string(),
            self.gpu.count.to_string(),
            self.gpu.ids.clone(),
            self.gpu.names.clone(),
            self.gpu.memory_used.clone(),
            self.gpu.memory_total.clone(),
            self.gpu.utilization.clone(),
            self.gpu.memory_utilization.clone(),
            self.gpu.temperature.clone(),
            self.gpu.fan_speed.clone(),
            self.gpu.power_draw.clone(),
            self.gpu.power_limit.clone(),
        ]
    }
}
