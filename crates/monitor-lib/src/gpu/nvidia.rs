//! nvidia-smi backed GPU telemetry
//!
//! Two queries per cycle, both `--format=csv,noheader,nounits`: one for
//! compute-process associations and one for per-device telemetry. The
//! device query carries the uuid so associations resolve to devices
//! without a separate lookup.

use super::GpuTelemetry;
use crate::error::MonitorError;
use crate::exec::command_stdout;
use crate::models::{GpuDeviceSnapshot, GpuProcess, GPU_FIELD_NA};
use async_trait::async_trait;

const COMPUTE_APPS_QUERY: &str = "--query-compute-apps=pid,gpu_uuid,used_memory";

const DEVICE_QUERY: &str = "--query-gpu=index,uuid,name,memory.total,memory.used,\
utilization.gpu,utilization.memory,temperature.gpu,fan.speed,power.draw,power.limit";

const CSV_FORMAT: &str = "--format=csv,noheader,nounits";

pub struct NvidiaSmiTelemetry;

impl NvidiaSmiTelemetry {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NvidiaSmiTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GpuTelemetry for NvidiaSmiTelemetry {
    async fn compute_processes(&self) -> Result<Vec<GpuProcess>, MonitorError> {
        let stdout = command_stdout("nvidia-smi", &[COMPUTE_APPS_QUERY, CSV_FORMAT])
            .await
            .map_err(MonitorError::GpuQuery)?;

        Ok(stdout.lines().filter_map(parse_compute_process_line).collect())
    }

    async fn devices(&self) -> Result<Vec<GpuDeviceSnapshot>, MonitorError> {
        let stdout = command_stdout("nvidia-smi", &[DEVICE_QUERY, CSV_FORMAT])
            .await
            .map_err(MonitorError::GpuQuery)?;

        Ok(stdout.lines().filter_map(parse_device_line).collect())
    }
}

/// Parse one compute-apps line: "pid, gpu_uuid, used_memory"
pub fn parse_compute_process_line(line: &str) -> Option<GpuProcess> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 3 {
        return None;
    }

    Some(GpuProcess {
        pid: parts[0].parse().ok()?,
        gpu_uuid: parts[1].to_string(),
        used_memory: parts[2].to_string(),
    })
}

/// Parse one device telemetry line (11 comma-separated columns)
///
/// Readings the driver cannot supply come back as "[Not Supported]" or
/// "[N/A]"; those are normalized to the "N/A" sentinel so the persisted
/// form is uniform.
pub fn parse_device_line(line: &str) -> Option<GpuDeviceSnapshot> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 11 {
        return None;
    }

    Some(GpuDeviceSnapshot {
        index: parts[0].parse().ok()?,
        uuid: parts[1].to_string(),
        name: parts[2].to_string(),
        memory_total: normalize_reading(parts[3]),
        memory_used: normalize_reading(parts[4]),
        utilization_gpu: normalize_reading(parts[5]),
        utilization_memory: normalize_reading(parts[6]),
        temperature: normalize_reading(parts[7]),
        fan_speed: normalize_reading(parts[8]),
        power_draw: normalize_reading(parts[9]),
        power_limit: normalize_reading(parts[10]),
    })
}

fn normalize_reading(value: &str) -> String {
    if value.is_empty() || value.starts_with('[') {
        GPU_FIELD_NA.to_string()
    } else {
        value.to_string()
    }
}
