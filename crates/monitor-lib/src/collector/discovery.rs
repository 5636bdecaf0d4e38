//! Workload container discovery
//!
//! Filters the runtime's container list down to names carrying the
//! configured workload prefix and extracts the task and job identifiers
//! embedded in them. A name that matches the prefix but not the naming
//! scheme is logged and dropped; it never fails the cycle.

use super::{ContainerRuntime, ContainerListing};
use crate::error::MonitorError;
use crate::models::WorkloadContainer;
use tracing::{debug, info, warn};

/// Parse task and job identifiers out of a container name
///
/// The name is split on '_'; after the prefix tokens, the first numeric
/// segment is the task id and the next numeric segment is the job id.
/// This covers both observed shapes, with and without a worker-type
/// token: `wemol_rc_task_gpu_<task>_<job>_<seq>` and
/// `wemol_rc_task_<task>_<job>_<seq>`. Trailing segments are ignored.
pub fn parse_container_name(name: &str, prefix: &str) -> Option<(u64, u64)> {
    if !name.starts_with(prefix) {
        return None;
    }

    let prefix_tokens = prefix.split('_').count();
    let segments: Vec<&str> = name.split('_').collect();
    if segments.len() < prefix_tokens + 2 {
        return None;
    }

    let mut numbers = segments[prefix_tokens..]
        .iter()
        .filter_map(|s| s.parse::<u64>().ok());
    let task_id = numbers.next()?;
    let job_id = numbers.next()?;
    Some((task_id, job_id))
}

/// List running workload containers with parsed identifiers
pub async fn discover_workload_containers(
    runtime: &dyn ContainerRuntime,
    prefix: &str,
) -> Result<Vec<WorkloadContainer>, MonitorError> {
    let listings = runtime.list_containers().await?;

    let mut containers = Vec::new();
    for ContainerListing { id, name } in listings {
        if !name.starts_with(prefix) {
            debug!(container = %name, "skipping non-workload container");
            continue;
        }
        match parse_container_name(&name, prefix) {
            Some((task_id, job_id)) => {
                debug!(container = %name, task_id, job_id, "parsed workload container");
                containers.push(WorkloadContainer {
                    container_id: id,
                    name,
                    task_id,
                    job_id,
                });
            }
            None => {
                warn!(
                    error = %MonitorError::NameParse(name.clone()),
                    "skipping container with unparseable name"
                );
            }
        }
    }

    info!(count = containers.len(), "workload containers discovered");
    Ok(containers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "wemol_rc_task";

    #[test]
    fn parse_name_with_worker_type() {
        let parsed = parse_container_name("wemol_rc_task_gpu_132178_182060_334177", PREFIX);
        assert_eq!(parsed, Some((132178, 182060)));
    }

    #[test]
    fn parse_name_without_worker_type() {
        let parsed = parse_container_name("wemol_rc_task_132178_182060_334177", PREFIX);
        assert_eq!(parsed, Some((132178, 182060)));
    }

    #[test]
    fn parse_name_ignores_trailing_segments() {
        let parsed = parse_container_name("wemol_rc_task_cpu_7_8_9_10_11", PREFIX);
        assert_eq!(parsed, Some((7, 8)));
    }

    #[test]
    fn parse_name_rejects_wrong_prefix() {
        assert_eq!(parse_container_name("redis_1_2_3", PREFIX), None);
    }

    #[test]
    fn parse_name_rejects_too_few_segments() {
        assert_eq!(parse_container_name("wemol_rc_task_1", PREFIX), None);
    }

    #[test]
    fn parse_name_rejects_missing_second_number() {
        assert_eq!(parse_container_name("wemol_rc_task_gpu_132178_job", PREFIX), None);
    }
}
