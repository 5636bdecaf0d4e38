//! Docker CLI backed container runtime
//!
//! Uses minimal `--format` templates so output lines carry no table
//! alignment or whitespace-ambiguous separators. Each tool output has its
//! own named parser returning a typed value or `None`; format drift is
//! handled here and nowhere else.

use super::{ContainerListing, ContainerRuntime};
use crate::error::MonitorError;
use crate::exec::command_stdout;
use crate::models::ResourceSample;
use async_trait::async_trait;
use std::collections::HashSet;

/// Format template for `docker ps`: one "<id> <name>" pair per line
const PS_FORMAT: &str = "{{.ID}} {{.Names}}";

/// Format template for `docker stats`: one space-separated data line
const STATS_FORMAT: &str =
    "{{.Container}} {{.CPUPerc}} {{.MemUsage}} {{.MemPerc}} {{.NetIO}} {{.BlockIO}} {{.PIDs}}";

pub struct DockerCliRuntime;

impl DockerCliRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DockerCliRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerListing>, MonitorError> {
        let stdout = command_stdout("docker", &["ps", "--format", PS_FORMAT])
            .await
            .map_err(MonitorError::Discovery)?;

        Ok(stdout.lines().filter_map(parse_listing_line).collect())
    }

    async fn sample_stats(&self, container_name: &str) -> Result<ResourceSample, MonitorError> {
        let stdout = command_stdout(
            "docker",
            &[
                "stats",
                "--no-stream",
                "--format",
                STATS_FORMAT,
                container_name,
            ],
        )
        .await
        .map_err(|reason| MonitorError::Stats {
            container: container_name.to_string(),
            reason,
        })?;

        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| MonitorError::Stats {
                container: container_name.to_string(),
                reason: "empty stats output".to_string(),
            })?;

        parse_stats_line(line).ok_or_else(|| MonitorError::Stats {
            container: container_name.to_string(),
            reason: format!("malformed stats line: `{line}`"),
        })
    }

    async fn list_pids(&self, container_name: &str) -> Result<HashSet<u32>, MonitorError> {
        let stdout = command_stdout("docker", &["top", container_name])
            .await
            .map_err(|reason| MonitorError::Stats {
                container: container_name.to_string(),
                reason,
            })?;

        Ok(parse_top_output(&stdout))
    }
}

/// Parse one `docker ps` line: "<id> <name>"
pub fn parse_listing_line(line: &str) -> Option<ContainerListing> {
    let mut parts = line.trim().splitn(2, ' ');
    let id = parts.next()?.trim();
    let name = parts.next()?.trim();
    if id.is_empty() || name.is_empty() {
        return None;
    }
    Some(ContainerListing {
        id: id.to_string(),
        name: name.to_string(),
    })
}

/// Parse one `docker stats` data line
///
/// The three compound columns are reported as "x / y", so a line tokenizes
/// into exactly 13 whitespace-separated fields with "/" at fixed
/// positions. The compound values are re-joined verbatim.
pub fn parse_stats_line(line: &str) -> Option<ResourceSample> {
    let t: Vec<&str> = line.split_whitespace().collect();
    if t.len() < 13 || t[3] != "/" || t[7] != "/" || t[10] != "/" {
        return None;
    }

    Some(ResourceSample {
        container: t[0].to_string(),
        cpu_percent: t[1].to_string(),
        mem_usage: format!("{} / {}", t[2], t[4]),
        mem_percent: t[5].to_string(),
        net_io: format!("{} / {}", t[6], t[8]),
        block_io: format!("{} / {}", t[9], t[11]),
        pid_count: t[12].parse().ok()?,
        timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}

/// Parse `docker top` output into the set of in-container pids
///
/// The first line is a header; the PID is the second column of each
/// following row (UID PID PPID C STIME TTY TIME CMD).
pub fn parse_top_output(output: &str) -> HashSet<u32> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            parts.next()?;
            parts.next()?.parse().ok()
        })
        .collect()
}
