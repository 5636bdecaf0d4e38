//! Container runtime data sources and the monitoring cycle
//!
//! The runtime is reached only through the [`ContainerRuntime`] trait so
//! the cycle loop and discovery logic can be exercised against
//! deterministic test doubles instead of a live Docker daemon.

mod docker;
mod discovery;
mod r#loop;


pub use discovery::{discover_workload_containers, parse_container_name};
pub use docker::DockerCliRuntime;
pub use r#loop::{Recorder, RecorderConfig};

use crate::error::MonitorError;
use crate::models::ResourceSample;
use std::collections::HashSet;

pub use async_trait::async_trait;

/// A container as listed by the runtime, before name parsing
#[derive(Debug, Clone)]
pub struct ContainerListing {
    pub id: String,
    pub name: String,
}

/// Point-in-time view of a container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List all running containers (id and name)
    async fn list_containers(&self) -> Result<Vec<ContainerListing>, MonitorError>;

    /// Fetch a single non-streaming stats sample for one container
    async fn sample_stats(&self, container_name: &str) -> Result<ResourceSample, MonitorError>;

    /// List OS-level process ids running inside one container
    async fn list_pids(&self, container_name: &str) -> Result<HashSet<u32>, MonitorError>;
}
