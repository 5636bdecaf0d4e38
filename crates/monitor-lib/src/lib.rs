//! Core library for the wemol workload resource monitor
//!
//! This crate provides the sampling-and-enrichment pipeline:
//! - Workload container discovery and identifier extraction
//! - Point-in-time stats collection via the container runtime
//! - GPU-process-to-container correlation and telemetry aggregation
//! - Task metadata resolution with process-lifetime caching
//! - Per-module append-only CSV persistence
//! - Drift-compensated cycle pacing

pub mod collector;
pub mod error;
mod exec;
pub mod gpu;
pub mod metadata;
pub mod models;
pub mod store;

pub use collector::{ContainerRuntime, DockerCliRuntime, Recorder, RecorderConfig};
pub use error::MonitorError;
pub use gpu::{GpuTelemetry, NvidiaSmiTelemetry};
pub use metadata::MetadataResolver;
pub use models::*;
pub use store::ModuleStore;
