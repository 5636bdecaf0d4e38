//! Task metadata resolution
//!
//! A task's module name lives in a `task.json` file under one of several
//! worker-type roots, at a path derived from the digits of the task id.
//! Resolution outcomes are cached for the lifetime of the process, so
//! each distinct task id touches the filesystem at most once no matter
//! how many cycles observe its container; a task's module assignment
//! never changes while it runs, and an "Unknown" outcome is cached the
//! same way to keep filesystem load flat through transient failures.

use crate::error::MonitorError;
use crate::models::UNKNOWN_MODULE;
use dashmap::DashMap;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Worker-type roots probed in order; first existing file wins
const WORKER_TYPES: [&str; 4] = ["GPU", "CPU", "AF2", "ALL"];

/// Shape of the on-disk `task.json`, reduced to the field we consume
#[derive(Debug, Deserialize)]
struct TaskFile {
    #[serde(rename = "Module")]
    module: ModuleSection,
}

#[derive(Debug, Deserialize)]
struct ModuleSection {
    #[serde(rename = "Name")]
    name: String,
}

/// Resolves task ids to module names with a process-lifetime cache
pub struct MetadataResolver {
    /// Directory holding the `Worker.<TYPE>` trees
    rcall_root: PathBuf,
    /// task_id -> module name; entries are never evicted
    cache: DashMap<u64, String>,
}

impl MetadataResolver {
    pub fn new(rcall_root: impl Into<PathBuf>) -> Self {
        Self {
            rcall_root: rcall_root.into(),
            cache: DashMap::new(),
        }
    }

    /// Resolve the module name for a task, probing the filesystem only on
    /// the first call per task id
    pub async fn resolve(&self, task_id: u64) -> String {
        if let Some(name) = self.cache.get(&task_id) {
            return name.clone();
        }

        let name = self.probe(task_id).await;
        self.cache.insert(task_id, name.clone());
        name
    }

    async fn probe(&self, task_id: u64) -> String {
        for worker_type in WORKER_TYPES {
            let path = self.task_file_path(worker_type, task_id);
            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => match serde_json::from_str::<TaskFile>(&contents) {
                    Ok(task) => {
                        info!(
                            task_id,
                            module = %task.module.name,
                            path = %path.display(),
                            "resolved task module"
                        );
                        return task.module.name;
                    }
                    Err(e) => {
                        let err = MonitorError::Metadata {
                            task_id,
                            reason: format!("malformed task file {}: {e}", path.display()),
                        };
                        warn!(error = %err, "task module unresolved");
                        return UNKNOWN_MODULE.to_string();
                    }
                },
                Err(_) => {
                    debug!(task_id, path = %path.display(), "no task file at candidate path");
                }
            }
        }

        let err = MonitorError::Metadata {
            task_id,
            reason: "task file not found under any worker root".to_string(),
        };
        warn!(error = %err, "task module unresolved");
        UNKNOWN_MODULE.to_string()
    }

    /// Candidate path for one worker type:
    /// `<root>/Worker.<TYPE>/work_blob/<prev2>/<last2>/<task_id>/task.json`
    fn task_file_path(&self, worker_type: &str, task_id: u64) -> PathBuf {
        let (prev2, last2) = bucket_components(task_id);
        self.rcall_root
            .join(format!("Worker.{worker_type}"))
            .join("work_blob")
            .join(prev2)
            .join(last2)
            .join(task_id.to_string())
            .join("task.json")
    }

    #[cfg(test)]
    pub(crate) fn candidate_paths(&self, task_id: u64) -> Vec<PathBuf> {
        WORKER_TYPES
            .iter()
            .map(|t| self.task_file_path(t, task_id))
            .collect()
    }
}

/// Derive the two bucket directories from the task id's decimal digits:
/// the last two digits and the two before them. Ids shorter than four
/// digits are left-padded with '0' for bucketing only; the leaf keeps the
/// unpadded id.
fn bucket_components(task_id: u64) -> (String, String) {
    let digits = format!("{task_id:04}");
    let last2 = digits[digits.len() - 2..].to_string();
    let prev2 = digits[digits.len() - 4..digits.len() - 2].to_string();
    (prev2, last2)
}

/// Production location of the worker trees
pub const DEFAULT_RCALL_ROOT: &str = "/data/PRG/RCall";

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    async fn write_task_file(root: &Path, worker_type: &str, task_id: u64, module: &str) {
        let resolver = MetadataResolver::new(root);
        let path = resolver.task_file_path(worker_type, task_id);
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        let body = format!(r#"{{"Module": {{"Name": "{module}"}}, "JobId": 182060}}"#);
        tokio::fs::write(&path, body).await.unwrap();
    }

    #[test]
    fn bucket_components_long_id() {
        // 132178 -> .../21/78/132178/task.json
        assert_eq!(bucket_components(132178), ("21".to_string(), "78".to_string()));
    }

    #[test]
    fn bucket_components_short_id_left_padded() {
        assert_eq!(bucket_components(7), ("00".to_string(), "07".to_string()));
        assert_eq!(bucket_components(123), ("01".to_string(), "23".to_string()));
    }

    #[test]
    fn candidate_paths_probe_all_worker_types_in_order() {
        let resolver = MetadataResolver::new(DEFAULT_RCALL_ROOT);
        let paths: Vec<String> = resolver
            .candidate_paths(132178)
            .iter()
            .map(|p| p.display().to_string())
            .collect();

        assert_eq!(
            paths[0],
            "/data/PRG/RCall/Worker.GPU/work_blob/21/78/132178/task.json"
        );
        assert!(paths[1].contains("Worker.CPU"));
        assert!(paths[2].contains("Worker.AF2"));
        assert!(paths[3].contains("Worker.ALL"));
    }

    #[tokio::test]
    async fn resolve_reads_module_name_from_first_matching_root() {
        let dir = TempDir::new().unwrap();
        write_task_file(dir.path(), "CPU", 132178, "Docking").await;

        let resolver = MetadataResolver::new(dir.path());
        assert_eq!(resolver.resolve(132178).await, "Docking");
    }

    #[tokio::test]
    async fn resolve_missing_file_yields_unknown() {
        let dir = TempDir::new().unwrap();
        let resolver = MetadataResolver::new(dir.path());
        assert_eq!(resolver.resolve(99).await, UNKNOWN_MODULE);
    }

    #[tokio::test]
    async fn resolve_malformed_file_yields_unknown() {
        let dir = TempDir::new().unwrap();
        let resolver = MetadataResolver::new(dir.path());
        let path = resolver.task_file_path("GPU", 55);
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&path, "not json").await.unwrap();

        assert_eq!(resolver.resolve(55).await, UNKNOWN_MODULE);
    }

    #[tokio::test]
    async fn unresolved_outcome_is_cached_without_retry() {
        let dir = TempDir::new().unwrap();
        let resolver = MetadataResolver::new(dir.path());
        assert_eq!(resolver.resolve(132178).await, UNKNOWN_MODULE);

        // The file appearing later must not change the cached outcome.
        write_task_file(dir.path(), "GPU", 132178, "Docking").await;
        assert_eq!(resolver.resolve(132178).await, UNKNOWN_MODULE);
    }

    #[tokio::test]
    async fn successful_outcome_is_cached() {
        let dir = TempDir::new().unwrap();
        write_task_file(dir.path(), "GPU", 132178, "Docking").await;

        let resolver = MetadataResolver::new(dir.path());
        assert_eq!(resolver.resolve(132178).await, "Docking");

        // Removing the file must not invalidate the cache.
        tokio::fs::remove_dir_all(dir.path().join("Worker.GPU"))
            .await
            .unwrap();
        assert_eq!(resolver.resolve(132178).await, "Docking");
    }
}
