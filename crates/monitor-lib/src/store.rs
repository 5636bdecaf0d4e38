//! Per-module append-only persistence
//!
//! Each (module, task_id) pair owns one CSV sink at
//! `<output_dir>/<sanitized module>/<task_id>.csv`. The 22-column header
//! is written only when the destination is empty at first open; every
//! append is flushed immediately, so a crash can lose at most the
//! in-flight row. A sink that cannot be created falls back to a file
//! directly under the output directory instead of dropping the record.

use crate::error::MonitorError;
use crate::models::{MonitoringRecord, RECORD_HEADER};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default output directory for the per-module time series
pub const DEFAULT_OUTPUT_DIR: &str = "module_resource";

/// Replacement for characters that are illegal in directory names
const SUBSTITUTE: char = '_';

/// Make a module name safe to use as a directory name
///
/// Illegal filesystem characters become '_', whitespace runs collapse to
/// a single space and the result is trimmed; an empty result maps to
/// "Unknown_Module". The function is idempotent and total, so distinct
/// readable names stay distinct wherever the character set allows.
pub fn sanitize_module_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => SUBSTITUTE,
            _ => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "Unknown_Module".to_string()
    } else {
        collapsed
    }
}

/// One open append destination
struct ModuleSink {
    file: File,
    path: PathBuf,
}

/// Owns all sink handles and the sanitization rules; exactly one writer
/// exists per sink because the store itself is the single writer.
pub struct ModuleStore {
    output_dir: PathBuf,
    sinks: HashMap<(String, u64), ModuleSink>,
}

impl ModuleStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            sinks: HashMap::new(),
        }
    }

    /// Append one record to its (module, task) sink
    ///
    /// Sink creation failure is logged and the row goes to the top-level
    /// fallback location; only failure of both paths surfaces as an
    /// error, and even that is non-fatal to the cycle.
    pub fn append(&mut self, record: &MonitoringRecord) -> Result<(), MonitorError> {
        let module_dir = sanitize_module_name(&record.module_name);
        let key = (module_dir.clone(), record.task_id);

        if !self.sinks.contains_key(&key) {
            match self.open_sink(&module_dir, record.task_id) {
                Ok(sink) => {
                    self.sinks.insert(key.clone(), sink);
                }
                Err(e) => {
                    warn!(
                        task_id = record.task_id,
                        module = %module_dir,
                        error = %e,
                        "failed to open module sink, using fallback location"
                    );
                    return self.append_fallback(record);
                }
            }
        }

        let sink = match self.sinks.get_mut(&key) {
            Some(sink) => sink,
            None => return self.append_fallback(record),
        };
        if let Err(e) = write_row(&mut sink.file, &record.to_row()) {
            // Drop the handle so the next append reopens from scratch.
            if let Some(sink) = self.sinks.remove(&key) {
                warn!(path = %sink.path.display(), error = %e, "sink write failed");
            }
            return Err(MonitorError::Persistence {
                task_id: record.task_id,
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    /// Open (and create if needed) the sink for one module/task pair
    fn open_sink(&self, module_dir: &str, task_id: u64) -> std::io::Result<ModuleSink> {
        let dir = self.output_dir.join(module_dir);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{task_id}.csv"));
        let file = open_with_header(&path)?;
        info!(path = %path.display(), "opened module sink");
        Ok(ModuleSink { file, path })
    }

    /// Last-resort destination directly under the output directory
    fn append_fallback(&mut self, record: &MonitoringRecord) -> Result<(), MonitorError> {
        let to_persistence = |e: std::io::Error| MonitorError::Persistence {
            task_id: record.task_id,
            reason: e.to_string(),
        };

        std::fs::create_dir_all(&self.output_dir).map_err(to_persistence)?;
        let path = self.output_dir.join(format!("{}.csv", record.task_id));
        let mut file = open_with_header(&path).map_err(to_persistence)?;
        write_row(&mut file, &record.to_row()).map_err(to_persistence)
    }

    /// Flush every open sink; called once at shutdown
    pub fn flush_all(&mut self) {
        for sink in self.sinks.values_mut() {
            if let Err(e) = sink.file.flush() {
                warn!(path = %sink.path.display(), error = %e, "failed to flush sink");
            }
        }
        debug!(sinks = self.sinks.len(), "flushed all module sinks");
    }
}

/// Open a file for appending, writing the header row if it is empty
fn open_with_header(path: &Path) -> std::io::Result<File> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        write_row(&mut file, &RECORD_HEADER.map(String::from))?;
    }
    Ok(file)
}

/// Write one CSV row and flush it
fn write_row(file: &mut File, fields: &[String; 22]) -> std::io::Result<()> {
    let line = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()
}

/// Quote a field when it contains a separator, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContainerGpuUsage, ResourceSample};
    use tempfile::TempDir;

    fn record(module: &str, task_id: u64) -> MonitoringRecord {
        MonitoringRecord {
            task_id,
            job_id: 182060,
            module_name: module.to_string(),
            sample: ResourceSample {
                container: format!("wemol_rc_task_gpu_{task_id}_182060_334177"),
                cpu_percent: "12.34%".to_string(),
                mem_usage: "951.7MiB / 250.3GiB".to_string(),
                mem_percent: "0.37%".to_string(),
                net_io: "746B / 0B".to_string(),
                block_io: "848kB / 254MB".to_string(),
                pid_count: 12,
                timestamp: "2024-05-01 10:00:00".to_string(),
            },
            gpu: ContainerGpuUsage::none(),
        }
    }

    /// Minimal CSV line parser used to check the round-trip property
    fn parse_csv_line(line: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut quoted = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '"' if quoted => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        current.push('"');
                    } else {
                        quoted = false;
                    }
                }
                '"' => quoted = true,
                ',' if !quoted => fields.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        fields.push(current);
        fields
    }

    #[test]
    fn sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_module_name("AF2/Fold:Run?"), "AF2_Fold_Run_");
        assert_eq!(sanitize_module_name(r#"a<b>c"d\e|f*g"#), "a_b_c_d_e_f_g");
    }

    #[test]
    fn sanitize_collapses_whitespace_and_trims() {
        assert_eq!(sanitize_module_name("  Protein   Docking  "), "Protein Docking");
    }

    #[test]
    fn sanitize_empty_maps_to_default() {
        assert_eq!(sanitize_module_name(""), "Unknown_Module");
        assert_eq!(sanitize_module_name("   "), "Unknown_Module");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for name in ["AF2/Fold:Run?", "  a  b ", "", "Unknown", "模块 名"] {
            let once = sanitize_module_name(name);
            assert_eq!(sanitize_module_name(&once), once);
        }
    }

    #[test]
    fn header_written_exactly_once() {
        let dir = TempDir::new().unwrap();
        let mut store = ModuleStore::new(dir.path());

        store.append(&record("Docking", 132178)).unwrap();
        store.append(&record("Docking", 132178)).unwrap();

        let contents =
            std::fs::read_to_string(dir.path().join("Docking").join("132178.csv")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("task_id,job_id,module_name"));
        assert!(lines[1].starts_with("132178,182060,Docking"));
    }

    #[test]
    fn header_not_rewritten_across_store_restarts() {
        let dir = TempDir::new().unwrap();

        let mut store = ModuleStore::new(dir.path());
        store.append(&record("Docking", 132178)).unwrap();
        drop(store);

        let mut store = ModuleStore::new(dir.path());
        store.append(&record("Docking", 132178)).unwrap();

        let contents =
            std::fs::read_to_string(dir.path().join("Docking").join("132178.csv")).unwrap();
        let headers = contents
            .lines()
            .filter(|l| l.starts_with("task_id,"))
            .count();
        assert_eq!(headers, 1);
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn unknown_module_lands_in_unknown_directory() {
        let dir = TempDir::new().unwrap();
        let mut store = ModuleStore::new(dir.path());

        store.append(&record("Unknown", 99)).unwrap();

        assert!(dir.path().join("Unknown").join("99.csv").exists());
    }

    #[test]
    fn written_row_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut store = ModuleStore::new(dir.path());

        let mut rec = record("Protein, Docking", 132178);
        rec.gpu.names = "NVIDIA GeForce RTX 3090,NVIDIA GeForce RTX 3090".to_string();
        rec.gpu.count = 2;
        store.append(&rec).unwrap();

        let contents = std::fs::read_to_string(
            dir.path().join("Protein, Docking").join("132178.csv"),
        )
        .unwrap();
        let data_line = contents.lines().nth(1).unwrap();
        let parsed = parse_csv_line(data_line);

        assert_eq!(parsed.len(), 22);
        assert_eq!(parsed, rec.to_row().to_vec());
    }

    #[test]
    fn falls_back_to_output_dir_when_module_dir_is_blocked() {
        let dir = TempDir::new().unwrap();
        // A file squatting on the module directory name forces
        // create_dir_all to fail.
        std::fs::write(dir.path().join("Docking"), "not a directory").unwrap();

        let mut store = ModuleStore::new(dir.path());
        store.append(&record("Docking", 132178)).unwrap();

        let fallback = dir.path().join("132178.csv");
        let contents = std::fs::read_to_string(fallback).unwrap();
        assert!(contents.lines().next().unwrap().starts_with("task_id,"));
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn distinct_tasks_get_distinct_sinks() {
        let dir = TempDir::new().unwrap();
        let mut store = ModuleStore::new(dir.path());

        store.append(&record("Docking", 1001)).unwrap();
        store.append(&record("Docking", 1002)).unwrap();
        store.flush_all();

        assert!(dir.path().join("Docking").join("1001.csv").exists());
        assert!(dir.path().join("Docking").join("1002.csv").exists());
    }
}
