//! Run descriptors
//!
//! A run descriptor lists the per-CPU record files and the two lookup tables.
//! JSON and TOML are both accepted; the format is chosen by file extension.
//!
//! # Example (JSON)
//!
//! ```json
//! {
//!   "csvs": [[2, "cpu2.csv"], [3, "cpu3.csv"]],
//!   "pc_map": { "0x4011a0": "jmp", "0x4011c8": "yield" },
//!   "task_map": { "7ffff7a3c0": 1, "7ffff7a4c0": 2 },
//!   "seed": [{ "cpu": 2, "tid": 0, "time": 0, "evt": "spawn" }]
//! }
//! ```
//!
//! Relative CSV paths are resolved against the descriptor's directory.

use crate::classifier::EventClassifier;
use crate::error::{ReconError, Result};
use crate::event::{CpuId, EventKind, TaskId, Timestamp, UNKNOWN_TASK};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// One processor's record file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStreamSource")]
pub struct StreamSource {
    pub cpu: CpuId,
    pub path: PathBuf,
}

/// Processor id as written in descriptors (`2` or `"2"`)
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCpuId {
    Number(CpuId),
    Text(String),
}

/// Accepted spellings of a stream source: `[cpu, path]` or `{cpu, path}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawStreamSource {
    Pair(RawCpuId, PathBuf),
    Named { cpu: RawCpuId, path: PathBuf },
}

impl TryFrom<RawStreamSource> for StreamSource {
    type Error = String;

    fn try_from(raw: RawStreamSource) -> std::result::Result<Self, Self::Error> {
        let (cpu, path) = match raw {
            RawStreamSource::Pair(cpu, path) => (cpu, path),
            RawStreamSource::Named { cpu, path } => (cpu, path),
        };
        let cpu = match cpu {
            RawCpuId::Number(n) => n,
            RawCpuId::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| format!("invalid CPU id '{}'", s))?,
        };
        Ok(Self { cpu, path })
    }
}

/// Entry emitted before any stream is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedEntry {
    pub cpu: CpuId,
    pub tid: TaskId,
    #[serde(default)]
    pub time: Timestamp,
    #[serde(default = "default_seed_kind")]
    pub evt: EventKind,
}

fn default_seed_kind() -> EventKind {
    EventKind::Spawn
}

/// Everything a reconstruction run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDescriptor {
    /// Per-CPU record files, processed in this order
    pub csvs: Vec<StreamSource>,

    /// Opcode token → event kind
    pub pc_map: BTreeMap<String, EventKind>,

    /// Task token → task id (tokens mapped to -1 stay unresolved)
    #[serde(default)]
    pub task_map: BTreeMap<String, TaskId>,

    /// Entries known before tracing started (e.g. the root task's spawn)
    #[serde(default)]
    pub seed: Vec<SeedEntry>,

    /// Origin subtracted from timestamps when deriving intervals
    #[serde(default)]
    pub time_offset: Timestamp,
}

impl RunDescriptor {
    /// Create a descriptor with no streams
    pub fn new(pc_map: BTreeMap<String, EventKind>, task_map: BTreeMap<String, TaskId>) -> Self {
        Self {
            csvs: Vec::new(),
            pc_map,
            task_map,
            seed: Vec::new(),
            time_offset: 0,
        }
    }

    /// Append a processor stream
    pub fn with_stream(mut self, cpu: CpuId, path: impl Into<PathBuf>) -> Self {
        self.csvs.push(StreamSource {
            cpu,
            path: path.into(),
        });
        self
    }

    /// Add a seed entry
    pub fn with_seed(mut self, seed: SeedEntry) -> Self {
        self.seed.push(seed);
        self
    }

    /// Load, resolve relative paths and validate a descriptor file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ReconError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let mut descriptor = if is_toml {
            Self::from_toml_str(&content)?
        } else {
            Self::from_json_str(&content)?
        };

        if let Some(base) = path.parent() {
            descriptor.resolve_paths(base);
        }
        descriptor.validate().map_err(ReconError::Descriptor)?;
        Ok(descriptor)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Make relative stream paths relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        for source in &mut self.csvs {
            if source.path.is_relative() {
                source.path = base.join(&source.path);
            }
        }
    }

    /// Validate descriptor contents
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.csvs.is_empty() {
            return Err("csvs must list at least one CPU stream".to_string());
        }

        if self.pc_map.is_empty() {
            return Err("pc_map must not be empty".to_string());
        }

        if let Some((token, tid)) = self.task_map.iter().find(|(_, tid)| **tid < UNKNOWN_TASK) {
            return Err(format!(
                "task_map['{}'] = {}: task ids must be >= 0 (or -1 for unresolved)",
                token, tid
            ));
        }

        if let Some(token) = trimmed_collision(self.pc_map.keys()) {
            return Err(format!("pc_map has more than one entry for token '{}'", token));
        }

        if let Some(token) = trimmed_collision(self.task_map.keys()) {
            return Err(format!("task_map has more than one entry for token '{}'", token));
        }

        if let Some(seed) = self.seed.iter().find(|seed| seed.tid < 0) {
            return Err(format!(
                "seed entry on CPU {} has negative task id {}",
                seed.cpu, seed.tid
            ));
        }

        Ok(())
    }

    /// Lookup tables for this run
    pub fn classifier(&self) -> EventClassifier {
        EventClassifier::new(&self.pc_map, &self.task_map)
    }
}

/// First token that two keys share once surrounding whitespace is dropped
fn trimmed_collision<'a>(keys: impl Iterator<Item = &'a String>) -> Option<&'a str> {
    let mut seen = BTreeSet::new();
    keys.map(|key| key.trim()).find(|token| !seen.insert(*token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const JSON: &str = r#"{
        "csvs": [[2, "cpu2.csv"], ["3", "/abs/cpu3.csv"]],
        "pc_map": { "0x10": "jmp", "0x20": "yield", "0x30": "pushed" },
        "task_map": { "aa": 1, "bb": 2, "00": -1 }
    }"#;

    #[test]
    fn test_parse_json_pairs() {
        let d = RunDescriptor::from_json_str(JSON).unwrap();
        assert_eq!(d.csvs.len(), 2);
        assert_eq!(d.csvs[0].cpu, 2);
        assert_eq!(d.csvs[1].cpu, 3);
        assert_eq!(d.pc_map["0x20"], EventKind::Yield);
        assert_eq!(d.task_map["bb"], 2);
        assert!(d.seed.is_empty());
        assert_eq!(d.time_offset, 0);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_tables() {
        let toml = r#"
            time_offset = 100

            [[csvs]]
            cpu = 0
            path = "cpu0.csv"

            [pc_map]
            "0x10" = "jd"
            "0x20" = "park"

            [task_map]
            aa = 4

            [[seed]]
            cpu = 0
            tid = 0
        "#;
        let d = RunDescriptor::from_toml_str(toml).unwrap();
        assert_eq!(d.csvs[0].path, PathBuf::from("cpu0.csv"));
        assert_eq!(d.pc_map["0x10"], EventKind::Jd);
        assert_eq!(d.time_offset, 100);
        assert_eq!(
            d.seed[0],
            SeedEntry {
                cpu: 0,
                tid: 0,
                time: 0,
                evt: EventKind::Spawn
            }
        );
    }

    #[test]
    fn test_unknown_event_kind_rejected() {
        let json = r#"{"csvs": [[0, "a.csv"]], "pc_map": {"0x1": "teleport"}}"#;
        assert!(RunDescriptor::from_json_str(json).is_err());
    }

    #[test]
    fn test_invalid_cpu_id_rejected() {
        let json = r#"{"csvs": [["cpu0", "a.csv"]], "pc_map": {"0x1": "jmp"}}"#;
        assert!(RunDescriptor::from_json_str(json).is_err());
    }

    #[test]
    fn test_validate_rejects_negative_task_ids() {
        let mut d = RunDescriptor::from_json_str(JSON).unwrap();
        d.task_map.insert("cc".to_string(), -4);
        let err = d.validate().unwrap_err();
        assert!(err.contains("task_map['cc']"));
    }

    #[test]
    fn test_validate_rejects_whitespace_duplicate_tokens() {
        let mut d = RunDescriptor::from_json_str(JSON).unwrap();
        d.task_map.insert("dup".to_string(), 3);
        d.task_map.insert(" dup".to_string(), 4);
        let err = d.validate().unwrap_err();
        assert!(err.contains("task_map has more than one entry for token 'dup'"));

        let mut d = RunDescriptor::from_json_str(JSON).unwrap();
        d.pc_map.insert("0x99 ".to_string(), EventKind::Park);
        d.pc_map.insert("0x99".to_string(), EventKind::Yield);
        assert!(d.validate().unwrap_err().contains("pc_map"));
    }

    #[test]
    fn test_validate_rejects_empty_streams() {
        let d = RunDescriptor::new(BTreeMap::new(), BTreeMap::new());
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(JSON.as_bytes()).unwrap();

        let d = RunDescriptor::from_file(&path).unwrap();
        assert_eq!(d.csvs[0].path, dir.path().join("cpu2.csv"));
        assert_eq!(d.csvs[1].path, PathBuf::from("/abs/cpu3.csv"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = RunDescriptor::from_file("/nonexistent/run.json").unwrap_err();
        assert!(matches!(err, ReconError::Io { .. }));
    }

    #[test]
    fn test_builder() {
        let mut pc = BTreeMap::new();
        pc.insert("0x1".to_string(), EventKind::Jmp);
        let d = RunDescriptor::new(pc, BTreeMap::new())
            .with_stream(1, "cpu1.csv")
            .with_seed(SeedEntry {
                cpu: 1,
                tid: 0,
                time: 0,
                evt: EventKind::Spawn,
            });
        assert!(d.validate().is_ok());
        assert_eq!(d.classifier().opcode_count(), 1);
    }
}
