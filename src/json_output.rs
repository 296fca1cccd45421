//! Serialized artifacts of a reconstruction run
//!
//! The canonical form is pretty-printed JSON with two top-level mappings,
//! `cpu` and `task`, keyed in numeric order. Identical input always yields
//! byte-identical output, so the SHA-256 digest of the canonical bytes can
//! be used as a cache key.

use crate::error::Result;
use crate::event::Timestamp;
use crate::intervals::{IntervalSet, OccupancyInterval, QueuePhaseInterval};
use crate::model::NormalizedModel;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Canonical JSON (2-space indent, trailing newline)
pub fn to_json(model: &NormalizedModel) -> Result<String> {
    let mut json = serde_json::to_string_pretty(model)?;
    json.push('\n');
    Ok(json)
}

/// Parse a model previously written with [`to_json`]
pub fn from_json(content: &str) -> Result<NormalizedModel> {
    Ok(serde_json::from_str(content)?)
}

/// MessagePack encoding with named fields
pub fn to_msgpack(model: &NormalizedModel) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(model)?)
}

/// Hex SHA-256 of serialized bytes
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Derived intervals as written by `--intervals`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonIntervals {
    /// Format name
    pub format: String,
    /// Origin subtracted from every time below
    pub time_offset: Timestamp,
    pub occupancy: Vec<OccupancyInterval>,
    pub queue_phases: Vec<QueuePhaseInterval>,
}

impl JsonIntervals {
    pub fn new(set: &IntervalSet, time_offset: Timestamp) -> Self {
        Self {
            format: "schedrecon-intervals-v1".to_string(),
            time_offset,
            occupancy: set.occupancy.clone(),
            queue_phases: set.queue_phases.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::intervals::{derive_intervals, RegionOfInterest};

    fn model() -> NormalizedModel {
        let mut m = NormalizedModel::new();
        m.emit(10, EventKind::Jmp, 0, 1);
        m.emit(20, EventKind::Yield, 0, 1);
        m
    }

    #[test]
    fn test_json_layout() {
        let json = to_json(&model()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["cpu"]["0"][0]["evt"], "jmp");
        assert_eq!(parsed["cpu"]["0"][1]["tid"], 1);
        assert_eq!(parsed["task"]["1"][1]["cpu"], 0);
        assert!(parsed["task"]["-1"].as_array().unwrap().is_empty());
        assert!(json.ends_with("}\n"));
        assert!(json.contains("\n  \"cpu\": {"));
    }

    #[test]
    fn test_json_parses_back() {
        let m = model();
        let back = from_json(&to_json(&m).unwrap()).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = to_json(&model()).unwrap();
        let b = to_json(&model()).unwrap();
        assert_eq!(digest(a.as_bytes()), digest(b.as_bytes()));
        assert_eq!(digest(a.as_bytes()).len(), 64);
    }

    #[test]
    fn test_msgpack_decodes() {
        let bytes = to_msgpack(&model()).unwrap();
        let back: NormalizedModel = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back.cpu_timeline(0).unwrap().len(), 2);
    }

    #[test]
    fn test_intervals_document() {
        let set = derive_intervals(&model(), 0, &RegionOfInterest::all());
        let doc = JsonIntervals::new(&set, 0);
        let parsed: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(parsed["format"], "schedrecon-intervals-v1");
        assert_eq!(parsed["occupancy"][0]["id"], "0_1_10_20");
    }
}
