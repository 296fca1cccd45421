//! Error taxonomy for trace reconstruction
//!
//! Only malformed input is an error. Unresolved task tokens and residency
//! mismatches are handled inside the engine and never surface here.

use crate::event::CpuId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a reconstruction run
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("CPU {cpu} row {row}: opcode token '{token}' is not in pc_map")]
    UnknownOpcode { cpu: CpuId, row: usize, token: String },

    #[error("CPU {cpu} row {row}: expected 3 fields (opcode,timestamp,task), got {fields}")]
    MalformedRow { cpu: CpuId, row: usize, fields: usize },

    #[error("CPU {cpu} row {row}: invalid timestamp '{value}'")]
    InvalidTimestamp { cpu: CpuId, row: usize, value: String },

    #[error("CPU {cpu} row {row}: unreadable row: {source}")]
    UnreadableRow {
        cpu: CpuId,
        row: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("CPU {cpu}: stream has no header row")]
    MissingHeader { cpu: CpuId },

    #[error("Invalid run descriptor: {0}")]
    Descriptor(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("MessagePack error: {0}")]
    MsgPack(#[from] rmp_serde::encode::Error),
}

impl ReconError {
    /// Processor and data row of the offending record, when known
    pub fn location(&self) -> Option<(CpuId, usize)> {
        match self {
            ReconError::UnknownOpcode { cpu, row, .. }
            | ReconError::MalformedRow { cpu, row, .. }
            | ReconError::InvalidTimestamp { cpu, row, .. }
            | ReconError::UnreadableRow { cpu, row, .. } => Some((*cpu, *row)),
            _ => None,
        }
    }
}

/// Result type for reconstruction operations
pub type Result<T> = std::result::Result<T, ReconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_opcode_message_names_record() {
        let err = ReconError::UnknownOpcode {
            cpu: 3,
            row: 17,
            token: "0x4011a0".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("CPU 3"));
        assert!(msg.contains("row 17"));
        assert!(msg.contains("0x4011a0"));
        assert_eq!(err.location(), Some((3, 17)));
    }

    #[test]
    fn test_descriptor_error_has_no_location() {
        let err = ReconError::Descriptor("empty csvs".to_string());
        assert_eq!(err.location(), None);
    }
}
