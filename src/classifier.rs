//! Event classification
//!
//! Maps a raw `(opcode_token, task_token)` pair to an [`EventKind`] and a
//! [`TaskRef`] using the two lookup tables of a run. A missing opcode token is
//! a malformed trace; a missing task token is the normal "not yet known" case.

use crate::event::{EventKind, TaskId, UNKNOWN_TASK};
use fnv::FnvHashMap;
use std::collections::BTreeMap;

/// Task identity of a classified record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskRef {
    /// Token found in `task_map`
    Resolved(TaskId),
    /// Token absent from `task_map`; the record must be buffered
    Unresolved,
}

impl TaskRef {
    pub fn resolved(&self) -> Option<TaskId> {
        match self {
            TaskRef::Resolved(tid) => Some(*tid),
            TaskRef::Unresolved => None,
        }
    }
}

/// Output of [`EventClassifier::classify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub kind: EventKind,
    pub task: TaskRef,
}

/// Opcode token that is not part of the run's `pc_map`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOpcode(pub String);

/// Immutable lookup tables for one run
#[derive(Debug, Clone, Default)]
pub struct EventClassifier {
    opcodes: FnvHashMap<String, EventKind>,
    tasks: FnvHashMap<String, TaskId>,
}

impl EventClassifier {
    /// Build a classifier from already-validated tables
    ///
    /// Tokens mapped to the unknown sentinel stay unresolved.
    pub fn new(opcode_map: &BTreeMap<String, EventKind>, task_map: &BTreeMap<String, TaskId>) -> Self {
        Self {
            opcodes: opcode_map
                .iter()
                .map(|(token, kind)| (token.trim().to_string(), *kind))
                .collect(),
            tasks: task_map
                .iter()
                .filter(|(_, tid)| **tid != UNKNOWN_TASK)
                .map(|(token, tid)| (token.trim().to_string(), *tid))
                .collect(),
        }
    }

    /// Classify one raw record
    ///
    /// Pure lookup: the same tokens always produce the same result.
    pub fn classify(&self, opcode_token: &str, task_token: &str) -> Result<Classified, UnknownOpcode> {
        let opcode_token = opcode_token.trim();
        let kind = *self
            .opcodes
            .get(opcode_token)
            .ok_or_else(|| UnknownOpcode(opcode_token.to_string()))?;

        let task = match self.tasks.get(task_token.trim()) {
            Some(tid) => TaskRef::Resolved(*tid),
            None => TaskRef::Unresolved,
        };

        Ok(Classified { kind, task })
    }

    /// Resolve a task token without classifying an opcode
    pub fn resolve_task(&self, task_token: &str) -> TaskRef {
        self.tasks
            .get(task_token.trim())
            .map_or(TaskRef::Unresolved, |tid| TaskRef::Resolved(*tid))
    }

    pub fn opcode_count(&self) -> usize {
        self.opcodes.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}
