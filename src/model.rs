//! Normalized event model
//!
//! Two append-only timelines built by the reconstruction engine:
//! - `cpu`: processor id → `{time, evt, tid}` entries, in emission order
//! - `task`: task id → `{time, evt, cpu}` entries, in emission order
//!
//! Both are keyed by `BTreeMap` so serialization order is stable across runs.

use crate::event::{CpuId, EventKind, TaskId, Timestamp, UNKNOWN_TASK};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of a per-CPU timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuEntry {
    pub time: Timestamp,
    pub evt: EventKind,
    /// Task resident when the entry was emitted (`-1` if never resolved)
    pub tid: TaskId,
}

/// One entry of a per-task timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub time: Timestamp,
    pub evt: EventKind,
    /// Processor the task ran on or most recently left
    pub cpu: CpuId,
}

/// The exported artifact of a reconstruction run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedModel {
    cpu: BTreeMap<CpuId, Vec<CpuEntry>>,
    task: BTreeMap<TaskId, Vec<TaskEntry>>,
}

impl Default for NormalizedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl NormalizedModel {
    /// Empty model; the unknown-task bucket is always present
    pub fn new() -> Self {
        let mut task = BTreeMap::new();
        task.insert(UNKNOWN_TASK, Vec::new());
        Self {
            cpu: BTreeMap::new(),
            task,
        }
    }

    /// Make sure a processor appears in the output even with no entries
    pub(crate) fn register_cpu(&mut self, cpu: CpuId) {
        self.cpu.entry(cpu).or_default();
    }

    /// Append one entry to both timelines
    pub(crate) fn emit(&mut self, time: Timestamp, evt: EventKind, cpu: CpuId, tid: TaskId) {
        self.cpu.entry(cpu).or_default().push(CpuEntry { time, evt, tid });
        self.emit_task_only(time, evt, cpu, tid);
    }

    /// Append to the task timeline only (synthesized residency starts)
    pub(crate) fn emit_task_only(&mut self, time: Timestamp, evt: EventKind, cpu: CpuId, tid: TaskId) {
        self.task.entry(tid).or_default().push(TaskEntry { time, evt, cpu });
    }

    /// All per-CPU timelines, ordered by processor id
    pub fn cpu_timelines(&self) -> &BTreeMap<CpuId, Vec<CpuEntry>> {
        &self.cpu
    }

    /// All per-task timelines, ordered by task id (sentinel first)
    pub fn task_timelines(&self) -> &BTreeMap<TaskId, Vec<TaskEntry>> {
        &self.task
    }

    pub fn cpu_timeline(&self, cpu: CpuId) -> Option<&[CpuEntry]> {
        self.cpu.get(&cpu).map(Vec::as_slice)
    }

    pub fn task_timeline(&self, tid: TaskId) -> Option<&[TaskEntry]> {
        self.task.get(&tid).map(Vec::as_slice)
    }

    /// Entries attributed to the unknown-task sentinel
    pub fn unknown_entries(&self) -> &[TaskEntry] {
        self.task_timeline(UNKNOWN_TASK).unwrap_or(&[])
    }

    /// Total number of per-CPU entries
    pub fn cpu_entry_count(&self) -> usize {
        self.cpu.values().map(Vec::len).sum()
    }

    /// Total number of per-task entries (includes synthesized starts)
    pub fn task_entry_count(&self) -> usize {
        self.task.values().map(Vec::len).sum()
    }

    /// Known task ids, excluding the sentinel
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.task.keys().copied().filter(|tid| *tid != UNKNOWN_TASK)
    }
}
