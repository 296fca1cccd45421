//! Reconstruction engine
//!
//! Consumes classified records one processor stream at a time and maintains:
//! - per-processor residency and a FIFO pending buffer of records whose task
//!   token did not resolve
//! - a run-wide task table (last known CPU and location), carried across
//!   processor streams
//!
//! # Pending buffer
//!
//! ```text
//! CPU 3:  pushed(?) @105   processed(?) @110   yield(T7) @120
//!            │                  │                   │
//!            └── buffered ──────┘                   │ resolves T7
//!                                                   ▼
//!         emit pushed(T7)@105, processed(T7)@110, yield(T7)@120
//! ```
//!
//! Anything still buffered when a stream ends is emitted under the
//! [`UNKNOWN_TASK`] sentinel for that processor. It never carries over to the
//! next stream.

use crate::classifier::TaskRef;
use crate::event::{CpuId, EventKind, TaskId, TaskLocation, Timestamp, UNKNOWN_TASK};
use crate::model::NormalizedModel;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Which task, if any, occupies a processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Residency {
    /// Nothing observed yet on this processor
    #[default]
    Unknown,
    /// Task currently resident
    Resident(TaskId),
    /// Last resident task left at `since` and the successor is not yet known
    Vacant { since: Timestamp },
}

/// Record waiting for its task identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRecord {
    pub time: Timestamp,
    pub kind: EventKind,
}

/// Per-processor state machine
#[derive(Debug, Clone, Default)]
pub struct ProcessorState {
    residency: Residency,
    pending: Vec<PendingRecord>,
    last_time: Option<Timestamp>,
}

impl ProcessorState {
    pub fn residency(&self) -> Residency {
        self.residency
    }

    pub fn current_task(&self) -> Option<TaskId> {
        match self.residency {
            Residency::Resident(tid) => Some(tid),
            _ => None,
        }
    }

    pub fn pending(&self) -> &[PendingRecord] {
        &self.pending
    }
}

/// Run-wide knowledge about one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskState {
    pub last_known_cpu: CpuId,
    pub location: TaskLocation,
    pub events: u64,
}

/// Task-indexed state shared by every processor stream of a run
#[derive(Debug, Clone, Default)]
pub struct TaskTable {
    tasks: BTreeMap<TaskId, TaskState>,
}

impl TaskTable {
    pub fn get(&self, tid: TaskId) -> Option<&TaskState> {
        self.tasks.get(&tid)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, &TaskState)> {
        self.tasks.iter()
    }

    fn observe(&mut self, tid: TaskId, cpu: CpuId, kind: EventKind) {
        let state = self.tasks.entry(tid).or_insert(TaskState {
            last_known_cpu: cpu,
            location: TaskLocation::Unknown,
            events: 0,
        });
        state.last_known_cpu = cpu;
        state.events += 1;
        if let Some(location) = kind.location_after() {
            state.location = location;
        }
    }
}

/// Non-fatal inconsistency detected during reconstruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyWarning {
    /// A task left a processor on which a different task was resident
    ResidencyMismatch {
        cpu: CpuId,
        time: Timestamp,
        kind: EventKind,
        task: TaskId,
        resident: TaskId,
    },
    /// A record's timestamp is earlier than its predecessor in the same stream
    TimeRegression {
        cpu: CpuId,
        time: Timestamp,
        previous: Timestamp,
    },
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyWarning::ResidencyMismatch {
                cpu,
                time,
                kind,
                task,
                resident,
            } => write!(
                f,
                "CPU {} @{}: T{} {} while T{} was resident",
                cpu, time, task, kind, resident
            ),
            ConsistencyWarning::TimeRegression {
                cpu,
                time,
                previous,
            } => write!(
                f,
                "CPU {} @{}: timestamp earlier than previous record @{}",
                cpu, time, previous
            ),
        }
    }
}

/// Counters collected while reconstructing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCounters {
    /// Records fed to the engine (excluding seeds)
    pub records: u64,
    /// Records that entered a pending buffer
    pub buffered: u64,
    /// Buffered records attributed to a task when a later record resolved
    pub retro_attributed: u64,
    /// Buffered records emitted under the unknown sentinel at stream end
    pub unknown: u64,
    /// Residency starts synthesized on the task timeline
    pub synthesized_starts: u64,
    /// Seed entries applied before the first stream
    pub seeds: u64,
}

/// Finished reconstruction: the model plus everything learned on the way
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub model: NormalizedModel,
    pub tasks: TaskTable,
    pub warnings: Vec<ConsistencyWarning>,
    pub counters: EngineCounters,
}

/// Owns all mutable reconstruction state for one run
#[derive(Debug, Default)]
pub struct ReconstructionEngine {
    model: NormalizedModel,
    tasks: TaskTable,
    processors: BTreeMap<CpuId, ProcessorState>,
    warnings: Vec<ConsistencyWarning>,
    counters: EngineCounters,
}

impl ReconstructionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a known entry before any stream is processed
    ///
    /// Seeds bypass the pending buffer and never synthesize residency starts.
    pub fn seed(&mut self, time: Timestamp, kind: EventKind, cpu: CpuId, tid: TaskId) {
        self.model.emit(time, kind, cpu, tid);
        self.transition(cpu, time, kind, tid);
        self.counters.seeds += 1;
    }

    /// Announce a processor stream so it appears in the output even if empty
    pub fn begin_stream(&mut self, cpu: CpuId) {
        self.model.register_cpu(cpu);
        let state = self.processors.entry(cpu).or_default();
        state.last_time = None;
        debug!(cpu, "stream started");
    }

    /// Process one classified record of `cpu`'s stream
    pub fn process(&mut self, cpu: CpuId, time: Timestamp, kind: EventKind, task: TaskRef) {
        self.counters.records += 1;
        self.check_time(cpu, time);

        let tid = match task {
            TaskRef::Resolved(tid) => tid,
            TaskRef::Unresolved => {
                self.processor_mut(cpu).pending.push(PendingRecord { time, kind });
                self.counters.buffered += 1;
                return;
            }
        };

        let state = self.processor_mut(cpu);
        let pending = std::mem::take(&mut state.pending);
        let residency = state.residency;

        if let Residency::Vacant { since } = residency {
            let opens_residency = pending.first().is_some_and(|p| p.kind.starts_residency());
            if !opens_residency {
                self.model.emit_task_only(since, EventKind::Jmp, cpu, tid);
                self.transition(cpu, since, EventKind::Jmp, tid);
                self.counters.synthesized_starts += 1;
                debug!(cpu, task = tid, time = since, "synthesized residency start");
            }
        }

        if !pending.is_empty() {
            debug!(cpu, task = tid, count = pending.len(), "flushing pending records");
            self.counters.retro_attributed += pending.len() as u64;
        }
        for record in pending {
            self.model.emit(record.time, record.kind, cpu, tid);
            self.absorb_flushed(cpu, record.kind, tid);
        }

        self.model.emit(time, kind, cpu, tid);
        self.transition(cpu, time, kind, tid);
    }

    /// Close `cpu`'s stream, emitting any unresolved tail under the sentinel
    pub fn end_stream(&mut self, cpu: CpuId) {
        let pending = std::mem::take(&mut self.processor_mut(cpu).pending);
        if !pending.is_empty() {
            info!(
                cpu,
                count = pending.len(),
                "stream ended with unresolved records, attributing to unknown task"
            );
        }
        self.counters.unknown += pending.len() as u64;
        for record in pending {
            self.model.emit(record.time, record.kind, cpu, UNKNOWN_TASK);
        }
        debug!(cpu, "stream finished");
    }

    pub fn processor(&self, cpu: CpuId) -> Option<&ProcessorState> {
        self.processors.get(&cpu)
    }

    pub fn tasks(&self) -> &TaskTable {
        &self.tasks
    }

    pub fn model(&self) -> &NormalizedModel {
        &self.model
    }

    pub fn warnings(&self) -> &[ConsistencyWarning] {
        &self.warnings
    }

    pub fn counters(&self) -> EngineCounters {
        self.counters
    }

    /// Consume the engine, returning the finalized model and run state
    pub fn finish(self) -> Reconstruction {
        Reconstruction {
            model: self.model,
            tasks: self.tasks,
            warnings: self.warnings,
            counters: self.counters,
        }
    }

    fn processor_mut(&mut self, cpu: CpuId) -> &mut ProcessorState {
        self.processors.entry(cpu).or_default()
    }

    fn check_time(&mut self, cpu: CpuId, time: Timestamp) {
        let state = self.processor_mut(cpu);
        let previous = state.last_time.replace(time);
        if let Some(previous) = previous.filter(|p| *p > time) {
            warn!(cpu, time, previous, "timestamp went backwards within stream");
            self.warnings.push(ConsistencyWarning::TimeRegression {
                cpu,
                time,
                previous,
            });
        }
    }

    /// Apply a retroactively attributed entry
    ///
    /// A buffered start claims the processor for the resolving task. Buffered
    /// yields and parks never vacate it: only resolved records set
    /// `Vacant { since }`.
    fn absorb_flushed(&mut self, cpu: CpuId, kind: EventKind, tid: TaskId) {
        if kind.starts_residency() {
            self.processor_mut(cpu).residency = Residency::Resident(tid);
        }
        self.tasks.observe(tid, cpu, kind);
    }

    /// Apply one resolved or synthesized entry to processor residency and the task table
    fn transition(&mut self, cpu: CpuId, time: Timestamp, kind: EventKind, tid: TaskId) {
        let state = self.processors.entry(cpu).or_default();
        if kind.starts_residency() {
            state.residency = Residency::Resident(tid);
        } else if kind.ends_residency() {
            if let Residency::Resident(resident) = state.residency {
                if resident != tid {
                    warn!(
                        cpu,
                        time,
                        task = tid,
                        resident,
                        evt = kind.as_str(),
                        "task left a processor it was not resident on"
                    );
                    self.warnings.push(ConsistencyWarning::ResidencyMismatch {
                        cpu,
                        time,
                        kind,
                        task: tid,
                        resident,
                    });
                }
            }
            state.residency = Residency::Vacant { since: time };
        }
        self.tasks.observe(tid, cpu, kind);
    }
}
