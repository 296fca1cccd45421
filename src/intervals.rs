//! Interval derivation over a normalized model
//!
//! Turns the two point-event timelines into the spans a timeline viewer draws:
//! - **occupancy** intervals per CPU, between consecutive residency-changing
//!   events
//! - **queue-phase** intervals per task, between consecutive queue events
//!
//! Every interval carries a stable id so a viewer can address it for
//! zoom/toggle interactions. Occupancy ids are `"{cpu}_{tid}_{start}_{end}"`,
//! queue-phase ids are `"{cpu}_{tid}_{event_time}"`, both computed on
//! offset-adjusted, unclipped times.

use crate::event::{CpuId, EventKind, TaskId, TaskLocation, Timestamp};
use crate::model::NormalizedModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::hash::Hasher;
use tracing::debug;

/// Time window and CPU subset to keep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionOfInterest {
    /// Window `[begin, end]`; ignored unless `end > begin`
    pub window: Option<(Timestamp, Timestamp)>,
    /// CPUs to keep (empty = all)
    pub cpus: BTreeSet<CpuId>,
}

impl RegionOfInterest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, begin: Timestamp, end: Timestamp) -> Self {
        self.window = (end > begin).then_some((begin, end));
        self
    }

    pub fn with_cpus(mut self, cpus: impl IntoIterator<Item = CpuId>) -> Self {
        self.cpus = cpus.into_iter().collect();
        self
    }

    fn keeps_cpu(&self, cpu: CpuId) -> bool {
        self.cpus.is_empty() || self.cpus.contains(&cpu)
    }

    /// Clip `[start, end]` to the window; `None` if nothing remains
    fn clip(&self, start: Timestamp, end: Timestamp) -> Option<(Timestamp, Timestamp)> {
        match self.window {
            None => Some((start, end)),
            Some((begin, finish)) => {
                let (start, end) = (start.max(begin), end.min(finish));
                (start <= end).then_some((start, end))
            }
        }
    }
}

/// A task's stay on a processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyInterval {
    pub id: String,
    pub hash: u64,
    pub cpu: CpuId,
    pub tid: TaskId,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl OccupancyInterval {
    pub fn duration(&self) -> Timestamp {
        self.end - self.start
    }
}

/// Time a task spent in one work-queue phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePhaseInterval {
    pub id: String,
    pub hash: u64,
    pub cpu: CpuId,
    pub tid: TaskId,
    pub phase: TaskLocation,
    pub start: Timestamp,
    pub end: Timestamp,
    /// Event that ended the phase
    pub closed_by: EventKind,
}

/// Inconsistency noticed while deriving intervals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalWarning {
    /// A task left a CPU while a different task's interval was open
    OpenTaskMismatch {
        cpu: CpuId,
        time: Timestamp,
        open: TaskId,
        task: TaskId,
    },
    /// A task left a CPU other than the one it last started on
    CpuMismatch {
        tid: TaskId,
        time: Timestamp,
        last_cpu: CpuId,
        cpu: CpuId,
    },
}

/// All derived intervals of a model
#[derive(Debug, Clone, Default)]
pub struct IntervalSet {
    pub occupancy: Vec<OccupancyInterval>,
    pub queue_phases: Vec<QueuePhaseInterval>,
    pub warnings: Vec<IntervalWarning>,
}

/// Stable 64-bit id for an interval
///
/// FNV-1a over the little-endian fields, so ids are reproducible across runs
/// and platforms.
pub fn interval_hash(cpu: CpuId, tid: TaskId, start: Timestamp, end: Timestamp) -> u64 {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(&cpu.to_le_bytes());
    hasher.write(&tid.to_le_bytes());
    hasher.write(&start.to_le_bytes());
    hasher.write(&end.to_le_bytes());
    hasher.finish()
}

/// Derive occupancy and queue-phase intervals
///
/// `time_offset` is subtracted from every timestamp first.
///
/// Occupancy is not the block layout of SVG timeline renderers, where a `jmp`
/// never closes a block and a `jd` draws the preceding period, vacancy
/// included, tagged with task `-1`. Here both `jmp` and `jd` close the open
/// period and start a new one, and a vacancy after a yield or park is never
/// emitted as an interval.
pub fn derive_intervals(model: &NormalizedModel, time_offset: Timestamp, roi: &RegionOfInterest) -> IntervalSet {
    let mut set = IntervalSet::default();
    occupancy(model, time_offset, roi, &mut set);
    queue_phases(model, time_offset, roi, &mut set);
    debug!(
        occupancy = set.occupancy.len(),
        queue_phases = set.queue_phases.len(),
        warnings = set.warnings.len(),
        "derived intervals"
    );
    set
}

fn occupancy(model: &NormalizedModel, offset: Timestamp, roi: &RegionOfInterest, set: &mut IntervalSet) {
    for (&cpu, entries) in model.cpu_timelines() {
        if !roi.keeps_cpu(cpu) {
            continue;
        }

        let mut last_occupied: Option<Timestamp> = None;
        let mut open_tid: Option<TaskId> = None;

        for entry in entries {
            let time = entry.time.saturating_sub(offset);
            let closed = if entry.evt.starts_residency() {
                let closed = open_tid.zip(last_occupied);
                open_tid = Some(entry.tid);
                closed
            } else if entry.evt.ends_residency() {
                if let Some(open) = open_tid.filter(|open| *open != entry.tid) {
                    set.warnings.push(IntervalWarning::OpenTaskMismatch {
                        cpu,
                        time,
                        open,
                        task: entry.tid,
                    });
                }
                let closed = last_occupied.map(|start| (open_tid.unwrap_or(entry.tid), start));
                open_tid = None;
                closed
            } else {
                continue;
            };
            last_occupied = Some(time);

            if let Some((tid, start)) = closed {
                push_occupancy(set, roi, cpu, tid, start, time);
            }
        }
    }
}

fn push_occupancy(
    set: &mut IntervalSet,
    roi: &RegionOfInterest,
    cpu: CpuId,
    tid: TaskId,
    start: Timestamp,
    end: Timestamp,
) {
    if let Some((clipped_start, clipped_end)) = roi.clip(start, end) {
        set.occupancy.push(OccupancyInterval {
            id: format!("{}_{}_{}_{}", cpu, tid, start, end),
            hash: interval_hash(cpu, tid, start, end),
            cpu,
            tid,
            start: clipped_start,
            end: clipped_end,
        });
    }
}

fn queue_phases(model: &NormalizedModel, offset: Timestamp, roi: &RegionOfInterest, set: &mut IntervalSet) {
    for (&tid, entries) in model.task_timelines() {
        let mut ordered: Vec<_> = entries.iter().collect();
        ordered.sort_by_key(|entry| entry.time);

        let mut last_on_cpu: Option<Timestamp> = None;
        let mut last_cpu: Option<CpuId> = None;
        let mut last_queue_event: Option<Timestamp> = None;
        let mut phase = TaskLocation::Unknown;

        for entry in ordered {
            let time = entry.time.saturating_sub(offset);
            let start = last_queue_event.max(last_on_cpu);

            let closed_phase = match entry.evt {
                EventKind::Jmp | EventKind::Jd => {
                    last_on_cpu = Some(time);
                    last_cpu = Some(entry.cpu);
                    continue;
                }
                EventKind::Yield | EventKind::Park => {
                    if let Some(prev) = last_cpu.filter(|prev| *prev != entry.cpu) {
                        set.warnings.push(IntervalWarning::CpuMismatch {
                            tid,
                            time,
                            last_cpu: prev,
                            cpu: entry.cpu,
                        });
                    }
                    last_on_cpu = None;
                    phase
                }
                EventKind::Peeked | EventKind::Pushing | EventKind::Pushed | EventKind::Processed => {
                    last_queue_event = Some(time);
                    let previous = phase;
                    phase = entry.evt.location_after().unwrap_or(previous);
                    previous
                }
                EventKind::Spawn | EventKind::Finish => continue,
            };

            if closed_phase == TaskLocation::Unknown || !roi.keeps_cpu(entry.cpu) {
                continue;
            }
            let Some(start) = start else { continue };
            let Some((clipped_start, clipped_end)) = roi.clip(start, time) else {
                continue;
            };

            set.queue_phases.push(QueuePhaseInterval {
                id: format!("{}_{}_{}", entry.cpu, tid, time),
                hash: interval_hash(entry.cpu, tid, start, time),
                cpu: entry.cpu,
                tid,
                phase: closed_phase,
                start: clipped_start,
                end: clipped_end,
                closed_by: entry.evt,
            });
        }
    }
}
