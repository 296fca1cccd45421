//! Event vocabulary for scheduling traces
//!
//! Every raw record is classified into one of a closed set of [`EventKind`]s.
//! The names match the tokens used in run descriptors (`pc_map` values) and in
//! the serialized timelines (`evt` fields).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Processor identifier
pub type CpuId = u32;

/// Resolved task identifier (`-1` is reserved for [`UNKNOWN_TASK`])
pub type TaskId = i64;

/// Capture timestamp (tracer clock ticks, shared by all processors)
pub type Timestamp = u64;

/// Sentinel task id for records whose identity never resolved
pub const UNKNOWN_TASK: TaskId = -1;

/// Canonical classification of a trace record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Task created
    Spawn,
    /// Task begins or resumes execution on a processor
    Jmp,
    /// Task dispatched from a ready state
    Jd,
    /// Task voluntarily leaves the processor
    Yield,
    /// Task parks (leaves the processor until woken)
    Park,
    /// Task examined its work queue
    Peeked,
    /// Task is about to push to a work queue
    Pushing,
    /// Task finished pushing
    Pushed,
    /// Task finished handling the popped item
    Processed,
    /// Task completed
    Finish,
}

impl EventKind {
    /// All kinds, in declaration order
    pub const ALL: [EventKind; 10] = [
        EventKind::Spawn,
        EventKind::Jmp,
        EventKind::Jd,
        EventKind::Yield,
        EventKind::Park,
        EventKind::Peeked,
        EventKind::Pushing,
        EventKind::Pushed,
        EventKind::Processed,
        EventKind::Finish,
    ];

    /// Token used in descriptors and serialized output
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Spawn => "spawn",
            EventKind::Jmp => "jmp",
            EventKind::Jd => "jd",
            EventKind::Yield => "yield",
            EventKind::Park => "park",
            EventKind::Peeked => "peeked",
            EventKind::Pushing => "pushing",
            EventKind::Pushed => "pushed",
            EventKind::Processed => "processed",
            EventKind::Finish => "finish",
        }
    }

    /// `jmp` or `jd`: the task becomes resident on the processor
    pub fn starts_residency(&self) -> bool {
        matches!(self, EventKind::Jmp | EventKind::Jd)
    }

    /// `yield` or `park`: the task leaves the processor
    pub fn ends_residency(&self) -> bool {
        matches!(self, EventKind::Yield | EventKind::Park)
    }

    /// Task-local work queue phase (does not change residency)
    pub fn is_queue_phase(&self) -> bool {
        matches!(
            self,
            EventKind::Peeked | EventKind::Pushing | EventKind::Pushed | EventKind::Processed
        )
    }

    /// Where a task is after this event, if the event moves it at all
    ///
    /// `spawn` and `finish` leave the last known location untouched.
    pub fn location_after(&self) -> Option<TaskLocation> {
        match self {
            EventKind::Jmp | EventKind::Jd => Some(TaskLocation::OnCpu),
            EventKind::Yield | EventKind::Park => Some(TaskLocation::OffCpu),
            EventKind::Peeked | EventKind::Pushed => Some(TaskLocation::Computing),
            EventKind::Pushing => Some(TaskLocation::Pushing),
            EventKind::Processed => Some(TaskLocation::Popping),
            EventKind::Spawn | EventKind::Finish => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event kind '{}'", s))
    }
}

/// Last known whereabouts of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskLocation {
    /// Never observed in a location-changing event
    #[default]
    Unknown,
    /// Resident on a processor
    OnCpu,
    /// Suspended off-processor
    OffCpu,
    /// Working on a peeked or freshly pushed item
    Computing,
    /// About to push to a work queue
    Pushing,
    /// Done with the current item, ready to pop the next one
    Popping,
}

impl TaskLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskLocation::Unknown => "unknown",
            TaskLocation::OnCpu => "on-cpu",
            TaskLocation::OffCpu => "off-cpu",
            TaskLocation::Computing => "computing",
            TaskLocation::Pushing => "pushing",
            TaskLocation::Popping => "popping",
        }
    }
}

impl fmt::Display for TaskLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
