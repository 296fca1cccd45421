//! Reconstruction summary for `--summary` mode
//!
//! Occupancy-based busy time per CPU and on-CPU time per task, plus event
//! counts and the engine's bookkeeping counters.

use crate::engine::{EngineCounters, Reconstruction};
use crate::event::{CpuId, EventKind, TaskId, Timestamp};
use crate::intervals::IntervalSet;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Busy time on one processor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuStats {
    pub events: u64,
    pub intervals: u64,
    pub busy_time: Timestamp,
    pub first_time: Option<Timestamp>,
    pub last_time: Option<Timestamp>,
}

impl CpuStats {
    /// Busy share of the observed span, in percent
    pub fn utilization(&self) -> f64 {
        match (self.first_time, self.last_time) {
            (Some(first), Some(last)) if last > first => {
                (self.busy_time as f64 / (last - first) as f64) * 100.0
            }
            _ => 0.0,
        }
    }
}

/// Time one task spent resident
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub events: u64,
    pub intervals: u64,
    pub on_cpu_time: Timestamp,
}

/// Summary of a reconstruction run
#[derive(Debug, Clone, Default)]
pub struct ReconSummary {
    pub cpus: BTreeMap<CpuId, CpuStats>,
    pub tasks: BTreeMap<TaskId, TaskStats>,
    pub event_counts: BTreeMap<EventKind, u64>,
    pub counters: EngineCounters,
    pub warnings: usize,
}

impl ReconSummary {
    /// Tabulate a finished run and its occupancy intervals
    pub fn new(result: &Reconstruction, intervals: &IntervalSet) -> Self {
        let mut summary = Self {
            counters: result.counters,
            warnings: result.warnings.len() + intervals.warnings.len(),
            ..Self::default()
        };

        for (&cpu, entries) in result.model.cpu_timelines() {
            let stats = summary.cpus.entry(cpu).or_default();
            stats.events = entries.len() as u64;
            stats.first_time = entries.iter().map(|e| e.time).min();
            stats.last_time = entries.iter().map(|e| e.time).max();
            for entry in entries {
                *summary.event_counts.entry(entry.evt).or_default() += 1;
            }
        }

        for (&tid, entries) in result.model.task_timelines() {
            if !entries.is_empty() {
                summary.tasks.entry(tid).or_default().events = entries.len() as u64;
            }
        }

        for interval in &intervals.occupancy {
            let cpu = summary.cpus.entry(interval.cpu).or_default();
            cpu.intervals += 1;
            cpu.busy_time += interval.duration();

            let task = summary.tasks.entry(interval.tid).or_default();
            task.intervals += 1;
            task.on_cpu_time += interval.duration();
        }

        summary
    }

    /// Render the summary as aligned text tables
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "   cpu    events intervals   busy-time   util%");
        let _ = writeln!(out, "------ --------- --------- ----------- -------");
        for (cpu, stats) in &self.cpus {
            let _ = writeln!(
                out,
                "{:>6} {:>9} {:>9} {:>11} {:>7.2}",
                cpu,
                stats.events,
                stats.intervals,
                stats.busy_time,
                stats.utilization()
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "  task    events intervals on-cpu-time");
        let _ = writeln!(out, "------ --------- --------- -----------");
        for (tid, stats) in &self.tasks {
            let _ = writeln!(
                out,
                "{:>6} {:>9} {:>9} {:>11}",
                tid, stats.events, stats.intervals, stats.on_cpu_time
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "    count event");
        let _ = writeln!(out, "--------- ----------");
        for (kind, count) in &self.event_counts {
            let _ = writeln!(out, "{:>9} {}", count, kind);
        }

        let _ = writeln!(out);
        let c = &self.counters;
        let _ = writeln!(
            out,
            "records: {}  seeds: {}  buffered: {}  retro-attributed: {}  unknown: {}  synthesized-starts: {}  warnings: {}",
            c.records, c.seeds, c.buffered, c.retro_attributed, c.unknown, c.synthesized_starts, self.warnings
        );

        out
    }

    /// Print the summary to stderr
    pub fn print_summary(&self) {
        if self.cpus.is_empty() {
            eprintln!("No records reconstructed.");
            return;
        }
        eprint!("{}", self.render());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TaskRef;
    use crate::engine::ReconstructionEngine;
    use crate::intervals::{derive_intervals, RegionOfInterest};

    fn reconstruction() -> Reconstruction {
        let mut engine = ReconstructionEngine::new();
        engine.begin_stream(0);
        engine.process(0, 100, EventKind::Jmp, TaskRef::Resolved(1));
        engine.process(0, 150, EventKind::Yield, TaskRef::Resolved(1));
        engine.process(0, 160, EventKind::Jd, TaskRef::Resolved(2));
        engine.process(0, 200, EventKind::Park, TaskRef::Resolved(2));
        engine.process(0, 210, EventKind::Pushed, TaskRef::Unresolved);
        engine.end_stream(0);
        engine.finish()
    }

    #[test]
    fn test_summary_busy_and_on_cpu_time() {
        let result = reconstruction();
        let intervals = derive_intervals(&result.model, 0, &RegionOfInterest::all());
        let summary = ReconSummary::new(&result, &intervals);

        let cpu0 = &summary.cpus[&0];
        assert_eq!(cpu0.events, 5);
        assert_eq!(cpu0.intervals, 2);
        assert_eq!(cpu0.busy_time, 90);
        assert!((cpu0.utilization() - 81.818).abs() < 0.01);

        assert_eq!(summary.tasks[&1].on_cpu_time, 50);
        assert_eq!(summary.tasks[&2].on_cpu_time, 40);
        assert_eq!(summary.tasks[&-1].events, 1);
        assert_eq!(summary.event_counts[&EventKind::Pushed], 1);
        assert_eq!(summary.counters.unknown, 1);
    }

    #[test]
    fn test_render_contains_tables() {
        let result = reconstruction();
        let intervals = derive_intervals(&result.model, 0, &RegionOfInterest::all());
        let text = ReconSummary::new(&result, &intervals).render();
        assert!(text.contains("busy-time"));
        assert!(text.contains("on-cpu-time"));
        assert!(text.contains("unknown: 1"));
        assert!(text.contains(" park"));
    }

    #[test]
    fn test_utilization_without_span() {
        let stats = CpuStats::default();
        assert_eq!(stats.utilization(), 0.0);
    }
}
