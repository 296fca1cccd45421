//! End-to-end reconstruction of a run
//!
//! Seeds first, then every processor stream in descriptor order, one stream
//! at a time. The engine's task table is the only state shared between
//! streams.

use crate::descriptor::RunDescriptor;
use crate::engine::{Reconstruction, ReconstructionEngine};
use crate::error::Result;
use crate::event::CpuId;
use crate::stream_reader::CpuStreamReader;
use std::io::BufRead;
use tracing::info;

/// Reconstruct the run described by `descriptor`, reading its CSV files
pub fn reconstruct(descriptor: &RunDescriptor) -> Result<Reconstruction> {
    let classifier = descriptor.classifier();
    let mut engine = seeded_engine(descriptor);

    for source in &descriptor.csvs {
        let reader = CpuStreamReader::open(source.cpu, &source.path)?;
        reader.feed(&classifier, &mut engine)?;
    }

    Ok(finish(engine))
}

/// Reconstruct from in-memory sources instead of the descriptor's files
///
/// The descriptor's lookup tables and seeds are used; its `csvs` are ignored.
pub fn reconstruct_from_readers<R, I>(descriptor: &RunDescriptor, streams: I) -> Result<Reconstruction>
where
    R: BufRead,
    I: IntoIterator<Item = (CpuId, R)>,
{
    let classifier = descriptor.classifier();
    let mut engine = seeded_engine(descriptor);

    for (cpu, source) in streams {
        CpuStreamReader::new(cpu, source)?.feed(&classifier, &mut engine)?;
    }

    Ok(finish(engine))
}

fn seeded_engine(descriptor: &RunDescriptor) -> ReconstructionEngine {
    let mut engine = ReconstructionEngine::new();
    for seed in &descriptor.seed {
        engine.seed(seed.time, seed.evt, seed.cpu, seed.tid);
    }
    engine
}

fn finish(engine: ReconstructionEngine) -> Reconstruction {
    let result = engine.finish();
    info!(
        records = result.counters.records,
        cpus = result.model.cpu_timelines().len(),
        tasks = result.tasks.len(),
        unknown = result.counters.unknown,
        warnings = result.warnings.len(),
        "reconstruction complete"
    );
    result
}
