/// Reconstruction throughput benchmarks
///
/// Measures records/second through the classify + engine path for synthetic
/// multi-CPU traces, with and without unresolved task tokens.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use schedrecon::descriptor::RunDescriptor;
use schedrecon::event::EventKind;
use schedrecon::intervals::{derive_intervals, RegionOfInterest};
use schedrecon::json_output;
use schedrecon::run::reconstruct_from_readers;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::Duration;

const CPUS: u32 = 4;

fn descriptor() -> RunDescriptor {
    let mut pc = BTreeMap::new();
    for (i, kind) in EventKind::ALL.iter().enumerate() {
        pc.insert(format!("0x{:x}", 0x4000 + i * 8), *kind);
    }
    let mut tasks = BTreeMap::new();
    for tid in 0..64 {
        tasks.insert(format!("7f{:04x}", tid), tid);
    }
    RunDescriptor::new(pc, tasks)
}

/// One CPU stream cycling jmp/peeked/pushing/pushed/processed/yield
///
/// Every `unresolved_every`-th record carries a token missing from task_map.
fn synth_stream(cpu: u32, records: usize, unresolved_every: usize) -> String {
    const CYCLE: [usize; 6] = [1, 5, 6, 7, 8, 3];
    let mut csv = String::from("pc,tsc,val\n");
    for i in 0..records {
        let op = 0x4000 + CYCLE[i % CYCLE.len()] * 8;
        let tid = (cpu as usize * 16 + i / CYCLE.len()) % 64;
        let token = if unresolved_every > 0 && i % unresolved_every == 1 {
            "deadbeef".to_string()
        } else {
            format!("7f{:04x}", tid)
        };
        csv.push_str(&format!("0x{:x},{},{}\n", op, i * 10, token));
    }
    csv
}

fn streams(records: usize, unresolved_every: usize) -> Vec<(u32, String)> {
    (0..CPUS)
        .map(|cpu| (cpu, synth_stream(cpu, records, unresolved_every)))
        .collect()
}

fn bench_reconstruct(c: &mut Criterion) {
    let descriptor = descriptor();
    let mut group = c.benchmark_group("reconstruct");
    group.measurement_time(Duration::from_secs(5));

    for records in [1_000usize, 10_000] {
        for (label, unresolved_every) in [("resolved", 0usize), ("buffered", 3)] {
            let inputs = streams(records, unresolved_every);
            group.throughput(Throughput::Elements((records * CPUS as usize) as u64));
            group.bench_with_input(BenchmarkId::new(label, records), &inputs, |b, inputs| {
                b.iter(|| {
                    let readers = inputs
                        .iter()
                        .map(|(cpu, csv)| (*cpu, Cursor::new(csv.as_bytes())));
                    let result = reconstruct_from_readers(&descriptor, readers).unwrap();
                    black_box(result);
                });
            });
        }
    }

    group.finish();
}

fn bench_outputs(c: &mut Criterion) {
    let descriptor = descriptor();
    let inputs = streams(10_000, 3);
    let readers = inputs
        .iter()
        .map(|(cpu, csv)| (*cpu, Cursor::new(csv.as_bytes())));
    let result = reconstruct_from_readers(&descriptor, readers).unwrap();

    let mut group = c.benchmark_group("outputs");
    group.bench_function("to_json", |b| {
        b.iter(|| black_box(json_output::to_json(&result.model).unwrap()));
    });
    group.bench_function("derive_intervals", |b| {
        b.iter(|| black_box(derive_intervals(&result.model, 0, &RegionOfInterest::all())));
    });
    group.finish();
}

criterion_group!(benches, bench_reconstruct, bench_outputs);
criterion_main!(benches);
