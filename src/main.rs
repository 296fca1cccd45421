use anyhow::{Context, Result};
use clap::Parser;
use schedrecon::cli::{Cli, OutputFormat};
use schedrecon::csv_output::CsvOutput;
use schedrecon::descriptor::RunDescriptor;
use schedrecon::engine::Reconstruction;
use schedrecon::intervals::{derive_intervals, RegionOfInterest};
use schedrecon::json_output::{self, JsonIntervals};
use schedrecon::stats::ReconSummary;
use schedrecon::run;
use std::io::Write;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber
///
/// Consistency warnings are always shown; `--debug` raises the level to TRACE.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Serialize the model in the requested format
fn render_model(result: &Reconstruction, format: OutputFormat, cpu_only: bool) -> Result<Vec<u8>> {
    let bytes = match format {
        OutputFormat::Json => json_output::to_json(&result.model)?.into_bytes(),
        OutputFormat::Msgpack => json_output::to_msgpack(&result.model)?,
        OutputFormat::Csv => CsvOutput::from_model(&result.model, !cpu_only)
            .to_csv()
            .into_bytes(),
    };
    Ok(bytes)
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).context("Failed to write to stdout")?;
            stdout.flush().context("Failed to flush stdout")
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let descriptor = RunDescriptor::from_file(&args.descriptor)
        .with_context(|| format!("Failed to load run descriptor {}", args.descriptor.display()))?;

    let result = run::reconstruct(&descriptor).context("Reconstruction aborted")?;

    let bytes = render_model(&result, args.format, args.cpu_only)?;
    write_output(args.out.as_deref(), &bytes)?;

    if args.digest {
        let canonical = json_output::to_json(&result.model)?;
        eprintln!("sha256 {}", json_output::digest(canonical.as_bytes()));
    }

    if args.summary || args.intervals.is_some() {
        let roi = RegionOfInterest::all()
            .with_window(args.begin, args.end)
            .with_cpus(args.cpus.iter().copied());
        let intervals = derive_intervals(&result.model, descriptor.time_offset, &roi);

        if let Some(path) = &args.intervals {
            let doc = JsonIntervals::new(&intervals, descriptor.time_offset);
            write_output(Some(path), doc.to_json()?.as_bytes())?;
        }

        if args.summary {
            ReconSummary::new(&result, &intervals).print_summary();
        }
    }

    if args.strict && !result.warnings.is_empty() {
        for warning in &result.warnings {
            eprintln!("warning: {}", warning);
        }
        anyhow::bail!(
            "{} consistency warning(s) raised (--strict)",
            result.warnings.len()
        );
    }

    Ok(())
}
