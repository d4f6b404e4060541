use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use flock_core::io::config::FlockConfig;
use flock_core::policy::Policy;
use flock_core::trainer::{EpisodeControl, GenerationOutcome, GenerationReport, Trainer};
use tracing::info;

mod evolver;

use evolver::Evolver;

#[derive(Parser, Debug)]
#[command(
    name = "flocktrain",
    about = "Evolutionary training loop emitting NDJSON generation reports"
)]
struct Args {
    /// Path to the config JSON document; defaults apply when omitted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the config's base seed.
    #[arg(long, value_name = "NUMBER")]
    seed: Option<u64>,

    /// Override the number of generations to run.
    #[arg(long, value_name = "NUMBER")]
    generations: Option<u32>,

    /// Override the population size per generation.
    #[arg(long, value_name = "NUMBER")]
    population: Option<usize>,

    /// Output NDJSON file for per-generation reports.
    #[arg(long)]
    out: PathBuf,

    /// Optional path to emit every frame of every generation as NDJSON.
    #[arg(long = "emit-frames", value_name = "PATH")]
    emit_frames: Option<PathBuf>,

    /// Stop the run once a generation survives this many ticks.
    #[arg(long = "max-ticks", value_name = "NUMBER", default_value_t = 100_000)]
    max_ticks: u64,
}

fn load_config(args: &Args) -> Result<FlockConfig> {
    let mut config = match &args.config {
        Some(path) => FlockConfig::load_from_path(path)?,
        None => FlockConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(generations) = args.generations {
        config.training.max_generations = generations;
    }
    if let Some(population) = args.population {
        config.training.population = population;
    }
    Ok(config)
}

/// Run one generation, streaming frames to the optional sink and cutting the
/// episode off at the tick cap. `Ok(None)` means the cohort outlived the cap.
fn run_capped_generation(
    trainer: &mut Trainer,
    policies: Vec<Box<dyn Policy>>,
    max_ticks: u64,
    mut frame_writer: Option<&mut BufWriter<File>>,
) -> Result<Option<GenerationReport>> {
    let mut sink_error: Option<anyhow::Error> = None;
    let outcome = trainer.run_generation_observed(policies, |frame| {
        if let Some(writer) = frame_writer.as_deref_mut() {
            match frame.to_ndjson() {
                Ok(line) => {
                    if let Err(err) = writer.write_all(line.as_bytes()) {
                        sink_error = Some(err.into());
                        return EpisodeControl::Abort;
                    }
                }
                Err(err) => {
                    sink_error = Some(err.into());
                    return EpisodeControl::Abort;
                }
            }
        }
        if frame.t >= max_ticks {
            EpisodeControl::Abort
        } else {
            EpisodeControl::Continue
        }
    })?;

    match (outcome, sink_error) {
        (_, Some(err)) => Err(err),
        (GenerationOutcome::Completed(report), None) => Ok(Some(report)),
        (GenerationOutcome::Aborted { .. }, None) => Ok(None),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let report_file =
        File::create(&args.out).with_context(|| format!("failed to create {:?}", args.out))?;
    let mut report_writer = BufWriter::new(report_file);

    let mut frame_writer = if let Some(path) = &args.emit_frames {
        let file = File::create(path)
            .with_context(|| format!("failed to create frame file at {:?}", path))?;
        Some(BufWriter::new(file))
    } else {
        None
    };

    let mut evolver = Evolver::new(config.seed, config.training.population);
    let generations = config.training.max_generations;
    let mut trainer = Trainer::new(config)?;

    for _ in 0..generations {
        let policies = evolver.population();
        let report = match run_capped_generation(
            &mut trainer,
            policies,
            args.max_ticks,
            frame_writer.as_mut(),
        )? {
            Some(report) => report,
            None => {
                info!(
                    generation = trainer.generations_run(),
                    max_ticks = args.max_ticks,
                    "generation outlived the tick cap; stopping"
                );
                break;
            }
        };

        let best = report
            .fitness
            .iter()
            .fold(f64::NEG_INFINITY, |best, &score| best.max(score));
        info!(
            generation = report.generation,
            score = report.score,
            ticks = report.ticks,
            best,
            "generation complete"
        );

        let line = serde_json::to_string(&report)?;
        report_writer.write_all(line.as_bytes())?;
        report_writer.write_all(b"\n")?;

        evolver.evolve(&report.fitness);
    }

    report_writer.flush()?;
    if let Some(writer) = frame_writer.as_mut() {
        writer.flush()?;
    }
    info!(generations = trainer.generations_run(), "training complete");

    Ok(())
}
