//! gammarec command-line interface.
//!
//! Reconstructs raw event tables against a JSON detector setup, generates
//! synthetic tables for a setup, and summarizes setups.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Parser, Subcommand, ValueEnum};

use gammarec_algorithms::{reconstruct, reconstruct_parallel, CoincidenceFills, EventState};
use gammarec_core::{Detector, DetectorSetup, RawEvent};
use gammarec_io::{
    read_raw_events, setup_from_file, CalibratedWriter, DataFileWriter, RawEventWriter,
    SpectraWriter,
};
use gammarec_sim::{Sampler, SamplerConfig};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    GammarecIo(#[from] gammarec_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] gammarec_core::Error),
}

/// Pair observation file format.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum PairFormat {
    /// `x,y` text rows
    Csv,
    /// Two little-endian f64 per pair
    Bin,
}

impl PairFormat {
    fn extension(self) -> &'static str {
        match self {
            PairFormat::Csv => "csv",
            PairFormat::Bin => "bin",
        }
    }
}

/// Event reconstruction for gamma-ray detector arrays.
#[derive(Parser)]
#[command(name = "gammarec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate raw event tables, run addback and write coincidence pairs
    /// and, on request, calibrated tables and single-event spectra
    Process {
        /// Setup JSON file
        setup: PathBuf,

        /// Raw CSV event table(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Directory for one pair file per coincidence matrix
        #[arg(short, long)]
        output: PathBuf,

        /// Pair file format
        #[arg(short, long, value_enum, default_value = "bin")]
        format: PairFormat,

        /// Also write calibrated values of every event to this CSV file
        #[arg(long)]
        calibrated: Option<PathBuf>,

        /// Also write per-channel energies, raw amplitudes, energy vs time,
        /// time differences and addback sums to CSV files in this directory
        #[arg(long)]
        spectra: Option<PathBuf>,

        /// Process events on a single thread
        #[arg(long)]
        sequential: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate a synthetic raw event table for a setup
    Synth {
        /// Setup JSON file
        setup: PathBuf,

        /// Output raw CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of event sets
        #[arg(short = 'n', long, default_value = "1")]
        sets: usize,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Show the groups, detectors and matrices of a setup
    Info {
        /// Setup JSON file
        setup: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            setup,
            input,
            output,
            format,
            calibrated,
            spectra,
            sequential,
            verbose,
        } => {
            let setup = setup_from_file(&setup)?;
            if verbose {
                eprintln!("Processing {} file(s)...", input.len());
                eprintln!(
                    "Setup: {} detectors, {} matrices",
                    setup.detectors().len(),
                    setup.matrices().len()
                );
            }

            let start = Instant::now();
            let mut events = Vec::new();
            for path in &input {
                if verbose {
                    eprintln!("Reading: {}", path.display());
                }
                let file_events = read_raw_events(&setup, path)?;
                if verbose {
                    eprintln!("  {} events", file_events.len());
                }
                events.extend(file_events);
            }

            let fills = if calibrated.is_some() || spectra.is_some() {
                process_with_outputs(&setup, &events, calibrated.as_deref(), spectra.as_deref())?
            } else if sequential {
                reconstruct(&setup, &events, 0)?
            } else {
                reconstruct_parallel(&setup, &events, 0)?
            };

            std::fs::create_dir_all(&output)?;
            for (matrix, pairs) in setup.matrices().iter().zip(&fills.pairs) {
                if !matrix.is_fillable() {
                    continue;
                }
                let path = output.join(format!("{}.{}", matrix.name, format.extension()));
                let mut writer = DataFileWriter::create(&path)?;
                match format {
                    PairFormat::Csv => writer.write_pairs_csv(pairs)?,
                    PairFormat::Bin => writer.write_pairs_binary(pairs)?,
                }
                if verbose {
                    eprintln!(
                        "  {}: {} pairs -> {}",
                        matrix.name,
                        pairs.len(),
                        path.display()
                    );
                }
            }

            let elapsed = start.elapsed();
            println!(
                "Processed {} events from {} files in {:.2}s",
                events.len(),
                input.len(),
                elapsed.as_secs_f64()
            );
            println!("Total pairs: {}", fills.len());
        }

        Commands::Synth {
            setup,
            output,
            sets,
            seed,
        } => {
            let setup = setup_from_file(&setup)?;
            let mut sampler = Sampler::new(&setup, SamplerConfig::default().with_seed(seed))?;
            let mut writer = RawEventWriter::create(&setup, &output)?;
            let mut n_events = 0usize;
            for _ in 0..sets {
                for event in sampler.generate_set() {
                    writer.write_event(&event)?;
                    n_events += 1;
                }
            }
            writer.finish()?;
            println!(
                "Wrote {} events ({} sets) to {}",
                n_events,
                sets,
                output.display()
            );
        }

        Commands::Info { setup: path } => {
            let setup = setup_from_file(&path)?;
            print_setup(&path, &setup);
        }
    }

    Ok(())
}

/// Sequential pass that also writes per-event outputs.
fn process_with_outputs(
    setup: &DetectorSetup,
    events: &[RawEvent],
    calibrated: Option<&Path>,
    spectra: Option<&Path>,
) -> Result<CoincidenceFills> {
    let mut table = calibrated
        .map(|path| CalibratedWriter::create(setup, path))
        .transpose()?;
    let mut observations = spectra
        .map(|dir| SpectraWriter::create(setup, dir))
        .transpose()?;
    let mut state = EventState::new(setup);
    let mut fills = CoincidenceFills::new(setup);
    for (index, raw) in (0u64..).zip(events) {
        state.process(setup, raw, index)?;
        state.fill(setup, &mut fills);
        if let Some(writer) = table.as_mut() {
            writer.write_event(&state)?;
        }
        if let Some(writer) = observations.as_mut() {
            writer.write_event(raw, &state)?;
        }
    }
    if let (Some(writer), Some(path)) = (table, calibrated) {
        writer.finish()?;
        info!("wrote calibrated table {}", path.display());
    }
    if let Some(writer) = observations {
        writer.finish()?;
    }
    Ok(fills)
}

fn print_setup(path: &Path, setup: &DetectorSetup) {
    println!("Setup: {}", path.display());
    println!(
        "Channels: {} energy-sensitive, {} counter",
        setup.n_samples(),
        setup.n_counters()
    );

    println!("Groups:");
    for group in setup.groups() {
        println!(
            "  {:<12} tdc {:>8} | raw {} bins [{}, {}] | energy {} bins [{}, {}]",
            group.name,
            group.tdc_resolution,
            group.raw_amplitude.n_bins,
            group.raw_amplitude.minimum,
            group.raw_amplitude.maximum,
            group.energy.n_bins,
            group.energy.minimum,
            group.energy.maximum
        );
    }

    println!("Detectors:");
    for detector in setup.detectors() {
        let group = &setup.group(detector.group()).name;
        match detector {
            Detector::EnergySensitive(d) => println!(
                "  {:<12} {:<8} {} channel(s){}",
                d.name,
                group,
                d.channels.len(),
                if d.is_multi_channel() {
                    format!(", addback ({:?})", d.policy)
                } else {
                    String::new()
                }
            ),
            Detector::Counter(d) => println!(
                "  {:<12} {:<8} {} counter(s) at {} Hz",
                d.name,
                group,
                d.channels.len(),
                d.trigger_frequency
            ),
        }
    }

    println!("Matrices:");
    for matrix in setup.matrices() {
        let names = |indices: &[usize]| {
            indices
                .iter()
                .map(|&i| setup.detectors()[i].name())
                .collect::<Vec<_>>()
                .join(" ")
        };
        println!(
            "  {:<12} x [{}] y [{}]{}",
            matrix.name,
            names(&matrix.x_data),
            names(&matrix.y_data),
            if matrix.symmetrize { " symmetrized" } else { "" }
        );
        if !matrix.is_fillable() {
            warn!(
                "matrix '{}' has no y detectors and stays empty",
                matrix.name
            );
        }
    }
}
