//! Laptrace - GNSS lap-timing toolkit
//!
//! Three stages, each usable on its own:
//! - `capture`: log raw receiver output from a serial port
//! - `demux`: split a captured stream into validated, bucketed files
//! - `laps`: compute lap times from a stream and a circuit map

use anyhow::Context;
use clap::{Parser, Subcommand};
use laptrace_core::core::capture::{self, CaptureConfig};
use laptrace_core::core::demux::FrameSink;
use laptrace_core::core::replay;
use laptrace_core::core::track::LapTimer;
use laptrace_core::{BucketedSink, DemuxStats, Demultiplexer, PassthroughSink, SectorMap, TimingEngine};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Laptrace CLI
#[derive(Parser, Debug)]
#[command(
    name = "laptrace",
    version,
    about = "GNSS stream demultiplexer and lap-timing engine",
    long_about = None
)]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture raw receiver output from a serial port
    Capture {
        /// Serial device to read from
        #[arg(short, long, default_value = "/dev/ttyS2")]
        device: String,

        /// Baud rate
        #[arg(short, long, default_value = "115200")]
        baud: u32,

        /// Directory for log files
        #[arg(short, long)]
        log_dir: PathBuf,

        /// Skip the raw-measurement setup commands
        #[arg(long)]
        no_raw: bool,
    },

    /// Demultiplex a captured stream into validated frame files
    Demux {
        /// Capture file, or a directory of capture files
        input: PathBuf,

        /// Directory for time-bucketed output files
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Also write every validated frame to one combined file
        #[arg(short, long)]
        combined: Option<PathBuf>,
    },

    /// Compute lap times from a captured stream and a circuit map
    Laps {
        /// Capture file, or a directory of capture files
        input: PathBuf,

        /// GeoJSON circuit map with named sectors and finish line
        #[arg(short, long)]
        track: PathBuf,

        /// Shift printed wall-clock times by whole hours from UTC
        #[arg(long, default_value = "0")]
        clock_offset: i32,

        /// Maximum seconds between crossings that still pair into a lap
        #[arg(long, default_value = "300")]
        max_gap: f64,
    },
}

/// Run the demultiplexer over a file or a whole capture directory
fn run_stream(input: &Path, sinks: &mut [&mut dyn FrameSink]) -> anyhow::Result<DemuxStats> {
    if input.is_dir() {
        Ok(replay::replay_directory(input, sinks)?)
    } else {
        let file = File::open(input)
            .with_context(|| format!("failed to open {}", input.display()))?;
        let mut demux = Demultiplexer::new(BufReader::new(file));
        Ok(demux.run(sinks)?)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Laptrace v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Capture {
            device,
            baud,
            log_dir,
            no_raw,
        } => {
            std::fs::create_dir_all(&log_dir)
                .with_context(|| format!("failed to create {}", log_dir.display()))?;
            let config = CaptureConfig {
                device,
                baud_rate: baud,
                log_dir,
                enable_raw: !no_raw,
            };
            let stop = capture::stop_flag().context("failed to install Ctrl-C handler")?;
            capture::run(&config, &stop).context("capture failed")?;
        }

        Commands::Demux {
            input,
            out_dir,
            combined,
        } => {
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            let mut bucketed = BucketedSink::new(&out_dir);

            let stats = match combined {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    let mut passthrough = PassthroughSink::new(std::io::BufWriter::new(file));
                    let stats = run_stream(&input, &mut [&mut bucketed, &mut passthrough])?;
                    passthrough.into_inner()?;
                    stats
                }
                None => run_stream(&input, &mut [&mut bucketed])?,
            };
            bucketed.flush()?;

            println!(
                "{} UBX frames, {} NMEA sentences, {} bytes resynced",
                stats.ubx_frames, stats.nmea_sentences, stats.resyncs
            );
        }

        Commands::Laps {
            input,
            track,
            clock_offset,
            max_gap,
        } => {
            let map = SectorMap::from_path(&track)
                .with_context(|| format!("failed to load {}", track.display()))?;
            let mut engine = TimingEngine::new(&map, std::io::stdout())
                .clock_offset_hours(clock_offset)
                .lap_timer(LapTimer::with_max_gap(max_gap));

            run_stream(&input, &mut [&mut engine])?;

            let laps = engine.laps().len();
            engine.into_inner()?;
            tracing::info!(laps, "finished");
        }
    }

    Ok(())
}
