//! Command line interface for the flightlog parsing pipeline.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use flightlog::config::Settings;
use flightlog::generation::{self, SENSOR_FILE_STEM};
use flightlog::parse;
use flightlog::sync;
use flightlog::trim;
use flightlog::Generation;

#[derive(Debug, Parser)]
#[command(author, version, about = "Flight log parsing and trimming toolkit")]
struct Cli {
    /// Path to an optional TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Identify the hardware generation of a log directory
    Classify {
        /// Directory containing raw log files
        log_dir: PathBuf,
    },

    /// Parse a modern log directory into a processed flight log
    Parse {
        /// Directory containing the sensor and track log files
        log_dir: PathBuf,

        /// Serialize the parsed session below this directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Reload a previously serialized session if one exists
        #[arg(long)]
        prefer_processed: bool,

        /// Shift GPS coordinates to begin at (0, 0)
        #[arg(long)]
        normalize_gps: bool,
    },

    /// Parse legacy single-file track logs from a directory
    ParseLegacy {
        /// Directory containing legacy log files
        log_dir: PathBuf,

        /// Shift GPS coordinates to begin at (0, 0)
        #[arg(long)]
        normalize_gps: bool,
    },

    /// Trim a raw log file to a row index window
    Trim {
        /// Raw log file to trim
        filepath: PathBuf,

        /// First data row to keep
        #[arg(short, long)]
        start: Option<i64>,

        /// Last data row to keep
        #[arg(short, long)]
        end: Option<i64>,
    },

    /// Report the sensor-to-track clock offset of a modern log directory
    SyncOffset {
        /// Directory containing the sensor and track log files
        log_dir: PathBuf,
    },
}

fn init_logging(cli: &Cli) {
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else {
        let default_level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let settings =
        Settings::new(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Classify { log_dir } => {
            let generation = generation::classify_log_dir(&log_dir)
                .with_context(|| format!("Failed to classify '{}'", log_dir.display()))?;
            println!("{generation:?}");
        }

        Commands::Parse {
            log_dir,
            out_dir,
            prefer_processed,
            normalize_gps,
        } => {
            let log =
                parse::parse_log_directory(&log_dir, &settings, prefer_processed, normalize_gps)
                .with_context(|| format!("Failed to parse '{}'", log_dir.display()))?;
            info!(
                channels = log.sensors.len(),
                track_rows = log.track.n_rows(),
                "Parse complete"
            );

            if let Some(out_dir) = out_dir {
                let session_dir = log
                    .to_csv(&out_dir, normalize_gps)
                    .context("Failed to serialize flight log")?;
                println!("{}", session_dir.display());
            }
        }

        Commands::ParseLegacy {
            log_dir,
            normalize_gps,
        } => {
            let logs = parse::batch_load_legacy(&log_dir, normalize_gps)
                .with_context(|| format!("Failed to parse '{}'", log_dir.display()))?;
            for (stem, log) in &logs {
                println!("{stem}: {} track rows", log.track.n_rows());
            }
        }

        Commands::Trim {
            filepath,
            start,
            end,
        } => {
            let is_sensor_file = filepath
                .file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(|stem| stem.eq_ignore_ascii_case(SENSOR_FILE_STEM));
            let generation = if is_sensor_file {
                Generation::Modern
            } else {
                Generation::Legacy
            };

            let trimmed_filepath = trim::trim_data_file(
                &filepath,
                start,
                end,
                generation,
                &settings.trim.filename_suffix,
            )
            .with_context(|| format!("Failed to trim '{}'", filepath.display()))?;
            println!("{}", trimmed_filepath.display());
        }

        Commands::SyncOffset { log_dir } => {
            let sensor_filepath = log_dir.join(&settings.parsing.sensor_filename);
            let track_filepath = log_dir.join(&settings.parsing.track_filename);

            let (sensors, _) =
                parse::parse_sensor_file(&sensor_filepath, settings.parsing.ground_pressure_pa)
                    .context("Failed to parse sensor log")?;
            let (track, _) =
                parse::parse_track_file(&track_filepath).context("Failed to parse track log")?;

            let time_channel = sensors
                .get("TIME")
                .context("Log contains no TIME channel to synchronize against")?;
            let track_offset = sync::calculate_sync_delta(&track, time_channel)?;
            println!("{track_offset:.6}");
        }
    }

    Ok(())
}
