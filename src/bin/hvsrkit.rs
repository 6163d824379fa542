//! hvsrkit CLI - Command-line interface for hvsrkit
//!
//! Commands:
//! - compute: Compute HVSR for one station from a directory of daily PSD artifacts
//! - reference: Parse a reference spectral-ratio curve file and echo it as JSON

use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use hvsrkit::{
    day_range, psd_to_hvsr, read_reference_curve, ConverterConfig, HvsrError, JsonDirStore,
    StationId, DEFAULT_CADENCE_MINUTES, HVSRKIT_VERSION,
};

/// hvsrkit - Compute ambient-noise HVSR from stored power spectral densities
#[derive(Parser)]
#[command(name = "hvsrkit")]
#[command(version = HVSRKIT_VERSION)]
#[command(about = "Transform stored PSD matrices into HVSR curves", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute HVSR for one station over a date range
    Compute {
        /// Directory of daily PSD JSON artifacts
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Network code
        #[arg(long)]
        network: String,

        /// Station code
        #[arg(long)]
        station: String,

        /// Location code
        #[arg(long, default_value = "")]
        location: String,

        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last day of the range, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        /// Temporal resampling cadence in minutes
        #[arg(long, default_value_t = DEFAULT_CADENCE_MINUTES)]
        cadence_minutes: i64,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Parse a reference spectral-ratio curve file
    Reference {
        /// Tab-delimited curve file (frequency, mean, min, max)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), KitCliError> {
    match cli.command {
        Commands::Compute {
            data_dir,
            network,
            station,
            location,
            from,
            to,
            cadence_minutes,
            output_format,
        } => cmd_compute(
            &data_dir,
            &network,
            &station,
            &location,
            from,
            to,
            cadence_minutes,
            output_format,
        ),

        Commands::Reference {
            input,
            output_format,
        } => cmd_reference(&input, output_format),
    }
}

fn cmd_compute(
    data_dir: &PathBuf,
    network: &str,
    station: &str,
    location: &str,
    from: NaiveDate,
    to: NaiveDate,
    cadence_minutes: i64,
    output_format: OutputFormat,
) -> Result<(), KitCliError> {
    if to < from {
        return Err(KitCliError::EmptyRange);
    }

    let store = JsonDirStore::new(data_dir);
    let station_id = StationId::new(network, station, location);
    let config = ConverterConfig::new(cadence_minutes);
    let days = day_range(from, to);

    let result = psd_to_hvsr(&store, &station_id, &days, &config)?;

    if result.table.is_empty() {
        log::warn!("no overlapping data for {} in {} - {}", station_id, from, to);
    }

    print_json(&result, &output_format)?;
    Ok(())
}

fn cmd_reference(input: &PathBuf, output_format: OutputFormat) -> Result<(), KitCliError> {
    let curve = read_reference_curve(input)?;
    print_json(&curve, &output_format)?;
    Ok(())
}

fn print_json<T: serde::Serialize>(
    value: &T,
    format: &OutputFormat,
) -> Result<(), KitCliError> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
    };
    println!("{}", rendered);
    Ok(())
}

// Error types

#[derive(Debug)]
enum KitCliError {
    Io(io::Error),
    Compute(HvsrError),
    Json(serde_json::Error),
    EmptyRange,
}

impl From<io::Error> for KitCliError {
    fn from(e: io::Error) -> Self {
        KitCliError::Io(e)
    }
}

impl From<HvsrError> for KitCliError {
    fn from(e: HvsrError) -> Self {
        KitCliError::Compute(e)
    }
}

impl From<serde_json::Error> for KitCliError {
    fn from(e: serde_json::Error) -> Self {
        KitCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<KitCliError> for CliError {
    fn from(e: KitCliError) -> Self {
        match e {
            KitCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            KitCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check artifact contents and configuration".to_string()),
            },
            KitCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            KitCliError::EmptyRange => CliError {
                code: "EMPTY_RANGE".to_string(),
                message: "end date precedes start date".to_string(),
                hint: Some("Swap --from and --to".to_string()),
            },
        }
    }
}
