//! Sample collocation command-line tool.
//!
//! Matches point samples (latitude, longitude, date) to the nearest cell of
//! dated NetCDF products and appends the gridded values to each row.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use collocation::{PhysicalConstants, Tolerance, UpwellingColumns, UpwellingParams};
use collocator::{load_service_config, run_upwelling, CollocationPipeline};
use netcdf_parser::{silence_hdf5_errors, NetCdfSource};
use table_io::CsvOptions;

#[derive(Parser, Debug)]
#[command(name = "collocator")]
#[command(about = "Collocate sample tables with gridded ocean products")]
struct Args {
    /// Log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "json", env = "COLLOCATOR_LOG_FORMAT", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ToleranceUnit {
    Degrees,
    Km,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collocate a sample table using a run file
    Collocate(CollocateArgs),
    /// Add an upwelling index column computed from wind columns
    Upwelling(UpwellingArgs),
}

#[derive(clap::Args, Debug)]
struct CollocateArgs {
    /// Run file path
    #[arg(short, long, default_value = "config/collocation.yaml", env = "COLLOCATOR_CONFIG")]
    config: PathBuf,

    /// Input table (overrides the run file)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output table (overrides the run file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON report path (overrides the run file)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Workbook sheets to process (overrides the run file)
    #[arg(long, value_delimiter = ',')]
    sheets: Option<Vec<String>>,

    /// Matching tolerance value (needs --tolerance-unit)
    #[arg(long, requires = "tolerance_unit")]
    tolerance: Option<f64>,

    /// Matching tolerance unit (needs --tolerance)
    #[arg(long, value_enum, requires = "tolerance")]
    tolerance_unit: Option<ToleranceUnit>,

    /// Process dates in parallel
    #[arg(long, conflicts_with = "sequential")]
    parallel: bool,

    /// Process dates one after another
    #[arg(long)]
    sequential: bool,

    /// Worker threads for parallel mode
    #[arg(long, env = "COLLOCATOR_THREADS")]
    threads: Option<usize>,

    /// Text written for missing values
    #[arg(long)]
    missing_marker: Option<String>,
}

#[derive(clap::Args, Debug)]
struct UpwellingArgs {
    /// Input table with wind columns
    #[arg(short, long)]
    input: PathBuf,

    /// Output table
    #[arg(short, long)]
    output: PathBuf,

    /// Workbook sheets to process (every sheet when omitted)
    #[arg(long, value_delimiter = ',')]
    sheets: Vec<String>,

    /// Latitude column (falls back to LATITUDE, then latitude)
    #[arg(long)]
    lat_column: Option<String>,

    /// Eastward wind column
    #[arg(long, default_value = "eastward_wind")]
    u_column: String,

    /// Northward wind column
    #[arg(long, default_value = "northward_wind")]
    v_column: String,

    /// Name of the added column
    #[arg(long, default_value = "UI")]
    output_column: String,

    /// Coastline orientation in degrees
    #[arg(long, default_value_t = -32.0, allow_hyphen_values = true)]
    coastline_angle: f64,

    /// Air density (kg/m^3)
    #[arg(long, default_value_t = PhysicalConstants::default().rho_air)]
    rho_air: f64,

    /// Sea water density (kg/m^3)
    #[arg(long, default_value_t = PhysicalConstants::default().rho_water)]
    rho_water: f64,

    /// Wind drag coefficient
    #[arg(long, default_value_t = PhysicalConstants::default().drag_coefficient)]
    drag_coefficient: f64,

    /// Earth rotation rate (rad/s)
    #[arg(long, default_value_t = PhysicalConstants::default().omega)]
    omega: f64,

    /// Field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Text written for missing values
    #[arg(long, default_value = "NaN")]
    missing_marker: String,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format);
    silence_hdf5_errors();

    match args.command {
        Command::Collocate(cmd) => collocate(cmd),
        Command::Upwelling(cmd) => upwelling(cmd),
    }
}

fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = fmt().with_env_filter(filter).with_target(true).with_level(true);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn collocate(cmd: CollocateArgs) -> Result<()> {
    let mut config = load_service_config(&cmd.config)?;

    if let Some(input) = cmd.input {
        config.input.path = input;
    }
    if let Some(output) = cmd.output {
        config.output.path = output;
    }
    if let Some(report) = cmd.report {
        config.output.report = Some(report);
    }
    if let Some(sheets) = cmd.sheets {
        config.input.sheets = sheets;
    }
    if let (Some(value), Some(unit)) = (cmd.tolerance, cmd.tolerance_unit) {
        config.collocation.tolerance = match unit {
            ToleranceUnit::Km => Tolerance::km(value),
            ToleranceUnit::Degrees => Tolerance::degrees(value),
        };
    }
    if cmd.parallel {
        config.collocation.parallel = true;
    }
    if cmd.sequential {
        config.collocation.parallel = false;
    }
    if let Some(marker) = cmd.missing_marker {
        config.collocation.missing_marker = marker;
    }
    if let Some(threads) = cmd.threads {
        config.runtime.threads = Some(threads);
    }
    anyhow::ensure!(
        config.input.path != config.output.path,
        "Output path must differ from input path: {:?}",
        config.input.path
    );

    if let Some(threads) = config.runtime.threads.filter(|_| config.collocation.parallel) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    info!(
        config = %cmd.config.display(),
        groups = ?config.collocation.groups.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
        tolerance = config.collocation.tolerance.value,
        unit = config.collocation.tolerance.unit.as_str(),
        parallel = config.collocation.parallel,
        "Loaded configuration"
    );

    let pipeline = CollocationPipeline::new(config, Arc::new(NetCdfSource::new()))?;
    let report = pipeline.run()?;

    for warning in &report.warnings {
        warn!(warning = %warning, "Collocation warning");
    }
    Ok(())
}

fn upwelling(cmd: UpwellingArgs) -> Result<()> {
    let columns = UpwellingColumns {
        lat: cmd.lat_column,
        u: cmd.u_column,
        v: cmd.v_column,
        output: cmd.output_column,
    };
    let params = UpwellingParams {
        coastline_angle_deg: cmd.coastline_angle,
        constants: PhysicalConstants {
            rho_air: cmd.rho_air,
            rho_water: cmd.rho_water,
            drag_coefficient: cmd.drag_coefficient,
            omega: cmd.omega,
        },
    };
    let csv = CsvOptions {
        delimiter: cmd.delimiter,
        missing_marker: cmd.missing_marker,
    };

    let summaries = run_upwelling(&cmd.input, &cmd.output, &cmd.sheets, &columns, &params, &csv)?;
    for (sheet, summary) in &summaries {
        info!(
            output = %cmd.output.display(),
            sheet = %sheet,
            computed = summary.computed,
            undefined_at_equator = summary.undefined_at_equator,
            "Upwelling index written"
        );
    }
    Ok(())
}
