//! CLI entry point for the signal KPI tool.
//!
//! Loads a dataset (record CSV, episode JSON, raw validation JSON or a
//! training log) from a file or URL and prints dashboard views, exports
//! filtered records, evaluates research objectives, or checks a record CSV's
//! columns.

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use signal_kpi::{
    adapter::SeededNoise,
    analyzers::{breakdown::Category, filter::Selection},
    config::PipelineConfig,
    dashboard::Dashboard,
    output::{export_records, print_json},
    parser::{inspect_schema, parse_episodes, parse_records, parse_training, parse_validation},
    record::Metric,
    source::{BasicClient, read_source},
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "signal_kpi")]
#[command(about = "Compare learned and fixed-time signal control runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print KPIs, comparisons, time series and breakdown for a selection
    Summary {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Metric plotted in the time series and breakdown
        #[arg(short, long, value_enum, default_value_t = Metric::PassengerThroughput)]
        metric: Metric,

        /// Dimension the breakdown groups on
        #[arg(long, value_enum, default_value_t = Category::Intersection)]
        category: Category,
    },
    /// Write the filtered records to a CSV file
    Export {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        selection: SelectionArgs,

        /// CSV file to write
        #[arg(short, long, default_value = "records.csv")]
        output: String,

        /// Gzip compress the CSV
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Evaluate the research objectives over episode data
    Objectives {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Check a record CSV for missing columns
    Validate {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Path to file or URL to fetch
    #[arg(value_name = "FILE_OR_URL")]
    source: String,

    /// Shape of the input data
    #[arg(short, long, value_enum, default_value_t = InputFormat::Records)]
    format: InputFormat,

    /// Pipeline configuration JSON
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Args)]
struct SelectionArgs {
    /// Runs to include (comma separated); defaults to every run
    #[arg(long, value_delimiter = ',')]
    runs: Vec<String>,

    /// Intersection to include; defaults to all
    #[arg(long)]
    intersection: Option<String>,

    /// First cycle to include
    #[arg(long)]
    cycle_min: Option<u32>,

    /// Last cycle to include
    #[arg(long)]
    cycle_max: Option<u32>,

    /// Drop records without occupancy or total count
    #[arg(long, default_value_t = false)]
    hide_incomplete: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Flat cycle-record CSV
    Records,
    /// JSON array of training episodes
    Episodes,
    /// JSON array of paired validation results
    Validation,
    /// Training log JSON with a `training_results` array
    Training,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/signal_kpi.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("signal_kpi.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Summary {
            input,
            selection,
            metric,
            category,
        } => {
            let dashboard = load_dashboard(&input).await?;
            let selection = selection.resolve(&dashboard);
            let view = dashboard.view(&selection, metric, category);

            info!(
                filtered = view.filtered_records,
                latest_cycle = ?view.latest_cycle,
                "Summary ready"
            );
            print_json(&view)?;
        }
        Commands::Export {
            input,
            selection,
            output,
            gzip,
        } => {
            let dashboard = load_dashboard(&input).await?;
            let selection = selection.resolve(&dashboard);
            let records = dashboard.filter(&selection);

            if records.is_empty() {
                warn!("Selection matched no records, writing an empty file");
            }
            export_records(&output, &records, gzip)?;
        }
        Commands::Objectives { input } => {
            if matches!(input.format, InputFormat::Records) {
                bail!("objectives need episode, validation or training input, not a record CSV");
            }
            let dashboard = load_dashboard(&input).await?;
            let report = dashboard.objectives();

            info!(
                objective_1 = report.objective_1_achieved,
                objective_2 = report.objective_2_achieved,
                objective_3 = report.objective_3_achieved,
                "Objectives evaluated"
            );
            print_json(&report)?;
        }
        Commands::Validate { source } => {
            let bytes = read_source(&BasicClient::new(), &source).await?;
            let report = inspect_schema(&bytes)?;
            print_json(&report)?;

            if !report.is_valid() {
                bail!(
                    "'{source}' is not a usable record CSV (missing columns: {:?})",
                    report.missing_columns
                );
            }
            info!(
                unexpected = report.unexpected_columns.len(),
                "Record CSV schema is valid"
            );
        }
    }

    Ok(())
}

impl SelectionArgs {
    /// Starts from everything in the dataset and narrows by the given flags.
    fn resolve(self, dashboard: &Dashboard) -> Selection {
        let mut selection = dashboard.default_selection();

        if !self.runs.is_empty() {
            selection.runs = self.runs;
        }
        if let Some(intersection) = self.intersection {
            selection.intersection = intersection;
        }
        if let Some(min) = self.cycle_min {
            selection.cycle_range.0 = min;
        }
        if let Some(max) = self.cycle_max {
            selection.cycle_range.1 = max;
        }
        selection.hide_incomplete = self.hide_incomplete;
        selection
    }
}

/// Reads the input and builds a dashboard over it.
#[tracing::instrument(skip(input), fields(source = %input.source))]
async fn load_dashboard(input: &InputArgs) -> Result<Dashboard> {
    let config = match &input.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let bytes = read_source(&BasicClient::new(), &input.source).await?;
    let mut noise = SeededNoise::from_config(&config);

    let dashboard = match input.format {
        InputFormat::Records => {
            let report = inspect_schema(&bytes)?;
            if !report.is_valid() {
                bail!(
                    "record CSV is missing columns {:?} or has no rows",
                    report.missing_columns
                );
            }
            let records = parse_records(&bytes, &config)?;
            Dashboard::from_records(config, records)
        }
        InputFormat::Episodes => {
            let episodes = parse_episodes(&bytes)?;
            Dashboard::from_episodes(config, episodes, &mut noise)
        }
        InputFormat::Validation => {
            let entries = parse_validation(&bytes)?;
            Dashboard::from_validation(config, &entries, &mut noise)
        }
        InputFormat::Training => {
            let log = parse_training(&bytes)?;
            Dashboard::from_training(config, &log, &mut noise)
        }
    };

    info!(
        records = dashboard.records().len(),
        runs = ?dashboard.available_runs(),
        "Dataset loaded"
    );
    Ok(dashboard)
}
