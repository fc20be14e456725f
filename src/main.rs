//! CLI entry point for the BiciMAD trip analyzer.
//!
//! Provides subcommands for listing the published monthly archives, resolving
//! an archive URL, and analyzing one month of trips.

use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use bicimad::config::Settings;
use bicimad::fetch::{BasicClient, fetch_bytes};
use bicimad::output::{append_record, print_json, print_pretty, write_daily};
use bicimad::{Period, TripDataset, UrlRegistry};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bicimad")]
#[command(about = "Download and summarize BiciMAD trip records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every monthly archive published on the portal
    Links,
    /// Print the archive URL for a month
    Url {
        /// Month (1-12)
        #[arg(short, long)]
        month: u32,

        /// Two-digit year (e.g. 23)
        #[arg(short, long)]
        year: u32,
    },
    /// Load one month of trips and report usage statistics
    Analyze {
        /// Month (1-12)
        #[arg(short, long)]
        month: u32,

        /// Two-digit year (e.g. 23)
        #[arg(short, long)]
        year: u32,

        /// Local ZIP/CSV file or URL of a ZIP to read instead of the portal
        #[arg(short, long, value_name = "FILE_OR_URL")]
        source: Option<String>,

        /// CSV file to append the monthly summary to
        #[arg(short, long, default_value = "summary.csv")]
        output: String,

        /// Optional: write the per-day table to this CSV file
        #[arg(short, long)]
        daily: Option<String>,

        /// Gzip compress the per-day CSV
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Log the report as JSON instead of one line per group
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bicimad.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bicimad.log"));

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
    let settings = Settings::from_env();
    let client = BasicClient::new(settings.timeout)?;

    match cli.command {
        Commands::Links => {
            let registry = UrlRegistry::fetch(&client, &settings)?;
            for (period, url) in registry.iter() {
                info!(month = period.month(), year = period.year(), url, "Archive");
            }
            info!(total = registry.len(), "Archive list fetched");
        }
        Commands::Url { month, year } => {
            let registry = UrlRegistry::fetch(&client, &settings)?;
            let url = registry.get_url(month, year)?;
            println!("{url}");
        }
        Commands::Analyze {
            month,
            year,
            source,
            output,
            daily,
            gzip,
            json,
        } => {
            let dataset = match source {
                Some(source) => load_source(&client, &source, Period::new(month, year)?)?,
                None => TripDataset::load_with(&client, &settings, month, year)?,
            };

            if json {
                print_json(&dataset)?;
            } else {
                print_pretty(&dataset);
            }

            append_record(&output, &dataset.summary())?;
            if let Some(daily) = daily {
                write_daily(&daily, &dataset.daily_stats(), gzip)?;
            }
            info!(output, "Finished analysis");
        }
    }

    Ok(())
}

/// Loads a dataset from a local ZIP/CSV file or a ZIP served over HTTP.
#[tracing::instrument(skip(client))]
fn load_source(client: &BasicClient, source: &str, period: Period) -> Result<TripDataset> {
    let dataset = if source.starts_with("http") {
        let bytes = fetch_bytes(client, source)?;
        TripDataset::from_archive(&bytes, period)?
    } else if source.to_ascii_lowercase().ends_with(".zip") {
        let bytes = std::fs::read(source).with_context(|| format!("reading {source}"))?;
        TripDataset::from_archive(&bytes, period)?
    } else {
        let file = File::open(source).with_context(|| format!("opening {source}"))?;
        TripDataset::from_reader(file, period)?
    };
    Ok(dataset)
}
