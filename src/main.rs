use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use streamchart::charts::ChartProcessor;
use streamchart::config::EngineConfig;
use streamchart::data::{is_data_file, load_rows, parse_definitions_file};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(about = "Aggregate a CSV/TSV/JSON file into ranked chart datasets")]
struct Args {
    /// Input rows (.csv, .tsv or .json).
    input: PathBuf,

    /// JSON array of chart definitions. Charts are autodetected when omitted.
    #[arg(long)]
    definitions: Option<PathBuf>,

    /// JSON engine configuration overriding the default limits.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print compact JSON instead of pretty-printed output.
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    // stdout carries the result, logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamchart=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    if !is_data_file(&args.input) {
        bail!(
            "{} is not a .csv, .tsv, .txt or .json file",
            args.input.display()
        );
    }

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let definitions = match &args.definitions {
        Some(path) => parse_definitions_file(path)
            .with_context(|| format!("failed to load definitions {}", path.display()))?,
        None => Vec::new(),
    };

    let rows = load_rows(&args.input)
        .with_context(|| format!("failed to load rows from {}", args.input.display()))?;
    tracing::info!(
        rows = rows.len(),
        definitions = definitions.len(),
        "Loaded input"
    );

    let mut processor = ChartProcessor::with_config(definitions, config);
    processor
        .add_rows(&rows)
        .context("chart aggregation failed")?;
    processor.finalize().context("chart finalization failed")?;

    let charts = processor.into_charts();
    tracing::info!(charts = charts.len(), "Prepared charts");

    let json = if args.compact {
        serde_json::to_string(&charts)?
    } else {
        serde_json::to_string_pretty(&charts)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}")?;
    Ok(())
}
