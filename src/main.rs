//! `perch` command-line entry point

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use perch_stats::{pipeline, AnalysisConfig, Dataset, Stage};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Bat landing and rat activity analysis
#[derive(Parser, Debug)]
#[command(name = "perch", version, about, long_about = None)]
struct Cli {
    /// JSON configuration file; positional paths override it
    #[arg(global = true, short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level regardless of RUST_LOG
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shapes, previews, column types and missing values
    Inspect(Inputs),
    /// Frequencies, crosstabs, summaries and bucketed means
    Describe(Inputs),
    /// Hypothesis tests on the pooled data
    Infer(Inputs),
    /// Winter vs spring tests and the summary file
    Seasonal(Inputs),
    /// Every stage in order
    All(Inputs),
}

#[derive(Args, Debug, Default)]
struct Inputs {
    /// Event-level CSV, one row per bat landing
    events: Option<PathBuf>,
    /// Window-level CSV, one row per observation window
    windows: Option<PathBuf>,
    /// Directory for charts and the summary file
    output: Option<PathBuf>,
}

impl Command {
    fn split(self) -> (Stage, Inputs) {
        match self {
            Self::Inspect(inputs) => (Stage::Inspect, inputs),
            Self::Describe(inputs) => (Stage::Describe, inputs),
            Self::Infer(inputs) => (Stage::Infer, inputs),
            Self::Seasonal(inputs) => (Stage::Seasonal, inputs),
            Self::All(inputs) => (Stage::All, inputs),
        }
    }
}

impl Inputs {
    fn apply(self, config: &mut AnalysisConfig) {
        if let Some(path) = self.events {
            config.events_path = path;
        }
        if let Some(path) = self.windows {
            config.windows_path = path;
        }
        if let Some(dir) = self.output {
            config.output_dir = dir;
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    let (stage, inputs) = cli
        .command
        .unwrap_or_else(|| Command::All(Inputs::default()))
        .split();
    inputs.apply(&mut config);
    config.validate().context("invalid configuration")?;

    info!(
        events = %config.events_path.display(),
        windows = %config.windows_path.display(),
        output = %config.output_dir.display(),
        ?stage,
        "starting analysis"
    );
    let data = Dataset::load(&config).context("failed to load input data")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    pipeline::run(stage, &data, &config, &mut out)
        .with_context(|| format!("{stage:?} stage failed"))?;
    out.flush()?;
    Ok(())
}
