//! torstats - Tor network size charts
//!
//! A CLI tool that aggregates daily relay/exit/guard node lists into
//! time-series charts and composites them with the node distribution
//! pie chart.
//!
//! Exit codes:
//!   0 - Success (including an empty history, which draws nothing)
//!   1 - Runtime error, or a composite source image is missing

mod analysis;
mod cli;
mod composite;
mod config;
mod history;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Local;
use cli::{Args, Command};
use composite::{CompositeError, Compositor};
use config::Config;
use history::HistoryScanner;
use report::{ChartOutputs, ChartStyle};
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("torstats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .torstats.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  .torstats.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .torstats.toml")?;

    println!("✅ Created .torstats.toml with default settings.");
    println!("   Edit it to customize paths, chart size and colours.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch the selected pipeline. Returns the process exit code.
fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    debug!("Project root: {}", config.paths.project_root.display());

    match args.command {
        Some(Command::Chart { dump }) => run_chart(&config, dump.as_deref()),
        Some(Command::Combine) => run_combine(&config),
        None => Ok(0),
    }
}

/// Aggregate the history tree and draw the network chart.
fn run_chart(config: &Config, dump: Option<&Path>) -> Result<i32> {
    let scanner = HistoryScanner::new(config.paths.history_root());
    let network = analysis::collect_history(&scanner)?;

    if let Some(path) = dump {
        let json = serde_json::to_string_pretty(&network)
            .context("Failed to serialize aggregated history")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write history dump to {}", path.display()))?;
        info!("Aggregated history written to {}", path.display());
    }

    println!("Generating dual chart...");

    let today = Local::now().date_naive();
    let outputs = ChartOutputs {
        latest: config.paths.latest_chart(),
        archive: config.paths.archived_chart(today),
    };
    let style = ChartStyle::from_config(&config.chart)?;

    let written = report::render_network_chart(
        &network.node_types,
        &network.ip_versions,
        &style,
        &outputs,
        today,
    )?;

    if !written {
        warn!("No snapshots under {}", scanner.root().display());
    }

    Ok(0)
}

/// Combine the network chart and the pie chart side by side.
fn run_combine(config: &Config) -> Result<i32> {
    println!("Generating combined analytics chart...\n");

    let background = config::parse_hex_colour(&config.composite.background)?;
    let compositor = Compositor::new(config.composite.gap, background);

    let left = config.paths.latest_chart();
    let right = config.paths.pie_chart_path();
    let output = config.paths.combined_chart_path();

    match compositor.combine_files(&left, &right, &output) {
        Ok(layout) => {
            debug!("Composite layout: {:?}", layout);
            Ok(0)
        }
        Err(e @ CompositeError::MissingSource { .. }) => {
            println!("Error: {}", e);
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .torstats.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
