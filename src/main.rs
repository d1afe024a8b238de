//! PeerBench - participant performance analytics and peer benchmarking
//!
//! A CLI tool that loads a snapshot of the incubation record store,
//! computes one participant's analytics bundle and renders it as a
//! Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad snapshot, config, participant not found, etc.)

use anyhow::{Context, Result};
use peerbench::cli::Args;
use peerbench::config::{Config, ReportFormat, DEFAULT_CONFIG_FILE};
use peerbench::report::{self, ReportOptions};
use peerbench::store::load_snapshot;
use peerbench::{AnalyticsError, AnalyticsFacade, AnalyticsSession};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
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

    // Load configuration
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, &config);

    info!("PeerBench v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args, config).await {
        error!("Analytics failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .peerbench.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to set the snapshot directory, peer limits and report format.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load the snapshot, compute the bundle and write the report.
async fn run(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    let snapshot_dir = &config.store.snapshot_dir;
    info!("Loading snapshot from {}", snapshot_dir.display());
    let store = load_snapshot(snapshot_dir)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_dir.display()))?;

    let facade = AnalyticsFacade::new(Arc::new(store), config.engine_config());
    let session = AnalyticsSession::new();
    let token = session.begin();

    let participant_id = args.participant_id().to_string();
    let filters = args.filters();
    let cohort = args.cohort();
    debug!("Filters: {:?}, cohort: {:?}", filters, cohort);

    let computation = facade.compute_analytics(&participant_id, &filters, cohort, &token);
    tokio::pin!(computation);

    let bundle = loop {
        tokio::select! {
            result = &mut computation => break result,
            _ = tokio::signal::ctrl_c(), if !token.is_cancelled() => {
                warn!("Interrupted, cancelling");
                session.cancel();
            }
        }
    };

    let bundle = match bundle {
        Ok(bundle) => bundle,
        Err(AnalyticsError::NotFound(id)) => {
            anyhow::bail!("Participant {} not found in {}", id, snapshot_dir.display())
        }
        Err(e) => return Err(e).context("Failed to compute analytics"),
    };

    for warning in &bundle.warnings {
        warn!("{}", warning);
    }

    let options = ReportOptions::from(&config.report);
    match args.output {
        Some(ref path) => {
            report::write_report(&bundle, &options, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report saved to {}", path.display());
        }
        None => {
            let output = match options.format {
                ReportFormat::Json => report::generate_json_report(&bundle)?,
                ReportFormat::Markdown => report::generate_markdown_report(&bundle, &options),
            };
            println!("{}", output);
        }
    }

    info!(
        "Done in {:.2}s ({} warnings)",
        start_time.elapsed().as_secs_f64(),
        bundle.warnings.len()
    );

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("Warning: ignoring {}: {:#}", DEFAULT_CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
