//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{CohortDefinition, CohortDimension, DateRange, FilterCriteria};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// PeerBench - participant performance analytics and peer benchmarking
///
/// Computes KPIs, revenue and headcount series, intervention and compliance
/// distributions for one participant from a snapshot of the record store,
/// optionally overlaid with averages over a peer cohort.
///
/// Examples:
///   peerbench --snapshot ./export --participant P-104
///   peerbench --snapshot ./export --participant P-104 --cohort sector
///   peerbench --participant P-104 --program PRG-7 --from 2024-01-01 --to 2024-06-30
///   peerbench --participant P-104 --format json --output bundle.json
///   peerbench --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Participant to analyze
    #[arg(
        short,
        long,
        value_name = "ID",
        required_unless_present = "init_config"
    )]
    pub participant: Option<String>,

    /// Snapshot directory of JSON collection files
    ///
    /// Overrides `store.snapshot_dir` from .peerbench.toml.
    #[arg(short, long, value_name = "DIR", env = "PEERBENCH_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Restrict to one program ("all" for every program)
    #[arg(long, value_name = "ID")]
    pub program: Option<String>,

    /// Restrict interventions to a consultant (case-insensitive substring, "all" for any)
    #[arg(long, value_name = "NAME")]
    pub consultant: Option<String>,

    /// Start of the date range (inclusive, YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "to")]
    pub from: Option<NaiveDate>,

    /// End of the date range (inclusive, YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "from")]
    pub to: Option<NaiveDate>,

    /// Overlay peer averages drawn on this dimension
    #[arg(long, value_name = "DIMENSION")]
    pub cohort: Option<CohortArg>,

    /// Caller's organization code; records of other organizations are excluded
    #[arg(long, value_name = "CODE", env = "PEERBENCH_COMPANY")]
    pub company: Option<String>,

    /// Maximum number of peers to average (capped at 25)
    #[arg(long, value_name = "COUNT")]
    pub max_peers: Option<usize>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Leave drill-down tables out of markdown reports
    #[arg(long)]
    pub no_drilldowns: bool,

    /// Output file path for the report (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .peerbench.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .peerbench.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Peer cohort dimension for --cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CohortArg {
    Gender,
    Sector,
    Program,
}

impl From<CohortArg> for CohortDimension {
    fn from(arg: CohortArg) -> Self {
        match arg {
            CohortArg::Gender => CohortDimension::Gender,
            CohortArg::Sector => CohortDimension::Sector,
            CohortArg::Program => CohortDimension::Program,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the participant id, empty if not set (should be validated first).
    pub fn participant_id(&self) -> &str {
        self.participant.as_deref().unwrap_or("")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.participant_id().trim().is_empty() {
            return Err("Participant id must not be empty".to_string());
        }

        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => {
                return Err(format!(
                    "Date range start {} is after its end {}",
                    from, to
                ));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err("--from and --to must be given together".to_string());
            }
            _ => {}
        }

        if self.max_peers == Some(0) {
            return Err("Max peers must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Filter criteria described by the flags.
    pub fn filters(&self) -> FilterCriteria {
        let date_range = match (self.from, self.to) {
            (Some(from), Some(to)) => Some(DateRange::new(from, to)),
            _ => None,
        };

        FilterCriteria {
            company_code: self.company.as_deref().and_then(FilterCriteria::selection),
            program: self.program.as_deref().and_then(FilterCriteria::selection),
            consultant: self.consultant.as_deref().and_then(FilterCriteria::selection),
            date_range,
        }
    }

    /// Peer cohort requested by --cohort.
    pub fn cohort(&self) -> CohortDefinition {
        match self.cohort {
            Some(dimension) => CohortDefinition::on(dimension.into()),
            None => CohortDefinition::disabled(),
        }
    }
}
