//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.peerbench.toml` files.

use crate::cli::{Args, OutputFormat};
use crate::engine::{EngineConfig, DEFAULT_MAX_PEERS};
use crate::store::MAX_IN_VALUES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".peerbench.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Record store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Peer cohort settings.
    #[serde(default)]
    pub cohort: CohortConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Where records are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of JSON collection files.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshot")
}

/// Peer cohort limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortConfig {
    /// Maximum peers averaged per request.
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,

    /// Ids per batched lookup (capped at the store's IN limit).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            max_peers: default_max_peers(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_max_peers() -> usize {
    DEFAULT_MAX_PEERS
}

fn default_batch_size() -> usize {
    MAX_IN_VALUES
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: ReportFormat,

    /// Include drill-down tables in markdown reports.
    #[serde(default = "default_true")]
    pub include_drilldowns: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::default(),
            include_drilldowns: true,
        }
    }
}

/// Serialized form of the report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Markdown => ReportFormat::Markdown,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.peerbench.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref dir) = args.snapshot {
            self.store.snapshot_dir = dir.clone();
        }
        if let Some(max_peers) = args.max_peers {
            self.cohort.max_peers = max_peers;
        }
        if let Some(format) = args.format {
            self.report.format = format.into();
        }
        if args.no_drilldowns {
            self.report.include_drilldowns = false;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Limits handed to the analytics engine.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::from(&self.cohort)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
