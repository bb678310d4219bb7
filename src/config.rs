//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.rankviz.toml` files.

use crate::cli::OutputFormat;
use crate::corpus::CorpusLayout;
use crate::report::MissingSystemPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".rankviz.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Corpus location.
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Extra language name aliases, e.g. `Deutsch = "de"`.
    #[serde(default)]
    pub languages: BTreeMap<String, String>,
}

/// Corpus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Root of the WMT raw data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Test set name used in file names.
    #[serde(default = "default_test_set")]
    pub test_set: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: None,
            test_set: default_test_set(),
        }
    }
}

fn default_test_set() -> String {
    "newstest2013".to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Show wins and totals next to each ratio.
    #[serde(default)]
    pub show_counts: bool,

    /// Policy for judged systems without an output file.
    #[serde(default)]
    pub missing_system: MissingSystemPolicy,
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
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings. The corpus
    /// root from the command line already includes the environment fallback.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref root) = args.path {
            self.corpus.root = Some(root.clone());
        }
        if let Some(ref test_set) = args.test_set {
            self.corpus.test_set = test_set.clone();
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(policy) = args.on_missing_system {
            self.report.missing_system = policy;
        }

        // Flags always override
        if args.show_counts {
            self.report.show_counts = true;
        }
    }

    /// Corpus layout, if a root has been configured.
    pub fn corpus_layout(&self) -> Option<CorpusLayout> {
        self.corpus
            .root
            .as_ref()
            .map(|root| CorpusLayout::new(root.clone(), self.corpus.test_set.clone()))
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
