//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::LanguagePair;
use crate::report::MissingSystemPolicy;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the WMT13 data root.
pub const CORPUS_ENV: &str = "WMT13";

/// rankviz - rank MT systems per sentence from WMT pairwise judgments
///
/// Reads a WMT-formatted judgment CSV, computes for every sentence how often
/// each system was judged better in pairwise comparisons, and prints the
/// systems in descending order next to the source and reference sentences.
///
/// Examples:
///   rankviz wmt13-manual-evaluation.csv de-en
///   rankviz wmt13-manual-evaluation.csv cs-en --path ~/data/wmt13 --judge judgeX
///   rankviz judgments.csv ru-en --format json -o ru-en.json
///   rankviz --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// WMT-formatted CSV file containing the judgments
    #[arg(value_name = "JUDGMENTS", required_unless_present = "init_config")]
    pub judgments: Option<PathBuf>,

    /// Language pair to display, as <src>-<tgt> short codes (e.g. de-en)
    #[arg(value_name = "LANGPAIR", required_unless_present = "init_config")]
    pub langpair: Option<String>,

    /// Path to the WMT13 raw data (system outputs, sources, references)
    ///
    /// Falls back to the WMT13 environment variable, then to `corpus.root`
    /// in the configuration file.
    #[arg(short, long, value_name = "DIR", env = "WMT13")]
    pub path: Option<PathBuf>,

    /// Judge id prefix; only judgments from matching judges are counted
    #[arg(short, long, default_value = "", value_name = "PREFIX")]
    pub judge: String,

    /// Test set name used in corpus file names
    #[arg(long, value_name = "NAME")]
    pub test_set: Option<String>,

    /// Output format (text, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the report to a file instead of standard output
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Show wins and comparison totals next to each ratio
    #[arg(long)]
    pub show_counts: bool,

    /// What to do with judged systems that have no output file
    #[arg(long, value_name = "POLICY")]
    pub on_missing_system: Option<MissingSystemPolicy>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .rankviz.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .rankviz.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain-text leaderboard (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        self.language_pair()?;

        if let Some(ref judgments) = self.judgments {
            if !judgments.is_file() {
                return Err(format!(
                    "Judgment file does not exist: {}",
                    judgments.display()
                ));
            }
        }

        if let Some(ref test_set) = self.test_set {
            if test_set.trim().is_empty() {
                return Err("Test set name cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// The requested language pair.
    pub fn language_pair(&self) -> Result<LanguagePair, String> {
        self.langpair
            .as_deref()
            .unwrap_or("")
            .parse::<LanguagePair>()
            .map_err(|e| e.to_string())
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_args(judgments: PathBuf) -> Args {
        Args {
            judgments: Some(judgments),
            langpair: Some("de-en".to_string()),
            path: Some(PathBuf::from("/data/wmt13")),
            judge: String::new(),
            test_set: None,
            format: None,
            output: None,
            show_counts: false,
            on_missing_system: None,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    fn judgments_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "srclang,trglang,srcIndex").unwrap();
        file
    }

    #[test]
    fn test_parse_positional_and_options() {
        let args = Args::try_parse_from([
            "rankviz",
            "judgments.csv",
            "cs-en",
            "--path",
            "/tmp/wmt13",
            "--judge",
            "judgeX",
            "--format",
            "json",
            "--on-missing-system",
            "skip",
        ])
        .unwrap();

        assert_eq!(args.judgments, Some(PathBuf::from("judgments.csv")));
        assert_eq!(args.language_pair().unwrap(), LanguagePair::new("cs", "en"));
        assert_eq!(args.path, Some(PathBuf::from("/tmp/wmt13")));
        assert_eq!(args.judge, "judgeX");
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.on_missing_system, Some(MissingSystemPolicy::Skip));
    }

    #[test]
    fn test_positionals_required() {
        assert!(Args::try_parse_from(["rankviz", "judgments.csv"]).is_err());
        assert!(Args::try_parse_from(["rankviz", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_ok() {
        let file = judgments_file();
        let args = make_args(file.path().to_path_buf());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_langpair() {
        let file = judgments_file();
        let mut args = make_args(file.path().to_path_buf());
        args.langpair = Some("german-english-x".to_string());
        assert!(args.validate().is_err());

        args.langpair = Some("deen".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_judgments() {
        let args = make_args(PathBuf::from("/nonexistent/judgments.csv"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let file = judgments_file();
        let mut args = make_args(file.path().to_path_buf());
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let file = judgments_file();
        let mut args = make_args(file.path().to_path_buf());
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
