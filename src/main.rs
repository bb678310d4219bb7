//! rankviz - per-sentence MT system rankings from WMT judgments
//!
//! A CLI tool that aggregates the pairwise human judgments of a WMT manual
//! evaluation campaign and shows, for every source sentence, the systems
//! ordered by how often they were judged better than their competitors.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Error (missing corpus root, unreadable input, inconsistent data, etc.)

mod analysis;
mod cli;
mod config;
mod corpus;
mod models;
mod report;

use analysis::{Aggregator, JudgmentFilter};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat, CORPUS_ENV};
use config::{Config, CONFIG_FILE};
use corpus::Corpus;
use models::{LanguageTable, Report, ReportMetadata};
use report::{generate_json_report, generate_text_report, Reporter, TextOptions};
use std::fs::File;
use std::io::{BufReader, Write};
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

    info!("rankviz v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args) {
        error!("Ranking failed: {:#}", e);
        eprintln!("FATAL: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .rankviz.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("{} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("Created {} with default settings.", CONFIG_FILE);
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr; stdout is reserved for the report.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Aggregate the judgments, load the corpus and write the report.
fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let layout = config.corpus_layout().with_context(|| {
        format!(
            "no corpus root configured; set the {} environment variable to the path of the \
             WMT13 raw data, or pass --path (see statmt.org/wmt13/wmt13-data.tar.gz)",
            CORPUS_ENV
        )
    })?;

    let language_pair = args.language_pair().map_err(anyhow::Error::msg)?;
    let judgments_path = args
        .judgments
        .clone()
        .context("missing judgment file argument")?;

    // Step 1: read the corpus text
    let corpus = Corpus::load(&layout, &language_pair)
        .with_context(|| format!("Failed to load corpus from {}", layout.root.display()))?;
    if corpus.is_empty() {
        warn!("No source sentences for {}; nothing will be reported", language_pair);
    }
    debug!("Systems in corpus: {:?}", corpus.system_ids());

    // Step 2: aggregate judgments
    let filter = JudgmentFilter::new(language_pair.clone(), args.judge.clone());
    let languages = LanguageTable::with_aliases(&config.languages);
    let mut aggregator = Aggregator::with_languages(filter, languages);

    let file = File::open(&judgments_path)
        .with_context(|| format!("Failed to open {}", judgments_path.display()))?;
    aggregator
        .ingest_reader(BufReader::new(file))
        .with_context(|| format!("Failed to read {}", judgments_path.display()))?;

    let (tallies, stats) = aggregator.finish();
    if stats.accepted == 0 {
        warn!(
            "No judgments matched language pair {} and judge prefix {:?}",
            language_pair, args.judge
        );
    }
    info!("{} sentences have judgments", tallies.len());

    // Step 3: rank
    let reporter = Reporter::new(&tallies, &corpus, config.report.missing_system);
    let sentences = reporter.report_all()?;

    let report = Report {
        metadata: ReportMetadata {
            judgments_file: judgments_path.display().to_string(),
            language_pair,
            judge_prefix: args.judge.clone(),
            generated_at: Utc::now(),
            stats,
        },
        sentences,
    };

    // Step 4: render and write
    let output = match config.report.format {
        OutputFormat::Text => generate_text_report(
            &report,
            TextOptions {
                show_counts: config.report.show_counts,
            },
        ),
        OutputFormat::Json => generate_json_report(&report)?,
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report saved to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.as_bytes())
                .context("Failed to write report to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
        }
    }

    info!("Ranked {} sentences", report.sentences.len());
    Ok(())
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
            info!("Loaded default config from {}", CONFIG_FILE);
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
