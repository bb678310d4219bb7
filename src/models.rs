//! Data models for judgment aggregation.
//!
//! This module contains the core data structures shared by the aggregator,
//! the corpus loader and the report generator: language pairs, normalized
//! system identifiers, raw and validated judgment records.

use crate::analysis::AggregateStats;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Number of candidate slots in one WMT ranking task.
pub const SLOT_COUNT: usize = 5;

/// Built-in mapping from judgment language names to short codes.
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("Czech", "cs"),
    ("Russian", "ru"),
    ("German", "de"),
    ("Spanish", "es"),
    ("English", "en"),
    ("French", "fr"),
    ("cs", "cs"),
    ("ru", "ru"),
    ("de", "de"),
    ("es", "es"),
    ("en", "en"),
    ("fr", "fr"),
];

/// Error produced when a judgment row cannot be turned into a [`Judgment`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A required column is absent or empty.
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A numeric column does not hold a valid integer.
    #[error("field `{field}` is not a valid integer: {value:?}")]
    InvalidInteger { field: String, value: String },

    /// Sentence indices are 1-based.
    #[error("sentence index must be at least 1")]
    ZeroSentenceIndex,

    /// A language name that is not in the language table.
    #[error("unknown language {0:?}")]
    UnknownLanguage(String),
}

/// Error produced when parsing a `src-tgt` language pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid language pair {0:?}, expected <src>-<tgt> (e.g. de-en)")]
pub struct LanguagePairError(pub String);

/// A source/target language pair in short-code form, e.g. `de-en`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.source, self.target)
    }
}

impl FromStr for LanguagePair {
    type Err = LanguagePairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((source, target))
                if !source.is_empty() && !target.is_empty() && !target.contains('-') =>
            {
                Ok(Self::new(source, target))
            }
            _ => Err(LanguagePairError(s.to_string())),
        }
    }
}

/// Maps the language names found in judgment files to short codes.
#[derive(Debug, Clone)]
pub struct LanguageTable {
    codes: BTreeMap<String, String>,
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self {
            codes: LANGUAGE_CODES
                .iter()
                .map(|(name, code)| (name.to_string(), code.to_string()))
                .collect(),
        }
    }
}

impl LanguageTable {
    /// Built-in table extended with extra aliases (extras win on conflict).
    pub fn with_aliases(aliases: &BTreeMap<String, String>) -> Self {
        let mut table = Self::default();
        for (name, code) in aliases {
            table.codes.insert(name.clone(), code.clone());
        }
        table
    }

    /// Look up the short code for a language name.
    pub fn code(&self, name: &str) -> Result<&str, RecordError> {
        self.codes
            .get(name.trim())
            .map(String::as_str)
            .ok_or_else(|| RecordError::UnknownLanguage(name.to_string()))
    }

    /// Resolve the pair formed by a judgment's source and target languages.
    pub fn pair(&self, source: &str, target: &str) -> Result<LanguagePair, RecordError> {
        Ok(LanguagePair::new(self.code(source)?, self.code(target)?))
    }
}

fn run_suffix() -> &'static Regex {
    static RUN_SUFFIX: OnceLock<Regex> = OnceLock::new();
    RUN_SUFFIX.get_or_init(|| Regex::new(r"\.\d+$").expect("static regex"))
}

/// Canonical identifier of a translation system.
///
/// Built from raw labels such as `newstest2013.cs-en.JHU.2903` by dropping
/// the trailing `.<run number>` and keeping the last dot-separated component
/// (`JHU`). The result never contains a dot, so normalizing it again is a
/// no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemId(String);

impl SystemId {
    /// Normalize a raw system label or system output file name.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = run_suffix().replace(raw.trim(), "");
        let last = trimmed.rsplit('.').next().unwrap_or_default();
        Self(last.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One CSV row of a WMT judgment file, before validation.
///
/// Every column is optional so that incomplete rows decode and can be
/// reported instead of aborting the whole file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JudgmentRow {
    #[serde(rename = "srcIndex", default)]
    pub src_index: Option<String>,
    #[serde(rename = "srclang", default)]
    pub src_lang: Option<String>,
    #[serde(rename = "trglang", default)]
    pub trg_lang: Option<String>,
    #[serde(rename = "judgeId", default)]
    pub judge_id: Option<String>,

    #[serde(rename = "system1Id", default)]
    pub system1_id: Option<String>,
    #[serde(rename = "system1rank", default)]
    pub system1_rank: Option<String>,
    #[serde(rename = "system2Id", default)]
    pub system2_id: Option<String>,
    #[serde(rename = "system2rank", default)]
    pub system2_rank: Option<String>,
    #[serde(rename = "system3Id", default)]
    pub system3_id: Option<String>,
    #[serde(rename = "system3rank", default)]
    pub system3_rank: Option<String>,
    #[serde(rename = "system4Id", default)]
    pub system4_id: Option<String>,
    #[serde(rename = "system4rank", default)]
    pub system4_rank: Option<String>,
    #[serde(rename = "system5Id", default)]
    pub system5_id: Option<String>,
    #[serde(rename = "system5rank", default)]
    pub system5_rank: Option<String>,
}

/// Treats absent and blank cells alike.
fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, RecordError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RecordError::MissingField(field.to_string())),
    }
}

fn parse_integer<T: FromStr>(value: &str, field: &str) -> Result<T, RecordError> {
    value.parse().map_err(|_| RecordError::InvalidInteger {
        field: field.to_string(),
        value: value.to_string(),
    })
}

impl JudgmentRow {
    /// The 1-based source sentence index.
    pub fn sentence_index(&self) -> Result<usize, RecordError> {
        let raw = required(&self.src_index, "srcIndex")?;
        match parse_integer::<usize>(raw, "srcIndex")? {
            0 => Err(RecordError::ZeroSentenceIndex),
            index => Ok(index),
        }
    }

    pub fn language_pair(&self, languages: &LanguageTable) -> Result<LanguagePair, RecordError> {
        let source = required(&self.src_lang, "srclang")?;
        let target = required(&self.trg_lang, "trglang")?;
        languages.pair(source, target)
    }

    /// Judge identifier; a missing cell is treated as the empty id.
    pub fn judge_id(&self) -> &str {
        self.judge_id.as_deref().unwrap_or("")
    }

    fn slot(&self, slot: usize) -> (&Option<String>, &Option<String>) {
        match slot {
            1 => (&self.system1_id, &self.system1_rank),
            2 => (&self.system2_id, &self.system2_rank),
            3 => (&self.system3_id, &self.system3_rank),
            4 => (&self.system4_id, &self.system4_rank),
            _ => (&self.system5_id, &self.system5_rank),
        }
    }

    /// Validated candidate in a 1-based slot.
    pub fn candidate(&self, slot: usize) -> Result<Candidate, RecordError> {
        let (id, rank) = self.slot(slot);
        let id_field = format!("system{}Id", slot);
        let rank_field = format!("system{}rank", slot);

        let system = SystemId::normalize(required(id, &id_field)?);
        let rank = parse_integer::<i64>(required(rank, &rank_field)?, &rank_field)?;
        Ok(Candidate { system, rank })
    }

    /// Validate the whole row against a known language table.
    pub fn to_judgment(&self, languages: &LanguageTable) -> Result<Judgment, RecordError> {
        let sentence = self.sentence_index()?;
        let language_pair = self.language_pair(languages)?;

        let mut candidates = Vec::with_capacity(SLOT_COUNT);
        for slot in 1..=SLOT_COUNT {
            candidates.push(self.candidate(slot)?);
        }

        Ok(Judgment {
            sentence,
            language_pair,
            judge_id: self.judge_id().to_string(),
            candidates,
        })
    }
}

/// One ranked candidate within a judgment; lower rank is better.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub system: SystemId,
    /// Any integer; zero and negative ranks are valid.
    pub rank: i64,
}

#[cfg(test)]
impl Candidate {
    pub fn new(system: &str, rank: i64) -> Self {
        Self {
            system: SystemId::normalize(system),
            rank,
        }
    }
}

/// A validated judgment: one judge ranking five candidates for one sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    pub sentence: usize,
    pub language_pair: LanguagePair,
    pub judge_id: String,
    /// Candidates in slot order; slot `n` is at index `n - 1`.
    pub candidates: Vec<Candidate>,
}

/// One ranked system line of a sentence report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub system: SystemId,
    pub wins: u32,
    pub total: u32,
    /// `wins / total`, in `[0, 1]`.
    pub ratio: f64,
    /// The system's translation of the sentence.
    pub candidate: String,
}

/// Leaderboard for one source sentence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentenceReport {
    /// 1-based sentence index.
    pub index: usize,
    pub source: String,
    pub reference: String,
    /// Systems by descending win ratio.
    pub systems: Vec<ReportEntry>,
}

/// Metadata about a ranking run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Judgment file the tallies were built from.
    pub judgments_file: String,
    pub language_pair: LanguagePair,
    /// Judge-id prefix filter, empty for all judges.
    pub judge_prefix: String,
    pub generated_at: DateTime<Utc>,
    pub stats: AggregateStats,
}

/// The complete per-sentence ranking report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub sentences: Vec<SentenceReport>,
}
