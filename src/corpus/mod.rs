//! Corpus loading for source, reference and system output sentences.
//!
//! The WMT13 plain-text release keeps one sentence per line:
//!
//! ```text
//! <root>/plain/sources/<set>-src.<src>
//! <root>/plain/references/<set>-ref.<tgt>
//! <root>/plain/system-outputs/<set>/<src>-<tgt>/<set>.<src>-<tgt>.<system>.<run>
//! ```

use crate::models::{LanguagePair, SystemId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Errors raised while reading the corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list system outputs in {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Where the corpus lives and which test set to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusLayout {
    pub root: PathBuf,
    pub test_set: String,
}

impl CorpusLayout {
    pub fn new(root: impl Into<PathBuf>, test_set: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            test_set: test_set.into(),
        }
    }

    pub fn source_file(&self, pair: &LanguagePair) -> PathBuf {
        self.root
            .join("plain/sources")
            .join(format!("{}-src.{}", self.test_set, pair.source))
    }

    pub fn reference_file(&self, pair: &LanguagePair) -> PathBuf {
        self.root
            .join("plain/references")
            .join(format!("{}-ref.{}", self.test_set, pair.target))
    }

    pub fn system_dir(&self, pair: &LanguagePair) -> PathBuf {
        self.root
            .join("plain/system-outputs")
            .join(&self.test_set)
            .join(pair.to_string())
    }

    /// File name prefix shared by all system outputs for `pair`.
    pub fn system_prefix(&self, pair: &LanguagePair) -> String {
        format!("{}.{}", self.test_set, pair)
    }
}

/// Sentences of one language pair, addressed by 1-based sentence index.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    sources: Vec<String>,
    references: Vec<String>,
    systems: HashMap<SystemId, Vec<String>>,
}

impl Corpus {
    /// Build a corpus from already loaded sentences.
    #[cfg(test)]
    pub fn from_parts(
        sources: Vec<String>,
        references: Vec<String>,
        systems: HashMap<SystemId, Vec<String>>,
    ) -> Self {
        Self {
            sources,
            references,
            systems,
        }
    }

    /// Read sources, references and every matching system output file.
    pub fn load(layout: &CorpusLayout, pair: &LanguagePair) -> Result<Self, CorpusError> {
        let sources = read_lines(&layout.source_file(pair))?;
        let references = read_lines(&layout.reference_file(pair))?;
        let systems = load_systems(layout, pair)?;

        info!(
            "Loaded corpus for {}: {} sources, {} references, {} systems",
            pair,
            sources.len(),
            references.len(),
            systems.len()
        );

        Ok(Self {
            sources,
            references,
            systems,
        })
    }

    /// Number of source sentences.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source(&self, index: usize) -> Option<&str> {
        line_at(&self.sources, index)
    }

    pub fn reference(&self, index: usize) -> Option<&str> {
        line_at(&self.references, index)
    }

    /// Candidate translation of `system` for sentence `index`.
    pub fn candidate(&self, system: &SystemId, index: usize) -> Option<&str> {
        self.systems.get(system).and_then(|lines| line_at(lines, index))
    }

    pub fn has_system(&self, system: &SystemId) -> bool {
        self.systems.contains_key(system)
    }

    /// Loaded system identifiers, sorted.
    pub fn system_ids(&self) -> Vec<&SystemId> {
        let mut ids: Vec<_> = self.systems.keys().collect();
        ids.sort();
        ids
    }
}

fn line_at(lines: &[String], index: usize) -> Option<&str> {
    index
        .checked_sub(1)
        .and_then(|i| lines.get(i))
        .map(String::as_str)
}

/// Read a file into lines with trailing whitespace removed.
fn read_lines(path: &Path) -> Result<Vec<String>, CorpusError> {
    let content = fs::read_to_string(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Read {}", path.display());
    Ok(content.lines().map(|l| l.trim_end().to_string()).collect())
}

fn load_systems(
    layout: &CorpusLayout,
    pair: &LanguagePair,
) -> Result<HashMap<SystemId, Vec<String>>, CorpusError> {
    let dir = layout.system_dir(pair);
    let prefix = layout.system_prefix(pair);
    let mut systems = HashMap::new();

    let walker = WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|source| CorpusError::Walk {
            path: dir.clone(),
            source,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(&prefix) {
            debug!("Ignoring {}: not a {} system output", name, pair);
            continue;
        }

        let system = SystemId::normalize(&name);
        if systems.contains_key(&system) {
            warn!("Ignoring {}: system {} already loaded", name, system);
            continue;
        }

        let lines = read_lines(entry.path())?;
        systems.insert(system, lines);
    }

    Ok(systems)
}
