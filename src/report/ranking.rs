//! Per-sentence system ranking.
//!
//! Systems are ordered by win ratio, highest first. Equal ratios keep the
//! order in which the systems were first seen in the judgments.

use crate::analysis::{SentenceTally, TallyTable};
use crate::corpus::Corpus;
use crate::models::{ReportEntry, SentenceReport, SystemId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use tracing::{debug, warn};

/// What to do when a ranked system has no candidate text in the corpus.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MissingSystemPolicy {
    /// Abort the run
    #[default]
    Fail,
    /// Warn and leave the system out of the listing
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("no candidate text for system {system} at sentence {sentence}; are the system outputs from the same test set as the judgments?")]
    MissingCandidate { system: SystemId, sentence: usize },

    #[error("no source sentence {0}")]
    MissingSource(usize),

    #[error("no reference sentence {0}")]
    MissingReference(usize),
}

/// A system's standing on one sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSystem {
    pub system: SystemId,
    pub wins: u32,
    pub total: u32,
    pub ratio: f64,
}

/// Compare `a.wins / a.total` against `b.wins / b.total` without floats.
fn compare_ratio(a: &RankedSystem, b: &RankedSystem) -> Ordering {
    let lhs = u64::from(a.wins) * u64::from(b.total);
    let rhs = u64::from(b.wins) * u64::from(a.total);
    lhs.cmp(&rhs)
}

/// Rank every system in a sentence tally.
///
/// Returns an empty list when no system won a single comparison.
pub fn rank_systems(tally: &SentenceTally) -> Vec<RankedSystem> {
    if tally.total_wins() == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<RankedSystem> = tally
        .iter()
        .map(|(system, counts)| RankedSystem {
            system: system.clone(),
            wins: counts.wins,
            total: counts.total,
            ratio: counts.ratio(),
        })
        .collect();

    // Stable: ties stay in first-seen order.
    ranked.sort_by(|a, b| compare_ratio(b, a));
    ranked
}

/// Builds sentence reports from tallies and corpus text.
pub struct Reporter<'a> {
    tallies: &'a TallyTable,
    corpus: &'a Corpus,
    policy: MissingSystemPolicy,
}

impl<'a> Reporter<'a> {
    pub fn new(tallies: &'a TallyTable, corpus: &'a Corpus, policy: MissingSystemPolicy) -> Self {
        Self {
            tallies,
            corpus,
            policy,
        }
    }

    /// Ranked systems for a sentence, empty if it has nothing to report.
    pub fn rank(&self, index: usize) -> Vec<RankedSystem> {
        self.tallies
            .sentence(index)
            .map(rank_systems)
            .unwrap_or_default()
    }

    /// Leaderboard for one sentence, or `None` if it has no decisive comparisons.
    pub fn report(&self, index: usize) -> Result<Option<SentenceReport>, ReportError> {
        let ranked = self.rank(index);
        if ranked.is_empty() {
            return Ok(None);
        }

        let source = self
            .corpus
            .source(index)
            .ok_or(ReportError::MissingSource(index))?;
        let reference = self
            .corpus
            .reference(index)
            .ok_or(ReportError::MissingReference(index))?;

        let mut systems = Vec::with_capacity(ranked.len());
        for entry in ranked {
            let candidate = match self.corpus.candidate(&entry.system, index) {
                Some(text) => text.to_string(),
                None => match self.policy {
                    MissingSystemPolicy::Fail => {
                        return Err(ReportError::MissingCandidate {
                            system: entry.system,
                            sentence: index,
                        });
                    }
                    MissingSystemPolicy::Skip => {
                        warn!(
                            "Skipping system {} on sentence {}: no candidate text",
                            entry.system, index
                        );
                        continue;
                    }
                },
            };

            systems.push(ReportEntry {
                system: entry.system,
                wins: entry.wins,
                total: entry.total,
                ratio: entry.ratio,
                candidate,
            });
        }

        Ok(Some(SentenceReport {
            index,
            source: source.to_string(),
            reference: reference.to_string(),
            systems,
        }))
    }

    /// Reports for every source sentence, in ascending index order.
    pub fn report_all(&self) -> Result<Vec<SentenceReport>, ReportError> {
        let outside = self
            .tallies
            .iter()
            .filter(|(index, _)| *index > self.corpus.len())
            .count();
        if outside > 0 {
            warn!(
                "{} judged sentences are beyond the {} source sentences and will not be shown",
                outside,
                self.corpus.len()
            );
        }

        let mut absent: Vec<&SystemId> = self
            .tallies
            .iter()
            .flat_map(|(_, tally)| tally.iter().map(|(system, _)| system))
            .filter(|system| !self.corpus.has_system(system))
            .collect();
        absent.sort();
        absent.dedup();
        if !absent.is_empty() {
            warn!("Judged systems without output files: {:?}", absent);
        }

        let mut reports = Vec::new();
        for index in 1..=self.corpus.len() {
            if let Some(report) = self.report(index)? {
                reports.push(report);
            }
        }

        debug!("{} sentences with rankings", reports.len());
        Ok(reports)
    }
}
