//! Pairwise judgment aggregation.
//!
//! Every judgment ranks five candidate translations of one source sentence.
//! Each of the ten candidate pairs counts as one comparison for both systems
//! involved, and as a win for the strictly better-ranked one. The result is
//! a per-sentence tally of wins and comparisons for every system seen.

use crate::models::{
    Candidate, Judgment, JudgmentRow, LanguagePair, LanguageTable, RecordError, SystemId,
    SLOT_COUNT,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use tracing::{debug, info, warn};

/// Win and comparison counts of one system on one sentence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub wins: u32,
    pub total: u32,
}

impl Counts {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.total)
        }
    }
}

/// Tally for one sentence, in the order systems were first seen.
#[derive(Debug, Clone, Default)]
pub struct SentenceTally {
    entries: Vec<(SystemId, Counts)>,
    positions: HashMap<SystemId, usize>,
}

impl SentenceTally {
    /// Counts for `system`, inserting zeroed counts on first touch.
    pub fn entry_or_default(&mut self, system: &SystemId) -> &mut Counts {
        let position = match self.positions.get(system) {
            Some(&position) => position,
            None => {
                self.entries.push((system.clone(), Counts::default()));
                self.positions.insert(system.clone(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[position].1
    }

    /// Systems with their counts, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&SystemId, &Counts)> {
        self.entries.iter().map(|(system, counts)| (system, counts))
    }

    pub fn total_wins(&self) -> u64 {
        self.entries.iter().map(|(_, c)| u64::from(c.wins)).sum()
    }
}

#[cfg(test)]
impl SentenceTally {
    pub fn get(&self, system: &SystemId) -> Option<&Counts> {
        self.positions.get(system).map(|&p| &self.entries[p].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Sentence index to per-sentence tally.
#[derive(Debug, Clone, Default)]
pub struct TallyTable {
    sentences: BTreeMap<usize, SentenceTally>,
}

impl TallyTable {
    pub fn sentence(&self, index: usize) -> Option<&SentenceTally> {
        self.sentences.get(&index)
    }

    /// Tally for `index`, created empty on first touch.
    pub fn sentence_or_default(&mut self, index: usize) -> &mut SentenceTally {
        self.sentences.entry(index).or_default()
    }

    /// Tallied sentences in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &SentenceTally)> {
        self.sentences.iter().map(|(&index, tally)| (index, tally))
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }
}

/// All unordered pairs of 1-based candidate slots, `(i, j)` with `i < j`.
pub fn slot_pairs() -> impl Iterator<Item = (usize, usize)> {
    (1..=SLOT_COUNT).flat_map(|i| ((i + 1)..=SLOT_COUNT).map(move |j| (i, j)))
}

/// Record one pairwise comparison between two candidates.
///
/// Both systems get an entry even if they never win. A tie adds to both
/// totals and to neither win count.
pub fn record_comparison(tally: &mut SentenceTally, first: &Candidate, second: &Candidate) {
    tally.entry_or_default(&first.system);
    tally.entry_or_default(&second.system);

    if first.rank < second.rank {
        tally.entry_or_default(&first.system).wins += 1;
    } else if second.rank < first.rank {
        tally.entry_or_default(&second.system).wins += 1;
    }

    tally.entry_or_default(&first.system).total += 1;
    tally.entry_or_default(&second.system).total += 1;
}

/// Selects the judgments that take part in aggregation.
#[derive(Debug, Clone)]
pub struct JudgmentFilter {
    pub language_pair: LanguagePair,
    /// Judge-id prefix; empty accepts every judge.
    pub judge_prefix: String,
}

impl JudgmentFilter {
    pub fn new(language_pair: LanguagePair, judge_prefix: impl Into<String>) -> Self {
        Self {
            language_pair,
            judge_prefix: judge_prefix.into(),
        }
    }

    pub fn accepts(&self, language_pair: &LanguagePair, judge_id: &str) -> bool {
        judge_id.starts_with(&self.judge_prefix) && *language_pair == self.language_pair
    }
}

/// Row counters collected while aggregating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    /// Rows read from the input, valid or not.
    pub rows: usize,
    /// Rows that were tallied.
    pub accepted: usize,
    /// Valid rows excluded by language pair or judge.
    pub filtered: usize,
    /// Malformed rows that were skipped.
    pub rejected: usize,
}

/// What happened to one ingested row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    Accepted,
    Filtered,
    Rejected(RecordError),
}

/// Streams judgments into a [`TallyTable`].
pub struct Aggregator {
    filter: JudgmentFilter,
    languages: LanguageTable,
    tallies: TallyTable,
    stats: AggregateStats,
}

impl Aggregator {
    pub fn with_languages(filter: JudgmentFilter, languages: LanguageTable) -> Self {
        Self {
            filter,
            languages,
            tallies: TallyTable::default(),
            stats: AggregateStats::default(),
        }
    }

    /// Add every pairwise comparison of one judgment to the tally.
    pub fn accumulate(&mut self, judgment: &Judgment) {
        let tally = self.tallies.sentence_or_default(judgment.sentence);

        for (i, j) in slot_pairs() {
            record_comparison(
                tally,
                &judgment.candidates[i - 1],
                &judgment.candidates[j - 1],
            );
        }
    }

    /// Validate, filter and accumulate one raw row.
    ///
    /// The sentence index is checked before filtering, so a row without one
    /// is rejected even when it belongs to another language pair. Candidate
    /// columns are only validated for rows that pass the filter. Rejections
    /// are logged with `row_number`.
    pub fn ingest(&mut self, row_number: usize, row: &JudgmentRow) -> Ingested {
        self.stats.rows += 1;

        let outcome = self.classify(row);
        match &outcome {
            Ingested::Accepted => self.stats.accepted += 1,
            Ingested::Filtered => {
                self.stats.filtered += 1;
                debug!("line {} filtered out", row_number);
            }
            Ingested::Rejected(e) => {
                self.stats.rejected += 1;
                warn!("bad line {}: {} ({:?})", row_number, e, row);
            }
        }
        outcome
    }

    fn classify(&mut self, row: &JudgmentRow) -> Ingested {
        if let Err(e) = row.sentence_index() {
            return Ingested::Rejected(e);
        }

        let language_pair = match row.language_pair(&self.languages) {
            Ok(pair) => pair,
            Err(e) => return Ingested::Rejected(e),
        };

        if !self.filter.accepts(&language_pair, row.judge_id()) {
            return Ingested::Filtered;
        }

        match row.to_judgment(&self.languages) {
            Ok(judgment) => {
                self.accumulate(&judgment);
                Ingested::Accepted
            }
            Err(e) => Ingested::Rejected(e),
        }
    }

    /// Stream a CSV judgment file through the aggregator.
    ///
    /// Malformed rows, including rows the CSV decoder cannot read, are logged
    /// and skipped. Only a failure to read the header is returned as an error.
    pub fn ingest_reader<R: Read>(&mut self, reader: R) -> csv::Result<()> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        csv_reader.headers()?;

        for (idx, record) in csv_reader.deserialize::<JudgmentRow>().enumerate() {
            // Header is line 1.
            let line = idx + 2;

            let row = match record {
                Ok(row) => row,
                Err(e) => {
                    self.stats.rows += 1;
                    self.stats.rejected += 1;
                    warn!("bad line {}: {}", line, e);
                    continue;
                }
            };

            self.ingest(line, &row);
        }

        info!(
            "Read {} judgment rows: {} accepted, {} filtered, {} rejected",
            self.stats.rows, self.stats.accepted, self.stats.filtered, self.stats.rejected
        );
        Ok(())
    }

    pub fn finish(self) -> (TallyTable, AggregateStats) {
        (self.tallies, self.stats)
    }
}

#[cfg(test)]
impl Aggregator {
    pub fn new(filter: JudgmentFilter) -> Self {
        Self::with_languages(filter, LanguageTable::default())
    }

    pub fn stats(&self) -> AggregateStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn de_en() -> LanguagePair {
        LanguagePair::new("de", "en")
    }

    fn judgment(sentence: usize, judge: &str, ranked: [(&str, i64); 5]) -> Judgment {
        Judgment {
            sentence,
            language_pair: de_en(),
            judge_id: judge.to_string(),
            candidates: ranked.iter().map(|&(s, r)| Candidate::new(s, r)).collect(),
        }
    }

    fn counts(tallies: &TallyTable, sentence: usize, system: &str) -> Counts {
        *tallies
            .sentence(sentence)
            .and_then(|t| t.get(&SystemId::normalize(system)))
            .expect("system tallied")
    }

    const CSV_HEADER: &str = "srclang,trglang,srcIndex,documentId,segmentId,judgeId,\
system1Number,system1Id,system2Number,system2Id,system3Number,system3Id,\
system4Number,system4Id,system5Number,system5Id,\
system1rank,system2rank,system3rank,system4rank,system5rank";

    fn csv_line(
        src: &str,
        index: &str,
        judge: &str,
        systems: [&str; 5],
        ranks: [i64; 5],
    ) -> String {
        format!(
            "{src},English,{index},doc1,1,{judge},1,{},2,{},3,{},4,{},5,{},{},{},{},{},{}",
            systems[0],
            systems[1],
            systems[2],
            systems[3],
            systems[4],
            ranks[0],
            ranks[1],
            ranks[2],
            ranks[3],
            ranks[4],
        )
    }

    #[test]
    fn test_slot_pairs() {
        let pairs: Vec<_> = slot_pairs().collect();
        assert_eq!(pairs.len(), 10);
        assert_eq!(pairs[0], (1, 2));
        assert_eq!(pairs[9], (4, 5));
        assert!(pairs.iter().all(|&(i, j)| i < j && j <= SLOT_COUNT));
    }

    #[test]
    fn test_entry_or_default_keeps_first_seen_order() {
        let mut tally = SentenceTally::default();
        tally.entry_or_default(&SystemId::normalize("B")).wins += 1;
        tally.entry_or_default(&SystemId::normalize("A"));
        tally.entry_or_default(&SystemId::normalize("B")).total += 2;

        let order: Vec<_> = tally.iter().map(|(s, _)| s.as_str().to_string()).collect();
        assert_eq!(order, vec!["B", "A"]);
        assert_eq!(tally.get(&SystemId::normalize("B")), Some(&Counts { wins: 1, total: 2 }));
        assert_eq!(tally.total_wins(), 1);
    }

    #[test]
    fn test_accumulate_single_judgment() {
        let mut aggregator = Aggregator::new(JudgmentFilter::new(de_en(), ""));
        aggregator.accumulate(&judgment(
            3,
            "j1",
            [("A", 1), ("B", 2), ("C", 3), ("D", 4), ("E", 5)],
        ));
        let (tallies, _) = aggregator.finish();

        // Every system takes part in four of the ten comparisons.
        assert_eq!(counts(&tallies, 3, "A"), Counts { wins: 4, total: 4 });
        assert_eq!(counts(&tallies, 3, "C"), Counts { wins: 2, total: 4 });
        assert_eq!(counts(&tallies, 3, "E"), Counts { wins: 0, total: 4 });
    }

    #[test]
    fn test_ties_count_towards_totals_only() {
        let mut aggregator = Aggregator::new(JudgmentFilter::new(de_en(), ""));
        aggregator.accumulate(&judgment(
            1,
            "j1",
            [("A", 2), ("B", 2), ("C", 2), ("D", 2), ("E", 2)],
        ));
        let (tallies, _) = aggregator.finish();

        for system in ["A", "B", "C", "D", "E"] {
            assert_eq!(counts(&tallies, 1, system), Counts { wins: 0, total: 4 });
        }
        assert_eq!(tallies.sentence(1).unwrap().total_wins(), 0);
    }

    #[test]
    fn test_duplicate_system_in_one_judgment() {
        let mut aggregator = Aggregator::new(JudgmentFilter::new(de_en(), ""));
        aggregator.accumulate(&judgment(
            1,
            "j1",
            [("X.1", 1), ("X.2", 3), ("B", 2), ("C", 4), ("D", 5)],
        ));
        let (tallies, _) = aggregator.finish();

        // Both X slots are counted independently, including X vs X.
        let x = counts(&tallies, 1, "X");
        assert_eq!(x.total, 8);
        assert_eq!(x.wins, 4 + 2);
        assert_eq!(tallies.sentence(1).unwrap().len(), 4);
    }

    #[test]
    fn test_three_way_scenario() {
        let mut tallies = TallyTable::default();
        let tally = tallies.sentence_or_default(1);
        record_comparison(tally, &Candidate::new("A", 1), &Candidate::new("B", 2));
        record_comparison(tally, &Candidate::new("A", 1), &Candidate::new("C", 1));
        record_comparison(tally, &Candidate::new("B", 2), &Candidate::new("C", 1));

        assert_eq!(counts(&tallies, 1, "A"), Counts { wins: 1, total: 2 });
        assert_eq!(counts(&tallies, 1, "B"), Counts { wins: 0, total: 2 });
        assert_eq!(counts(&tallies, 1, "C"), Counts { wins: 1, total: 2 });

        let order: Vec<_> = tallies
            .sentence(1)
            .unwrap()
            .iter()
            .map(|(s, _)| s.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_ingest_reader_skips_row_without_sentence_index() {
        let systems = ["s.A.1", "s.B.1", "s.C.1", "s.D.1", "s.E.1"];
        let input = [
            CSV_HEADER.to_string(),
            csv_line("German", "", "j1", systems, [1, 2, 3, 4, 5]),
            csv_line("German", "1", "j1", systems, [1, 2, 3, 4, 5]),
        ]
        .join("\n");

        let mut aggregator = Aggregator::new(JudgmentFilter::new(de_en(), ""));
        aggregator.ingest_reader(input.as_bytes()).unwrap();
        let (tallies, stats) = aggregator.finish();

        assert_eq!(
            stats,
            AggregateStats {
                rows: 2,
                accepted: 1,
                filtered: 0,
                rejected: 1
            }
        );
        assert_eq!(tallies.len(), 1);
        assert_eq!(counts(&tallies, 1, "A"), Counts { wins: 4, total: 4 });
    }

    #[test]
    fn test_ingest_reader_tolerates_short_rows() {
        let systems = ["A", "B", "C", "D", "E"];
        let input = [
            CSV_HEADER.to_string(),
            "German,English".to_string(),
            csv_line("German", "2", "j1", systems, [5, 4, 3, 2, 1]),
        ]
        .join("\n");

        let mut aggregator = Aggregator::new(JudgmentFilter::new(de_en(), ""));
        aggregator.ingest_reader(input.as_bytes()).unwrap();
        let (tallies, stats) = aggregator.finish();

        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.accepted, 1);
        assert_eq!(counts(&tallies, 2, "E"), Counts { wins: 4, total: 4 });
    }

    #[test]
    fn test_negative_rank_beats_positive_ranks() {
        let input = [
            CSV_HEADER.to_string(),
            csv_line("German", "1", "j1", ["A", "B", "C", "D", "E"], [-1, 2, 3, 4, 5]),
        ]
        .join("\n");

        let mut aggregator = Aggregator::new(JudgmentFilter::new(de_en(), ""));
        aggregator.ingest_reader(input.as_bytes()).unwrap();
        let (tallies, stats) = aggregator.finish();

        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 0);
        assert_eq!(counts(&tallies, 1, "A"), Counts { wins: 4, total: 4 });
        assert_eq!(counts(&tallies, 1, "B"), Counts { wins: 3, total: 4 });
    }

    #[test]
    fn test_ingest_reports_outcome_per_row() {
        let mut aggregator = Aggregator::new(JudgmentFilter::new(de_en(), "judgeX"));
        let cell = |v: &str| Some(v.to_string());
        let mut row = JudgmentRow {
            src_index: cell("2"),
            src_lang: cell("German"),
            trg_lang: cell("English"),
            judge_id: cell("judgeX-1"),
            system1_id: cell("A"),
            system1_rank: cell("1"),
            system2_id: cell("B"),
            system2_rank: cell("2"),
            system3_id: cell("C"),
            system3_rank: cell("3"),
            system4_id: cell("D"),
            system4_rank: cell("4"),
            system5_id: cell("E"),
            system5_rank: cell("5"),
        };

        assert_eq!(aggregator.ingest(2, &row), Ingested::Accepted);

        row.judge_id = cell("turker-3");
        assert_eq!(aggregator.ingest(3, &row), Ingested::Filtered);

        row.src_index = None;
        assert_eq!(
            aggregator.ingest(4, &row),
            Ingested::Rejected(RecordError::MissingField("srcIndex".to_string()))
        );

        assert_eq!(
            aggregator.stats(),
            AggregateStats {
                rows: 3,
                accepted: 1,
                filtered: 1,
                rejected: 1
            }
        );
    }

    #[test]
    fn test_ingest_filters_language_pair() {
        let systems = ["A", "B", "C", "D", "E"];
        let input = [
            CSV_HEADER.to_string(),
            csv_line("Czech", "1", "j1", systems, [1, 2, 3, 4, 5]),
            csv_line("German", "1", "j1", systems, [1, 1, 1, 1, 1]),
        ]
        .join("\n");

        let mut aggregator = Aggregator::new(JudgmentFilter::new(de_en(), ""));
        aggregator.ingest_reader(input.as_bytes()).unwrap();
        let (tallies, stats) = aggregator.finish();

        assert_eq!(stats.filtered, 1);
        assert_eq!(counts(&tallies, 1, "A"), Counts { wins: 0, total: 4 });
    }

    #[test]
    fn test_unknown_language_is_rejected() {
        let systems = ["A", "B", "C", "D", "E"];
        let input = [
            CSV_HEADER.to_string(),
            csv_line("Klingon", "1", "j1", systems, [1, 2, 3, 4, 5]),
        ]
        .join("\n");

        let mut aggregator = Aggregator::new(JudgmentFilter::new(de_en(), ""));
        aggregator.ingest_reader(input.as_bytes()).unwrap();

        assert_eq!(aggregator.stats().rejected, 1);
        assert!(aggregator.finish().0.is_empty());
    }

    #[test]
    fn test_judge_prefix_filter() {
        let systems = ["A", "B", "C", "D", "E"];
        let input = [
            CSV_HEADER.to_string(),
            csv_line("German", "1", "judgeX-1", systems, [1, 2, 3, 4, 5]),
            csv_line("German", "1", "turker-9", systems, [5, 4, 3, 2, 1]),
            csv_line("German", "2", "turker-9", systems, [1, 2, 3, 4, 5]),
        ]
        .join("\n");

        let mut everyone = Aggregator::new(JudgmentFilter::new(de_en(), ""));
        everyone.ingest_reader(input.as_bytes()).unwrap();
        let (all, all_stats) = everyone.finish();

        let mut experts = Aggregator::new(JudgmentFilter::new(de_en(), "judgeX"));
        experts.ingest_reader(input.as_bytes()).unwrap();
        let (judged, judged_stats) = experts.finish();

        assert_eq!(all_stats.accepted, 3);
        assert_eq!(judged_stats.accepted, 1);
        assert_eq!(judged_stats.filtered, 2);

        assert_eq!(all.len(), 2);
        assert_eq!(judged.len(), 1);
        assert!(judged.sentence(2).is_none());
        assert_eq!(counts(&all, 1, "A"), Counts { wins: 4, total: 8 });
        assert_eq!(counts(&judged, 1, "A"), Counts { wins: 4, total: 4 });
        assert_eq!(counts(&judged, 1, "E"), Counts { wins: 0, total: 4 });
    }

    #[test]
    fn test_language_aliases() {
        let aliases = [("Deutsch".to_string(), "de".to_string())].into_iter().collect();
        let mut aggregator = Aggregator::with_languages(
            JudgmentFilter::new(de_en(), ""),
            LanguageTable::with_aliases(&aliases),
        );
        let input = [
            CSV_HEADER.to_string(),
            csv_line("Deutsch", "4", "j1", ["A", "B", "C", "D", "E"], [1, 2, 3, 4, 5]),
        ]
        .join("\n");

        aggregator.ingest_reader(input.as_bytes()).unwrap();
        assert_eq!(aggregator.stats().accepted, 1);
    }

    proptest! {
        #[test]
        fn prop_wins_never_exceed_totals(
            rows in prop::collection::vec(
                (1usize..4, prop::collection::vec((0usize..4, -2i64..6), 5)),
                1..30,
            )
        ) {
            let names = ["A", "B", "C", "D"];
            let mut aggregator = Aggregator::new(JudgmentFilter::new(de_en(), ""));
            for (sentence, slots) in &rows {
                let candidates = slots
                    .iter()
                    .map(|&(system, rank)| Candidate::new(names[system], rank))
                    .collect();
                aggregator.accumulate(&Judgment {
                    sentence: *sentence,
                    language_pair: de_en(),
                    judge_id: "j".to_string(),
                    candidates,
                });
            }

            let (tallies, _) = aggregator.finish();
            for (_, tally) in tallies.iter() {
                for (_, counts) in tally.iter() {
                    prop_assert!(counts.total >= 1);
                    prop_assert!(counts.wins <= counts.total);
                    prop_assert!((0.0..=1.0).contains(&counts.ratio()));
                }
            }
        }
    }
}
