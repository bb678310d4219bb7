//! Report rendering.
//!
//! Produces the plain-text leaderboard printed per sentence, or a JSON
//! document carrying the same data plus run metadata.

use crate::models::{Report, ReportEntry, SentenceReport};
use anyhow::Result;

/// Options for the plain-text layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextOptions {
    /// Show `wins / total` next to each ratio.
    pub show_counts: bool,
}

/// Generate the plain-text report.
pub fn generate_text_report(report: &Report, options: TextOptions) -> String {
    report
        .sentences
        .iter()
        .map(|sentence| generate_sentence_block(sentence, options))
        .collect()
}

/// Generate the block for one sentence, ending with a blank line.
fn generate_sentence_block(sentence: &SentenceReport, options: TextOptions) -> String {
    let mut block = String::new();

    block.push_str(&format!("SENTENCE {}\n", sentence.index));
    block.push_str(&format!("SOURCE {}\n", sentence.source));
    block.push_str(&format!("REFERENCE {}\n", sentence.reference));

    for entry in &sentence.systems {
        block.push_str(&generate_system_line(entry, options));
    }

    block.push('\n');
    block
}

fn generate_system_line(entry: &ReportEntry, options: TextOptions) -> String {
    if options.show_counts {
        format!(
            "[{:02} / {:02} = {:.2}] {} [{}]\n",
            entry.wins, entry.total, entry.ratio, entry.candidate, entry.system
        )
    } else {
        format!("[{:.2}] {} [{}]\n", entry.ratio, entry.candidate, entry.system)
    }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
