//! Judgment analysis.
//!
//! Turns the stream of pairwise judgments into per-sentence tallies.

pub mod aggregator;

pub use aggregator::*;
