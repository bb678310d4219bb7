//! Sentence rankings and their rendering.

pub mod generator;
pub mod ranking;

pub use generator::{generate_json_report, generate_text_report, TextOptions};
pub use ranking::{MissingSystemPolicy, Reporter};
