//! Confidence scoring module
//!
//! Additive 0-100 scores for the three kinds of outcome: a paginated listing,
//! a single page, and an infinite-scroll page. Every signal adds a fixed
//! weight, so partial evidence lowers the score without zeroing it.

mod scorer;
mod types;

pub use scorer::ConfidenceScorer;
pub use types::{Confidence, ScoringSignals, SinglePageSignals, SpotCheck};
