//! Scoring types

use crate::types::Reliability;
use serde::{Deserialize, Serialize};

/// A score with its tier and the signals that contributed
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Confidence {
    /// 0-100
    pub score: u8,
    pub reliability: Reliability,
    /// Names of the signals that fired
    pub signals: Vec<String>,
}

impl Confidence {
    /// Build from a raw score, clamping to 100
    pub fn new(score: u32, signals: Vec<String>) -> Self {
        let score = score.min(100) as u8;
        Self {
            score,
            reliability: Reliability::from_score(score),
            signals,
        }
    }

    /// Lower the score and re-derive the tier
    #[must_use]
    pub fn penalize(mut self, points: u8, reason: &str) -> Self {
        self.score = self.score.saturating_sub(points);
        self.reliability = Reliability::from_score(self.score);
        self.signals.push(format!("penalty:{reason}"));
        self
    }
}

/// One spot-checked page of a paginated listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotCheck {
    pub page: u32,
    /// Populated with enough contacts
    pub valid: bool,
    /// Rendered text was present at all
    pub has_content: bool,
    pub contact_estimate: u32,
}

/// Evidence for a paginated outcome
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoringSignals {
    /// A pattern was established
    pub pattern_detected: bool,
    /// Pagination controls are visible
    pub visual_controls: bool,
    /// Two empty pages follow the max
    pub boundary_confirmed: bool,
    /// A last page was found below the cap
    pub true_max_found: bool,
    /// The highest page link equals the found max
    pub max_agreement: bool,
    /// Share of spot checks that were valid, 0.0-1.0
    pub spot_check_success: f64,
    /// Smallest over largest contact count among valid spot checks, 0.0-1.0
    pub contact_consistency: f64,
    /// The pattern is a known page-URL encoding
    pub recognized_type: bool,
    /// The pattern came from configuration or cache
    pub provided: bool,
    /// Share of spot checks with any content, 0.0-1.0
    pub spot_checks_not_empty: f64,
}

/// Evidence for a single-page outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SinglePageSignals {
    /// The page has rendered content
    pub content_present: bool,
    /// At least one contact was seen
    pub contacts_found: bool,
    /// No pagination controls are visible
    pub no_controls: bool,
    /// A trial scroll did not grow the page
    pub stable_height: bool,
    /// The URL carries no page number
    pub unpaginated_url: bool,
}
