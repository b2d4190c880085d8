//! Engine types
//!
//! Options, phases and the result of a discovery run.

use crate::cache::CacheWrite;
use crate::pacing::RetryPolicy;
use crate::pagination::{BoundarySearchState, DetectionSource, PaginationPattern, VisualControls};
use crate::scoring::{Confidence, SpotCheck};
use crate::scroll::ScrollState;
use crate::types::{PaginationType, Reliability};
use serde::{Deserialize, Serialize};

/// Knobs for the orchestrator itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryOptions {
    /// Pages re-validated after the boundary search
    pub spot_checks: u32,
    /// Minimum confidence for a detected pattern to be cached
    pub cache_threshold: u8,
    /// Retry policy for the start page load
    pub retry: RetryPolicy,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            spot_checks: 3,
            cache_threshold: 80,
            retry: RetryPolicy::default(),
        }
    }
}

/// States of a discovery run, in the order they can be visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryPhase {
    Start,
    DetectingScrollVsPaginated,
    PaginatedDiscovery,
    InfiniteScrollLoad,
    Scored,
    Done,
}

/// Everything learned about one directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub start_url: String,
    pub pagination_type: PaginationType,
    /// Pattern that generated `page_urls`, for paginated listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PaginationPattern>,
    /// Where the pattern came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_source: Option<DetectionSource>,
    /// Pages to hand to extraction, in order
    pub page_urls: Vec<String>,
    /// 0-100
    pub confidence: u8,
    pub reliability: Reliability,
    /// Scoring signals that fired
    #[serde(default)]
    pub signals: Vec<String>,
    #[serde(default)]
    pub controls: VisualControls,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary: Option<BoundarySearchState>,
    #[serde(default)]
    pub spot_checks: Vec<SpotCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll: Option<ScrollState>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// The page cap stopped the boundary search
    pub hard_capped: bool,
    /// All content is believed reachable through `page_urls`
    pub fully_loaded: bool,
    /// State-machine trace
    pub phases: Vec<DiscoveryPhase>,
    /// Pattern stored for the domain after this run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_write: Option<CacheWrite>,
}

impl DiscoveryResult {
    /// A fresh result in the `Start` phase
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            pagination_type: PaginationType::None,
            pattern: None,
            detection_source: None,
            page_urls: Vec::new(),
            confidence: 0,
            reliability: Reliability::Low,
            signals: Vec::new(),
            controls: VisualControls::default(),
            boundary: None,
            spot_checks: Vec::new(),
            scroll: None,
            warnings: Vec::new(),
            hard_capped: false,
            fully_loaded: false,
            phases: vec![DiscoveryPhase::Start],
            cache_write: None,
        }
    }

    /// Result for a run whose start page never loaded
    pub fn failed(start_url: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(start_url);
        result.pagination_type = PaginationType::Error;
        result.warnings.push(message.into());
        result.enter(DiscoveryPhase::Done);
        result
    }

    /// Record a phase transition
    pub fn enter(&mut self, phase: DiscoveryPhase) {
        self.phases.push(phase);
    }

    /// Current phase
    pub fn phase(&self) -> DiscoveryPhase {
        self.phases.last().copied().unwrap_or(DiscoveryPhase::Start)
    }

    /// Apply a score
    pub fn set_confidence(&mut self, confidence: Confidence) {
        self.confidence = confidence.score;
        self.reliability = confidence.reliability;
        self.signals = confidence.signals;
    }

    /// Add a warning
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_error(&self) -> bool {
        self.pagination_type == PaginationType::Error
    }

    /// Number of pages to extract
    pub fn page_count(&self) -> usize {
        self.page_urls.len()
    }
}
