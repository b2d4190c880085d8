//! Confidence scorer implementation

use super::types::{Confidence, ScoringSignals, SinglePageSignals, SpotCheck};
use crate::pagination::{BoundarySearchState, Detection, VisualControls};
use crate::scroll::ScrollState;
use tracing::debug;

// Paginated weights, summing to 100
const PATTERN_DETECTED: f64 = 15.0;
const VISUAL_CONTROLS: f64 = 15.0;
const BOUNDARY_CONFIRMED: f64 = 15.0;
const TRUE_MAX_FOUND: f64 = 10.0;
const MAX_AGREEMENT: f64 = 5.0;
const SPOT_CHECK_SUCCESS: f64 = 10.0;
const CONTACT_CONSISTENCY: f64 = 10.0;
const RECOGNIZED_TYPE: f64 = 10.0;
const PROVIDED: f64 = 5.0;
const SPOT_CHECKS_NOT_EMPTY: f64 = 5.0;

// Single page weights
const SINGLE_CONTENT: u32 = 30;
const SINGLE_CONTACTS: u32 = 20;
const SINGLE_NO_CONTROLS: u32 = 20;
const SINGLE_STABLE: u32 = 20;
const SINGLE_PLAIN_URL: u32 = 10;

// Infinite scroll weights
const SCROLL_COMPLETE: u32 = 40;
const SCROLL_GREW: u32 = 20;
const SCROLL_CONTENT: u32 = 25;
const SCROLL_CLEAN: u32 = 15;

/// Turns discovery evidence into a 0-100 score
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score a paginated outcome
    pub fn score(
        &self,
        detection: Option<&Detection>,
        controls: &VisualControls,
        boundary: &BoundarySearchState,
        spot_checks: &[SpotCheck],
    ) -> Confidence {
        let signals = Self::gather(detection, controls, boundary, spot_checks);
        debug!("Scoring signals: {signals:?}");
        self.score_signals(&signals)
    }

    /// Collect the signals for a paginated outcome
    pub fn gather(
        detection: Option<&Detection>,
        controls: &VisualControls,
        boundary: &BoundarySearchState,
        spot_checks: &[SpotCheck],
    ) -> ScoringSignals {
        let total = spot_checks.len() as f64;
        let valid: Vec<u32> = spot_checks
            .iter()
            .filter(|c| c.valid)
            .map(|c| c.contact_estimate)
            .collect();
        let not_empty = spot_checks.iter().filter(|c| c.has_content).count();

        let share = |count: usize| if total > 0.0 { count as f64 / total } else { 0.0 };
        let contact_consistency = match (valid.iter().min(), valid.iter().max()) {
            (Some(_), Some(0)) => 0.0,
            (Some(min), Some(max)) => f64::from(*min) / f64::from(*max),
            _ => 0.0,
        };

        ScoringSignals {
            pattern_detected: detection.is_some(),
            visual_controls: controls.present(),
            boundary_confirmed: boundary.boundary_confirmed,
            true_max_found: boundary.found_content() && !boundary.hard_capped,
            max_agreement: boundary.found_content()
                && controls.declared_max == Some(boundary.confirmed_max_page),
            spot_check_success: share(valid.len()),
            contact_consistency,
            recognized_type: detection.is_some_and(|d| d.pattern.is_paginated()),
            provided: detection.is_some_and(|d| d.source.is_provided()),
            spot_checks_not_empty: share(not_empty),
        }
    }

    /// Score a set of paginated signals
    pub fn score_signals(&self, signals: &ScoringSignals) -> Confidence {
        let mut fired = Vec::new();
        let mut total = 0.0;

        let mut add = |name: &str, weight: f64, amount: f64| {
            let amount = amount.clamp(0.0, 1.0);
            if amount > 0.0 {
                total += weight * amount;
                fired.push(name.to_string());
            }
        };
        let flag = |b: bool| if b { 1.0 } else { 0.0 };

        add("pattern_detected", PATTERN_DETECTED, flag(signals.pattern_detected));
        add("visual_controls", VISUAL_CONTROLS, flag(signals.visual_controls));
        add("boundary_confirmed", BOUNDARY_CONFIRMED, flag(signals.boundary_confirmed));
        add("true_max_found", TRUE_MAX_FOUND, flag(signals.true_max_found));
        add("max_agreement", MAX_AGREEMENT, flag(signals.max_agreement));
        add("spot_check_success", SPOT_CHECK_SUCCESS, signals.spot_check_success);
        add("contact_consistency", CONTACT_CONSISTENCY, signals.contact_consistency);
        add("recognized_type", RECOGNIZED_TYPE, flag(signals.recognized_type));
        add("provided", PROVIDED, flag(signals.provided));
        add("spot_checks_not_empty", SPOT_CHECKS_NOT_EMPTY, signals.spot_checks_not_empty);

        Confidence::new(total.round() as u32, fired)
    }

    /// Score a listing that fits on one page
    pub fn score_single_page(&self, signals: SinglePageSignals) -> Confidence {
        Self::sum(&[
            ("content_present", SINGLE_CONTENT, signals.content_present),
            ("contacts_found", SINGLE_CONTACTS, signals.contacts_found),
            ("no_controls", SINGLE_NO_CONTROLS, signals.no_controls),
            ("stable_height", SINGLE_STABLE, signals.stable_height),
            ("unpaginated_url", SINGLE_PLAIN_URL, signals.unpaginated_url),
        ])
    }

    /// Score an infinite-scroll load
    pub fn score_infinite_scroll(&self, state: &ScrollState, content_present: bool) -> Confidence {
        Self::sum(&[
            ("load_complete", SCROLL_COMPLETE, state.is_complete()),
            ("content_grew", SCROLL_GREW, state.grew()),
            ("content_present", SCROLL_CONTENT, content_present),
            ("clean_measurements", SCROLL_CLEAN, state.failed_measurements == 0),
        ])
    }

    fn sum(parts: &[(&str, u32, bool)]) -> Confidence {
        let fired = parts
            .iter()
            .filter(|(_, _, on)| *on)
            .map(|(name, _, _)| (*name).to_string())
            .collect();
        let score = parts.iter().filter(|(_, _, on)| *on).map(|(_, w, _)| w).sum();
        Confidence::new(score, fired)
    }
}
