//! Load completion detector
//!
//! One cycle: scroll to the bottom, wait, measure. Growth resets the patience
//! budget, anything else (no change, shrink, failed read) spends it.

use super::types::{ProgressSignal, ScrollOptions, ScrollState, StopReason};
use crate::error::Result;
use crate::probe::PageProbe;
use tracing::{debug, info};

/// Fold one cycle's sample into the state.
///
/// `None` is a failed or timed-out measurement and counts as no growth.
pub fn advance(mut state: ScrollState, sample: Option<u64>, options: &ScrollOptions) -> ScrollState {
    if state.is_finished() {
        return state;
    }

    state.scroll_count += 1;
    match sample {
        Some(value) if value > state.last_height => {
            state.total_growth += value - state.last_height;
            state.last_height = value;
            state.no_progress_streak = 0;
        }
        Some(_) => state.no_progress_streak += 1,
        None => {
            state.failed_measurements += 1;
            state.no_progress_streak += 1;
        }
    }

    if state.no_progress_streak >= options.max_retries {
        state.stop_reason = StopReason::MaxRetries;
    } else if state.scroll_count >= options.max_scrolls {
        state.stop_reason = StopReason::MaxScrolls;
    }
    state
}

/// Replay a whole sample history from an initial value
pub fn replay(initial: u64, samples: &[Option<u64>], options: &ScrollOptions) -> ScrollState {
    let mut state = ScrollState::starting_at(initial);
    if options.max_scrolls == 0 {
        state.stop_reason = StopReason::MaxScrolls;
        return state;
    }

    for sample in samples {
        state = advance(state, *sample, options);
        if state.is_finished() {
            break;
        }
    }
    state
}

/// Whether an unchanged cycle should be followed by a jiggle before it counts
pub fn jiggle_due(state: &ScrollState, options: &ScrollOptions) -> bool {
    options.jiggle_every > 0 && (state.no_progress_streak + 1) % options.jiggle_every == 0
}

/// Drives scroll cycles on a probe until the page stops growing
#[derive(Debug, Clone, Default)]
pub struct LoadCompletionDetector {
    options: ScrollOptions,
}

impl LoadCompletionDetector {
    /// Create a detector
    pub fn new(options: ScrollOptions) -> Self {
        Self { options }
    }

    /// Detector options
    pub fn options(&self) -> &ScrollOptions {
        &self.options
    }

    /// Scroll until the progress signal is stable or the scroll cap is hit.
    ///
    /// Never fails: probe errors become no-growth cycles.
    pub async fn load_until_stable(&self, probe: &mut PageProbe) -> ScrollState {
        let initial = self.initial(probe).await;
        let mut state = ScrollState::starting_at(initial);
        if self.options.max_scrolls == 0 {
            state.stop_reason = StopReason::MaxScrolls;
            return state;
        }
        self.load_from(probe, state).await
    }

    /// Keep loading after a trial scroll that grew the page from `before` to
    /// `after` pixels.
    ///
    /// The trial is the first cycle, so `max_scrolls` covers it as well.
    pub async fn load_after_trial(&self, probe: &mut PageProbe, before: u64, after: u64) -> ScrollState {
        let options = &self.options;
        let state = match options.signal {
            ProgressSignal::Height => advance(ScrollState::starting_at(before), Some(after), options),
            _ => {
                // The trial measured height; other signals start from their current value
                let mut state = ScrollState::starting_at(self.initial(probe).await);
                state.scroll_count = 1;
                if state.scroll_count >= options.max_scrolls {
                    state.stop_reason = StopReason::MaxScrolls;
                }
                state
            }
        };
        self.load_from(probe, state).await
    }

    /// Run cycles from `state` until it finishes
    async fn load_from(&self, probe: &mut PageProbe, mut state: ScrollState) -> ScrollState {
        let options = &self.options;
        info!(
            "Loading until stable (signal={:?}, from={}, scrolls={}, max_retries={}, max_scrolls={})",
            options.signal, state.last_height, state.scroll_count, options.max_retries, options.max_scrolls
        );

        while !state.is_finished() {
            if let Err(e) = probe.scroll_to_bottom().await {
                debug!("Scroll {} failed: {e}", state.scroll_count + 1);
            }
            probe.pause(options.scroll_delay()).await;

            let mut sample = measure(probe, &options.signal).await.ok();
            let grew = sample.is_some_and(|value| value > state.last_height);

            if !grew && jiggle_due(&state, options) {
                self.jiggle(probe, state.last_height).await;
                state.jiggles += 1;
                let retry = measure(probe, &options.signal).await.ok();
                sample = sample.max(retry);
            }

            let before = state.last_height;
            state = advance(state, sample, options);
            debug!(
                "Scroll {}: {before} -> {} (streak {}/{})",
                state.scroll_count, state.last_height, state.no_progress_streak, options.max_retries
            );
        }

        info!(
            "Stopped after {} scrolls ({:?}), final value {}",
            state.scroll_count, state.stop_reason, state.last_height
        );
        state
    }

    /// First reading of the progress signal; a failed read starts from zero
    async fn initial(&self, probe: &mut PageProbe) -> u64 {
        match measure(probe, &self.options.signal).await {
            Ok(value) => value,
            Err(e) => {
                debug!("Initial measurement failed: {e}");
                0
            }
        }
    }

    /// Scroll back up a little, then to the bottom again
    async fn jiggle(&self, probe: &mut PageProbe, height: u64) {
        let delay = self.options.scroll_delay();
        let up = height.saturating_sub(self.options.jiggle_distance);
        debug!("Jiggling to {up} and back");

        if let Err(e) = probe.scroll_to(up).await {
            debug!("Jiggle up failed: {e}");
        }
        probe.pause(delay / 2).await;
        if let Err(e) = probe.scroll_to_bottom().await {
            debug!("Jiggle down failed: {e}");
        }
        probe.pause(delay).await;
    }
}

/// Read the progress signal from the page
async fn measure(probe: &mut PageProbe, signal: &ProgressSignal) -> Result<u64> {
    match signal {
        ProgressSignal::Height => probe.document_height().await,
        ProgressSignal::ElementCount { selector } => probe.element_count(selector).await,
        ProgressSignal::ScrollPosition => probe.scroll_position().await,
    }
}
