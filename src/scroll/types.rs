//! Scroll types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What counts as "more content arrived"
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressSignal {
    /// Document scroll height
    #[default]
    Height,
    /// Number of elements matching a card selector
    ElementCount {
        /// Selector for one contact card
        selector: String,
    },
    /// Bottom edge of the viewport after scrolling down
    ScrollPosition,
}

/// Options for a load-until-stable run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollOptions {
    /// Wait after each scroll for lazy content to render
    pub scroll_delay_ms: u64,
    /// Consecutive no-growth cycles tolerated before declaring the page complete
    pub max_retries: u32,
    /// Hard cap on scroll cycles
    pub max_scrolls: u32,
    /// Unchanged cycles between reverse-then-forward jiggles (0 disables)
    pub jiggle_every: u32,
    /// How far a jiggle scrolls back up, in pixels
    pub jiggle_distance: u64,
    /// Progress signal to watch
    pub signal: ProgressSignal,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            scroll_delay_ms: 500,
            max_retries: 5,
            max_scrolls: 500,
            jiggle_every: 3,
            jiggle_distance: 600,
            signal: ProgressSignal::Height,
        }
    }
}

impl ScrollOptions {
    /// Wait after each scroll
    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    /// Set the retry budget
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the scroll cap
    #[must_use]
    pub fn with_max_scrolls(mut self, max_scrolls: u32) -> Self {
        self.max_scrolls = max_scrolls;
        self
    }

    /// Set the scroll delay
    #[must_use]
    pub fn with_delay_ms(mut self, scroll_delay_ms: u64) -> Self {
        self.scroll_delay_ms = scroll_delay_ms;
        self
    }

    /// Set the progress signal
    #[must_use]
    pub fn with_signal(mut self, signal: ProgressSignal) -> Self {
        self.signal = signal;
        self
    }
}

/// Why scrolling stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The signal stopped growing for `max_retries` cycles: content judged complete
    MaxRetries,
    /// The scroll cap was hit first: content may be incomplete
    MaxScrolls,
    /// Still running
    #[default]
    Unknown,
}

/// Progress of a load-until-stable run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScrollState {
    /// Scroll cycles performed
    pub scroll_count: u32,
    /// Consecutive cycles without growth
    pub no_progress_streak: u32,
    /// Largest signal value seen so far
    pub last_height: u64,
    /// Why the run ended
    pub stop_reason: StopReason,
    /// Jiggles issued
    pub jiggles: u32,
    /// Cycles whose measurement failed or timed out
    pub failed_measurements: u32,
    /// Total signal growth over the run
    pub total_growth: u64,
}

impl ScrollState {
    /// State before the first cycle, given the initial signal value
    pub fn starting_at(initial: u64) -> Self {
        Self {
            last_height: initial,
            ..Self::default()
        }
    }

    /// Whether the run has ended
    pub fn is_finished(&self) -> bool {
        self.stop_reason != StopReason::Unknown
    }

    /// Whether all lazy content is believed to have loaded
    pub fn is_complete(&self) -> bool {
        self.stop_reason == StopReason::MaxRetries
    }

    /// Whether any growth was observed
    pub fn grew(&self) -> bool {
        self.total_growth > 0
    }
}
