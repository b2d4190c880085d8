//! Load completion module
//!
//! Scrolls an infinite-scroll page until its progress signal stops growing.
//!
//! # Overview
//!
//! The patience logic lives in pure functions (`advance`, `replay`) over a
//! history of samples, so it can be tested without a browser. The
//! `LoadCompletionDetector` only drives the probe and feeds samples in.
//! Height polling, element counting, and scroll-position monitoring are one
//! implementation with a configurable `ProgressSignal`.

mod detector;
mod types;

pub use detector::{advance, jiggle_due, replay, LoadCompletionDetector};
pub use types::{ProgressSignal, ScrollOptions, ScrollState, StopReason};
