//! Discovery engine module
//!
//! Ties detection, boundary search, load completion and scoring together.
//!
//! # Overview
//!
//! The engine module provides:
//! - `PaginationOrchestrator` - Runs discovery for one start URL
//! - `DiscoveryResult` - Page URLs, confidence, warnings and the phase trace
//! - `DiscoveryOptions` - Spot checks, cache threshold, start page retries

mod orchestrator;
mod types;

pub use orchestrator::{spot_check_pages, PaginationOrchestrator};
pub use types::{DiscoveryOptions, DiscoveryPhase, DiscoveryResult};

#[cfg(test)]
mod tests;
