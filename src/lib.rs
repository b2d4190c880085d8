// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # pagescout
//!
//! Pagination and load-completion discovery for directory pages that render
//! their listings client-side.
//!
//! Given the start URL of a people directory, pagescout decides whether the
//! listing is a single page, an infinite scroll, or paginated, and in the last
//! case which URL encoding reaches each page and where the last page is.
//!
//! ## Features
//!
//! - **Load completion**: scroll until the page stops growing, with jiggles for
//!   lazy loaders that need a nudge
//! - **Pattern detection**: `?page=N`, `/page/N/` and `?start=N` from page links,
//!   a clicked "next" control, or the URL itself
//! - **Boundary search**: exponential probing plus binary search for the last
//!   populated page, confirmed by two empty pages
//! - **Confidence scoring**: additive 0-100 score with Low/Medium/High tiers
//! - **Pattern cache**: detected patterns remembered per domain
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pagescout::{PageProbe, PaginationOrchestrator};
//! use pagescout::probe::{ChromiumConfig, ChromiumDriver};
//!
//! #[tokio::main]
//! async fn main() -> pagescout::Result<()> {
//!     let driver = ChromiumDriver::launch(&ChromiumConfig::default()).await?;
//!     let mut probe = PageProbe::new(driver);
//!
//!     let result = PaginationOrchestrator::new()
//!         .discover(&mut probe, "https://lawfirm.com/people")
//!         .await?;
//!     for url in &result.page_urls {
//!         println!("{url}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    PaginationOrchestrator                       │
//! │  discover(start_url) → DiscoveryResult {page_urls, confidence}  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌────────────┬─────────────┬───┴─────────┬────────────┬───────────┐
//! │  Detector  │  Boundary   │  Scroll     │  Scoring   │  Cache    │
//! ├────────────┼─────────────┼─────────────┼────────────┼───────────┤
//! │ Page links │ Doubling    │ Height      │ Paginated  │ In-memory │
//! │ Click-diff │ Binary      │ Elements    │ Single     │ JSON file │
//! │ URL        │ Confirm +2  │ Jiggle      │ Scroll     │           │
//! └────────────┴─────────────┴─────────────┴────────────┴───────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │            PageProbe → BrowserDriver (Chromium, scripted)       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for pagescout
pub mod error;

/// Common types and type aliases
pub mod types;

/// Navigation pacing and start page retries
pub mod pacing;

/// Browser driver abstraction and page measurements
pub mod probe;

/// Page content validation
pub mod validate;

/// Infinite-scroll load completion
pub mod scroll;

/// Pagination patterns, detection and last-page search
pub mod pagination;

/// Confidence scoring
pub mod scoring;

/// Per-domain pattern cache
pub mod cache;

/// Discovery orchestration
pub mod engine;

/// Engine configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{DiscoveryResult, PaginationOrchestrator};
pub use probe::{BrowserDriver, PageProbe};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
