//! Pagination module
//!
//! Supports: query parameter, path segment, and item offset encodings
//!
//! # Overview
//!
//! - `PatternDetector` - works out how page `n` of a directory is addressed
//! - `PaginationPattern` - generates page URLs from that encoding
//! - `BoundarySearcher` - finds the true last page by doubling and bisection

mod boundary;
mod detector;
mod types;

pub use boundary::{BoundarySearcher, PageSource, ProbePageSource};
pub use detector::{DetectorConfig, PatternDetector};
pub use types::{
    BoundaryOptions, BoundarySearchState, Detection, DetectionSource, PaginationPattern,
    TestedPage, VisualControls, PAGE_PLACEHOLDER,
};

#[cfg(test)]
mod tests;
