//! Pagination types
//!
//! Defines the page-URL generator and the records kept while searching for
//! the last page.

use crate::types::PaginationType;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Placeholder for the page number in a path template
pub const PAGE_PLACEHOLDER: &str = "{page}";

// ============================================================================
// Pagination Pattern
// ============================================================================

/// How page `n` of a directory is addressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationPattern {
    /// Page number in a query parameter (`?page=3`)
    Parameter {
        /// Query parameter name
        name: String,
        /// Any URL of the listing; other query parameters are kept
        base_url: Url,
    },
    /// Page number in the path (`/people/page/3`)
    PathSegment {
        /// Path with a `{page}` placeholder, e.g. `/people/page/{page}`
        template: String,
        /// Any URL of the listing; scheme, host and query are kept
        base_url: Url,
    },
    /// Item offset in a query parameter (`?start=40`)
    Offset {
        /// Query parameter name
        param_name: String,
        /// Any URL of the listing; other query parameters are kept
        base_url: Url,
        /// Items per page, the offset step
        items_per_page: u32,
    },
    /// No pagination
    None,
}

impl PaginationPattern {
    /// Query parameter pattern
    pub fn parameter(name: impl Into<String>, base_url: Url) -> Self {
        Self::Parameter {
            name: name.into(),
            base_url,
        }
    }

    /// Path template pattern
    pub fn path_segment(template: impl Into<String>, base_url: Url) -> Self {
        Self::PathSegment {
            template: template.into(),
            base_url,
        }
    }

    /// Offset pattern
    pub fn offset(param_name: impl Into<String>, base_url: Url, items_per_page: u32) -> Self {
        Self::Offset {
            param_name: param_name.into(),
            base_url,
            items_per_page,
        }
    }

    /// Result classification for this pattern
    pub fn kind(&self) -> PaginationType {
        match self {
            Self::Parameter { .. } => PaginationType::Parameter,
            Self::PathSegment { .. } => PaginationType::Path,
            Self::Offset { .. } => PaginationType::Offset,
            Self::None => PaginationType::None,
        }
    }

    /// Base URL, if any
    pub fn base_url(&self) -> Option<&Url> {
        match self {
            Self::Parameter { base_url, .. }
            | Self::PathSegment { base_url, .. }
            | Self::Offset { base_url, .. } => Some(base_url),
            Self::None => None,
        }
    }

    /// Whether the pattern can generate page URLs
    pub fn is_paginated(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// URL of page `page` (1-based). `None` for page 0 or an unpaginated pattern.
    pub fn page_url(&self, page: u32) -> Option<Url> {
        if page == 0 {
            return None;
        }

        match self {
            Self::Parameter { name, base_url } => {
                Some(with_query_value(base_url, name, &page.to_string()))
            }
            Self::Offset {
                param_name,
                base_url,
                items_per_page,
            } => {
                let offset = u64::from(page - 1) * u64::from(*items_per_page);
                Some(with_query_value(base_url, param_name, &offset.to_string()))
            }
            Self::PathSegment { template, base_url } => {
                let mut url = base_url.clone();
                url.set_path(&template.replace(PAGE_PLACEHOLDER, &page.to_string()));
                Some(url)
            }
            Self::None => None,
        }
    }

    /// URLs of pages `1..=last`
    pub fn page_urls(&self, last: u32) -> Vec<Url> {
        (1..=last).filter_map(|page| self.page_url(page)).collect()
    }
}

impl fmt::Display for PaginationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameter { name, .. } => write!(f, "?{name}=N"),
            Self::PathSegment { template, .. } => f.write_str(template),
            Self::Offset {
                param_name,
                items_per_page,
                ..
            } => write!(f, "?{param_name}=(N-1)*{items_per_page}"),
            Self::None => f.write_str("none"),
        }
    }
}

/// Copy of `url` with `name` set to `value`, keeping other parameters in order
pub(crate) fn with_query_value(url: &Url, name: &str, value: &str) -> Url {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    match pairs.iter_mut().find(|(k, _)| k == name) {
        Some(pair) => pair.1 = value.to_string(),
        None => pairs.push((name.to_string(), value.to_string())),
    }
    // Drop repeats of the parameter so the URL is unambiguous
    let mut seen = false;
    pairs.retain(|(k, _)| {
        if k != name {
            return true;
        }
        let keep = !seen;
        seen = true;
        keep
    });

    let mut out = url.clone();
    out.query_pairs_mut().clear().extend_pairs(pairs);
    out
}

// ============================================================================
// Detection
// ============================================================================

/// Where a pattern came from, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// Per-domain site configuration
    Manual,
    /// An earlier run's discovery
    Cached,
    /// Numbered page links on the page
    Dom,
    /// Clicking "next" and diffing the URL
    ClickDiff,
    /// The start URL itself
    Url,
}

impl DetectionSource {
    /// Whether the pattern was supplied rather than discovered on this run
    pub fn is_provided(self) -> bool {
        matches!(self, Self::Manual | Self::Cached)
    }
}

/// A detected pattern and its provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub pattern: PaginationPattern,
    pub source: DetectionSource,
}

impl Detection {
    pub fn new(pattern: PaginationPattern, source: DetectionSource) -> Self {
        Self { pattern, source }
    }
}

/// Pagination controls visible on the page
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisualControls {
    /// Distinct page numbers linked from the page, ascending
    pub numbered_pages: Vec<u32>,
    /// A "next" control exists
    pub has_next: bool,
    /// A "previous" control exists
    pub has_prev: bool,
    /// Highest numbered page link
    pub declared_max: Option<u32>,
}

impl VisualControls {
    /// Whether any pagination control was seen
    pub fn present(&self) -> bool {
        !self.numbered_pages.is_empty() || self.has_next || self.has_prev
    }
}

// ============================================================================
// Boundary Search
// ============================================================================

/// Bounds for the last-page search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryOptions {
    /// Never test beyond this page
    pub max_pages: u32,
    /// Contacts a page needs to count as populated
    pub min_contacts_per_page: u32,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self {
            max_pages: 200,
            min_contacts_per_page: 1,
        }
    }
}

impl BoundaryOptions {
    /// Set the page cap
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }
}

/// One tested page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestedPage {
    /// Page number
    pub page: u32,
    /// Populated with enough contacts
    pub valid: bool,
    /// Contacts seen on the last attempt
    pub contact_estimate: u32,
    /// Loads made (2 when an empty result was re-tested)
    pub attempts: u32,
    /// Lower page with identical content, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<u32>,
}

/// Progress and outcome of a last-page search
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundarySearchState {
    /// Highest page known to be valid
    pub low: u32,
    /// Lowest page known to be empty
    pub high: Option<u32>,
    /// Last populated page (0 when even page 1 is empty)
    pub confirmed_max_page: u32,
    /// Every page tested, in test order
    pub tested_pages: Vec<TestedPage>,
    /// The two pages after the max were both empty
    pub boundary_confirmed: bool,
    /// The page cap stopped the search; the max is a lower bound
    pub hard_capped: bool,
    /// Pages whose content repeated a lower page
    pub duplicates: Vec<u32>,
}

impl BoundarySearchState {
    /// Record for `page`, if tested
    pub fn tested(&self, page: u32) -> Option<&TestedPage> {
        self.tested_pages.iter().find(|t| t.page == page)
    }

    /// Page numbers in test order
    pub fn test_order(&self) -> Vec<u32> {
        self.tested_pages.iter().map(|t| t.page).collect()
    }

    /// Page loads made, counting re-tests
    pub fn total_loads(&self) -> u32 {
        self.tested_pages.iter().map(|t| t.attempts).sum()
    }

    /// Whether any page at all had content
    pub fn found_content(&self) -> bool {
        self.confirmed_max_page > 0
    }
}
