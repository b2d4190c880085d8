//! Common types used throughout pagescout
//!
//! This module contains shared type definitions and small enums used
//! across multiple modules.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Pagination Type
// ============================================================================

/// How a directory spreads its listing across pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationType {
    /// Everything is on the start page
    #[default]
    None,
    /// Page number in a query parameter (`?page=3`)
    Parameter,
    /// Page number in a path segment (`/page/3`)
    Path,
    /// Item offset in a query parameter (`?start=40`)
    Offset,
    /// Content keeps arriving while scrolling
    InfiniteScroll,
    /// The start page could not be loaded
    Error,
}

impl PaginationType {
    /// Whether page URLs were generated from a pattern
    pub fn is_paginated(&self) -> bool {
        matches!(self, Self::Parameter | Self::Path | Self::Offset)
    }
}

impl fmt::Display for PaginationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Parameter => "parameter",
            Self::Path => "path",
            Self::Offset => "offset",
            Self::InfiniteScroll => "infinite_scroll",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Reliability
// ============================================================================

/// Confidence tier derived from a 0-100 score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    #[default]
    Low,
    Medium,
    High,
}

impl Reliability {
    /// Tier for a score: >= 80 high, >= 50 medium, else low
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Self::High,
            50..=79 => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Backoff
// ============================================================================

/// Backoff strategy between retries of the initial page load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}
