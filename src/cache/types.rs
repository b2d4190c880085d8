//! Cache entry types
//!
//! These types are serialized to JSON and persisted between runs.

use crate::pagination::PaginationPattern;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// A pattern discovered on an earlier run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPattern {
    /// The pattern
    pub pattern: PaginationPattern,
    /// When it was discovered
    pub discovered_at: DateTime<Utc>,
    /// Confidence of the run that discovered it
    pub confidence: u8,
}

impl CachedPattern {
    /// Entry discovered now
    pub fn new(pattern: PaginationPattern, confidence: u8) -> Self {
        Self {
            pattern,
            discovered_at: Utc::now(),
            confidence,
        }
    }

    /// Whether the entry is younger than `max_age_hours` (non-positive: never expires)
    pub fn is_fresh(&self, max_age_hours: i64) -> bool {
        max_age_hours <= 0 || Utc::now() - self.discovered_at <= Duration::hours(max_age_hours)
    }
}

/// Request to remember a pattern for a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheWrite {
    pub domain: String,
    pub pattern: PaginationPattern,
    pub confidence: u8,
}

impl CacheWrite {
    /// Cache entry for this write, stamped now
    pub fn to_entry(&self) -> CachedPattern {
        CachedPattern::new(self.pattern.clone(), self.confidence)
    }
}

/// All cached patterns, keyed by domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternCache {
    #[serde(default)]
    pub domains: BTreeMap<String, CachedPattern>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, domain: &str) -> Option<&CachedPattern> {
        self.domains.get(domain)
    }

    pub fn insert(&mut self, domain: impl Into<String>, entry: CachedPattern) {
        self.domains.insert(domain.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// Cache key for a URL: lowercase host without a leading `www.`
pub fn domain_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map_or_else(|| host.clone(), str::to_string))
}
