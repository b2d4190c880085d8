//! Page validator implementation

use crate::probe::PageProbe;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::debug;

/// Characters of normalized text that go into a fingerprint
pub const FINGERPRINT_PREFIX_CHARS: usize = 2000;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").expect("email regex is valid")
});

/// Thresholds and selectors for validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Minimum rendered text length for a page to count as having content
    pub min_text_length: usize,
    /// Selector for structured contact links
    pub contact_link_selector: String,
    /// Characters of normalized text hashed into the fingerprint
    pub fingerprint_prefix_chars: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_text_length: 200,
            contact_link_selector: r#"a[href^="mailto:"]"#.to_string(),
            fingerprint_prefix_chars: FINGERPRINT_PREFIX_CHARS,
        }
    }
}

/// Outcome of validating one page
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageVerdict {
    /// Rendered text reached the minimum length
    pub has_content: bool,
    /// Best guess at the number of contacts listed
    pub contact_estimate: u32,
    /// Hash of the normalized text prefix
    pub content_fingerprint: String,
    /// The page could not be read in time
    #[serde(default)]
    pub timed_out: bool,
}

impl PageVerdict {
    /// Verdict for a page that could not be read
    pub fn unreadable() -> Self {
        Self {
            timed_out: true,
            ..Self::default()
        }
    }

    /// Whether this page should count as a populated directory page
    pub fn is_valid(&self, min_contacts_per_page: u32) -> bool {
        self.has_content && self.contact_estimate >= min_contacts_per_page
    }
}

/// Scores the page currently loaded in a probe
#[derive(Debug, Clone, Default)]
pub struct PageValidator {
    config: ValidatorConfig,
}

impl PageValidator {
    /// Create a validator with default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator with custom thresholds
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validator configuration
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate the current page. Read failures give an unreadable verdict.
    pub async fn validate(&self, probe: &mut PageProbe) -> PageVerdict {
        let text = match probe.body_text().await {
            Ok(text) => text,
            Err(e) => {
                debug!("Page text unreadable: {e}");
                return PageVerdict::unreadable();
            }
        };

        let link_count = match probe.element_count(&self.config.contact_link_selector).await {
            Ok(count) => count as u32,
            Err(e) => {
                debug!("Contact links unreadable: {e}");
                0
            }
        };

        assess(&text, link_count, &self.config)
    }
}

/// Build a verdict from page text and a contact-link count
pub fn assess(text: &str, contact_links: u32, config: &ValidatorConfig) -> PageVerdict {
    let has_content = text.trim().chars().count() >= config.min_text_length;

    let unique_emails: HashSet<String> = EMAIL
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    let contact_estimate = contact_links.max(unique_emails.len() as u32);

    PageVerdict {
        has_content,
        contact_estimate,
        content_fingerprint: fingerprint(text, config.fingerprint_prefix_chars),
        timed_out: false,
    }
}

/// Hash of the lowercased, whitespace-collapsed text prefix (16 hex chars)
pub fn fingerprint(text: &str, prefix_chars: usize) -> String {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let prefix: String = normalized.chars().take(prefix_chars).collect();

    let digest = Sha256::digest(prefix.as_bytes());
    hex::encode(&digest[..8])
}
