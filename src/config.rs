//! Engine configuration
//!
//! Everything the orchestrator and its components can be tuned with, loaded
//! from YAML. Every section is optional and falls back to its defaults.
//!
//! ```yaml
//! probe:
//!   navigation_timeout_ms: 30000
//!   pacing:
//!     min_delay_ms: 2000
//!     max_delay_ms: 5000
//! scroll:
//!   max_retries: 5
//!   signal:
//!     kind: element_count
//!     selector: ".attorney-card"
//! discovery:
//!   cache_threshold: 80
//! sites:
//!   - domain: lawfirm.com
//!     pagination:
//!       type: parameter
//!       name: pg
//!       base_url: "https://lawfirm.com/people?pg=1"
//! ```

use crate::engine::DiscoveryOptions;
use crate::error::{Error, Result};
use crate::pagination::{BoundaryOptions, DetectorConfig, PaginationPattern};
use crate::probe::ProbeConfig;
use crate::scroll::{ProgressSignal, ScrollOptions};
use crate::validate::ValidatorConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Browser timeouts and pacing
    pub probe: ProbeConfig,

    /// Infinite-scroll load detection
    pub scroll: ScrollOptions,

    /// Last-page search bounds
    pub boundary: BoundaryOptions,

    /// Pattern detection names and selectors
    pub detector: DetectorConfig,

    /// Page content thresholds
    pub validator: ValidatorConfig,

    /// Orchestrator settings
    pub discovery: DiscoveryOptions,

    /// Per-domain manual patterns
    pub sites: Vec<SiteConfig>,
}

/// A domain whose pagination is known in advance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Host name, without `www.`
    pub domain: String,
    /// Pattern to use instead of detection
    pub pagination: PaginationPattern,
}

impl EngineConfig {
    /// Load and validate a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::config(format!("Failed to read config file '{}': {e}", path.display()))
            }
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot work
    pub fn validate(&self) -> Result<()> {
        if self.probe.navigation_timeout_ms == 0 {
            return Err(Error::invalid_value("probe.navigation_timeout_ms", "must be positive"));
        }
        if self.probe.measure_timeout_ms == 0 {
            return Err(Error::invalid_value("probe.measure_timeout_ms", "must be positive"));
        }
        let pacing = &self.probe.pacing;
        if pacing.min_delay_ms > pacing.max_delay_ms {
            return Err(Error::invalid_value(
                "probe.pacing.min_delay_ms",
                format!(
                    "{} is greater than max_delay_ms {}",
                    pacing.min_delay_ms, pacing.max_delay_ms
                ),
            ));
        }

        if self.scroll.max_retries == 0 {
            return Err(Error::invalid_value("scroll.max_retries", "must be at least 1"));
        }
        if self.scroll.max_scrolls == 0 {
            return Err(Error::invalid_value("scroll.max_scrolls", "must be at least 1"));
        }
        if let ProgressSignal::ElementCount { selector } = &self.scroll.signal {
            if selector.trim().is_empty() {
                return Err(Error::invalid_value("scroll.signal.selector", "cannot be empty"));
            }
        }

        if self.boundary.max_pages == 0 {
            return Err(Error::invalid_value("boundary.max_pages", "must be at least 1"));
        }
        if self.detector.page_params.is_empty() {
            return Err(Error::invalid_value("detector.page_params", "cannot be empty"));
        }
        if self.discovery.cache_threshold > 100 {
            return Err(Error::invalid_value("discovery.cache_threshold", "must be 0-100"));
        }
        if self.discovery.retry.max_attempts == 0 {
            return Err(Error::invalid_value("discovery.retry.max_attempts", "must be at least 1"));
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            let domain = site.domain.trim();
            if domain.is_empty() {
                return Err(Error::config("Site domain cannot be empty"));
            }
            if !seen.insert(domain.to_lowercase()) {
                return Err(Error::config(format!("Duplicate site domain: {domain}")));
            }
        }

        Ok(())
    }

    /// Manual pattern configured for `domain`
    pub fn manual_pattern(&self, domain: &str) -> Option<&PaginationPattern> {
        self.sites
            .iter()
            .find(|s| s.domain.eq_ignore_ascii_case(domain))
            .map(|s| &s.pagination)
    }
}
