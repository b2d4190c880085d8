//! Discovery state machine
//!
//! `Start -> DetectingScrollVsPaginated -> {PaginatedDiscovery | InfiniteScrollLoad} -> Scored -> Done`

use super::types::{DiscoveryOptions, DiscoveryPhase, DiscoveryResult};
use crate::cache::{domain_key, CacheWrite, CachedPattern, PatternStore};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::pagination::{
    BoundaryOptions, BoundarySearcher, Detection, DetectorConfig, PageSource, PaginationPattern,
    PatternDetector, ProbePageSource, VisualControls,
};
use crate::probe::PageProbe;
use crate::scoring::{ConfidenceScorer, SinglePageSignals, SpotCheck};
use crate::scroll::{LoadCompletionDetector, ScrollOptions};
use crate::types::PaginationType;
use crate::validate::{PageValidator, ValidatorConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Points taken off when the boundary search saw repeated content
const DUPLICATE_PENALTY: u8 = 10;

/// Top-level discovery engine
pub struct PaginationOrchestrator {
    detector: PatternDetector,
    searcher: BoundarySearcher,
    validator: PageValidator,
    scorer: ConfidenceScorer,
    loader: LoadCompletionDetector,
    options: DiscoveryOptions,
    /// Manual patterns by domain
    sites: HashMap<String, PaginationPattern>,
    store: Option<Arc<dyn PatternStore>>,
}

impl Default for PaginationOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl PaginationOrchestrator {
    /// Orchestrator with default components and no pattern store
    pub fn new() -> Self {
        Self {
            detector: PatternDetector::default(),
            searcher: BoundarySearcher::default(),
            validator: PageValidator::new(),
            scorer: ConfidenceScorer::new(),
            loader: LoadCompletionDetector::default(),
            options: DiscoveryOptions::default(),
            sites: HashMap::new(),
            store: None,
        }
    }

    /// Orchestrator built from a loaded configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut orchestrator = Self::new()
            .with_detector_config(config.detector.clone())
            .with_boundary_options(config.boundary.clone())
            .with_scroll_options(config.scroll.clone())
            .with_validator_config(config.validator.clone())
            .with_options(config.discovery.clone());
        for site in &config.sites {
            orchestrator = orchestrator.with_site(&site.domain, site.pagination.clone());
        }
        orchestrator
    }

    #[must_use]
    pub fn with_options(mut self, options: DiscoveryOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_detector_config(mut self, config: DetectorConfig) -> Self {
        self.detector = PatternDetector::new(config);
        self
    }

    #[must_use]
    pub fn with_boundary_options(mut self, options: BoundaryOptions) -> Self {
        self.searcher = BoundarySearcher::new(options);
        self
    }

    #[must_use]
    pub fn with_scroll_options(mut self, options: ScrollOptions) -> Self {
        self.loader = LoadCompletionDetector::new(options);
        self
    }

    #[must_use]
    pub fn with_validator_config(mut self, config: ValidatorConfig) -> Self {
        self.validator = PageValidator::with_config(config);
        self
    }

    /// Use a fixed pattern for a domain, skipping detection
    #[must_use]
    pub fn with_site(mut self, domain: &str, pattern: PaginationPattern) -> Self {
        self.sites.insert(normalize_domain(domain), pattern);
        self
    }

    /// Read and write detected patterns through `store`
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn PatternStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Like [`discover`](Self::discover), but a failed start page becomes a
    /// result with `pagination_type = Error` instead of an `Err`
    pub async fn discover_or_report(&self, probe: &mut PageProbe, start_url: &str) -> DiscoveryResult {
        match self.discover(probe, start_url).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Discovery failed for {start_url}: {e}");
                DiscoveryResult::failed(start_url, e.to_string())
            }
        }
    }

    /// Work out how to reach every page of the directory at `start_url`.
    ///
    /// Only a start page that never loads is an error.
    pub async fn discover(&self, probe: &mut PageProbe, start_url: &str) -> Result<DiscoveryResult> {
        let start = Url::parse(start_url)?;
        let mut result = DiscoveryResult::new(start.as_str());
        info!("Discovering pagination for {start}");

        self.load_start_page(probe, &start).await?;
        result.enter(DiscoveryPhase::DetectingScrollVsPaginated);

        let domain = domain_key(&start);
        let manual = domain.as_deref().and_then(|d| self.sites.get(d));
        let cached = self.cached_entry(domain.as_deref()).await;

        let controls = self.detector.inspect_controls(probe).await;
        let detection = self
            .detector
            .detect(probe, &start, &controls, manual, cached.as_ref())
            .await
            .filter(|d| d.pattern.is_paginated());
        result.controls = controls.clone();

        if let Some(detection) = detection {
            result.enter(DiscoveryPhase::PaginatedDiscovery);
            self.discover_paginated(probe, &start, detection, &controls, &mut result)
                .await;
        } else if let Some(growth) = self.trial_scroll(probe).await {
            result.enter(DiscoveryPhase::InfiniteScrollLoad);
            self.load_infinite(probe, &start, growth, &mut result).await;
        } else {
            self.score_single_page(probe, &start, &controls, true, &mut result)
                .await;
        }

        self.store_pattern(domain, &mut result).await;
        result.enter(DiscoveryPhase::Done);

        info!(
            "Discovered {} for {start}: {} page(s), confidence {} ({})",
            result.pagination_type,
            result.page_count(),
            result.confidence,
            result.reliability
        );
        Ok(result)
    }

    // ========================================================================
    // Start Page
    // ========================================================================

    async fn load_start_page(&self, probe: &mut PageProbe, start: &Url) -> Result<()> {
        let mut attempt = 0;
        loop {
            match probe.navigate(start.as_str()).await {
                Ok(()) => break,
                Err(e) => match self.options.retry.retry_after(&e, attempt) {
                    Some(delay) => {
                        warn!("Start page attempt {} failed: {e}. Retrying in {delay:?}", attempt + 1);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(Error::initial_load(start.as_str(), e.to_string())),
                },
            }
        }
        probe.settle().await;
        Ok(())
    }

    async fn cached_entry(&self, domain: Option<&str>) -> Option<CachedPattern> {
        let (store, domain) = (self.store.as_ref()?, domain?);
        match store.get(domain).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Pattern cache unreadable for {domain}: {e}");
                None
            }
        }
    }

    // ========================================================================
    // Paginated Listings
    // ========================================================================

    async fn discover_paginated(
        &self,
        probe: &mut PageProbe,
        start: &Url,
        detection: Detection,
        controls: &VisualControls,
        result: &mut DiscoveryResult,
    ) {
        let min_contacts = self.searcher.options().min_contacts_per_page;
        let (boundary, spot_checks) = {
            let mut source = ProbePageSource::new(probe, &detection.pattern, &self.validator);
            let boundary = self
                .searcher
                .find_true_max_page(&mut source, controls.declared_max)
                .await;

            let mut checks = Vec::new();
            for page in spot_check_pages(boundary.confirmed_max_page, self.options.spot_checks) {
                let verdict = source.check_page(page).await;
                debug!("Spot check page {page}: {verdict:?}");
                checks.push(SpotCheck {
                    page,
                    valid: verdict.is_valid(min_contacts),
                    has_content: verdict.has_content,
                    contact_estimate: verdict.contact_estimate,
                });
            }
            (boundary, checks)
        };

        if !boundary.found_content() {
            result.warn(format!(
                "Detected {} but no page had content; treating as a single page",
                detection.pattern
            ));
            result.boundary = Some(boundary);
            if let Err(e) = probe.navigate(start.as_str()).await {
                result.warn(format!("Could not return to start page: {e}"));
            }
            self.score_single_page(probe, start, controls, false, result)
                .await;
            return;
        }

        let mut confidence = self
            .scorer
            .score(Some(&detection), controls, &boundary, &spot_checks);

        if !boundary.duplicates.is_empty() {
            result.warn(format!(
                "Pages {:?} repeated earlier content; the pattern may loop back",
                boundary.duplicates
            ));
            confidence = confidence.penalize(DUPLICATE_PENALTY, "duplicate_content");
        }
        if boundary.hard_capped {
            result.warn(format!(
                "Stopped at the {}-page cap; the listing may be longer",
                self.searcher.options().max_pages
            ));
        }

        result.pagination_type = detection.pattern.kind();
        result.page_urls = detection
            .pattern
            .page_urls(boundary.confirmed_max_page)
            .into_iter()
            .map(String::from)
            .collect();
        result.hard_capped = boundary.hard_capped;
        result.fully_loaded = boundary.boundary_confirmed && !boundary.hard_capped;
        result.detection_source = Some(detection.source);
        result.pattern = Some(detection.pattern);
        result.boundary = Some(boundary);
        result.spot_checks = spot_checks;
        result.enter(DiscoveryPhase::Scored);
        result.set_confidence(confidence);
    }

    // ========================================================================
    // Infinite Scroll and Single Pages
    // ========================================================================

    /// One scroll to the bottom; `Some((before, after))` when the page grew
    async fn trial_scroll(&self, probe: &mut PageProbe) -> Option<(u64, u64)> {
        let before = probe.document_height().await.ok()?;
        if let Err(e) = probe.scroll_to_bottom().await {
            debug!("Trial scroll failed: {e}");
            return None;
        }
        probe.pause(self.loader.options().scroll_delay()).await;
        let after = probe.document_height().await.ok()?;

        debug!("Trial scroll: {before} -> {after}");
        (after > before).then_some((before, after))
    }

    async fn load_infinite(
        &self,
        probe: &mut PageProbe,
        start: &Url,
        (before, after): (u64, u64),
        result: &mut DiscoveryResult,
    ) {
        let state = self.loader.load_after_trial(probe, before, after).await;

        let verdict = self.validator.validate(probe).await;
        if !state.is_complete() {
            result.warn(format!(
                "Scroll cap of {} reached before content stopped loading",
                self.loader.options().max_scrolls
            ));
        }

        let confidence = self.scorer.score_infinite_scroll(&state, verdict.has_content);
        result.pagination_type = PaginationType::InfiniteScroll;
        result.page_urls = vec![start.to_string()];
        result.fully_loaded = state.is_complete();
        result.scroll = Some(state);
        result.enter(DiscoveryPhase::Scored);
        result.set_confidence(confidence);
    }

    async fn score_single_page(
        &self,
        probe: &mut PageProbe,
        start: &Url,
        controls: &VisualControls,
        stable_height: bool,
        result: &mut DiscoveryResult,
    ) {
        let verdict = self.validator.validate(probe).await;
        if !verdict.has_content {
            result.warn("Start page has little or no content");
        }

        let confidence = self.scorer.score_single_page(SinglePageSignals {
            content_present: verdict.has_content,
            contacts_found: verdict.contact_estimate > 0,
            no_controls: !controls.present(),
            stable_height,
            unpaginated_url: self.detector.classify_url(start).is_none(),
        });

        result.pagination_type = PaginationType::None;
        result.page_urls = vec![start.to_string()];
        result.fully_loaded = verdict.has_content;
        result.enter(DiscoveryPhase::Scored);
        result.set_confidence(confidence);
    }

    // ========================================================================
    // Pattern Cache
    // ========================================================================

    async fn store_pattern(&self, domain: Option<String>, result: &mut DiscoveryResult) {
        let (Some(store), Some(domain), Some(pattern), Some(source)) = (
            self.store.as_ref(),
            domain,
            result.pattern.as_ref(),
            result.detection_source,
        ) else {
            return;
        };
        if source.is_provided() || result.confidence < self.options.cache_threshold {
            return;
        }

        let write = CacheWrite {
            domain,
            pattern: pattern.clone(),
            confidence: result.confidence,
        };
        match store.put(&write.domain, write.to_entry()).await {
            Ok(()) => {
                info!("Cached {} for {}", write.pattern, write.domain);
                result.cache_write = Some(write);
            }
            Err(e) => result.warn(format!("Could not cache pattern for {}: {e}", write.domain)),
        }
    }
}

/// Up to `count` pages spread evenly over `1..=max_page`, first and last included
pub fn spot_check_pages(max_page: u32, count: u32) -> Vec<u32> {
    if max_page == 0 || count == 0 {
        return Vec::new();
    }
    if max_page <= count {
        return (1..=max_page).collect();
    }
    if count == 1 {
        return vec![1];
    }

    let span = u64::from(max_page - 1);
    let steps = u64::from(count - 1);
    let mut pages: Vec<u32> = (0..u64::from(count))
        .map(|i| 1 + (i * span / steps) as u32)
        .collect();
    pages.dedup();
    pages
}

fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_lowercase();
    lower.strip_prefix("www.").unwrap_or(&lower).to_string()
}
