//! Pagination pattern detector
//!
//! Works through the sources of a pattern in priority order: manual site
//! configuration, a cached discovery, live DOM inspection (numbered links,
//! then clicking "next" and diffing the URL), and finally the URL itself.

use super::types::{Detection, DetectionSource, PaginationPattern, VisualControls, PAGE_PLACEHOLDER};
use crate::cache::CachedPattern;
use crate::probe::{ElementHandle, PageProbe};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

static PATH_PAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)/(?:page|p|pg|seite|pagina)/(\d+)(?:/|$)").expect("path page regex is valid")
});

static HREF_PAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:[?&](?:page|p|pg|paged|pagenum)=|/page/)(\d+)").expect("href page regex is valid")
});

/// Poll interval while waiting for a click to change the URL
const CLICK_POLL_MS: u64 = 250;

// ============================================================================
// Configuration
// ============================================================================

/// Names, selectors and labels the detector recognizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Query parameters that carry a page number
    pub page_params: Vec<String>,
    /// Query parameters that carry an item offset
    pub offset_params: Vec<String>,
    /// Query parameters that carry a page size
    pub limit_params: Vec<String>,
    /// Selectors for a "next" control, tried in order
    pub next_selectors: Vec<String>,
    /// Visible labels of a "next" control
    pub next_labels: Vec<String>,
    /// Selectors for a "previous" control
    pub prev_selectors: Vec<String>,
    /// Visible labels of a "previous" control
    pub prev_labels: Vec<String>,
    /// Selector for candidate page links
    pub page_link_selector: String,
    /// Selector for clickable controls searched by label
    pub control_selector: String,
    /// How long to wait for a click to change the URL
    pub click_wait_ms: u64,
    /// Offset step assumed when the URL carries no page size
    pub default_items_per_page: u32,
    /// Cached patterns older than this are ignored
    pub cache_max_age_hours: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| -> Vec<String> { items.iter().map(|s| (*s).to_string()).collect() };
        Self {
            page_params: strings(&["page", "p", "pg", "pagenum", "paged", "pn", "pageno", "currentpage"]),
            offset_params: strings(&["start", "offset", "skip", "from"]),
            limit_params: strings(&["limit", "per_page", "perpage", "pagesize", "page_size", "rows", "count", "size"]),
            next_selectors: strings(&[
                r#"a[rel="next"]"#,
                "a.next",
                "button.next",
                r#"[aria-label="Next"]"#,
                r#"[aria-label="Next page"]"#,
            ]),
            next_labels: strings(&["next", "next page", "next ›", "next »", "›", "»", ">"]),
            prev_selectors: strings(&[r#"a[rel="prev"]"#, "a.prev", "button.prev", r#"[aria-label="Previous"]"#]),
            prev_labels: strings(&["prev", "previous", "previous page", "‹", "«", "<"]),
            page_link_selector: "a[href]".to_string(),
            control_selector: "a, button".to_string(),
            click_wait_ms: 3_000,
            default_items_per_page: 20,
            cache_max_age_hours: 24 * 30,
        }
    }
}

impl DetectorConfig {
    fn is_page_param(&self, name: &str) -> bool {
        self.page_params.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    fn is_offset_param(&self, name: &str) -> bool {
        self.offset_params.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    fn is_limit_param(&self, name: &str) -> bool {
        self.limit_params.iter().any(|p| p.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Classifies how a directory paginates
#[derive(Debug, Clone, Default)]
pub struct PatternDetector {
    config: DetectorConfig,
}

impl PatternDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Find a pattern for the page at `current_url`, highest-priority source first.
    ///
    /// `controls` are the page's controls as read by `inspect_controls`.
    /// `None` means no pagination could be established; callers fall back to
    /// infinite-scroll handling.
    pub async fn detect(
        &self,
        probe: &mut PageProbe,
        current_url: &Url,
        controls: &VisualControls,
        manual: Option<&PaginationPattern>,
        cached: Option<&CachedPattern>,
    ) -> Option<Detection> {
        if let Some(pattern) = manual {
            info!("Using configured pattern {pattern}");
            return Some(Detection::new(pattern.clone(), DetectionSource::Manual));
        }

        if let Some(entry) = cached {
            if entry.is_fresh(self.config.cache_max_age_hours) {
                info!("Using cached pattern {}", entry.pattern);
                return Some(Detection::new(entry.pattern.clone(), DetectionSource::Cached));
            }
            debug!("Cached pattern from {} is stale", entry.discovered_at);
        }

        if let Some(pattern) = self.from_numbered_links(probe, current_url, controls).await {
            info!("Detected {pattern} from page links");
            return Some(Detection::new(pattern, DetectionSource::Dom));
        }

        if controls.has_next {
            if let Some(pattern) = self.click_and_diff(probe, current_url).await {
                info!("Detected {pattern} by following the next control");
                return Some(Detection::new(pattern, DetectionSource::ClickDiff));
            }
        }

        if let Some(pattern) = self.classify_url(current_url) {
            info!("Detected {pattern} from the URL");
            return Some(Detection::new(pattern, DetectionSource::Url));
        }

        debug!("No pagination pattern found for {current_url}");
        None
    }

    /// Read the pagination controls on the current page
    pub async fn inspect_controls(&self, probe: &mut PageProbe) -> VisualControls {
        let mut numbered = BTreeSet::new();
        let mut declared_max = None;

        for link in self.elements(probe, &self.config.page_link_selector).await {
            if let Some(n) = page_number_label(&link) {
                numbered.insert(n);
                declared_max = declared_max.max(Some(n));
            }
            // "Last" links often only carry the number in the href
            if let Some(n) = link.href.as_deref().and_then(page_number_in_href) {
                declared_max = declared_max.max(Some(n));
            }
        }

        let has_next = self
            .find_control(probe, &self.config.next_selectors, &self.config.next_labels, "next")
            .await
            .is_some();
        let has_prev = self
            .find_control(probe, &self.config.prev_selectors, &self.config.prev_labels, "prev")
            .await
            .is_some();

        let controls = VisualControls {
            numbered_pages: numbered.into_iter().collect(),
            has_next,
            has_prev,
            declared_max,
        };
        debug!("Pagination controls: {controls:?}");
        controls
    }

    /// Classify a URL that already points at a numbered page
    pub fn classify_url(&self, url: &Url) -> Option<PaginationPattern> {
        for (name, value) in url.query_pairs() {
            if self.config.is_page_param(&name) && value.parse::<u32>().is_ok() {
                return Some(PaginationPattern::parameter(name.into_owned(), url.clone()));
            }
        }

        for (name, value) in url.query_pairs() {
            if self.config.is_offset_param(&name) && value.parse::<u32>().is_ok() {
                let items = url
                    .query_pairs()
                    .find(|(k, _)| self.config.is_limit_param(k))
                    .and_then(|(_, v)| v.parse::<u32>().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(self.config.default_items_per_page);
                return Some(PaginationPattern::offset(name.into_owned(), url.clone(), items));
            }
        }

        let path = url.path();
        let caps = PATH_PAGE.captures(path)?;
        let digits = caps.get(1)?;
        let template = format!(
            "{}{PAGE_PLACEHOLDER}{}",
            &path[..digits.start()],
            &path[digits.end()..]
        );
        Some(PaginationPattern::path_segment(template, url.clone()))
    }

    /// Classify the move from `old` to `new` made by a "next" control
    pub fn classify_transition(&self, old: &Url, new: &Url) -> Option<PaginationPattern> {
        if old == new || old.host_str() != new.host_str() {
            return None;
        }

        for (name, value) in new.query_pairs() {
            let Ok(to) = value.parse::<u32>() else {
                continue;
            };

            if self.config.is_page_param(&name) {
                let from = query_number(old, &name).unwrap_or(1);
                let Some(next) = from.checked_add(1) else {
                    continue;
                };
                if to == next {
                    return Some(PaginationPattern::parameter(name.into_owned(), new.clone()));
                }
                if to > next {
                    warn!("Next control jumped {name} from {from} to {to}; not classifying");
                    return None;
                }
            } else if self.config.is_offset_param(&name) {
                let from = query_number(old, &name).unwrap_or(0);
                if to > from {
                    return Some(PaginationPattern::offset(name.into_owned(), new.clone(), to - from));
                }
            }
        }

        path_transition(old, new).map(|template| PaginationPattern::path_segment(template, new.clone()))
    }

    /// Derive a pattern from the link to the lowest numbered page above 1
    async fn from_numbered_links(
        &self,
        probe: &mut PageProbe,
        current_url: &Url,
        controls: &VisualControls,
    ) -> Option<PaginationPattern> {
        let target = controls.numbered_pages.iter().copied().find(|n| *n > 1)?;

        for link in self.elements(probe, &self.config.page_link_selector).await {
            if page_number_label(&link) != Some(target) {
                continue;
            }
            let Some(href) = link.href.as_deref().and_then(|h| current_url.join(h).ok()) else {
                continue;
            };
            if let Some(pattern) = self.classify_link(&href, target) {
                return Some(pattern);
            }
        }
        None
    }

    /// Classify a link known to point at page `page`
    fn classify_link(&self, url: &Url, page: u32) -> Option<PaginationPattern> {
        if let Some(pattern) = self.classify_url(url) {
            // The number in the URL must be the page the link claims
            if pattern.page_url(page).as_ref() == Some(url) {
                return Some(pattern);
            }
        }

        // Offset links without a page size: infer the step from the number
        for (name, value) in url.query_pairs() {
            if !self.config.is_offset_param(&name) || page < 2 {
                continue;
            }
            let Ok(offset) = value.parse::<u32>() else {
                continue;
            };
            if offset > 0 && offset % (page - 1) == 0 {
                let step = offset / (page - 1);
                return Some(PaginationPattern::offset(name.into_owned(), url.clone(), step));
            }
        }
        None
    }

    /// Click "next", wait for the URL to change, diff, then go back
    async fn click_and_diff(&self, probe: &mut PageProbe, current_url: &Url) -> Option<PaginationPattern> {
        let control = self
            .find_control(probe, &self.config.next_selectors, &self.config.next_labels, "next")
            .await?;
        debug!("Clicking next control '{}'", control.label());

        if let Err(e) = probe.click(&control).await {
            debug!("Next control click failed: {e}");
            return None;
        }

        let moved = self.wait_for_url_change(probe, current_url).await;

        // Leave the tab where we found it
        if let Err(e) = probe.navigate(current_url.as_str()).await {
            warn!("Could not return to {current_url}: {e}");
        } else {
            probe.settle().await;
        }

        match moved {
            Some(new_url) => self.classify_transition(current_url, &new_url),
            None => {
                debug!("Next control did not change the URL; pagination is script-driven");
                None
            }
        }
    }

    async fn wait_for_url_change(&self, probe: &mut PageProbe, old: &Url) -> Option<Url> {
        let deadline = Instant::now() + Duration::from_millis(self.config.click_wait_ms);
        loop {
            if let Ok(current) = probe.current_url().await {
                if let Ok(url) = Url::parse(&current) {
                    if &url != old {
                        return Some(url);
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let wait = (deadline - now).min(Duration::from_millis(CLICK_POLL_MS));
            probe.pause(wait).await;
        }
    }

    /// First control matching a selector, then first control with a matching label
    async fn find_control(
        &self,
        probe: &mut PageProbe,
        selectors: &[String],
        labels: &[String],
        what: &str,
    ) -> Option<ElementHandle> {
        for selector in selectors {
            if let Some(handle) = self.elements(probe, selector).await.into_iter().next() {
                return Some(handle);
            }
        }

        self.elements(probe, &self.config.control_selector)
            .await
            .into_iter()
            .find(|el| {
                let label = el.label().to_lowercase();
                el.rel.as_deref().is_some_and(|rel| rel.eq_ignore_ascii_case(what))
                    || labels.iter().any(|l| l.to_lowercase() == label)
            })
    }

    async fn elements(&self, probe: &mut PageProbe, selector: &str) -> Vec<ElementHandle> {
        probe.find_elements(selector).await.unwrap_or_else(|e| {
            debug!("Lookup of '{selector}' failed: {e}");
            Vec::new()
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Page number shown as a link's text
fn page_number_label(link: &ElementHandle) -> Option<u32> {
    link.href.as_ref()?;
    link.label().parse::<u32>().ok().filter(|n| (1..=10_000).contains(n))
}

/// Page number carried in an href
fn page_number_in_href(href: &str) -> Option<u32> {
    HREF_PAGE
        .captures(href)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn query_number(url: &Url, name: &str) -> Option<u32> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .and_then(|(_, v)| v.parse().ok())
}

/// Path template when `new` differs from `old` by a page-number step
fn path_transition(old: &Url, new: &Url) -> Option<String> {
    let before: Vec<&str> = old.path().split('/').collect();
    let after: Vec<&str> = new.path().split('/').collect();

    if before.len() == after.len() {
        let changed: Vec<usize> = (0..after.len()).filter(|&i| before[i] != after[i]).collect();
        let [i] = changed.as_slice() else {
            return None;
        };
        let from = before[*i].parse::<u32>().ok()?;
        let to = after[*i].parse::<u32>().ok()?;
        let next = from.checked_add(1)?;
        if to != next {
            if to > next {
                warn!("Next control jumped path segment from {from} to {to}; not classifying");
            }
            return None;
        }
        return Some(with_placeholder(&after, *i));
    }

    // `/people` -> `/people/page/2` or `/people/2`
    let base: Vec<&str> = before.iter().copied().filter(|s| !s.is_empty()).collect();
    let grown: Vec<&str> = after.iter().copied().filter(|s| !s.is_empty()).collect();
    if grown.len() > base.len() && grown.len() <= base.len() + 2 && grown.starts_with(&base) {
        let last = grown.len() - 1;
        if grown[last] == "2" {
            let segments: Vec<&str> = std::iter::once("").chain(grown.iter().copied()).collect();
            return Some(with_placeholder(&segments, last + 1));
        }
    }
    None
}

fn with_placeholder(segments: &[&str], index: usize) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(i, s)| if i == index { PAGE_PLACEHOLDER } else { s })
        .collect::<Vec<_>>()
        .join("/")
}
