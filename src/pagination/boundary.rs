//! Last-page search
//!
//! Doubles from a starting page until an empty page bounds the listing, then
//! binary-searches between the last populated page and the first empty one.
//! The candidate is only trusted when the two pages after it are both empty.

use super::types::{BoundaryOptions, BoundarySearchState, PaginationPattern, TestedPage};
use crate::probe::PageProbe;
use crate::validate::{PageValidator, PageVerdict};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, warn};

// ============================================================================
// Page Source
// ============================================================================

/// Something that can load page `n` of a listing and judge it
#[async_trait]
pub trait PageSource: Send {
    /// Load and validate a page. Failures come back as unreadable verdicts.
    async fn check_page(&mut self, page: u32) -> PageVerdict;
}

#[async_trait]
impl<F> PageSource for F
where
    F: FnMut(u32) -> PageVerdict + Send,
{
    async fn check_page(&mut self, page: u32) -> PageVerdict {
        self(page)
    }
}

/// Loads pages through a probe using a pagination pattern
pub struct ProbePageSource<'a> {
    probe: &'a mut PageProbe,
    pattern: &'a PaginationPattern,
    validator: &'a PageValidator,
}

impl<'a> ProbePageSource<'a> {
    pub fn new(
        probe: &'a mut PageProbe,
        pattern: &'a PaginationPattern,
        validator: &'a PageValidator,
    ) -> Self {
        Self {
            probe,
            pattern,
            validator,
        }
    }
}

#[async_trait]
impl PageSource for ProbePageSource<'_> {
    async fn check_page(&mut self, page: u32) -> PageVerdict {
        let Some(url) = self.pattern.page_url(page) else {
            return PageVerdict::unreadable();
        };

        if let Err(e) = self.probe.navigate(url.as_str()).await {
            debug!("Page {page} failed to load: {e}");
            return PageVerdict::unreadable();
        }
        self.probe.settle().await;
        self.validator.validate(self.probe).await
    }
}

// ============================================================================
// Boundary Searcher
// ============================================================================

/// Finds the last populated page of a listing
#[derive(Debug, Clone, Default)]
pub struct BoundarySearcher {
    options: BoundaryOptions,
}

impl BoundarySearcher {
    pub fn new(options: BoundaryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BoundaryOptions {
        &self.options
    }

    /// Search for the last populated page, expanding from `hint` when given.
    ///
    /// Page 1 is always tested first. Never fails; unreadable pages count as
    /// empty.
    pub async fn find_true_max_page<S>(&self, source: &mut S, hint: Option<u32>) -> BoundarySearchState
    where
        S: PageSource + ?Sized,
    {
        let max_pages = self.options.max_pages.max(1);
        let start = hint.unwrap_or(1).clamp(1, max_pages);
        info!("Searching for last page (start={start}, max_pages={max_pages})");

        let mut search = Search {
            source,
            min_contacts: self.options.min_contacts_per_page,
            state: BoundarySearchState::default(),
            fingerprints: HashMap::new(),
        };

        let mut low = 0u32;
        let mut next = start;

        // Page 1 anchors loop-back detection, so it is read even when a hint
        // starts the search further in
        if start > 1 && search.is_valid(1).await {
            low = 1;
        }

        loop {
            // Expand until an empty page bounds the search
            let mut high = None;
            while high.is_none() {
                if search.is_valid(next).await {
                    low = next;
                    if next >= max_pages {
                        break;
                    }
                    next = next.saturating_mul(2).min(max_pages);
                } else {
                    high = Some(next);
                }
            }

            let Some(mut high) = high else {
                warn!("Page {low} is still populated at the page cap");
                search.state.hard_capped = true;
                break;
            };

            while high - low > 1 {
                let mid = low + (high - low) / 2;
                if search.is_valid(mid).await {
                    low = mid;
                } else {
                    high = mid;
                }
            }
            search.state.high = Some(high);

            // `low + 1` is empty; the boundary needs `low + 2` empty too
            let second = low + 2;
            if second > max_pages {
                warn!("Cannot confirm page {low} as last page within {max_pages} pages");
                search.state.hard_capped = true;
                break;
            }

            if search.is_valid(second).await {
                info!("Page {second} has content after an empty page {}, resuming", low + 1);
                low = second;
                search.state.high = None;
                if second >= max_pages {
                    search.state.hard_capped = true;
                    break;
                }
                next = second.saturating_mul(2).min(max_pages);
                continue;
            }

            search.state.boundary_confirmed = true;
            break;
        }

        let mut state = search.state;
        state.low = low;
        state.confirmed_max_page = low;
        info!(
            "Last page {} (confirmed={}, hard_capped={}, tested {} pages in {} loads)",
            state.confirmed_max_page,
            state.boundary_confirmed,
            state.hard_capped,
            state.tested_pages.len(),
            state.total_loads()
        );
        state
    }
}

/// Mutable search context
struct Search<'s, S: PageSource + ?Sized> {
    source: &'s mut S,
    min_contacts: u32,
    state: BoundarySearchState,
    // fingerprint -> page it was first seen on
    fingerprints: HashMap<String, u32>,
}

impl<S: PageSource + ?Sized> Search<'_, S> {
    /// Test a page once, re-testing an empty result one time
    async fn is_valid(&mut self, page: u32) -> bool {
        if let Some(tested) = self.state.tested(page) {
            return tested.valid;
        }

        let mut verdict = self.source.check_page(page).await;
        let mut attempts = 1;
        if !verdict.is_valid(self.min_contacts) {
            debug!("Page {page} looked empty, re-testing");
            verdict = self.source.check_page(page).await;
            attempts += 1;
        }

        let mut valid = verdict.is_valid(self.min_contacts);
        let mut duplicate_of = None;
        if valid && !verdict.content_fingerprint.is_empty() {
            match self.fingerprints.get(&verdict.content_fingerprint) {
                Some(&seen) if seen < page => {
                    warn!("Page {page} repeats the content of page {seen}, treating it as empty");
                    duplicate_of = Some(seen);
                    valid = false;
                    self.state.duplicates.push(page);
                }
                _ => {
                    self.fingerprints
                        .insert(verdict.content_fingerprint.clone(), page);
                }
            }
        }

        debug!(
            "Page {page}: valid={valid}, contacts={}, attempts={attempts}",
            verdict.contact_estimate
        );
        self.state.tested_pages.push(TestedPage {
            page,
            valid,
            contact_estimate: verdict.contact_estimate,
            attempts,
            duplicate_of,
        });
        valid
    }
}
