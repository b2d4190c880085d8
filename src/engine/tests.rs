//! Tests for engine module

use super::*;
use crate::cache::{CachedPattern, InMemoryPatternStore, PatternCache, PatternStore};
use crate::error::Error;
use crate::pacing::RetryPolicy;
use crate::pagination::{BoundaryOptions, DetectionSource, DetectorConfig, PaginationPattern};
use crate::probe::{HeightModel, PageProbe, ProbeConfig, ScriptedDriver, ScriptedElement, ScriptedPage};
use crate::scroll::{ScrollOptions, StopReason};
use crate::types::{BackoffType, PaginationType, Reliability};
use std::sync::Arc;
use test_case::test_case;
use url::Url;

const LISTING: &str = "https://firm.test/people?page=1";
const TEAM: &str = "https://firm.test/team";

fn probe(driver: ScriptedDriver) -> PageProbe {
    PageProbe::with_config(driver, ProbeConfig::immediate())
}

fn orchestrator() -> PaginationOrchestrator {
    PaginationOrchestrator::new()
        .with_scroll_options(ScrollOptions::default().with_delay_ms(0))
        .with_detector_config(DetectorConfig {
            click_wait_ms: 0,
            ..DetectorConfig::default()
        })
        .with_boundary_options(BoundaryOptions::default().with_max_pages(50))
        .with_options(DiscoveryOptions {
            retry: RetryPolicy {
                max_attempts: 2,
                backoff: BackoffType::Constant,
                initial_backoff_ms: 1,
                max_backoff_ms: 1,
            },
            ..DiscoveryOptions::default()
        })
}

fn directory_page(prefix: &str) -> ScriptedPage {
    ScriptedPage::new("Our People").with_contacts(prefix, 10)
}

/// `?page=N` listing with `last` populated pages and numbered links on page 1
fn listing(last: u32) -> ScriptedDriver {
    let mut driver = ScriptedDriver::new().with_fallback(ScriptedPage::empty());
    for n in 1..=last {
        let mut page = directory_page(&format!("p{n}-"));
        if n == 1 {
            page = page
                .with_element(ScriptedElement::link("/people?page=2", "2"))
                .with_element(ScriptedElement::link("/people?page=3", "3"))
                .with_element(ScriptedElement::link("/people?page=2", "Next").attr("rel", "next"));
        }
        driver = driver.with_page(&format!("https://firm.test/people?page={n}"), page);
    }
    driver
}

fn listing_pattern() -> PaginationPattern {
    PaginationPattern::parameter("page", Url::parse(LISTING).unwrap())
}

// ============================================================================
// Spot Check Selection
// ============================================================================

#[test_case(17, 3 => vec![1, 9, 17]; "evenly spread")]
#[test_case(2, 3 => vec![1, 2]; "fewer pages than checks")]
#[test_case(10, 1 => vec![1]; "single check")]
#[test_case(0, 3 => Vec::<u32>::new(); "no pages")]
#[test_case(5, 0 => Vec::<u32>::new(); "checks disabled")]
#[test_case(4, 3 => vec![1, 2, 4]; "rounding down")]
fn test_spot_check_pages(max_page: u32, count: u32) -> Vec<u32> {
    spot_check_pages(max_page, count)
}

// ============================================================================
// Result Tests
// ============================================================================

#[test]
fn test_failed_result() {
    let result = DiscoveryResult::failed(TEAM, "Initial page load failed");
    assert!(result.is_error());
    assert_eq!(result.confidence, 0);
    assert_eq!(result.reliability, Reliability::Low);
    assert!(result.page_urls.is_empty());
    assert_eq!(result.phases, vec![DiscoveryPhase::Start, DiscoveryPhase::Done]);
    assert_eq!(result.phase(), DiscoveryPhase::Done);
}

#[test]
fn test_result_serializes_snake_case() {
    let mut result = DiscoveryResult::new(TEAM);
    result.pagination_type = PaginationType::InfiniteScroll;
    result.enter(DiscoveryPhase::InfiniteScrollLoad);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["pagination_type"], "infinite_scroll");
    assert_eq!(json["phases"][1], "infinite_scroll_load");
    assert!(json.get("pattern").is_none());
}

// ============================================================================
// Discovery Tests
// ============================================================================

#[tokio::test]
async fn test_single_page_directory() {
    let driver = ScriptedDriver::new().with_page(TEAM, directory_page("t"));
    let mut probe = probe(driver);

    let result = orchestrator().discover(&mut probe, TEAM).await.unwrap();

    assert_eq!(result.pagination_type, PaginationType::None);
    assert_eq!(result.page_urls, vec![TEAM.to_string()]);
    assert_eq!(result.confidence, 100);
    assert_eq!(result.reliability, Reliability::High);
    assert!(result.fully_loaded);
    assert!(result.warnings.is_empty());
    assert_eq!(
        result.phases,
        vec![
            DiscoveryPhase::Start,
            DiscoveryPhase::DetectingScrollVsPaginated,
            DiscoveryPhase::Scored,
            DiscoveryPhase::Done,
        ]
    );
}

#[tokio::test]
async fn test_infinite_scroll_directory() {
    let page = directory_page("t").with_height(HeightModel::Growing {
        initial: 1000,
        step: 500,
        grows: 10,
    });
    let mut probe = probe(ScriptedDriver::new().with_page(TEAM, page));

    let result = orchestrator().discover(&mut probe, TEAM).await.unwrap();

    assert_eq!(result.pagination_type, PaginationType::InfiniteScroll);
    assert_eq!(result.page_urls, vec![TEAM.to_string()]);
    let scroll = result.scroll.as_ref().unwrap();
    assert_eq!(scroll.stop_reason, StopReason::MaxRetries);
    assert_eq!(scroll.scroll_count, 15);
    assert_eq!(scroll.last_height, 6000);
    assert_eq!(scroll.total_growth, 5000);
    assert!(result.fully_loaded);
    assert_eq!(result.confidence, 100);
    assert!(result.phases.contains(&DiscoveryPhase::InfiniteScrollLoad));
}

#[tokio::test]
async fn test_infinite_scroll_cap_warns() {
    let page = directory_page("t").with_height(HeightModel::Growing {
        initial: 1000,
        step: 500,
        grows: 1000,
    });
    let mut probe = probe(ScriptedDriver::new().with_page(TEAM, page));

    let result = orchestrator()
        .with_scroll_options(ScrollOptions::default().with_delay_ms(0).with_max_scrolls(10))
        .discover(&mut probe, TEAM)
        .await
        .unwrap();

    let scroll = result.scroll.as_ref().unwrap();
    assert_eq!(scroll.stop_reason, StopReason::MaxScrolls);
    // The trial scroll is inside the cap
    assert_eq!(scroll.scroll_count, 10);
    assert_eq!(scroll.last_height, 1000 + 10 * 500);
    assert!(!result.fully_loaded);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("Scroll cap"));
}

#[tokio::test]
async fn test_paginated_directory() {
    let mut probe = probe(listing(17));

    let result = orchestrator().discover(&mut probe, LISTING).await.unwrap();

    assert_eq!(result.pagination_type, PaginationType::Parameter);
    assert_eq!(result.detection_source, Some(DetectionSource::Dom));
    assert_eq!(result.page_count(), 17);
    assert_eq!(result.page_urls[0], LISTING);
    assert_eq!(result.page_urls[16], "https://firm.test/people?page=17");

    let boundary = result.boundary.as_ref().unwrap();
    assert_eq!(boundary.confirmed_max_page, 17);
    assert!(boundary.boundary_confirmed);
    assert!(!result.hard_capped);
    assert!(result.fully_loaded);

    let checked: Vec<u32> = result.spot_checks.iter().map(|c| c.page).collect();
    assert_eq!(checked, vec![1, 9, 17]);
    assert!(result.spot_checks.iter().all(|c| c.valid));

    // Everything but provenance and link/boundary agreement
    assert_eq!(result.confidence, 90);
    assert_eq!(result.reliability, Reliability::High);
    assert_eq!(
        result.phases,
        vec![
            DiscoveryPhase::Start,
            DiscoveryPhase::DetectingScrollVsPaginated,
            DiscoveryPhase::PaginatedDiscovery,
            DiscoveryPhase::Scored,
            DiscoveryPhase::Done,
        ]
    );
}

#[tokio::test]
async fn test_listing_that_loops_back_to_page_one() {
    // Every page past 17 silently serves page 1's listing
    let mut probe = probe(listing(17).with_fallback(directory_page("p1-")));

    let result = orchestrator().discover(&mut probe, LISTING).await.unwrap();

    let boundary = result.boundary.as_ref().unwrap();
    assert_eq!(boundary.confirmed_max_page, 17);
    assert!(boundary.boundary_confirmed);
    assert!(!boundary.duplicates.is_empty());
    assert_eq!(result.page_count(), 17);
    assert!(result.warnings.iter().any(|w| w.contains("repeated earlier content")));
    assert_eq!(result.confidence, 80);
}

#[tokio::test]
async fn test_discovery_runs_on_a_spawned_task() {
    let mut probe = probe(listing(3));
    let orchestrator = orchestrator();

    let result = tokio::spawn(async move { orchestrator.discover(&mut probe, LISTING).await })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.page_count(), 3);
    assert_eq!(result.boundary.unwrap().confirmed_max_page, 3);
}

#[tokio::test]
async fn test_hard_cap_warns() {
    let mut probe = probe(listing(40));

    let result = orchestrator()
        .with_boundary_options(BoundaryOptions::default().with_max_pages(10))
        .discover(&mut probe, LISTING)
        .await
        .unwrap();

    assert!(result.hard_capped);
    assert!(!result.fully_loaded);
    assert_eq!(result.page_count(), 10);
    assert!(result.warnings.iter().any(|w| w.contains("10-page cap")));
}

#[tokio::test]
async fn test_detected_pattern_without_content_degrades() {
    let start = ScriptedPage::new("Loading")
        .with_element(ScriptedElement::link("/people?page=2", "2"))
        .with_element(ScriptedElement::link("/people?page=3", "3"));
    let driver = ScriptedDriver::new()
        .with_page(LISTING, start)
        .with_fallback(ScriptedPage::empty());
    let mut probe = probe(driver);

    let result = orchestrator().discover(&mut probe, LISTING).await.unwrap();

    assert_eq!(result.pagination_type, PaginationType::None);
    assert_eq!(result.page_urls, vec![LISTING.to_string()]);
    assert!(result.pattern.is_none());
    assert!(result.boundary.is_some());
    assert!(result.warnings[0].contains("no page had content"));
    assert_eq!(result.reliability, Reliability::Low);
}

// ============================================================================
// Start Page Failures
// ============================================================================

#[tokio::test]
async fn test_start_page_retried() {
    let driver = ScriptedDriver::new()
        .with_page(TEAM, directory_page("t"))
        .failing_navigations(1);
    let mut probe = probe(driver);

    let result = orchestrator().discover(&mut probe, TEAM).await.unwrap();
    assert_eq!(result.pagination_type, PaginationType::None);
}

#[tokio::test]
async fn test_start_page_failure_is_an_error() {
    let driver = ScriptedDriver::new()
        .with_page(TEAM, directory_page("t"))
        .failing_navigations(5);
    let mut probe = probe(driver);

    let err = orchestrator().discover(&mut probe, TEAM).await.unwrap_err();
    assert!(matches!(err, Error::InitialLoad { .. }), "{err}");
}

#[tokio::test]
async fn test_discover_or_report_turns_failure_into_result() {
    let mut probe = probe(ScriptedDriver::new().failing_navigations(5));

    let result = orchestrator().discover_or_report(&mut probe, TEAM).await;
    assert_eq!(result.pagination_type, PaginationType::Error);
    assert!(result.page_urls.is_empty());
    assert_eq!(result.confidence, 0);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("Initial page load failed"));
}

#[tokio::test]
async fn test_invalid_start_url_is_reported() {
    let mut probe = probe(ScriptedDriver::new());

    let result = orchestrator().discover_or_report(&mut probe, "not a url").await;
    assert!(result.is_error());
    assert!(result.warnings[0].contains("Invalid URL"));
}

// ============================================================================
// Pattern Sources and Caching
// ============================================================================

#[tokio::test]
async fn test_detected_pattern_is_cached() {
    let store = Arc::new(InMemoryPatternStore::new());
    let mut probe = probe(listing(5));

    let result = orchestrator()
        .with_store(store.clone())
        .discover(&mut probe, LISTING)
        .await
        .unwrap();

    let write = result.cache_write.as_ref().unwrap();
    assert_eq!(write.domain, "firm.test");
    assert_eq!(write.confidence, result.confidence);

    let entry = store.get("firm.test").await.unwrap().unwrap();
    assert_eq!(Some(&entry.pattern), result.pattern.as_ref());
}

#[tokio::test]
async fn test_low_confidence_is_not_cached() {
    let store = Arc::new(InMemoryPatternStore::new());
    let mut probe = probe(listing(5));

    let result = orchestrator()
        .with_options(DiscoveryOptions {
            cache_threshold: 100,
            ..DiscoveryOptions::default()
        })
        .with_store(store.clone())
        .discover(&mut probe, LISTING)
        .await
        .unwrap();

    assert!(result.confidence < 100);
    assert!(result.cache_write.is_none());
    assert!(store.entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_pattern_wins_and_is_not_cached() {
    let store = Arc::new(InMemoryPatternStore::new());
    // No links on the start page: detection alone would find nothing
    let driver = ScriptedDriver::new()
        .with_page(LISTING, directory_page("p1-"))
        .with_page("https://firm.test/people?page=2", directory_page("p2-"))
        .with_fallback(ScriptedPage::empty());
    let mut probe = probe(driver);

    let result = orchestrator()
        .with_site("WWW.Firm.test", listing_pattern())
        .with_store(store.clone())
        .discover(&mut probe, LISTING)
        .await
        .unwrap();

    assert_eq!(result.detection_source, Some(DetectionSource::Manual));
    assert_eq!(result.page_count(), 2);
    assert!(result.signals.contains(&"provided".to_string()));
    assert!(result.cache_write.is_none());
    assert!(store.entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cached_pattern_is_used() {
    let mut cache = PatternCache::new();
    cache.insert("firm.test", CachedPattern::new(listing_pattern(), 90));
    let store: Arc<dyn PatternStore> = Arc::new(InMemoryPatternStore::with_cache(cache));

    let driver = ScriptedDriver::new()
        .with_page(LISTING, directory_page("p1-"))
        .with_page("https://firm.test/people?page=2", directory_page("p2-"))
        .with_page("https://firm.test/people?page=3", directory_page("p3-"))
        .with_fallback(ScriptedPage::empty());
    let mut probe = probe(driver);

    let result = orchestrator()
        .with_store(store)
        .discover(&mut probe, LISTING)
        .await
        .unwrap();

    assert_eq!(result.detection_source, Some(DetectionSource::Cached));
    assert_eq!(result.page_count(), 3);
    assert!(result.cache_write.is_none());
}

#[test]
fn test_from_config_registers_sites() {
    let config = crate::config::EngineConfig::from_yaml_str(
        r#"
discovery:
  spot_checks: 5
sites:
  - domain: www.firm.test
    pagination:
      type: parameter
      name: page
      base_url: "https://firm.test/people?page=1"
"#,
    )
    .unwrap();

    let orchestrator = PaginationOrchestrator::from_config(&config);
    assert_eq!(orchestrator.options().spot_checks, 5);
}
