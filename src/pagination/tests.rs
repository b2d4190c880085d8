//! Tests for pagination module

use super::*;
use crate::cache::CachedPattern;
use crate::probe::{PageProbe, ProbeConfig, ScriptedDriver, ScriptedElement, ScriptedPage};
use crate::types::PaginationType;
use crate::validate::PageVerdict;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use test_case::test_case;
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn probe(driver: ScriptedDriver) -> PageProbe {
    PageProbe::with_config(driver, ProbeConfig::immediate())
}

// ============================================================================
// PaginationPattern Tests
// ============================================================================

#[test]
fn test_parameter_page_url_round_trip() {
    let detector = PatternDetector::default();
    let start = url("https://firm.test/people?page=3");

    let pattern = detector.classify_url(&start).unwrap();
    assert_eq!(
        pattern,
        PaginationPattern::parameter("page", start.clone())
    );
    assert_eq!(pattern.kind(), PaginationType::Parameter);

    let page3 = pattern.page_url(3).unwrap();
    let value = page3
        .query_pairs()
        .find(|(k, _)| k == "page")
        .map(|(_, v)| v.into_owned());
    assert_eq!(value.as_deref(), Some("3"));
    assert_eq!(page3, start);
}

#[test]
fn test_parameter_page_url_keeps_other_params() {
    let pattern = PaginationPattern::parameter("page", url("https://firm.test/people?office=nyc&page=1&sort=name"));
    assert_eq!(
        pattern.page_url(7).unwrap().as_str(),
        "https://firm.test/people?office=nyc&page=7&sort=name"
    );

    let appended = PaginationPattern::parameter("p", url("https://firm.test/people?office=nyc"));
    assert_eq!(
        appended.page_url(2).unwrap().as_str(),
        "https://firm.test/people?office=nyc&p=2"
    );
}

#[test]
fn test_offset_page_url() {
    let pattern = PaginationPattern::offset("start", url("https://firm.test/people?start=40"), 20);
    assert_eq!(pattern.page_url(1).unwrap().as_str(), "https://firm.test/people?start=0");
    assert_eq!(pattern.page_url(4).unwrap().as_str(), "https://firm.test/people?start=60");
    assert_eq!(pattern.kind(), PaginationType::Offset);
}

#[test]
fn test_path_segment_page_url() {
    let pattern = PaginationPattern::path_segment(
        "/people/page/{page}",
        url("https://firm.test/people/page/2?lang=en"),
    );
    assert_eq!(
        pattern.page_url(5).unwrap().as_str(),
        "https://firm.test/people/page/5?lang=en"
    );
    assert_eq!(pattern.kind(), PaginationType::Path);
}

#[test]
fn test_page_zero_and_none_pattern() {
    let pattern = PaginationPattern::parameter("page", url("https://firm.test/?page=1"));
    assert!(pattern.page_url(0).is_none());
    assert!(PaginationPattern::None.page_url(1).is_none());
    assert!(PaginationPattern::None.page_urls(3).is_empty());
    assert_eq!(pattern.page_urls(3).len(), 3);
}

#[test]
fn test_pattern_serde_tagged() {
    let pattern = PaginationPattern::offset("skip", url("https://firm.test/list"), 25);
    let json = serde_json::to_value(&pattern).unwrap();
    assert_eq!(json["type"], "offset");
    assert_eq!(json["items_per_page"], 25);
    assert_eq!(json["base_url"], "https://firm.test/list");

    let back: PaginationPattern = serde_json::from_value(json).unwrap();
    assert_eq!(back, pattern);
}

// ============================================================================
// URL Classification Tests
// ============================================================================

#[test_case("https://firm.test/people?page=3", Some(PaginationType::Parameter) ; "page param")]
#[test_case("https://firm.test/people?PG=2", Some(PaginationType::Parameter) ; "case insensitive")]
#[test_case("https://firm.test/people?start=40&limit=20", Some(PaginationType::Offset) ; "offset param")]
#[test_case("https://firm.test/people/page/4", Some(PaginationType::Path) ; "path segment")]
#[test_case("https://firm.test/people?page=all", None ; "non numeric")]
#[test_case("https://firm.test/people", None ; "plain")]
fn test_classify_url(input: &str, expected: Option<PaginationType>) {
    let detector = PatternDetector::default();
    assert_eq!(detector.classify_url(&url(input)).map(|p| p.kind()), expected);
}

#[test]
fn test_classify_url_offset_uses_limit() {
    let detector = PatternDetector::default();
    let pattern = detector
        .classify_url(&url("https://firm.test/people?start=40&limit=10"))
        .unwrap();
    assert!(matches!(pattern, PaginationPattern::Offset { items_per_page: 10, .. }));

    let pattern = detector
        .classify_url(&url("https://firm.test/people?offset=40"))
        .unwrap();
    assert!(matches!(pattern, PaginationPattern::Offset { items_per_page: 20, .. }));
}

#[test]
fn test_classify_url_path_template() {
    let detector = PatternDetector::default();
    let pattern = detector
        .classify_url(&url("https://firm.test/en/people/page/4/"))
        .unwrap();
    let PaginationPattern::PathSegment { template, .. } = pattern else {
        panic!("Expected PathSegment");
    };
    assert_eq!(template, "/en/people/page/{page}/");
}

// ============================================================================
// Transition Classification Tests
// ============================================================================

#[test]
fn test_transition_parameter_increment() {
    let detector = PatternDetector::default();
    let pattern = detector
        .classify_transition(&url("https://firm.test/people"), &url("https://firm.test/people?page=2"))
        .unwrap();
    assert!(matches!(pattern, PaginationPattern::Parameter { ref name, .. } if name == "page"));

    let pattern = detector
        .classify_transition(
            &url("https://firm.test/people?page=4"),
            &url("https://firm.test/people?page=5"),
        )
        .unwrap();
    assert_eq!(pattern.page_url(5).unwrap().as_str(), "https://firm.test/people?page=5");
}

#[test]
fn test_transition_jump_is_not_classified() {
    let detector = PatternDetector::default();
    let pattern = detector.classify_transition(
        &url("https://firm.test/people?page=1"),
        &url("https://firm.test/people?page=3"),
    );
    assert_eq!(pattern, None);
}

#[test]
fn test_transition_offset_step() {
    let detector = PatternDetector::default();
    let pattern = detector
        .classify_transition(
            &url("https://firm.test/people?start=0"),
            &url("https://firm.test/people?start=25"),
        )
        .unwrap();
    assert!(matches!(pattern, PaginationPattern::Offset { items_per_page: 25, .. }));
}

#[test_case("https://firm.test/people/2", "https://firm.test/people/3", Some("/people/{page}") ; "numeric segment")]
#[test_case("https://firm.test/people", "https://firm.test/people/page/2", Some("/people/page/{page}") ; "new page segment")]
#[test_case("https://firm.test/people", "https://firm.test/people/2", Some("/people/{page}") ; "new number segment")]
#[test_case("https://firm.test/people/2", "https://firm.test/people/4", None ; "path jump")]
#[test_case("https://firm.test/people", "https://firm.test/about", None ; "unrelated path")]
#[test_case("https://firm.test/people", "https://other.test/people?page=2", None ; "other host")]
#[test_case("https://firm.test/people", "https://firm.test/people", None ; "unchanged")]
#[test_case("https://firm.test/people/4294967295", "https://firm.test/people/1", None ; "segment at u32 max")]
fn test_transition_paths(old: &str, new: &str, expected: Option<&str>) {
    let detector = PatternDetector::default();
    let template = detector
        .classify_transition(&url(old), &url(new))
        .map(|pattern| match pattern {
            PaginationPattern::PathSegment { template, .. } => template,
            other => panic!("Expected PathSegment, got {other:?}"),
        });
    assert_eq!(template.as_deref(), expected);
}

#[test]
fn test_transition_from_largest_page_number() {
    let detector = PatternDetector::default();
    let old = url("https://firm.test/people?page=4294967295");

    assert!(detector
        .classify_transition(&old, &url("https://firm.test/people?page=1"))
        .is_none());
    assert!(detector
        .classify_transition(&old, &url("https://firm.test/people?page=2&sort=name"))
        .is_none());
}

// ============================================================================
// Live Detection Tests
// ============================================================================

const PEOPLE: &str = "https://firm.test/people";

fn numbered_page() -> ScriptedPage {
    ScriptedPage::new("Our people")
        .with_element(ScriptedElement::link("/people?page=1", "1"))
        .with_element(ScriptedElement::link("/people?page=2", "2"))
        .with_element(ScriptedElement::link("/people?page=3", "3"))
        .with_element(ScriptedElement::link("/people?page=2", "Next").attr("rel", "next"))
        .with_element(ScriptedElement::link("/people?page=9", "Last"))
}

#[tokio::test]
async fn test_inspect_controls() {
    let mut probe = probe(ScriptedDriver::new().with_page(PEOPLE, numbered_page()));
    probe.navigate(PEOPLE).await.unwrap();

    let controls = PatternDetector::default().inspect_controls(&mut probe).await;
    assert_eq!(
        controls,
        VisualControls {
            numbered_pages: vec![1, 2, 3],
            has_next: true,
            has_prev: false,
            declared_max: Some(9),
        }
    );
    assert!(controls.present());
}

#[tokio::test]
async fn test_inspect_controls_on_bare_page() {
    let mut probe = probe(ScriptedDriver::new().with_page(PEOPLE, ScriptedPage::new("Hello")));
    probe.navigate(PEOPLE).await.unwrap();

    let controls = PatternDetector::default().inspect_controls(&mut probe).await;
    assert_eq!(controls, VisualControls::default());
    assert!(!controls.present());
}

#[tokio::test]
async fn test_detect_from_numbered_links() {
    let mut probe = probe(ScriptedDriver::new().with_page(PEOPLE, numbered_page()));
    probe.navigate(PEOPLE).await.unwrap();

    let detector = PatternDetector::default();
    let controls = detector.inspect_controls(&mut probe).await;
    let detection = detector
        .detect(&mut probe, &url(PEOPLE), &controls, None, None)
        .await
        .unwrap();
    assert_eq!(detection.source, DetectionSource::Dom);
    assert_eq!(
        detection.pattern.page_url(4).unwrap().as_str(),
        "https://firm.test/people?page=4"
    );
}

#[tokio::test]
async fn test_detect_by_click_and_diff_returns_to_start() {
    let page = ScriptedPage::new("Team")
        .with_element(ScriptedElement::button("Next").attr("class", "next").navigates_to("/people?pg=2"));
    let driver = ScriptedDriver::new()
        .with_page(PEOPLE, page)
        .with_fallback(ScriptedPage::empty());
    let mut probe = probe(driver);
    probe.navigate(PEOPLE).await.unwrap();

    let detector = PatternDetector::default();
    let controls = detector.inspect_controls(&mut probe).await;
    let detection = detector
        .detect(&mut probe, &url(PEOPLE), &controls, None, None)
        .await
        .unwrap();
    assert_eq!(detection.source, DetectionSource::ClickDiff);
    assert!(matches!(detection.pattern, PaginationPattern::Parameter { ref name, .. } if name == "pg"));
    assert_eq!(probe.current_url().await.unwrap(), PEOPLE);
}

#[tokio::test]
async fn test_detect_path_by_click_and_diff() {
    let page = ScriptedPage::new("Team")
        .with_element(ScriptedElement::link("/people/page/2", "Next ›"));
    let driver = ScriptedDriver::new()
        .with_page(PEOPLE, page)
        .with_fallback(ScriptedPage::empty());
    let mut probe = probe(driver);
    probe.navigate(PEOPLE).await.unwrap();

    let detector = PatternDetector::default();
    let controls = detector.inspect_controls(&mut probe).await;
    let detection = detector
        .detect(&mut probe, &url(PEOPLE), &controls, None, None)
        .await
        .unwrap();
    assert_eq!(detection.source, DetectionSource::ClickDiff);
    assert_eq!(
        detection.pattern.page_url(3).unwrap().as_str(),
        "https://firm.test/people/page/3"
    );
}

#[tokio::test]
async fn test_detect_script_driven_next_gives_none() {
    let page = ScriptedPage::new("Team").with_element(ScriptedElement::button("Load more").attr("class", "next"));
    let mut probe = probe(ScriptedDriver::new().with_page(PEOPLE, page));
    probe.navigate(PEOPLE).await.unwrap();

    let detector = PatternDetector::new(DetectorConfig {
        click_wait_ms: 0,
        ..DetectorConfig::default()
    });
    let controls = detector.inspect_controls(&mut probe).await;
    let detection = detector.detect(&mut probe, &url(PEOPLE), &controls, None, None).await;
    assert_eq!(detection, None);
    assert_eq!(probe.current_url().await.unwrap(), PEOPLE);
}

#[tokio::test]
async fn test_detect_priority_manual_then_cached() {
    let mut probe = probe(ScriptedDriver::new().with_page(PEOPLE, numbered_page()));
    probe.navigate(PEOPLE).await.unwrap();
    let detector = PatternDetector::default();

    let manual = PaginationPattern::path_segment("/people/p/{page}", url(PEOPLE));
    let cached = CachedPattern::new(PaginationPattern::offset("start", url(PEOPLE), 10), 90);

    let detection = detector
        .detect(&mut probe, &url(PEOPLE), &VisualControls::default(), Some(&manual), Some(&cached))
        .await
        .unwrap();
    assert_eq!(detection, Detection::new(manual, DetectionSource::Manual));

    let detection = detector
        .detect(&mut probe, &url(PEOPLE), &VisualControls::default(), None, Some(&cached))
        .await
        .unwrap();
    assert_eq!(detection.source, DetectionSource::Cached);
    assert!(detection.source.is_provided());
}

#[tokio::test]
async fn test_detect_works_from_supplied_controls() {
    let mut probe = probe(ScriptedDriver::new().with_page(PEOPLE, numbered_page()));
    probe.navigate(PEOPLE).await.unwrap();
    let detector = PatternDetector::default();

    // Links are only followed when the caller's controls list them
    let detection = detector
        .detect(&mut probe, &url(PEOPLE), &VisualControls::default(), None, None)
        .await;
    assert_eq!(detection, None);

    let controls = detector.inspect_controls(&mut probe).await;
    let detection = detector
        .detect(&mut probe, &url(PEOPLE), &controls, None, None)
        .await
        .unwrap();
    assert_eq!(detection.source, DetectionSource::Dom);
}

#[tokio::test]
async fn test_detect_ignores_stale_cache() {
    let start = "https://firm.test/people?page=1";
    let mut probe = probe(ScriptedDriver::new().with_page(start, ScriptedPage::new("x")));
    probe.navigate(start).await.unwrap();

    let mut cached = CachedPattern::new(PaginationPattern::None, 90);
    cached.discovered_at = Utc::now() - Duration::days(60);

    let detection = PatternDetector::default()
        .detect(&mut probe, &url(start), &VisualControls::default(), None, Some(&cached))
        .await
        .unwrap();
    assert_eq!(detection.source, DetectionSource::Url);
    assert_eq!(detection.pattern.kind(), PaginationType::Parameter);
}

// ============================================================================
// Boundary Search Tests
// ============================================================================

fn verdict(page: u32, valid: bool) -> PageVerdict {
    PageVerdict {
        has_content: valid,
        contact_estimate: if valid { 12 } else { 0 },
        content_fingerprint: if valid { format!("fp-{page}") } else { String::new() },
        timed_out: false,
    }
}

#[tokio::test]
async fn test_boundary_seventeen_pages() {
    let mut source = |page: u32| verdict(page, page <= 17);
    let state = BoundarySearcher::default()
        .find_true_max_page(&mut source, None)
        .await;

    assert_eq!(state.confirmed_max_page, 17);
    assert!(state.boundary_confirmed);
    assert!(!state.hard_capped);
    assert_eq!(state.test_order(), vec![1, 2, 4, 8, 16, 32, 24, 20, 18, 17, 19]);
    // Every empty page was loaded twice
    assert_eq!(state.total_loads(), 16);
    assert_eq!(state.tested(32).unwrap().attempts, 2);
    assert_eq!(state.tested(17).unwrap().attempts, 1);
}

#[tokio::test]
async fn test_boundary_probe_count_is_logarithmic() {
    for last in [5u32, 17, 40, 90, 150] {
        let mut source = move |page: u32| verdict(page, page <= last);
        let state = BoundarySearcher::default()
            .find_true_max_page(&mut source, None)
            .await;

        assert_eq!(state.confirmed_max_page, last);
        let bound = 2 * (32 - last.leading_zeros()) + 4;
        assert!(
            state.tested_pages.len() as u32 <= bound,
            "last={last}: tested {} pages",
            state.tested_pages.len()
        );
    }
}

#[tokio::test]
async fn test_boundary_uses_hint() {
    let mut source = |page: u32| verdict(page, page <= 17);
    let state = BoundarySearcher::default()
        .find_true_max_page(&mut source, Some(17))
        .await;

    assert_eq!(state.test_order(), vec![1, 17, 34, 25, 21, 19, 18]);
    assert_eq!(state.confirmed_max_page, 17);
    assert!(state.boundary_confirmed);
}

#[tokio::test]
async fn test_boundary_hint_is_clamped() {
    let mut source = |page: u32| verdict(page, page <= 3);
    let searcher = BoundarySearcher::new(BoundaryOptions::default().with_max_pages(50));
    let state = searcher.find_true_max_page(&mut source, Some(500)).await;

    assert_eq!(state.test_order()[..2].to_vec(), vec![1, 50]);
    assert_eq!(state.confirmed_max_page, 3);
}

#[tokio::test]
async fn test_boundary_resumes_after_false_end() {
    // Page 4 is missing but 5 and 6 exist
    let mut source = |page: u32| verdict(page, page <= 3 || page == 5 || page == 6);
    let state = BoundarySearcher::default()
        .find_true_max_page(&mut source, None)
        .await;

    assert_eq!(state.test_order(), vec![1, 2, 4, 3, 5, 10, 7, 6, 8]);
    assert_eq!(state.confirmed_max_page, 6);
    assert!(state.boundary_confirmed);
}

#[tokio::test]
async fn test_boundary_retests_transient_empty_page() {
    let mut calls: HashMap<u32, u32> = HashMap::new();
    let mut source = move |page: u32| {
        let n = calls.entry(page).or_default();
        *n += 1;
        // Page 4 renders slowly the first time
        let valid = page <= 6 && !(page == 4 && *n == 1);
        verdict(page, valid)
    };
    let state = BoundarySearcher::default()
        .find_true_max_page(&mut source, None)
        .await;

    let four = state.tested(4).unwrap();
    assert!(four.valid);
    assert_eq!(four.attempts, 2);
    assert_eq!(state.confirmed_max_page, 6);
    assert!(state.boundary_confirmed);
}

#[tokio::test]
async fn test_boundary_hard_cap_when_everything_is_valid() {
    let mut source = |page: u32| verdict(page, true);
    let searcher = BoundarySearcher::new(BoundaryOptions::default().with_max_pages(50));
    let state = searcher.find_true_max_page(&mut source, None).await;

    assert_eq!(state.test_order(), vec![1, 2, 4, 8, 16, 32, 50]);
    assert_eq!(state.confirmed_max_page, 50);
    assert!(state.hard_capped);
    assert!(!state.boundary_confirmed);
}

#[tokio::test]
async fn test_boundary_hard_cap_when_confirmation_needs_more_pages() {
    let mut source = |page: u32| verdict(page, page <= 49);
    let searcher = BoundarySearcher::new(BoundaryOptions::default().with_max_pages(50));
    let state = searcher.find_true_max_page(&mut source, None).await;

    assert_eq!(state.confirmed_max_page, 49);
    assert!(state.hard_capped);
    assert!(!state.boundary_confirmed);
}

#[tokio::test]
async fn test_boundary_empty_first_page() {
    let mut source = |page: u32| verdict(page, false);
    let state = BoundarySearcher::default()
        .find_true_max_page(&mut source, None)
        .await;

    assert_eq!(state.confirmed_max_page, 0);
    assert!(!state.found_content());
    assert!(state.boundary_confirmed);
    assert_eq!(state.test_order(), vec![1, 2]);
}

#[tokio::test]
async fn test_boundary_min_contacts() {
    let mut source = |page: u32| PageVerdict {
        has_content: true,
        contact_estimate: if page <= 3 { 10 } else { 1 },
        content_fingerprint: format!("fp-{page}"),
        timed_out: false,
    };
    let searcher = BoundarySearcher::new(BoundaryOptions {
        max_pages: 200,
        min_contacts_per_page: 5,
    });
    let state = searcher.find_true_max_page(&mut source, None).await;
    assert_eq!(state.confirmed_max_page, 3);
}

#[tokio::test]
async fn test_boundary_loop_back_counts_as_empty() {
    // Out-of-range pages silently serve page 1 again
    let mut source = |page: u32| {
        let shown = if page <= 5 { page } else { 1 };
        verdict(shown, true)
    };
    let state = BoundarySearcher::default()
        .find_true_max_page(&mut source, None)
        .await;

    assert_eq!(state.confirmed_max_page, 5);
    assert!(state.boundary_confirmed);
    assert_eq!(state.duplicates, vec![8, 6, 7]);
    assert_eq!(state.tested(8).unwrap().duplicate_of, Some(1));
    assert_eq!(state.tested(8).unwrap().attempts, 1);
}

#[tokio::test]
async fn test_boundary_loop_back_detected_from_hint() {
    // Pages past 17 serve page 1 again; the search starts at page 5
    let mut source = |page: u32| {
        let shown = if page <= 17 { page } else { 1 };
        verdict(shown, true)
    };
    let state = BoundarySearcher::default()
        .find_true_max_page(&mut source, Some(5))
        .await;

    assert_eq!(state.test_order(), vec![1, 5, 10, 20, 15, 17, 18, 19]);
    assert_eq!(state.confirmed_max_page, 17);
    assert!(state.boundary_confirmed);
    assert_eq!(state.duplicates, vec![20, 18, 19]);
    assert!(state.duplicates.iter().all(|p| state.tested(*p).unwrap().duplicate_of == Some(1)));
}

#[tokio::test]
async fn test_boundary_confirmation_invariant_randomized() {
    let mut rng = rand::thread_rng();

    for _ in 0..200 {
        let max_pages = rng.gen_range(1..120);
        let last = rng.gen_range(0..150);
        // A few holes inside the populated range
        let holes: HashSet<u32> = (0..rng.gen_range(0..3)).map(|_| rng.gen_range(1..=last.max(1))).collect();
        let valid = move |page: u32| page <= last && !holes.contains(&page);

        let check = valid.clone();
        let mut source = move |page: u32| verdict(page, check(page));
        let searcher = BoundarySearcher::new(BoundaryOptions::default().with_max_pages(max_pages));
        let hint = rng.gen_bool(0.5).then(|| rng.gen_range(1..200));
        let state = searcher.find_true_max_page(&mut source, hint).await;

        assert!(state.confirmed_max_page <= max_pages);
        assert!(state.boundary_confirmed != state.hard_capped);
        if state.confirmed_max_page > 0 {
            assert!(valid(state.confirmed_max_page));
        }
        if state.boundary_confirmed {
            let m = state.confirmed_max_page;
            for after in [m + 1, m + 2] {
                let tested = state.tested(after).expect("pages after the max are tested");
                assert!(!tested.valid);
            }
        }
        let distinct: HashSet<u32> = state.test_order().into_iter().collect();
        assert_eq!(distinct.len(), state.tested_pages.len());
    }
}
