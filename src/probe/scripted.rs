//! In-memory simulated directory site
//!
//! `ScriptedDriver` implements [`BrowserDriver`] over a fixed set of pages so
//! the engine can be exercised without a browser. Pages declare their text,
//! their elements, and how their height responds to scrolling to the bottom.
//!
//! Selector support is deliberately small: compounds of a tag, `.class`, and
//! `[attr]`, `[attr=v]`, `[attr^=v]`, `[attr*=v]`, `[attr$=v]`, joined by
//! commas. A descendant selector such as `.pagination a` matches on its last
//! compound only, since the simulation has no element tree.

use super::driver::{BrowserDriver, ElementHandle};
use super::scripts;
use crate::error::{Error, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use url::Url;

static SELECTOR_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(?:(?P<tag>[a-zA-Z][\w-]*|\*)|\.(?P<class>[\w-]+)|\[(?P<attr>[\w-]+)(?:\s*(?P<op>[\^$*]?=)\s*["']?(?P<value>[^"'\]]*)["']?)?\])"#,
    )
    .expect("selector token regex is valid")
});

// ============================================================================
// Height Model
// ============================================================================

/// How a page's height responds to scroll-to-bottom loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeightModel {
    /// Never grows
    Constant(u64),
    /// Grows by `step` on each of the first `grows` bottom scrolls
    Growing { initial: u64, step: u64, grows: u32 },
    /// Height after 0, 1, 2, ... bottom scrolls; the last value repeats
    Sequence(Vec<u64>),
}

impl Default for HeightModel {
    fn default() -> Self {
        Self::Constant(800)
    }
}

impl HeightModel {
    /// Height after `loads` scrolls to the bottom
    pub fn at(&self, loads: u32) -> u64 {
        match self {
            Self::Constant(height) => *height,
            Self::Growing {
                initial,
                step,
                grows,
            } => initial + step * u64::from(loads.min(*grows)),
            Self::Sequence(heights) => {
                let index = (loads as usize).min(heights.len().saturating_sub(1));
                heights.get(index).copied().unwrap_or(0)
            }
        }
    }
}

// ============================================================================
// Elements and Pages
// ============================================================================

/// An element on a simulated page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedElement {
    /// Lowercase tag name
    pub tag: String,
    /// Text content
    pub text: String,
    /// Attributes
    pub attrs: BTreeMap<String, String>,
    /// URL the tab ends up on after a click (`None` = nothing visible happens)
    pub navigates_to: Option<String>,
}

impl ScriptedElement {
    /// Any element
    pub fn new(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            text: text.into(),
            attrs: BTreeMap::new(),
            navigates_to: None,
        }
    }

    /// An anchor; clicking it follows `href`
    pub fn link(href: impl Into<String>, text: impl Into<String>) -> Self {
        let href = href.into();
        Self::new("a", text)
            .attr("href", href.clone())
            .navigates_to(href)
    }

    /// A button that does nothing unless told to navigate
    pub fn button(text: impl Into<String>) -> Self {
        Self::new("button", text)
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Make a click land on `url`
    #[must_use]
    pub fn navigates_to(mut self, url: impl Into<String>) -> Self {
        self.navigates_to = Some(url.into());
        self
    }

    /// Make a click change nothing in the URL (AJAX-style)
    #[must_use]
    pub fn without_navigation(mut self) -> Self {
        self.navigates_to = None;
        self
    }

    fn to_handle(&self, selector: &str, index: usize) -> ElementHandle {
        ElementHandle {
            selector: selector.to_string(),
            index,
            text: self.text.clone(),
            href: self.attrs.get("href").cloned(),
            rel: self.attrs.get("rel").cloned(),
        }
    }
}

/// A simulated page
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    /// Rendered body text
    pub text: String,
    /// Elements in document order
    pub elements: Vec<ScriptedElement>,
    /// Height behaviour
    pub height: HeightModel,
}

impl ScriptedPage {
    /// A page with the given body text and a constant height
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// A page with almost no text, like a "no results" page
    pub fn empty() -> Self {
        Self::new("No results")
    }

    /// Set the height model
    #[must_use]
    pub fn with_height(mut self, height: HeightModel) -> Self {
        self.height = height;
        self
    }

    /// Add an element
    #[must_use]
    pub fn with_element(mut self, element: ScriptedElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Add `count` contact cards: mailto links plus matching text
    #[must_use]
    pub fn with_contacts(mut self, prefix: &str, count: usize) -> Self {
        for i in 0..count {
            let email = format!("{prefix}{i}@firm.test");
            self.text.push_str(&format!("\nPartner {prefix}{i}\n{email}\n+1 555 0100"));
            self.elements
                .push(ScriptedElement::link(format!("mailto:{email}"), email).without_navigation());
        }
        self
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Browser driver over simulated pages
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    pages: HashMap<String, ScriptedPage>,
    fallback: Option<ScriptedPage>,
    current: Option<String>,
    loads: u32,
    position: u64,
    height_reads: u32,
    failing_height_reads: HashSet<u32>,
    failing_navigations: u32,
    visits: Vec<String>,
}

impl ScriptedDriver {
    /// Create a driver with no pages
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page at `url`
    #[must_use]
    pub fn with_page(mut self, url: &str, page: ScriptedPage) -> Self {
        self.pages.insert(normalize(url), page);
        self
    }

    /// Page served for any URL that was not registered
    #[must_use]
    pub fn with_fallback(mut self, page: ScriptedPage) -> Self {
        self.fallback = Some(page);
        self
    }

    /// Make the given (0-based) document-height reads time out
    #[must_use]
    pub fn failing_height_reads(mut self, reads: impl IntoIterator<Item = u32>) -> Self {
        self.failing_height_reads.extend(reads);
        self
    }

    /// Make the next `count` navigations fail
    #[must_use]
    pub fn failing_navigations(mut self, count: u32) -> Self {
        self.failing_navigations = count;
        self
    }

    /// Every URL navigated to, in order, including clicks that navigated
    pub fn visits(&self) -> &[String] {
        &self.visits
    }

    fn page(&self) -> Result<&ScriptedPage> {
        let current = self
            .current
            .as_ref()
            .ok_or_else(|| Error::driver("no page loaded"))?;
        self.pages
            .get(current)
            .or(self.fallback.as_ref())
            .ok_or_else(|| Error::driver(format!("no page registered for {current}")))
    }

    fn load(&mut self, url: &str) -> Result<()> {
        let key = normalize(url);
        self.visits.push(key.clone());
        if !self.pages.contains_key(&key) && self.fallback.is_none() {
            return Err(Error::navigation(url, "net::ERR_NAME_NOT_RESOLVED"));
        }
        self.current = Some(key);
        self.loads = 0;
        self.position = 0;
        Ok(())
    }

    fn matching(&self, selector: &str) -> Result<Vec<&ScriptedElement>> {
        let page = self.page()?;
        let compounds: Vec<Compound> = selector.split(',').filter_map(Compound::parse).collect();
        Ok(page
            .elements
            .iter()
            .filter(|element| compounds.iter().any(|c| c.matches(element)))
            .collect())
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<()> {
        if self.failing_navigations > 0 {
            self.failing_navigations -= 1;
            return Err(Error::navigation(url, "net::ERR_CONNECTION_RESET"));
        }
        self.load(url)
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value> {
        let loads = self.loads;
        let position = self.position;
        let page = self.page()?;

        match script {
            scripts::DOCUMENT_HEIGHT => {
                let height = page.height.at(loads);
                let read = self.height_reads;
                self.height_reads += 1;
                if self.failing_height_reads.contains(&read) {
                    return Err(Error::timeout("document height", 0));
                }
                Ok(json!(height))
            }
            scripts::SCROLL_POSITION => Ok(json!(position.min(page.height.at(loads)))),
            scripts::BODY_TEXT => Ok(json!(page.text)),
            scripts::WAIT_FOR_READY => Ok(json!("complete")),
            _ => Ok(Value::Null),
        }
    }

    async fn scroll_to(&mut self, position: u64) -> Result<()> {
        let height = self.page()?.height.at(self.loads);
        if position >= height {
            self.loads += 1;
        }
        self.position = position;
        Ok(())
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<ElementHandle>> {
        Ok(self
            .matching(selector)?
            .into_iter()
            .enumerate()
            .map(|(index, element)| element.to_handle(selector, index))
            .collect())
    }

    async fn current_url(&mut self) -> Result<String> {
        self.current
            .clone()
            .ok_or_else(|| Error::driver("no page loaded"))
    }

    async fn click(&mut self, handle: &ElementHandle) -> Result<()> {
        let target = self
            .matching(&handle.selector)?
            .get(handle.index)
            .map(|element| element.navigates_to.clone())
            .ok_or_else(|| Error::driver(format!("stale element {}", handle.selector)))?;

        match target {
            Some(url) => {
                let absolute = self
                    .current
                    .as_deref()
                    .and_then(|base| Url::parse(base).ok())
                    .and_then(|base| base.join(&url).ok())
                    .map_or(url, |u| u.to_string());
                self.load(&absolute)
            }
            None => Ok(()),
        }
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url).map_or_else(|_| url.to_string(), |u| u.to_string())
}

// ============================================================================
// Selector Matching
// ============================================================================

#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<(String, String)>)>,
}

impl Compound {
    fn parse(selector: &str) -> Option<Self> {
        let mut rest = last_compound(selector.trim())?;
        let mut compound = Self::default();

        while !rest.is_empty() {
            let caps = SELECTOR_TOKEN.captures(rest)?;
            if let Some(tag) = caps.name("tag") {
                if tag.as_str() != "*" {
                    compound.tag = Some(tag.as_str().to_lowercase());
                }
            } else if let Some(class) = caps.name("class") {
                compound.classes.push(class.as_str().to_string());
            } else if let Some(attr) = caps.name("attr") {
                let condition = caps.name("op").map(|op| {
                    let value = caps.name("value").map_or("", |v| v.as_str());
                    (op.as_str().to_string(), value.to_string())
                });
                compound.attrs.push((attr.as_str().to_string(), condition));
            }
            rest = &rest[caps.get(0)?.end()..];
        }

        Some(compound)
    }

    fn matches(&self, element: &ScriptedElement) -> bool {
        if self.tag.as_ref().is_some_and(|tag| *tag != element.tag) {
            return false;
        }

        let classes = element.attrs.get("class").map_or("", String::as_str);
        if !self
            .classes
            .iter()
            .all(|class| classes.split_whitespace().any(|c| c == class))
        {
            return false;
        }

        self.attrs.iter().all(|(name, condition)| {
            let Some(actual) = element.attrs.get(name) else {
                return false;
            };
            match condition {
                None => true,
                Some((op, expected)) => match op.as_str() {
                    "^=" => actual.starts_with(expected.as_str()),
                    "$=" => actual.ends_with(expected.as_str()),
                    "*=" => actual.contains(expected.as_str()),
                    _ => actual == expected,
                },
            }
        })
    }
}

/// The part after the last descendant combinator, ignoring spaces inside `[...]`
fn last_compound(selector: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => start = i + c.len_utf8(),
            _ => {}
        }
    }
    let compound = &selector[start..];
    (!compound.is_empty()).then_some(compound)
}
