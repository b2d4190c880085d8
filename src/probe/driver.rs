//! Browser driver abstraction
//!
//! The engine never talks to a browser directly. Anything that can navigate,
//! evaluate a script, scroll, and find/click elements can back a probe.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A located element, detached from the live DOM
///
/// Handles are addressed by `(selector, index)`, so a driver can re-resolve
/// them after the page has changed underneath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Selector the element was found with
    pub selector: String,
    /// Position among the selector's matches
    pub index: usize,
    /// Rendered text content
    #[serde(default)]
    pub text: String,
    /// `href` attribute, if any
    #[serde(default)]
    pub href: Option<String>,
    /// `rel` attribute, if any
    #[serde(default)]
    pub rel: Option<String>,
}

impl ElementHandle {
    /// Create a handle with only a selector and index
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
            text: String::new(),
            href: None,
            rel: None,
        }
    }

    /// Trimmed text content
    pub fn label(&self) -> &str {
        self.text.trim()
    }
}

/// A single browser tab
///
/// Methods take `&mut self`: a tab cannot interleave commands, so one driver
/// serves one sequential caller. `Sync` lets a `&PageProbe` be held across
/// an await inside `Send` futures.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Load `url` and wait for it to be ready, giving up after `timeout`
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate a JavaScript expression and return its JSON value
    async fn evaluate(&mut self, script: &str) -> Result<Value>;

    /// Scroll the window to a vertical position in pixels
    async fn scroll_to(&mut self, position: u64) -> Result<()>;

    /// Find all elements matching a CSS selector
    async fn find_elements(&mut self, selector: &str) -> Result<Vec<ElementHandle>>;

    /// Current document URL
    async fn current_url(&mut self) -> Result<String>;

    /// Click a previously found element
    async fn click(&mut self, handle: &ElementHandle) -> Result<()>;
}
