//! Timeout-guarded page probe
//!
//! Wraps a [`BrowserDriver`] so that every call has an explicit deadline and
//! every navigation goes through the pacer.

use super::driver::{BrowserDriver, ElementHandle};
use super::scripts;
use crate::error::{Error, Result};
use crate::pacing::{Pacer, PacingConfig};
use crate::validate::{fingerprint, FINGERPRINT_PREFIX_CHARS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Timeouts and pacing for a probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Deadline for a navigation
    pub navigation_timeout_ms: u64,
    /// Deadline for a single measurement, scroll, or DOM query
    pub measure_timeout_ms: u64,
    /// Pause after a navigation for client-side rendering to start
    pub settle_delay_ms: u64,
    /// Politeness between navigations
    pub pacing: PacingConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            measure_timeout_ms: 5_000,
            settle_delay_ms: 1_000,
            pacing: PacingConfig::default(),
        }
    }
}

impl ProbeConfig {
    /// Config with no pacing and no settle delay, for simulated drivers
    pub fn immediate() -> Self {
        Self {
            navigation_timeout_ms: 5_000,
            measure_timeout_ms: 1_000,
            settle_delay_ms: 0,
            pacing: PacingConfig::disabled(),
        }
    }

    /// Navigation deadline
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Measurement deadline
    pub fn measure_timeout(&self) -> Duration {
        Duration::from_millis(self.measure_timeout_ms)
    }

    /// Post-navigation settle delay
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// One measurement of the current page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Document height in pixels
    pub height: u64,
    /// Matches for the element selector (0 when none was given)
    pub element_count: u64,
    /// Hash of the normalized text prefix
    pub content_fingerprint: String,
    /// When the measurement was taken
    pub timestamp: DateTime<Utc>,
}

/// Measurement and navigation primitives over a single browser tab
pub struct PageProbe {
    driver: Box<dyn BrowserDriver>,
    config: ProbeConfig,
    pacer: Pacer,
}

impl PageProbe {
    /// Create a probe with default timeouts and pacing
    pub fn new(driver: impl BrowserDriver + 'static) -> Self {
        Self::with_config(driver, ProbeConfig::default())
    }

    /// Create a probe with custom timeouts and pacing
    pub fn with_config(driver: impl BrowserDriver + 'static, config: ProbeConfig) -> Self {
        let pacer = Pacer::new(&config.pacing);
        Self {
            driver: Box::new(driver),
            config,
            pacer,
        }
    }

    /// Probe configuration
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Navigate to `url`, paced and bounded by the navigation timeout
    pub async fn navigate(&mut self, url: &str) -> Result<()> {
        self.pacer.wait().await;

        let timeout = self.config.navigation_timeout();
        debug!("Navigating to {url}");
        match tokio::time::timeout(timeout, self.driver.navigate(url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(Error::navigation(
                url,
                format!("timed out after {}ms", self.config.navigation_timeout_ms),
            )),
        }
    }

    /// Evaluate a script under the measurement timeout
    pub async fn evaluate(&mut self, script: &str) -> Result<Value> {
        let timeout = self.config.measure_timeout();
        bounded("evaluate", timeout, self.driver.evaluate(script)).await
    }

    /// Current scrollable document height
    pub async fn document_height(&mut self) -> Result<u64> {
        let value = self.evaluate(scripts::DOCUMENT_HEIGHT).await?;
        as_pixels(&value, "document height")
    }

    /// Bottom edge of the viewport
    pub async fn scroll_position(&mut self) -> Result<u64> {
        let value = self.evaluate(scripts::SCROLL_POSITION).await?;
        as_pixels(&value, "scroll position")
    }

    /// Number of elements matching `selector`
    pub async fn element_count(&mut self, selector: &str) -> Result<u64> {
        Ok(self.find_elements(selector).await?.len() as u64)
    }

    /// Rendered body text
    pub async fn body_text(&mut self) -> Result<String> {
        let value = self.evaluate(scripts::BODY_TEXT).await?;
        match value {
            Value::String(text) => Ok(text),
            Value::Null => Ok(String::new()),
            other => Err(Error::script(format!("body text was not a string: {other}"))),
        }
    }

    /// Scroll to a vertical position
    pub async fn scroll_to(&mut self, position: u64) -> Result<()> {
        let timeout = self.config.measure_timeout();
        bounded("scroll", timeout, self.driver.scroll_to(position)).await
    }

    /// Scroll to the current document bottom, returning the height scrolled to
    pub async fn scroll_to_bottom(&mut self) -> Result<u64> {
        let height = self.document_height().await?;
        self.scroll_to(height).await?;
        Ok(height)
    }

    /// Find elements by CSS selector
    pub async fn find_elements(&mut self, selector: &str) -> Result<Vec<ElementHandle>> {
        let timeout = self.config.measure_timeout();
        bounded("find elements", timeout, self.driver.find_elements(selector)).await
    }

    /// Click an element
    pub async fn click(&mut self, handle: &ElementHandle) -> Result<()> {
        let timeout = self.config.measure_timeout();
        bounded("click", timeout, self.driver.click(handle)).await
    }

    /// Current document URL
    pub async fn current_url(&mut self) -> Result<String> {
        let timeout = self.config.measure_timeout();
        bounded("current url", timeout, self.driver.current_url()).await
    }

    /// Wait for client-side rendering after a navigation
    pub async fn settle(&self) {
        self.pause(self.config.settle_delay()).await;
    }

    /// Sleep for `duration` (no-op when zero)
    pub async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    /// Take a snapshot, counting `selector` matches when given
    pub async fn snapshot(&mut self, selector: Option<&str>) -> Result<PageSnapshot> {
        let height = self.document_height().await?;
        let element_count = match selector {
            Some(selector) => self.element_count(selector).await?,
            None => 0,
        };
        let text = self.body_text().await?;

        Ok(PageSnapshot {
            height,
            element_count,
            content_fingerprint: fingerprint(&text, FINGERPRINT_PREFIX_CHARS),
            timestamp: Utc::now(),
        })
    }
}

impl std::fmt::Debug for PageProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageProbe")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Run a driver call under a deadline
async fn bounded<T>(
    operation: &str,
    timeout: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| Error::timeout(operation, timeout.as_millis() as u64))?
}

/// Interpret a script result as a pixel count
fn as_pixels(value: &Value, what: &str) -> Result<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v.round() as u64))
        .ok_or_else(|| Error::script(format!("{what} was not a number: {value}")))
}
