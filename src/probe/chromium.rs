//! Chromium DevTools driver
//!
//! Drives a single tab of a local or remote Chrome through chromiumoxide.

use super::driver::{BrowserDriver, ElementHandle};
use super::scripts;
use crate::error::{Error, Result};
use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Common Chrome executable paths to check
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

/// How to obtain a browser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromiumConfig {
    /// Run without a visible window
    pub headless: bool,
    /// Explicit Chrome binary
    pub executable: Option<PathBuf>,
    /// DevTools endpoint of an already running browser (`http://host:9222`)
    pub remote_url: Option<String>,
    /// Extra command line switches
    pub chrome_args: Vec<String>,
    /// Viewport size
    pub window_size: (u32, u32),
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            remote_url: None,
            chrome_args: Vec::new(),
            window_size: (1920, 1080),
        }
    }
}

/// One Chrome tab
pub struct ChromiumDriver {
    // Held so the browser process lives as long as the tab
    _browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launch (or connect to) a browser and open a blank tab
    pub async fn launch(config: &ChromiumConfig) -> Result<Self> {
        let (browser, mut handler) = match &config.remote_url {
            Some(url) => {
                let ws_url = resolve_websocket_url(url).await?;
                info!("Connecting to remote browser at {ws_url}");
                Browser::connect(ws_url).await.map_err(driver_error)?
            }
            None => {
                let executable = match &config.executable {
                    Some(path) => path.clone(),
                    None => find_chrome()?,
                };
                info!(
                    "Launching {} (headless={})",
                    executable.display(),
                    config.headless
                );

                let mut builder = BrowserConfig::builder()
                    .chrome_executable(executable)
                    .window_size(config.window_size.0, config.window_size.1)
                    .arg("--disable-blink-features=AutomationControlled")
                    .arg("--disable-dev-shm-usage")
                    .arg("--no-first-run")
                    .arg("--no-default-browser-check")
                    .arg("--no-sandbox")
                    .arg("--disable-gpu");
                if !config.headless {
                    builder = builder.with_head();
                }
                for arg in &config.chrome_args {
                    builder = builder.arg(arg);
                }
                let browser_config = builder.build().map_err(Error::driver)?;

                Browser::launch(browser_config).await.map_err(driver_error)?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(driver_error)?;

        Ok(Self {
            _browser: browser,
            page,
            handler,
        })
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| Error::navigation(url, format!("timed out after {timeout:?}")))?
            .map_err(|e| Error::navigation(url, e.to_string()))?;

        match tokio::time::timeout(timeout, self.page.evaluate(scripts::WAIT_FOR_READY)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("Could not check ready state: {e}"),
            Err(_) => warn!("Timeout waiting for ready state on {url}"),
        }
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| Error::script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn scroll_to(&mut self, position: u64) -> Result<()> {
        self.page
            .evaluate(scripts::scroll_to(position))
            .await
            .map_err(|e| Error::script(e.to_string()))?;
        Ok(())
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<ElementHandle>> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .unwrap_or_default();

        let mut handles = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let mut handle = ElementHandle::new(selector, index);
            handle.text = element.inner_text().await.ok().flatten().unwrap_or_default();
            handle.href = element.attribute("href").await.ok().flatten();
            handle.rel = element.attribute("rel").await.ok().flatten();
            handles.push(handle);
        }
        Ok(handles)
    }

    async fn current_url(&mut self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(driver_error)?
            .ok_or_else(|| Error::driver("tab has no URL"))
    }

    async fn click(&mut self, handle: &ElementHandle) -> Result<()> {
        let elements = self
            .page
            .find_elements(handle.selector.as_str())
            .await
            .map_err(driver_error)?;
        let element = elements
            .get(handle.index)
            .ok_or_else(|| Error::driver(format!("stale element {}", handle.selector)))?;
        element.click().await.map_err(driver_error)?;
        Ok(())
    }
}

fn driver_error(e: impl std::fmt::Display) -> Error {
    Error::driver(e.to_string())
}

/// Locate a Chrome binary in well-known places or on PATH
fn find_chrome() -> Result<PathBuf> {
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }

    for cmd in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(Error::driver(
        "Chrome/Chromium not found; install it or pass --remote-url",
    ))
}

/// Turn an `http://host:port` DevTools address into its websocket URL
async fn resolve_websocket_url(url: &str) -> anyhow::Result<String> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        return Ok(url.to_string());
    }

    let version_url = format!("{}/json/version", url.trim_end_matches('/'));
    let info: Value = reqwest::get(&version_url)
        .await
        .with_context(|| format!("DevTools endpoint {version_url} is unreachable"))?
        .json()
        .await
        .with_context(|| format!("DevTools endpoint {version_url} did not return JSON"))?;

    info.get("webSocketDebuggerUrl")
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("no webSocketDebuggerUrl at {version_url}"))
}
