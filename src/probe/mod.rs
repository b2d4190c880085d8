//! Page probe module
//!
//! A thin, timeout-guarded facade over a live browser session.
//!
//! # Overview
//!
//! - `BrowserDriver` - Trait the browser collaborator implements
//! - `PageProbe` - Measurement and navigation primitives used by the engine
//! - `ScriptedDriver` - In-memory simulated site for tests and dry runs
//! - `ChromiumDriver` - DevTools-backed driver (`chromium` feature)

#[cfg(feature = "chromium")]
mod chromium;
mod driver;
mod page;
pub mod scripted;
pub mod scripts;

#[cfg(feature = "chromium")]
pub use chromium::{ChromiumConfig, ChromiumDriver};
pub use driver::{BrowserDriver, ElementHandle};
pub use page::{PageProbe, PageSnapshot, ProbeConfig};
pub use scripted::{HeightModel, ScriptedDriver, ScriptedElement, ScriptedPage};
