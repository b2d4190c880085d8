//! JavaScript expressions evaluated through the driver
//!
//! Kept as constants so simulated drivers can recognise them.

/// Full scrollable height of the document in pixels
pub const DOCUMENT_HEIGHT: &str =
    "Math.max(document.body ? document.body.scrollHeight : 0, document.documentElement.scrollHeight)";

/// Bottom edge of the viewport in document coordinates
pub const SCROLL_POSITION: &str = "Math.round(window.pageYOffset + window.innerHeight)";

/// Rendered text of the page body
pub const BODY_TEXT: &str = "document.body ? document.body.innerText : ''";

/// Resolves once the document has parsed, or after ten seconds
pub const WAIT_FOR_READY: &str = r"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
";

/// Scroll expression for a position
pub fn scroll_to(position: u64) -> String {
    format!("window.scrollTo(0, {position})")
}
