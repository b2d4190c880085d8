//! Pacing module
//!
//! Keeps navigations polite and retries the start page load.
//!
//! # Overview
//!
//! - `Pacer` - Token bucket plus a jittered random delay before each navigation
//! - `RetryPolicy` - Constant, linear, or exponential backoff between attempts

mod backoff;
mod rate_limit;

pub use backoff::RetryPolicy;
pub use rate_limit::{Pacer, PacingConfig};
