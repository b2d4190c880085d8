//! Pattern cache module
//!
//! Remembers the pagination pattern discovered for a domain so the next run
//! can skip live detection.
//!
//! # Overview
//!
//! - `PatternStore` - Async store trait the engine is given
//! - `InMemoryPatternStore` - Process-local store
//! - `FilePatternStore` - JSON file store with atomic writes
//!
//! Entries are advisory: reads are concurrent and the last writer wins.

mod store;
mod types;

pub use store::{FilePatternStore, InMemoryPatternStore, PatternStore};
pub use types::{domain_key, CacheWrite, CachedPattern, PatternCache};
