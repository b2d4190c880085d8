//! CLI module
//!
//! Command-line interface for running discovery.
//!
//! # Commands
//!
//! - `discover` - Find the page URLs of a directory (needs the `chromium` feature)
//! - `validate` - Check an engine config file
//! - `cache` - Show cached patterns

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
