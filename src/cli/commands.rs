//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pagination and load-completion discovery for directory pages
#[derive(Parser, Debug)]
#[command(name = "pagescout")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Engine configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Pattern cache file (JSON)
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover how to reach every page of a directory
    Discover {
        /// Start URL of the directory
        url: String,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// DevTools endpoint of a running browser instead of launching one
        #[arg(long)]
        remote_url: Option<String>,

        /// Chrome executable
        #[arg(long)]
        chrome: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,

    /// Show cached patterns
    Cache {
        /// Only this domain
        domain: Option<String>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one document per line)
    Json,
    /// Indented JSON
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_discover() {
        let cli = Cli::try_parse_from([
            "pagescout",
            "discover",
            "https://firm.test/people",
            "--headed",
            "--cache",
            "patterns.json",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.cache, Some(PathBuf::from("patterns.json")));
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Discover { url, headed, remote_url, .. } => {
                assert_eq!(url, "https://firm.test/people");
                assert!(headed);
                assert!(remote_url.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_cache_with_format() {
        let cli = Cli::try_parse_from(["pagescout", "--format", "pretty", "cache", "firm.test"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Pretty);
        assert!(matches!(cli.command, Commands::Cache { domain: Some(ref d) } if d == "firm.test"));
    }

    #[test]
    fn test_discover_requires_url() {
        assert!(Cli::try_parse_from(["pagescout", "discover"]).is_err());
    }
}
