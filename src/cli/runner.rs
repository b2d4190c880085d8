//! CLI runner - executes commands

use crate::cache::{FilePatternStore, PatternStore};
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::EngineConfig;
use crate::error::{Error, Result, ResultExt};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Discover {
                url,
                headed,
                remote_url,
                chrome,
            } => {
                self.discover(url, *headed, remote_url.clone(), chrome.clone())
                    .await
            }
            Commands::Validate => self.validate(),
            Commands::Cache { domain } => self.show_cache(domain.as_deref()).await,
        }
    }

    /// Load the engine config, or defaults when none was given
    fn load_config(&self) -> Result<EngineConfig> {
        match &self.cli.config {
            Some(path) => EngineConfig::from_file(path),
            None => Ok(EngineConfig::default()),
        }
    }

    /// Open the pattern cache, if one was given
    fn open_store(&self) -> Result<Option<Arc<FilePatternStore>>> {
        self.cli
            .cache
            .as_ref()
            .map(|path| {
                FilePatternStore::from_file(path)
                    .map(Arc::new)
                    .with_context(|| format!("Cannot open pattern cache {}", path.display()))
            })
            .transpose()
    }

    /// Run discovery against a live browser
    #[cfg(feature = "chromium")]
    async fn discover(
        &self,
        url: &str,
        headed: bool,
        remote_url: Option<String>,
        chrome: Option<PathBuf>,
    ) -> Result<()> {
        use crate::engine::PaginationOrchestrator;
        use crate::probe::{ChromiumConfig, ChromiumDriver, PageProbe};

        let config = self.load_config()?;
        let browser = ChromiumConfig {
            headless: !headed,
            executable: chrome,
            remote_url,
            ..ChromiumConfig::default()
        };
        let driver = ChromiumDriver::launch(&browser).await?;
        let mut probe = PageProbe::with_config(driver, config.probe.clone());

        let mut orchestrator = PaginationOrchestrator::from_config(&config);
        if let Some(store) = self.open_store()? {
            orchestrator = orchestrator.with_store(store);
        }

        let result = orchestrator.discover_or_report(&mut probe, url).await;
        self.output(&result);
        if result.is_error() {
            return Err(Error::Other(result.warnings.join("; ")));
        }
        Ok(())
    }

    #[cfg(not(feature = "chromium"))]
    async fn discover(
        &self,
        _url: &str,
        _headed: bool,
        _remote_url: Option<String>,
        _chrome: Option<PathBuf>,
    ) -> Result<()> {
        Err(Error::config(
            "pagescout was built without a browser driver; rebuild with `--features chromium`",
        ))
    }

    /// Validate the configuration file
    fn validate(&self) -> Result<()> {
        let path = self
            .cli
            .config
            .as_ref()
            .ok_or_else(|| Error::config("Config file not specified (use -C flag)"))?;
        let config = EngineConfig::from_file(path)?;
        info!("Config {} is valid", path.display());

        self.output(&json!({
            "valid": true,
            "config": path.display().to_string(),
            "sites": config.sites.iter().map(|s| s.domain.as_str()).collect::<Vec<_>>(),
        }));
        Ok(())
    }

    /// Print cached patterns
    async fn show_cache(&self, domain: Option<&str>) -> Result<()> {
        let store = self
            .open_store()?
            .ok_or_else(|| Error::config("Cache file not specified (use --cache flag)"))?;

        let entries = match domain {
            Some(domain) => store
                .get(domain)
                .await?
                .map(|entry| vec![(domain.to_string(), entry)])
                .unwrap_or_default(),
            None => store.entries().await?,
        };

        for (domain, entry) in entries {
            self.output(&json!({
                "domain": domain,
                "pattern": entry.pattern,
                "confidence": entry.confidence,
                "discovered_at": entry.discovered_at,
            }));
        }
        Ok(())
    }

    /// Write a document to stdout in the selected format
    fn output<T: Serialize>(&self, value: &T) {
        let text = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(value),
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
        };
        println!("{}", text.unwrap_or_default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn runner(args: &[&str]) -> Runner {
        let mut argv = vec!["pagescout"];
        argv.extend_from_slice(args);
        Runner::new(Cli::try_parse_from(argv).unwrap())
    }

    #[tokio::test]
    async fn test_validate_command() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sites:\n  - domain: firm.test\n    pagination:\n      type: none").unwrap();
        let path = file.path().to_str().unwrap();

        assert!(runner(&["-C", path, "validate"]).run().await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_requires_config() {
        let err = runner(&["validate"]).run().await.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_cache_command_reports_corrupt_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let path = file.path().to_str().unwrap();

        let err = runner(&["--cache", path, "cache"]).run().await.unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Cannot open pattern cache"), "{message}");
        assert!(message.contains("Failed to parse cache file"), "{message}");
    }

    #[tokio::test]
    async fn test_cache_command_on_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.json");

        let result = runner(&["--cache", path.to_str().unwrap(), "cache", "firm.test"])
            .run()
            .await;
        assert!(result.is_ok());
    }
}
