//! Kobold CLI - Main Entry Point
//!
//! Compares the build screens of a test folder against its approved screens
//! and exits non-zero when any case failed.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kobold_core::{KoboldConfig, KoboldError, Orchestrator};

mod output;

use output::ConsoleHarness;

/// Kobold - visual regression testing against approved screens
#[derive(Parser, Debug)]
#[command(name = "kobold")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Folder holding the approved, build, and archive folders
    test_path: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "kobold.toml")]
    config: PathBuf,

    /// Build identifier
    #[arg(long, env = "BUILD_NUMBER")]
    build: Option<String>,

    /// Name of the approved screens folder
    #[arg(long)]
    approved_folder: Option<String>,

    /// Name of the build screens folder
    #[arg(long)]
    build_folder: Option<String>,

    /// Name of the highlight archive folder
    #[arg(long)]
    highlight_folder: Option<String>,

    /// Fail when an approved screen has no build screen
    #[arg(long)]
    fail_orphans: bool,

    /// Fail when a build screen has no approved screen
    #[arg(long)]
    fail_additions: bool,

    /// Archive highlight images of passing screens too
    #[arg(long)]
    highlight_on_success: bool,

    /// Maximum number of screens compared at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Allowed share of differing pixels (percentage)
    #[arg(long)]
    threshold: Option<f64>,

    /// Output directory for the JSON results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Layer command-line values over the file configuration
    fn apply(&self, mut config: KoboldConfig) -> KoboldConfig {
        config.storage.path = self.test_path.clone();
        if let Some(build) = &self.build {
            config.build = build.clone();
        }
        if let Some(folder) = &self.approved_folder {
            config.storage.approved_folder = folder.clone();
        }
        if let Some(folder) = &self.build_folder {
            config.storage.build_folder = folder.clone();
        }
        if let Some(folder) = &self.highlight_folder {
            config.storage.highlight_folder = folder.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(threshold) = self.threshold {
            config
                .comparison
                .insert("threshold".to_string(), threshold.into());
        }
        config.fail_for_orphans |= self.fail_orphans;
        config.fail_on_additions |= self.fail_additions;
        config.highlight_on_success |= self.highlight_on_success;
        config.verbose |= self.verbose;
        config
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match async_main(cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            if let Some(message) = fatal_message(&e) {
                output::print_error(&message);
            }
            2
        }
    };
    std::process::exit(code);
}

/// Message for a fatal error, `None` when the harness already reported it
fn fatal_message(err: &anyhow::Error) -> Option<String> {
    match err.downcast_ref::<KoboldError>() {
        Some(KoboldError::Listing { .. }) => None,
        _ => Some(format!("{:#}", err)),
    }
}

async fn async_main(cli: Cli) -> anyhow::Result<bool> {
    if !cli.test_path.exists() {
        anyhow::bail!("Cannot find path to {}", cli.test_path.display());
    }

    let config = KoboldConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let config = cli.apply(config);

    // Initialize logging
    let log_level = if config.verbose { "debug" } else { "info" };
    // already set when called more than once in one process
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .try_init();

    info!("Kobold v{}", kobold_core::VERSION);

    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| config.storage.path.join("results"));

    let orchestrator = Orchestrator::from_config(config, Arc::new(ConsoleHarness::new()))?;
    let summary = orchestrator.run().await?;

    output::print_summary(&summary);
    summary.write_json(&output_dir)?;

    Ok(summary.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_cli_defaults_keep_config() {
        let cli = Cli::try_parse_from(["kobold", "screens"]).unwrap();
        let config = cli.apply(KoboldConfig {
            fail_for_orphans: true,
            ..Default::default()
        });
        assert_eq!(config.storage.path, PathBuf::from("screens"));
        assert!(config.fail_for_orphans);
        assert!(!config.fail_on_additions);
        assert_eq!(config.storage.approved_folder, "approved");
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "kobold",
            "--build",
            "pr-17",
            "--approved-folder",
            "baseline",
            "--highlight-folder",
            "diffs",
            "--fail-additions",
            "--highlight-on-success",
            "--concurrency",
            "8",
            "--threshold",
            "1.5",
            "screens",
        ])
        .unwrap();
        let config = cli.apply(KoboldConfig::default());

        assert_eq!(config.build, "pr-17");
        assert_eq!(config.storage.approved_folder, "baseline");
        assert_eq!(config.storage.highlight_folder, "diffs");
        assert!(config.fail_on_additions);
        assert!(config.highlight_on_success);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.comparison.get("threshold").and_then(|v| v.as_f64()), Some(1.5));
    }

    #[test]
    fn test_test_path_is_required() {
        assert!(Cli::try_parse_from(["kobold"]).is_err());
    }

    #[tokio::test]
    async fn test_missing_test_path_is_fatal() {
        let cli = Cli::try_parse_from(["kobold", "/definitely/not/here"]).unwrap();
        let err = async_main(cli).await.unwrap_err();
        assert!(err.to_string().contains("Cannot find path to"));
    }

    #[tokio::test]
    async fn test_listing_failure_is_reported_by_harness_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("approved")).unwrap();
        let config = dir.path().join("absent.toml");

        let args: Vec<OsString> = vec![
            "kobold".into(),
            "--build".into(),
            "t1".into(),
            "--config".into(),
            config.into_os_string(),
            dir.path().as_os_str().to_owned(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let err = async_main(cli).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<KoboldError>(),
            Some(KoboldError::Listing { .. })
        ));
        assert_eq!(fatal_message(&err), None);
    }

    #[test]
    fn test_other_fatal_errors_are_printed() {
        let err = anyhow::anyhow!("Cannot find path to /nowhere");
        assert_eq!(fatal_message(&err).as_deref(), Some("Cannot find path to /nowhere"));

        let err: anyhow::Error = KoboldError::InvalidConfig("build identifier is empty".into()).into();
        assert!(fatal_message(&err).unwrap().contains("build identifier is empty"));
    }
}
