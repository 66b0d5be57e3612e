//! Insight CLI - Command-line front end for the Insight page-analysis client.
//!
//! Provides the `insight` command, which runs PageSpeed Insights analyses
//! for a list of pages with bounded concurrency and reports scores or the
//! classified failure of each page.

mod report;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use insight_api::{ApiKey, BatchRunner, Job, Outcome};
use insight_core::{AppConfig, InsightError, RotationMode};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Insight - PageSpeed Insights batch analysis
#[derive(Parser, Debug)]
#[command(name = "insight", author, version, about)]
struct Cli {
    /// Log filter (trace, debug, info, warn, error or a full filter directive)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one or more pages
    Analyze(AnalyzeArgs),

    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Page URLs to analyze
    urls: Vec<String>,

    /// Read additional page URLs from a file, one per line
    #[arg(long)]
    url_file: Option<PathBuf>,

    /// API key; repeat to rotate between several keys
    #[arg(short, long = "key")]
    keys: Vec<String>,

    /// Key rotation mode (single, random, round-robin)
    #[arg(long)]
    rotation: Option<RotationMode>,

    /// Maximum number of analyses in flight
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Device strategy (mobile, desktop)
    #[arg(short, long)]
    strategy: Option<String>,

    /// Lighthouse category; repeat for several
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Locale of the report text
    #[arg(long)]
    locale: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing(level: Option<&str>) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,insight=debug")),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, InsightError> {
    let mut config = match path {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    config.apply_env(|name| std::env::var(name).ok())?;
    Ok(config)
}

impl AnalyzeArgs {
    /// Fold command-line overrides into `config`.
    fn apply(&self, config: &mut AppConfig) {
        if !self.keys.is_empty() {
            config.api.keys.clone_from(&self.keys);
        }
        if let Some(rotation) = self.rotation {
            config.api.key_rotation = rotation;
        }
        if let Some(concurrency) = self.concurrency {
            config.batch.max_concurrency = concurrency;
        }
        if let Some(strategy) = &self.strategy {
            config.analysis.strategy.clone_from(strategy);
        }
        if !self.categories.is_empty() {
            config.analysis.categories.clone_from(&self.categories);
        }
        if let Some(locale) = &self.locale {
            config.analysis.locale = Some(locale.clone());
        }
    }

    /// Page URLs from the arguments followed by those in `--url-file`.
    fn collect_urls(&self) -> Result<Vec<String>, InsightError> {
        let mut urls = self.urls.clone();

        if let Some(path) = &self.url_file {
            let content = std::fs::read_to_string(path)?;
            urls.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(ToString::to_string),
            );
        }

        if urls.is_empty() {
            return Err(InsightError::Validation(
                "no page URLs given".to_string(),
            ));
        }

        Ok(urls)
    }
}

async fn analyze(args: AnalyzeArgs, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let mut config = load_config(config_path).context("failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let urls = args.collect_urls()?;
    if config.api.keys.is_empty() {
        warn!("No API key configured; requests are subject to anonymous quotas");
    }

    let runner = BatchRunner::from_config(&config).context("failed to create HTTP client")?;
    let credential = Arc::new(ApiKey::from_config(&config.api));

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; waiting for running analyses to finish");
            interrupt.cancel();
        }
    });

    info!(
        pages = urls.len(),
        max_concurrency = config.batch.max_concurrency,
        rotation = %config.api.key_rotation,
        "Starting analysis"
    );

    let jobs: Vec<Job> = urls.into_iter().map(Job::from).collect();
    let results = runner
        .run(jobs, credential, config.batch.max_concurrency, cancel)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report::render_json(&results))?);
    } else {
        for result in &results {
            println!("{}", report::render_line(result));
        }
    }

    let failed = results
        .iter()
        .filter(|r| r.outcome() == Outcome::Failed)
        .count();

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_config(config_path: Option<&Path>, force: bool) -> anyhow::Result<ExitCode> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => AppConfig::config_path()?,
    };

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    AppConfig::default().save_to(&path)?;
    println!("Wrote default config to {}", path.display());
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Command::Analyze(args) => analyze(args, cli.config.as_deref()).await,
        Command::InitConfig { force } => init_config(cli.config.as_deref(), force),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_args(argv: &[&str]) -> AnalyzeArgs {
        let cli = Cli::try_parse_from(argv).expect("parse args");
        match cli.command {
            Command::Analyze(args) => args,
            Command::InitConfig { .. } => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_parse_analyze() {
        let args = analyze_args(&[
            "insight",
            "analyze",
            "https://example.com",
            "https://example.org",
            "--key",
            "a",
            "-k",
            "b",
            "--rotation",
            "random",
            "-j",
            "8",
            "--category",
            "seo",
            "--category",
            "performance",
            "--json",
        ]);

        assert_eq!(args.urls, vec!["https://example.com", "https://example.org"]);
        assert_eq!(args.keys, vec!["a", "b"]);
        assert_eq!(args.rotation, Some(RotationMode::Random));
        assert_eq!(args.concurrency, Some(8));
        assert_eq!(args.categories, vec!["seo", "performance"]);
        assert!(args.json);
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "insight",
            "analyze",
            "https://example.com",
            "--log-level",
            "debug",
            "--config",
            "/tmp/insight.toml",
        ])
        .expect("parse args");

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/insight.toml")));
    }

    #[test]
    fn test_invalid_rotation_is_rejected() {
        let result = Cli::try_parse_from(["insight", "analyze", "x", "--rotation", "sideways"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let args = analyze_args(&[
            "insight",
            "analyze",
            "https://example.com",
            "-k",
            "cli-key",
            "--strategy",
            "desktop",
            "--locale",
            "fr",
        ]);

        let mut config = AppConfig::default();
        config.api.keys = vec!["file-key".to_string()];
        args.apply(&mut config);

        assert_eq!(config.api.keys, vec!["cli-key"]);
        assert_eq!(config.analysis.strategy, "desktop");
        assert_eq!(config.analysis.locale.as_deref(), Some("fr"));
        assert_eq!(config.analysis.categories, vec!["PERFORMANCE"]);
        assert_eq!(config.batch.max_concurrency, 4);
    }

    #[test]
    fn test_collect_urls_from_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("urls.txt");
        std::fs::write(&path, "# pages\nhttps://example.org\n\n  https://example.net  \n")
            .expect("write url file");

        let args = analyze_args(&[
            "insight",
            "analyze",
            "https://example.com",
            "--url-file",
            path.to_str().expect("utf-8 path"),
        ]);

        assert_eq!(
            args.collect_urls().expect("collect urls"),
            vec![
                "https://example.com",
                "https://example.org",
                "https://example.net"
            ]
        );
    }

    #[test]
    fn test_collect_urls_requires_input() {
        let args = analyze_args(&["insight", "analyze"]);
        assert!(matches!(
            args.collect_urls(),
            Err(InsightError::Validation(_))
        ));

        let args = analyze_args(&["insight", "analyze", "--url-file", "/nonexistent/urls.txt"]);
        assert!(matches!(args.collect_urls(), Err(InsightError::Io(_))));
    }

    #[test]
    fn test_load_config_from_path() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[batch]\nmax_concurrency = 2\n").expect("write config");

        let config = load_config(Some(&path)).expect("load config");
        assert!(config.batch.max_concurrency >= 1);

        let missing = load_config(Some(&dir.path().join("missing.toml")));
        assert!(matches!(missing, Err(InsightError::Config(_))));
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("config.toml");

        init_config(Some(&path), false).expect("write config");
        assert!(path.exists());
        assert!(init_config(Some(&path), false).is_err());
        assert!(init_config(Some(&path), true).is_ok());
    }
}
