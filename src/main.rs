use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ghsync::config::LoggingConfig;
use ghsync::error::EXIT_CONFIG;
use ghsync::github::detect_authentication;
use ghsync::health::CheckResult;
use ghsync::sync::SyncSummary;
use ghsync::{
    Category, Config, GhSyncError, GitHubClient, GitHubSource, HealthCheck, RunConfig, SyncEngine,
    SyncResult,
};

#[derive(Parser, Debug)]
#[command(name = "ghsync")]
#[command(about = "Clones or pulls all of your GitHub repositories into a categorized tree")]
#[command(version)]
struct Cli {
    /// Organization to sync (omit to sync your own repositories and watch list)
    scope: Option<String>,

    /// Add an `upstream` remote pointing at the parent of each fork
    #[arg(long)]
    upstream: bool,

    /// Only process these categories
    #[arg(long, value_enum, value_delimiter = ',', value_name = "CATEGORY")]
    only: Vec<Category>,

    /// Root of the category tree (defaults to the current directory)
    #[arg(long, env = "GHSYNC_DIR")]
    root: Option<PathBuf>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum concurrent git operations per category
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Show what would be cloned or updated without doing it
    #[arg(long)]
    dry_run: bool,

    /// Run system diagnostics and exit
    #[arg(long)]
    check: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{:#}", err);
            eprintln!("❌ {:#}", err);
            ExitCode::from(GhSyncError::exit_code_for(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config = load_config(cli.config.as_deref())?;

    init_logging(cli.verbose, &config.logging)?;
    info!("Starting ghsync v{}", env!("CARGO_PKG_VERSION"));

    let root = config.resolve_root(cli.root.as_deref())?;

    if cli.check {
        return Ok(cmd_check(&config, &root));
    }

    if !cli.dry_run {
        let git = HealthCheck::check_git();
        if !git.passed {
            return Err(GhSyncError::Config(git.message).into());
        }
    }

    let (strategy, credentials) = detect_authentication(&config)?;
    info!("Using authentication strategy: {:?}", strategy);

    let mut run = RunConfig::from_config(&config, root);
    run.scope = cli.scope;
    run.upstream |= cli.upstream;
    run.dry_run = cli.dry_run;
    if !cli.only.is_empty() {
        run.only = Some(cli.only);
    }
    if let Some(jobs) = cli.jobs {
        run.max_parallel = jobs.max(1);
    }

    let client = GitHubClient::new(&config, credentials)
        .await
        .context("Failed to connect to GitHub")?;
    let source = Arc::new(GitHubSource::new(client));
    let engine = SyncEngine::new(run, source);

    if engine.config().dry_run {
        cmd_dry_run(&engine).await
    } else {
        cmd_sync(&engine).await
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool, logging: &LoggingConfig) -> Result<()> {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if !logging.color {
        colored::control::set_override(false);
    }

    // Logs go to stderr; stdout carries progress lines and the summary
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(logging.color),
        )
        .with(filter)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Sync repositories and print the summary
async fn cmd_sync(engine: &SyncEngine) -> Result<u8> {
    println!("🔍 Discovering repositories...");
    let summary = engine.run_sync().await?;
    print_summary(&summary);
    Ok(summary.exit_code())
}

/// Print the planned action for every repository
async fn cmd_dry_run(engine: &SyncEngine) -> Result<u8> {
    println!("🔍 Dry run mode - nothing will be cloned or updated");

    let outcomes = engine.dry_run().await?;
    let mut current = None;

    for outcome in &outcomes {
        if current != Some(outcome.category) {
            println!("\n📁 {}/", outcome.category);
            current = Some(outcome.category);
        }
        if let SyncResult::Skipped { reason, .. } = &outcome.result {
            println!("   {}: {}", outcome.name, reason);
        }
    }

    println!("\n   {} repositories", outcomes.len());
    Ok(0)
}

fn print_summary(summary: &SyncSummary) {
    println!("\n🎉 Synchronization Complete!");
    println!("   📊 Total repositories: {}", summary.total_repositories);
    println!("   📥 Cloned: {}", summary.cloned);
    println!("   🔄 Updated: {}", summary.pulled);
    println!("   ✅ Up to date: {}", summary.up_to_date);
    println!("   ⏭️  Skipped: {}", summary.skipped);
    println!("   ❌ Failed: {}", summary.failed);
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.failed > 0 {
        println!("\n🔍 Failed Operations:");
        for outcome in summary.failures() {
            if let SyncResult::Failed { path, error } = &outcome.result {
                println!("   ❌ {}: {}", path.display(), error);
            }
        }
    }

    if !summary.category_failures.is_empty() {
        println!("\n🔍 Categories not processed:");
        for failure in &summary.category_failures {
            println!("   ❌ {}: {}", failure.category, failure.error);
        }
    }
}

/// System health check and diagnostics
fn cmd_check(config: &Config, root: &Path) -> u8 {
    let health = HealthCheck::run(config, root);
    print_health_report(&health);

    if health.all_passed() {
        0
    } else {
        EXIT_CONFIG
    }
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning { "⚠️ " } else { "✅" }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 ghsync System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    let warnings = health.warnings();
    if !warnings.is_empty() {
        println!("⚠️  {} warning(s)", warnings.len());
    }

    if health.all_passed() {
        println!("✅ All checks passed");
    } else {
        println!("❌ Some checks failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_only_accepts_comma_separated_categories() {
        let cli = Cli::try_parse_from(["ghsync", "--only", "private,forks"]).unwrap();
        assert_eq!(cli.only, vec![Category::Private, Category::Forks]);
        assert!(cli.scope.is_none());
        assert!(!cli.upstream);
    }

    #[test]
    fn test_scope_and_upstream() {
        let cli = Cli::try_parse_from(["ghsync", "psf", "--upstream"]).unwrap();
        assert_eq!(cli.scope.as_deref(), Some("psf"));
        assert!(cli.upstream);
        assert!(cli.only.is_empty());
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let result = Cli::try_parse_from(["ghsync", "--only", "private,starred"]);
        assert!(result.is_err());
    }
}
