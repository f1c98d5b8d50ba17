use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use syncwarden::config::LoggingConfig;
use syncwarden::daemon::{build_repos, prepare_all};
use syncwarden::health::CheckResult;
use syncwarden::{Config, Daemon, HealthCheck, ProcessRunner, Repo, RepoStatus};

#[derive(Parser)]
#[command(name = "syncwarden")]
#[command(about = "Keeps local directories in sync with remote git repositories")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare all repositories, pull them once, then keep pulling until Ctrl+C
    Run,

    /// Prepare and pull every repository once, then exit
    Sync {
        /// Print repository status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check out an arbitrary commit in one repository
    Checkout {
        /// Local path of the repository, as configured
        path: PathBuf,

        /// Commit identifier to check out
        commit: String,
    },

    /// Validate the configuration and list the resolved repositories
    Check,

    /// System health check and diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_from(cli.config.as_deref())?;

    init_logging(&config.logging, cli.verbose)?;
    info!("Starting syncwarden v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run => cmd_run(&config).await,
        Commands::Sync { json } => cmd_sync(json, &config).await,
        Commands::Checkout { path, commit } => cmd_checkout(path, commit, &config).await,
        Commands::Check => cmd_check(&config),
        Commands::Doctor => cmd_doctor(&config).await,
    }
}

/// Initialize logging from configuration and verbosity
fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let layer = fmt::layer().with_writer(std::io::stderr).with_ansi(logging.color);
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format.as_str() {
        "full" => registry.with(layer).try_init(),
        _ => registry.with(layer.compact()).try_init(),
    }
    .context("Failed to initialize logging")?;

    Ok(())
}

fn repos(config: &Config) -> Result<Vec<Arc<Repo>>> {
    build_repos(config, Arc::new(ProcessRunner::new()))
}

/// Run the synchronization daemon in the foreground
async fn cmd_run(config: &Config) -> Result<()> {
    let daemon = Daemon::new(config)?;
    daemon.run().await
}

/// Prepare and pull every repository once
async fn cmd_sync(json: bool, config: &Config) -> Result<()> {
    let repos = repos(config)?;
    prepare_all(&repos).await?;

    let mut failed = 0;
    let mut statuses = Vec::with_capacity(repos.len());
    for repo in &repos {
        if let Err(e) = repo.pull().await {
            failed += 1;
            eprintln!("❌ {}: {}", repo.spec().path().display(), e);
        }
        statuses.push(repo.status());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        for status in &statuses {
            print_status(status);
        }
    }

    if failed > 0 {
        bail!("{} of {} repositories failed to sync", failed, repos.len());
    }
    Ok(())
}

/// Check out a commit in the repository configured at `path`
async fn cmd_checkout(path: PathBuf, commit: String, config: &Config) -> Result<()> {
    let wanted = config
        .resolve_path(path.to_str())
        .with_context(|| format!("Invalid path: {}", path.display()))?;

    let repo = repos(config)?
        .into_iter()
        .find(|repo| repo.spec().path() == wanted)
        .with_context(|| format!("No repository configured at {}", wanted.display()))?;

    repo.prepare().await?;
    repo.checkout_commit(&commit).await?;

    println!("✅ Checked out {} in {}", commit, wanted.display());
    Ok(())
}

/// Validate configuration and print resolved repositories
fn cmd_check(config: &Config) -> Result<()> {
    let specs = config.repository_specs()?;

    println!("Repositories ({}):", specs.len());
    for spec in specs {
        println!("  📁 {}", spec.path().display());
        println!("     🔗 {}", spec.display_url());
        println!("     🎯 {}", spec.tracking());
        println!("     ⏱️  every {:?}", spec.interval());
    }
    Ok(())
}

/// System health check and diagnostics
async fn cmd_doctor(config: &Config) -> Result<()> {
    let repos = repos(config)?;
    let health = HealthCheck::run(&config.git_binary, &repos).await;
    print_health_report(&health);

    if !health.all_passed() {
        bail!("Some checks failed");
    }
    Ok(())
}

fn print_status(status: &RepoStatus) {
    println!("📁 {}", status.path.display());
    println!("   🎯 {} ({:?})", status.tracking, status.phase);
    if let Some(tag) = &status.current_tag {
        println!("   🏷️  {}", tag);
    }
    if let Some(commit) = &status.last_commit {
        println!("   🔖 {}", commit);
    }
    if let Some(at) = status.last_pull {
        println!("   🕒 {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
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

    println!("🔍 syncwarden System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    let warnings = health.warnings().len();
    if health.all_passed() {
        if warnings > 0 {
            println!("✅ All checks passed ({} warning(s))", warnings);
        } else {
            println!("✅ All checks passed");
        }
    } else {
        println!(
            "❌ Some checks failed: {} error(s), {} warning(s)",
            health.errors().len(),
            warnings
        );
    }
}
