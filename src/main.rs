use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Select};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ghmirror::mirror::EXIT_FATAL;
use ghmirror::sync::SyncAction;
use ghmirror::{
    Classification, Config, GitCli, GitHubClient, Mirror, RemoteRepository, TracingReporter,
};

#[derive(Parser)]
#[command(name = "ghmirror")]
#[command(about = "A GitHub mirroring tool")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to XDG config location)
    #[arg(long)]
    conf: Option<PathBuf>,

    /// GitHub personal access token (overrides the config)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Classify unknown repositories before syncing
    #[arg(long, conflicts_with = "dry_run")]
    interactive: bool,

    /// Show what would be cloned or fetched without touching anything
    #[arg(long)]
    dry_run: bool,

    /// Only log errors
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Number of repositories synchronized at once
    #[arg(short = 'j', long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.quiet, cli.verbose) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Error: {:#}", e);
            EXIT_FATAL
        }
    };

    std::process::exit(code);
}

/// Initialize logging based on verbosity level
fn init_logging(quiet: bool, verbose: bool) -> Result<()> {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init()
        .context("A global subscriber is already installed")?;

    Ok(())
}

async fn run(cli: Cli) -> Result<i32> {
    let config_path = match cli.conf {
        Some(path) => path,
        None => Config::default_config_path().context("Failed to get user config directory")?,
    };

    let (mut config, _) = Config::load_or_generate(&config_path, cli.token.as_deref())?;
    let settings = config.settings(cli.token.as_deref(), cli.workers)?;

    let client = GitHubClient::new(&settings.token)?;
    let mirror = Mirror::new(
        settings,
        Arc::new(client),
        Arc::new(GitCli::new()),
        Arc::new(TracingReporter),
    );

    let mut discovery = mirror.discover().await?;

    if cli.dry_run {
        print_plan(&mirror.plan(&discovery));
        return Ok(0);
    }

    if cli.interactive && !discovery.reconciliation.unknown.is_empty() {
        let delta = classify_unknown(&discovery.reconciliation.unknown)?;
        if !delta.is_empty() {
            config.apply_classification(&delta);
            config
                .save(&config_path)
                .with_context(|| format!("Failed to save classification to {:?}", config_path))?;
            info!("Saved classification to {:?}", config_path);
            discovery.apply_classification(&delta);
        }
    }

    let report = mirror.synchronize(&discovery, cli.interactive).await?;

    info!(
        "Done: {} synced, {} changed, {} failed in {:.1}s",
        report.sync.outcomes.len(),
        report.sync.changed_count(),
        report.sync.failed_count(),
        report.sync.duration.as_secs_f64()
    );

    Ok(report.exit_code())
}

/// Ask the operator about every unknown repository
fn classify_unknown(unknown: &[RemoteRepository]) -> Result<Classification> {
    println!(
        "{} unknown repos found while checking GitHub, please classify them:",
        unknown.len()
    );

    let theme = ColorfulTheme::default();
    let choices = ["Yes, mirror it", "No, exclude it", "Skip for this run"];
    let mut delta = Classification::default();

    for repo in unknown {
        println!();
        println!("📁 {}", repo.name);
        println!("   Fork: {}", if repo.is_fork { "Yes" } else { "No" });
        println!("   🔗 {}", repo.display_url());
        if let Some(description) = &repo.description {
            println!("   📝 {}", description);
        }

        let choice = Select::with_theme(&theme)
            .with_prompt("Track this repository?")
            .items(&choices)
            .default(2)
            .interact()
            .context("Failed to read classification")?;

        match choice {
            0 => {
                println!("Adding {} to the list of repos.", repo.name);
                delta.track(repo);
            }
            1 => {
                println!("Adding {} to the exclusion list.", repo.name);
                delta.exclude(repo);
            }
            _ => println!("Skipping {} for this run.", repo.name),
        }
    }

    Ok(delta)
}

fn print_plan(plan: &[(String, SyncAction)]) {
    println!("Repositories ({}):", plan.len());
    for (name, action) in plan {
        println!("  📁 {} ({})", name, action);
    }
}
