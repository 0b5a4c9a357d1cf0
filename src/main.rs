use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commitpress::web::AppState;
use commitpress::{
    ChatSummarizer, Config, GitHubCommitSource, HealthCheck, NetworkPublisher, Publisher, Store,
    Summarizer, SyncEngine, SyncSettings,
};

#[derive(Parser)]
#[command(name = "commitpress")]
#[command(about = "Commit-monitoring and AI dev-blogging assistant")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dashboard HTTP API (default)
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one sync pass and print the report
    Sync,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// System health check and diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("commitpress={}", default_level)));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let command = cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    });

    match command {
        Commands::Serve { host, port } => {
            let config = load_config(&cli.config)?;
            let state = build_state(&config)?;
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            commitpress::web::run_server(state, &host, port, config.server.cors_permissive).await
        }
        Commands::Sync => {
            let config = load_config(&cli.config)?;
            run_sync_once(&config).await
        }
        Commands::Init { force } => init_config(&cli.config, force),
        Commands::Doctor => {
            let config = load_config(&cli.config)?;
            run_doctor(&config)
        }
    }
}

fn load_config(explicit_path: &Option<PathBuf>) -> Result<Config> {
    match explicit_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Wire the store, engine and collaborator clients together
fn build_state(config: &Config) -> Result<AppState> {
    let store = Arc::new(Store::open_at(PathBuf::from(&config.database.path))?);
    let source = Arc::new(GitHubCommitSource::new(&config.github)?);
    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&store),
        source.clone(),
        SyncSettings::from(&config.sync),
    ));

    // The summarizer and publisher are optional: without them the API runs
    // with those endpoints disabled.
    let summarizer: Option<Arc<dyn Summarizer>> = match ChatSummarizer::from_config(&config.ai) {
        Ok(s) => Some(Arc::new(s)),
        Err(e) => {
            warn!("Summary generation disabled: {:#}", e);
            None
        }
    };
    let publisher: Option<Arc<dyn Publisher>> = if config.publishing.enabled {
        Some(Arc::new(NetworkPublisher::from_config(&config.publishing)))
    } else {
        info!("Publishing disabled in configuration");
        None
    };

    Ok(AppState::new(store, engine, source, summarizer, publisher))
}

/// One-shot sync for cron-less manual runs
async fn run_sync_once(config: &Config) -> Result<()> {
    let store = Arc::new(Store::open_at(PathBuf::from(&config.database.path))?);
    let source = Arc::new(GitHubCommitSource::new(&config.github)?);
    let engine = SyncEngine::new(store, source, SyncSettings::from(&config.sync));

    let report = engine.run_sync().await.context("Sync failed")?;

    println!(
        "Synced {} repositories: {} new commits in {}ms",
        report.repositories_processed, report.new_commits, report.duration_ms
    );
    for err in &report.errors {
        println!("  ⚠ {}: {}", err.repository, err.message);
    }

    Ok(())
}

fn init_config(explicit_path: &Option<PathBuf>, force: bool) -> Result<()> {
    let path = match explicit_path {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };

    if path.exists() && !force {
        println!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    Config::default().save(&path)?;
    println!("Configuration initialized at {}", path.display());
    Ok(())
}

fn run_doctor(config: &Config) -> Result<()> {
    println!("Commitpress System Diagnostics");
    println!();

    let health = HealthCheck::run(config);

    for (name, result) in health.all_checks() {
        let symbol = if !result.passed {
            "✗"
        } else if result.is_warning {
            "⚠"
        } else {
            "✓"
        };
        println!("{} {}: {}", symbol, name, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("    {}", line);
            }
        }
    }

    println!();
    if health.all_passed() {
        println!("All required checks passed");
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} required check(s) failed",
            health.errors().len()
        ))
    }
}
