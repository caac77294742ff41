//! tracker-sync - GitHub/ZenHub → Jira synchronization
//!
//! Main entry point for the tracker-sync CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracker_sync::config::{validate_config, validate_config_result, SyncConfig, Synchronization};
use tracker_sync::integrations::{
    GitHubAdapter, GitHubApi, JiraAdapter, JiraCredentials, ZenHubAdapter,
};
use tracker_sync::sync::{Services, SyncReport, Synchronizer};
use tracker_sync::{Result, ResultExt, SyncError};

/// Synchronize GitHub issues, ZenHub boards and releases into Jira
#[derive(Parser, Debug)]
#[command(name = "tracker-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/tracker-sync/config.yaml)
    #[arg(short, long, env = "TRACKER_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log every diff decision
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every configured synchronization once
    Run {
        /// Only synchronize this repository (owner/repository)
        #[arg(long)]
        only: Option<String>,
    },

    /// Check the configuration without contacting any service
    Validate,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = tracker_sync::logging::init(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match cli.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::load_default()?,
    };

    match cli.command {
        Commands::Validate => handle_validate(&config),
        Commands::Run { only } => handle_run(&config, only.as_deref()).await,
    }
}

fn handle_validate(config: &SyncConfig) -> Result<()> {
    match validate_config(config) {
        Ok(()) => {
            println!(
                "Configuration is valid ({} synchronizations)",
                config.synchronizations.len()
            );
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                println!("  - {}", error);
            }
            Err(SyncError::Config(format!(
                "{} configuration problems",
                errors.len()
            )))
        }
    }
}

async fn handle_run(config: &SyncConfig, only: Option<&str>) -> Result<()> {
    validate_config_result(config)?;

    let selected: Vec<&Synchronization> = match only {
        Some(slug) => match config.find(slug) {
            Some(sync) => vec![sync],
            None => {
                return Err(SyncError::Config(format!(
                    "No synchronization configured for {}",
                    slug
                )))
            }
        },
        None => config.synchronizations.iter().collect(),
    };

    let mut failures = 0;
    for sync in selected {
        match synchronize(config, sync).await {
            Ok(report) => {
                println!("{}: {}", sync.slug(), report);
            }
            Err(e) => {
                tracing::error!(repository = %sync.slug(), error = %e, "Synchronization failed");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(SyncError::Other(format!(
            "{} synchronizations failed",
            failures
        )));
    }
    Ok(())
}

async fn synchronize(config: &SyncConfig, sync: &Synchronization) -> Result<SyncReport> {
    let options = config.options_for(sync)?;

    let mut github = GitHubAdapter::new(
        config.github_api_url.as_deref(),
        &sync.github_owner,
        &sync.github_repository,
    )?;
    if let Some(token) = config.github_token() {
        github = github.with_token(token);
    }
    let repository = github
        .get_repository()
        .await
        .context(|| format!("get GitHub repository {}", sync.slug()))?;

    let zenhub = ZenHubAdapter::new(
        config.zenhub_api_url.as_deref(),
        &config.zenhub_api_token,
        repository.id,
    )?;
    let jira = JiraAdapter::new(
        &config.jira_uri,
        &config.jira_project_key,
        sync.jira_board_id,
        JiraCredentials {
            user: config.jira_authentication.user.clone(),
            password: config.jira_authentication.password.clone(),
        },
    )?;

    let services = Services {
        github: &github,
        zenhub: &zenhub,
        jira: &jira,
    };
    let synchronizer = Synchronizer::init(services, repository, options).await?;
    synchronizer.run().await
}
