//! CaseBridge - GitHub/support-case sync bridge
//!
//! Main entry point for the CaseBridge CLI. Each subcommand maps onto
//! one orchestrator operation, invoked once per external event.

use casebridge::clients::{GitHubClient, SalesforceClient};
use casebridge::config::BridgeConfig;
use casebridge::sync::{SyncAction, SyncOrchestrator};
use clap::{Parser, Subcommand};
use std::process;

/// CaseBridge - sync GitHub issues/PRs with support cases
#[derive(Parser, Debug)]
#[command(name = "casebridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/casebridge/config.yaml)
    #[arg(short, long)]
    config: Option<String>,

    /// GitHub token (overrides GITHUB_TOKEN)
    #[arg(long, env = "CASEBRIDGE_GITHUB_TOKEN")]
    github_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a GitHub issue from a support case
    CaseToIssue {
        /// Case Id (e.g., 500XXXXXXXXXXXX)
        case_id: String,
    },

    /// Create or update the linked case from an issue
    IssueToCase {
        /// Repository as owner/name
        repo: String,

        /// Issue number
        number: u64,
    },

    /// Propagate an issue comment to the linked case
    Comment {
        /// Repository as owner/name
        repo: String,

        /// Issue number
        number: u64,

        /// Comment text
        body: String,
    },

    /// Propagate a case comment to the linked issue
    CaseComment {
        /// Case Id (e.g., 500XXXXXXXXXXXX)
        case_id: String,

        /// Comment text
        body: String,
    },

    /// Propagate an issue state change to the linked case
    Status {
        /// Repository as owner/name
        repo: String,

        /// Issue number
        number: u64,

        /// New state (open, closed)
        state: String,
    },

    /// Propagate a case status change to the linked issue
    CaseStatus {
        /// Case Id (e.g., 500XXXXXXXXXXXX)
        case_id: String,

        /// New case status (e.g., Closed)
        status: String,
    },

    /// Post a sync-failure comment and error label on an issue
    Notify {
        /// Repository as owner/name
        repo: String,

        /// Issue number
        number: u64,

        /// Error text to report
        error: String,
    },

    /// Handle a merged pull request (closes the linked case if configured)
    Merged {
        /// Repository as owner/name
        repo: String,

        /// Pull request number
        number: u64,
    },

    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() {
    if let Err(e) = casebridge::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> casebridge::Result<()> {
    if let Commands::Init = cli.command {
        let path = BridgeConfig::default_path();
        BridgeConfig::new().save(&path)?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let config = match cli.config {
        Some(ref path) => BridgeConfig::load(path)?,
        None => {
            let path = BridgeConfig::default_path();
            if path.exists() {
                BridgeConfig::load(&path)?
            } else {
                BridgeConfig::new()
            }
        }
    };

    let mut github = GitHubClient::new()?;
    if let Some(token) = cli.github_token {
        github = github.with_token(token);
    }
    let salesforce = SalesforceClient::new(config.salesforce.instance_url.clone());

    let orchestrator = SyncOrchestrator::new(github, salesforce, config);

    // Best-effort operation with a bool result rather than an outcome
    if let Commands::Notify {
        ref repo,
        number,
        ref error,
    } = cli.command
    {
        let ok = orchestrator.notify_sync_failure(repo, number, error).await;
        println!(
            "{}",
            if ok {
                "Failure notification posted"
            } else {
                "Failure notification could not be posted"
            }
        );
        return Ok(());
    }

    let outcome = match cli.command {
        Commands::CaseToIssue { ref case_id } => orchestrator.sync_case_to_issue(case_id).await?,
        Commands::IssueToCase { ref repo, number } => {
            orchestrator.sync_issue_to_case(repo, number).await?
        }
        Commands::Comment {
            ref repo,
            number,
            ref body,
        } => orchestrator.sync_comment_to_case(repo, number, body).await?,
        Commands::CaseComment {
            ref case_id,
            ref body,
        } => orchestrator.sync_comment_to_issue(case_id, body).await?,
        Commands::Status {
            ref repo,
            number,
            ref state,
        } => orchestrator.sync_status_to_case(repo, number, state).await?,
        Commands::CaseStatus {
            ref case_id,
            ref status,
        } => orchestrator.sync_status_to_issue(case_id, status).await?,
        Commands::Merged { ref repo, number } => {
            orchestrator.handle_pr_merge(repo, number).await?
        }
        Commands::Init | Commands::Notify { .. } => unreachable!("handled above"),
    };

    match outcome.action {
        SyncAction::NotLinked => {
            println!(
                "Not linked: {}",
                outcome.reason.as_deref().unwrap_or("no sync record")
            );
        }
        ref action => {
            println!(
                "{:?}: case={} issue={}",
                action,
                outcome.case_id.as_deref().unwrap_or("-"),
                outcome
                    .issue_number
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }

    Ok(())
}
