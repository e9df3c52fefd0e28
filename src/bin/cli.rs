//! mailindex operator CLI
//!
//! Ad-hoc local access for operators: run the server loop inline, inspect a
//! job's status, run a cleanup policy once against a user's store, and list
//! known users. The HTTP/tool-call surface is out of scope (spec Non-goal);
//! this binary is the ambient operator-facing entrypoint only.

use clap::{Parser, Subcommand};
use colored::Colorize;
use mailindex::bulk::{BatchDeleteOptions, BulkMutator, CleanupActionType, CleanupPolicy, CleanupSafety};
use mailindex::export::JsonExportFormatter;
use mailindex::file_acl::{FileAccessControl, FileAclConfig};
use mailindex::jobs::{CategorizationWorker, JobQueue, JobStore};
use mailindex::prelude::*;
use mailindex::remote::FakeRemoteMailClient;
use mailindex::store::email::CleanupCriteria;
use mailindex::store::StoreRegistry;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "mailindex")]
#[command(about = "Operator CLI for the mailindex categorization/bulk-mutation core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Commands {
    /// Run the categorization worker and expired-file sweep until Ctrl+C.
    Serve,

    /// Show the status of a single job.
    Job {
        #[command(subcommand)]
        action: JobCommands,
    },

    /// Run a cleanup policy once against a user's store.
    Cleanup {
        #[command(subcommand)]
        action: CleanupCommands,
    },

    /// List users with a store on disk.
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
}

#[derive(Subcommand)]
#[clap(rename_all = "kebab-case")]
enum JobCommands {
    Status {
        job_id: String,
        #[arg(long)]
        user: String,
    },
}

#[derive(Subcommand)]
#[clap(rename_all = "kebab-case")]
enum CleanupCommands {
    Run {
        #[arg(long)]
        user: String,
        #[arg(long)]
        policy: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
#[clap(rename_all = "kebab-case")]
enum UserCommands {
    List,
}

/// On-disk shape for `cleanup run --policy <file>`.
#[derive(Debug, Deserialize)]
struct PolicyFile {
    action: String,
    #[serde(default = "default_true")]
    preserve_important: bool,
    max_emails_per_run: Option<usize>,
    #[serde(default = "default_max_failures")]
    max_failures: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_failures() -> usize {
    3
}

impl PolicyFile {
    fn into_policy(self) -> anyhow::Result<CleanupPolicy> {
        let action = match self.action.as_str() {
            "delete" => CleanupActionType::Delete,
            "archive" => CleanupActionType::Archive,
            other => anyhow::bail!("unknown cleanup action '{other}', expected 'delete' or 'archive'"),
        };
        Ok(CleanupPolicy {
            action,
            safety: CleanupSafety {
                preserve_important: self.preserve_important,
                max_emails_per_run: self.max_emails_per_run,
                max_failures: self.max_failures,
            },
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    config.ensure_dirs().await?;
    let registry = Arc::new(StoreRegistry::new(&config.storage_path));

    match cli.command {
        Commands::Serve => run_serve(registry, &config).await?,
        Commands::Job { action: JobCommands::Status { job_id, user } } => {
            run_job_status(registry, &job_id, &user).await?
        }
        Commands::Cleanup { action: CleanupCommands::Run { user, policy, dry_run } } => {
            run_cleanup(registry, &user, &policy, dry_run).await?
        }
        Commands::User { action: UserCommands::List } => run_user_list(registry).await?,
    }

    Ok(())
}

async fn run_serve(registry: Arc<StoreRegistry>, _config: &Config) -> anyhow::Result<()> {
    let cache = Arc::new(Cache::default());
    let job_backing_store = registry.get_legacy().await?;
    let job_store = Arc::new(JobStore::new(job_backing_store));
    let queue = Arc::new(JobQueue::new());
    let worker = CategorizationWorker::new(queue, job_store, registry.clone(), cache, EngineConfig::default());
    worker.start().await;
    info!("worker started, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    worker.stop();
    worker.wait_for_shutdown().await;
    registry.cleanup().await;
    Ok(())
}

async fn run_job_status(registry: Arc<StoreRegistry>, job_id: &str, user_id: &str) -> anyhow::Result<()> {
    let store = registry.get_legacy().await?;
    let job_store = JobStore::new(store);
    match job_store.get(job_id, user_id).await? {
        Some(job) => {
            let status = format!("{:?}", job.status);
            println!("{} {}", "job:".bold(), job.job_id);
            println!("  status: {}", status.cyan());
            println!("  progress: {}", job.progress);
            if let Some(err) = &job.error_details {
                println!("  {}: {}", "error".red(), err);
            }
        }
        None => println!("{}", "no such job for this user".yellow()),
    }
    Ok(())
}

async fn run_cleanup(registry: Arc<StoreRegistry>, user_id: &str, policy_path: &PathBuf, dry_run: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(policy_path)?;
    let policy = serde_json::from_str::<PolicyFile>(&raw)?.into_policy()?;

    let store = registry.get(user_id).await?;
    let candidates = store.get_emails_for_cleanup(&CleanupCriteria::default(), None, Some(user_id)).await?;
    let total = candidates.len();

    let remote = Arc::new(FakeRemoteMailClient::default());
    let file_acl = Arc::new(FileAccessControl::new(store.clone(), FileAclConfig::default()));
    let formatter = Arc::new(JsonExportFormatter);
    let mutator = BulkMutator::new(store, remote, file_acl, formatter);

    let result = mutator
        .batch_delete_for_cleanup(candidates, &policy, BatchDeleteOptions { dry_run, batch_size: None }, user_id)
        .await?;

    println!("{} {total} candidate emails", "cleanup:".bold());
    println!("  deleted: {}", result.deleted.to_string().green());
    println!("  archived: {}", result.archived);
    println!("  failed: {}", result.failed);
    println!("  storage freed: {} bytes", result.storage_freed);
    for err in &result.errors {
        println!("  {}: {err}", "note".yellow());
    }
    Ok(())
}

async fn run_user_list(registry: Arc<StoreRegistry>) -> anyhow::Result<()> {
    let users = registry.list().await?;
    if users.is_empty() {
        println!("{}", "no users found".yellow());
        return Ok(());
    }
    for user in users {
        println!("{user}");
    }
    Ok(())
}
