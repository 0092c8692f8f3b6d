//! Argument parsing and command dispatch for the `drivesync` binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drivesync_sync::{
    DriveConfig, PullOptions, PushOptions, SyncEngine, SyncEntry, SyncReport, TransferConfig,
};
use drivesync_types::NodeId;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "drivesync")]
#[command(about = "Mirror a local directory to and from a Google Drive folder")]
#[command(version)]
pub struct Cli {
    /// OAuth access token with Drive scope
    #[arg(long, env = "DRIVESYNC_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Drive API base URL
    #[arg(
        long,
        env = "DRIVESYNC_API_BASE_URL",
        default_value = "https://www.googleapis.com",
        global = true
    )]
    pub api_base_url: String,

    /// Abort a transfer after this many seconds without progress
    #[arg(long, default_value_t = 300, global = true)]
    pub idle_timeout: u64,

    /// Upload read buffer size in bytes
    #[arg(long, default_value_t = 8 * 1024 * 1024, global = true)]
    pub chunk_size: usize,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Make the remote folder match the local directory
    Push {
        /// Local directory to read from
        local: PathBuf,
        /// Id of the remote folder
        root: String,
        /// Delete remote entries missing locally
        #[arg(long)]
        delete: bool,
        /// Show what would be done without doing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Make the local directory match the remote folder
    Pull {
        /// Id of the remote sync root
        root: String,
        /// Local directory to write to (created if missing)
        local: PathBuf,
        /// Delete local entries missing remotely
        #[arg(long)]
        delete: bool,
        /// Show what would be done without doing it
        #[arg(long)]
        dry_run: bool,
    },
    /// List remote folders that have been used as sync roots
    Roots,
    /// List the synced content of a remote sync root
    Content {
        /// Id of the remote sync root
        root: String,
    },
}

impl Cli {
    /// Drive settings derived from the flags.
    pub fn drive_config(&self) -> DriveConfig {
        DriveConfig {
            api_base_url: self.api_base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Transfer settings derived from the flags.
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            idle_timeout_secs: self.idle_timeout,
            chunk_size: self.chunk_size,
        }
    }

    /// Log filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "drivesync=debug,drivesync_sync=debug,drivesync_cli=debug"
        } else {
            "warn"
        }
    }
}

fn parse_root(root: &str) -> Result<NodeId> {
    NodeId::parse(root).with_context(|| format!("invalid remote root id {root:?}"))
}

fn summarize(report: &SyncReport) -> String {
    let mode = if report.dry_run { " (dry run)" } else { "" };
    format!(
        "{} complete{mode}: {} directories created, {} files created, {} files updated, {} deleted",
        capitalize(&report.direction.to_string()),
        report.dirs_created,
        report.files_created,
        report.files_updated,
        report.deleted
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Runs one command against `engine`, writing results to `out`.
///
/// Progress narration goes to the engine's own sink; `out` only receives
/// the final summary or listing.
pub async fn run(command: &Command, engine: &SyncEngine, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::Push {
            local,
            root,
            delete,
            dry_run,
        } => {
            let root = parse_root(root)?;
            let options = PushOptions {
                delete_extraneous: *delete,
                dry_run: *dry_run,
            };
            let report = engine
                .push(local, &root, options)
                .await
                .with_context(|| format!("push {} -> {root} failed", local.display()))?;
            writeln!(out, "{}", summarize(&report))?;
        }
        Command::Pull {
            root,
            local,
            delete,
            dry_run,
        } => {
            let root = parse_root(root)?;
            let options = PullOptions {
                delete_extraneous: *delete,
                dry_run: *dry_run,
            };
            let report = engine
                .pull(&root, local, options)
                .await
                .with_context(|| format!("pull {root} -> {} failed", local.display()))?;
            writeln!(out, "{}", summarize(&report))?;
        }
        Command::Roots => {
            let roots = engine
                .list_sync_roots()
                .await
                .context("listing sync roots failed")?;
            if roots.is_empty() {
                writeln!(out, "No sync roots found")?;
            }
            for node in roots {
                writeln!(out, "{}\t{}", node.id, node.name)?;
            }
        }
        Command::Content { root } => {
            let root = parse_root(root)?;
            let entries = engine
                .list_content(&root)
                .await
                .with_context(|| format!("listing content of {root} failed"))?;
            for entry in entries {
                if entry.is_dir() {
                    writeln!(out, "{}/", entry.rel_path)?;
                } else {
                    writeln!(out, "{}\t{}", entry.rel_path, entry.node.size)?;
                }
            }
        }
    }
    Ok(())
}
