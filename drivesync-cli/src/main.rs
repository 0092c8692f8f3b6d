//! drivesync: one-way mirroring between a local directory and Google Drive.
//!
//! Usage:
//!   drivesync push ./photos <folder-id> --delete
//!   drivesync pull <folder-id> ./photos
//!   drivesync roots
//!
//! The access token is read from `--token` or `DRIVESYNC_ACCESS_TOKEN`.

use anyhow::{Context, Result, bail};
use clap::Parser;
use drivesync_cli::{Cli, run};
use drivesync_sync::{DriveStore, SyncEngine, WriterSink};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let Some(token) = cli.token.as_deref() else {
        bail!("no access token: pass --token or set DRIVESYNC_ACCESS_TOKEN");
    };

    let store = DriveStore::new(cli.drive_config()).context("failed to set up Drive client")?;
    store.set_access_token(token).await;

    let engine = SyncEngine::new(Arc::new(store), Arc::new(WriterSink::new(std::io::stdout())))
        .with_transfer_config(cli.transfer_config())?;
    info!("drivesync {} using {}", env!("CARGO_PKG_VERSION"), engine.provider_name());

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    run(&cli.command, &engine, &mut stdout).await
}
