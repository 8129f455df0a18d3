///
/// This module implements the CLI interface for issue-sync: command parsing, wiring of
/// the concrete clients into the core pipeline, and the user-visible summary.
///
/// All business logic (normalization, change detection, orchestration) lives in the
/// [`issue-sync-core`] crate. This module is strictly glue.
///
/// ## How To Use
/// - From the command line: `issue-sync sync --config sync.yaml [--replay]`.
/// - Programmatically/integration tests: call [`run`] with a constructed [`Cli`].
///
/// [`issue-sync-core`]: ../../issue-sync-core/
use crate::fetch::GitHubFetcher;
use crate::load_config::load_config;
use crate::upload::AlgoliaClient;
use anyhow::Result;
use clap::{Parser, Subcommand};
use issue_sync_core::config::RunMode;
use issue_sync_core::snapshot::{FileRawArchive, FileSnapshotStore};
use issue_sync_core::strategy::{LiveStrategy, ReplayStrategy};
use issue_sync_core::synchronise::synchronise;
use std::path::PathBuf;

/// CLI for issue-sync: keep a search index in step with GitHub issues and pull requests.
#[derive(Parser)]
#[clap(
    name = "issue-sync",
    version,
    about = "Sync GitHub issues and pull requests into a search index, uploading only what changed"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize all configured sources to the search index
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Replay archived responses instead of fetching; uploads and writes nothing
        #[clap(long)]
        replay: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config, replay } => {
            let mut config = load_config(config)?;
            if replay {
                config.sync.mode = RunMode::Replay;
            }
            config.sync.trace_loaded();
            tracing::info!(command = "sync", mode = %config.sync.mode, "Starting synchronisation process");

            let snapshots = FileSnapshotStore::new(config.sync.snapshot_path());
            let archive = FileRawArchive::new(&config.sync.data_dir);
            tracing::info!(snapshot_path = %snapshots.path().display(), "Using snapshot store");

            println!("Synchronise starting...");
            let result = match config.sync.mode {
                RunMode::Live => {
                    let index = config.require_index()?;
                    let fetcher = GitHubFetcher::new(&config.github)
                        .map_err(|e| anyhow::anyhow!("Failed to construct GitHub client: {e}"))?;
                    let uploader = AlgoliaClient::new(index)
                        .map_err(|e| anyhow::anyhow!("Failed to construct index client: {e}"))?;
                    let strategy =
                        LiveStrategy::new(fetcher, uploader, archive, config.sync.max_pages);
                    synchronise(&config.sync, &snapshots, &strategy).await
                }
                RunMode::Replay => {
                    let strategy = ReplayStrategy::new(archive);
                    synchronise(&config.sync, &snapshots, &strategy).await
                }
            };

            match result {
                Ok(report) => {
                    tracing::info!(command = "sync", ?report, "Synchronisation complete");
                    println!("Synchronise complete.\n{report}");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    Err(anyhow::Error::new(e).context("Synchronisation failed"))
                }
            }
        }
    }
}
