//! Live and replay runs behind one interface.
//!
//! [`LiveStrategy`] fetches from upstream, archives the raw response, uploads the
//! upload set and replaces the snapshot. [`ReplayStrategy`] reads the archived raw
//! responses and commits nothing, which makes it safe for trying out normalization
//! changes against real data.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use crate::change_set::{records_to_upload, ChangeSet};
use crate::config::{RunMode, SourceRepo};
use crate::contract::{Fetcher, IndexUploader, RawArchive, SnapshotStore};
use crate::error::SyncError;
use crate::snapshot::Snapshot;

/// What a commit actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    pub uploaded: usize,
    pub snapshot_written: bool,
}

#[async_trait]
pub trait RunStrategy: Send + Sync {
    fn mode(&self) -> RunMode;

    /// Raw upstream records for one source.
    async fn acquire(&self, source: &SourceRepo) -> Result<Vec<Value>, SyncError>;

    /// Apply the outcome of a run. `current` is the full freshly normalized set.
    async fn commit(
        &self,
        snapshots: &dyn SnapshotStore,
        current: &Snapshot,
        change_set: &ChangeSet,
    ) -> Result<CommitOutcome, SyncError>;
}

pub struct LiveStrategy<F, U, A> {
    fetcher: F,
    uploader: U,
    archive: A,
    max_pages: Option<u32>,
}

impl<F, U, A> LiveStrategy<F, U, A>
where
    F: Fetcher,
    U: IndexUploader,
    A: RawArchive,
{
    pub fn new(fetcher: F, uploader: U, archive: A, max_pages: Option<u32>) -> Self {
        Self {
            fetcher,
            uploader,
            archive,
            max_pages,
        }
    }
}

#[async_trait]
impl<F, U, A> RunStrategy for LiveStrategy<F, U, A>
where
    F: Fetcher,
    U: IndexUploader,
    A: RawArchive,
{
    fn mode(&self) -> RunMode {
        RunMode::Live
    }

    async fn acquire(&self, source: &SourceRepo) -> Result<Vec<Value>, SyncError> {
        info!(source = source.name(), max_pages = ?self.max_pages, "[LIVE] Fetching source");
        let raw = self
            .fetcher
            .fetch(source, self.max_pages)
            .await
            .map_err(|error| {
                error!(source = source.name(), error = %error, "[LIVE] Fetch failed");
                SyncError::Fetch {
                    source_name: source.name().to_owned(),
                    error,
                }
            })?;
        info!(source = source.name(), count = raw.len(), "[LIVE] Fetched raw records");

        self.archive.save(source, &raw).map_err(|error| SyncError::Archive {
            source_name: source.name().to_owned(),
            error,
        })?;
        Ok(raw)
    }

    async fn commit(
        &self,
        snapshots: &dyn SnapshotStore,
        current: &Snapshot,
        change_set: &ChangeSet,
    ) -> Result<CommitOutcome, SyncError> {
        let batch = records_to_upload(change_set);
        if batch.is_empty() {
            info!("[LIVE] Nothing to upload");
        } else {
            info!(count = batch.len(), "[LIVE] Uploading records");
            self.uploader.upload(&batch).await.map_err(|e| {
                error!(error = %e, "[LIVE] Upload failed, snapshot left untouched");
                SyncError::Upload(e)
            })?;
        }

        snapshots.save(current).map_err(SyncError::Snapshot)?;
        Ok(CommitOutcome {
            uploaded: batch.len(),
            snapshot_written: true,
        })
    }
}

pub struct ReplayStrategy<A> {
    archive: A,
}

impl<A: RawArchive> ReplayStrategy<A> {
    pub fn new(archive: A) -> Self {
        Self { archive }
    }
}

#[async_trait]
impl<A: RawArchive> RunStrategy for ReplayStrategy<A> {
    fn mode(&self) -> RunMode {
        RunMode::Replay
    }

    async fn acquire(&self, source: &SourceRepo) -> Result<Vec<Value>, SyncError> {
        self.archive.load(source).map_err(|error| SyncError::Archive {
            source_name: source.name().to_owned(),
            error,
        })
    }

    async fn commit(
        &self,
        _snapshots: &dyn SnapshotStore,
        _current: &Snapshot,
        change_set: &ChangeSet,
    ) -> Result<CommitOutcome, SyncError> {
        info!(
            would_upload = change_set.upload_len(),
            "[REPLAY] Skipping upload and snapshot write"
        );
        Ok(CommitOutcome::default())
    }
}
