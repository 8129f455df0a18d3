//! High-level pipeline: orchestrates fetch → normalize → diff → commit for all sources.
//!
//! One run:
//!   - acquires the raw records of every configured source, in order, through the
//!     [`RunStrategy`] (live fetch or replay from the raw archive)
//!   - decodes and normalizes them, merging each source's extra key/values
//!   - loads the previous snapshot once and computes the [`ChangeSet`]
//!   - hands the change set to the strategy to commit (upload, then replace snapshot)
//!
//! # Error Handling
//! Any failure returns immediately. Nothing is committed before every source has been
//! acquired and normalized, so a failed run never touches the stored snapshot.

use std::fmt;
use tracing::{error, info, info_span, Instrument};

use crate::change_set::{compute_change_set, ChangeSet};
use crate::config::{RunMode, SyncConfig};
use crate::contract::SnapshotStore;
use crate::equality::FieldComparator;
use crate::error::SyncError;
use crate::normalize::normalize_all;
use crate::snapshot::Snapshot;
use crate::strategy::RunStrategy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source_name: String,
    pub fetched: usize,
    pub normalized: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: RunMode,
    pub sources: Vec<SourceReport>,
    pub new: usize,
    pub changed: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub uploaded: usize,
    pub snapshot_written: bool,
}

impl SyncReport {
    fn from_parts(mode: RunMode, sources: Vec<SourceReport>, set: &ChangeSet) -> Self {
        Self {
            mode,
            sources,
            new: set.new.len(),
            changed: set.changed.len(),
            deleted: set.deleted.len(),
            unchanged: set.unchanged.len(),
            uploaded: 0,
            snapshot_written: false,
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mode: {}", self.mode)?;
        for source in &self.sources {
            writeln!(
                f,
                "Source {}: {} fetched, {} normalized",
                source.source_name, source.fetched, source.normalized
            )?;
        }
        writeln!(f, "New: {}", self.new)?;
        writeln!(f, "Changed: {}", self.changed)?;
        writeln!(f, "Deleted: {}", self.deleted)?;
        writeln!(f, "Unchanged: {}", self.unchanged)?;
        writeln!(f, "Uploaded: {}", self.uploaded)?;
        write!(
            f,
            "Snapshot: {}",
            if self.snapshot_written { "written" } else { "not written" }
        )
    }
}

pub async fn synchronise<S>(
    config: &SyncConfig,
    snapshots: &dyn SnapshotStore,
    strategy: &S,
) -> Result<SyncReport, SyncError>
where
    S: RunStrategy + ?Sized,
{
    info!(mode = %strategy.mode(), sources = config.sources.len(), "[SYNC] Starting synchronisation");
    config.validate().map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Invalid source configuration");
        e
    })?;

    let mut current = Vec::new();
    let mut source_reports = Vec::with_capacity(config.sources.len());

    for source in &config.sources {
        let span = info_span!("source", name = source.name());
        let raw = strategy.acquire(source).instrument(span.clone()).await?;
        let fetched = raw.len();

        let records = span.in_scope(|| normalize_all(raw, &source.extra)).map_err(|error| {
            error!(source = source.name(), error = %error, "[SYNC][ERROR] Normalization failed");
            SyncError::Normalize {
                source_name: source.name().to_owned(),
                error,
            }
        })?;
        info!(source = source.name(), fetched, normalized = records.len(), "[SYNC] Source done");

        source_reports.push(SourceReport {
            source_name: source.name().to_owned(),
            fetched,
            normalized: records.len(),
        });
        current.extend(records);
    }

    let previous = snapshots.load().map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Failed to load snapshot");
        SyncError::Snapshot(e)
    })?;
    if previous.is_empty() {
        info!("[SYNC] Previous snapshot is empty, every record counts as new");
    }

    let comparator = FieldComparator::new(config.unordered_fields.iter().cloned());
    let current = Snapshot::new(current);
    let change_set = compute_change_set(previous.records(), current.records(), &comparator)?;

    let mut report = SyncReport::from_parts(strategy.mode(), source_reports, &change_set);
    let outcome = strategy.commit(snapshots, &current, &change_set).await?;
    report.uploaded = outcome.uploaded;
    report.snapshot_written = outcome.snapshot_written;

    info!(
        new = report.new,
        changed = report.changed,
        deleted = report.deleted,
        unchanged = report.unchanged,
        uploaded = report.uploaded,
        snapshot_written = report.snapshot_written,
        "[SYNC] Synchronisation complete"
    );
    Ok(report)
}
