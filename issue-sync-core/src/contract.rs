#![allow(unused)]

//! # contract: interfaces to everything outside the core
//!
//! The core never talks to the network or the filesystem directly. It goes through
//! the traits below:
//!
//! - [`Fetcher`]: lists raw issue/PR records of one source repository.
//! - [`IndexUploader`]: pushes a batch of documents to the search index.
//! - [`SnapshotStore`]: loads and replaces the last uploaded snapshot.
//! - [`RawArchive`]: keeps one raw-response blob per source for replay runs.
//!
//! Network-backed implementations live in the CLI crate; file-backed stores live in
//! [`crate::snapshot`]. All traits are annotated for `mockall` so tests can drive the
//! pipeline deterministically.

use async_trait::async_trait;
use mockall::{automock, predicate::*};

use crate::config::SourceRepo;
use crate::record::NormalizedRecord;
use crate::snapshot::Snapshot;

/// Error type for Fetcher (simple boxed error)
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for IndexUploader
pub type UploadError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for SnapshotStore and RawArchive
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Lists every raw record of a source repository.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Paginate until an empty page, or until `max_pages` pages have been read.
    ///
    /// Network and authorization failures are returned as errors; nothing is retried.
    async fn fetch(
        &self,
        source: &SourceRepo,
        max_pages: Option<u32>,
    ) -> Result<Vec<serde_json::Value>, FetchError>;
}

/// Pushes documents to the search index.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait IndexUploader: Send + Sync {
    /// Upsert `batch` keyed by `objectID`.
    ///
    /// Must not return `Ok` before the index has applied every document. Chunking is
    /// the implementor's concern.
    async fn upload(&self, batch: &[NormalizedRecord]) -> Result<(), UploadError>;
}

/// Persists the full set of normalized records between runs.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait SnapshotStore: Send + Sync {
    /// Missing snapshot on a first run is an empty snapshot, not an error.
    fn load(&self) -> Result<Snapshot, StoreError>;

    /// Replace the stored snapshot wholesale.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

/// Stores the raw upstream response of each source.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait RawArchive: Send + Sync {
    fn load(&self, source: &SourceRepo) -> Result<Vec<serde_json::Value>, StoreError>;

    fn save(&self, source: &SourceRepo, raw: &[serde_json::Value]) -> Result<(), StoreError>;
}
