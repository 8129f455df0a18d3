//! Error types for the sync pipeline.
//!
//! Collaborator traits in [`crate::contract`] return boxed errors; everything the
//! core itself can detect has a typed variant here.

use crate::record::RecordId;
use thiserror::Error;

/// Which input of a change-set computation an id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Previous,
    Current,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Previous => f.write_str("previous snapshot"),
            Side::Current => f.write_str("current record set"),
        }
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A required field was missing or had the wrong type.
    #[error("failed to decode upstream record{}: {source}", id_suffix(.id))]
    Decode {
        id: Option<RecordId>,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {id}: field `{field}` is not a valid timestamp: {value:?}")]
    InvalidTimestamp {
        id: RecordId,
        field: &'static str,
        value: String,
    },
}

fn id_suffix(id: &Option<RecordId>) -> String {
    match id {
        Some(id) => format!(" {id}"),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum ChangeSetError {
    #[error("duplicate id {id} in {side}")]
    DuplicateId { id: RecordId, side: Side },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Two sources would share one raw archive file.
    #[error("sources {first} and {second} both resolve to name `{name}`; set a distinct `name` on one of them")]
    DuplicateSourceName {
        name: String,
        first: String,
        second: String,
    },
}

/// Failure of a whole run. Every stage names the source it failed on where one applies.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("fetch failed for source {source_name}: {error}")]
    Fetch {
        source_name: String,
        error: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("raw archive failed for source {source_name}: {error}")]
    Archive {
        source_name: String,
        error: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("normalization failed for source {source_name}: {error}")]
    Normalize {
        source_name: String,
        #[source]
        error: NormalizeError,
    },

    #[error(transparent)]
    ChangeSet(#[from] ChangeSetError),

    #[error("snapshot store failed: {0}")]
    Snapshot(Box<dyn std::error::Error + Send + Sync>),

    #[error("upload failed: {0}")]
    Upload(Box<dyn std::error::Error + Send + Sync>),
}
