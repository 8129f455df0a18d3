use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::equality::DEFAULT_UNORDERED_FIELDS;
use crate::error::ConfigError;
use crate::record::Fields;

/// Whether a run talks to the outside world or replays archived responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Fetch, archive, upload and replace the snapshot.
    #[default]
    Live,
    /// Read archived raw responses; upload nothing, write nothing.
    Replay,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Live => f.write_str("live"),
            RunMode::Replay => f.write_str("replay"),
        }
    }
}

/// One upstream repository to sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRepo {
    pub owner: String,
    pub repo: String,
    /// Name used in logs and archive file names. Defaults to `repo`.
    #[serde(default)]
    pub name: Option<String>,
    /// Key/values merged into every document of this source (e.g. `repo: loculus`).
    #[serde(default)]
    pub extra: Fields,
}

impl SourceRepo {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            name: None,
            extra: Fields::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_owned(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.repo)
    }

    /// `name()` with path separators replaced, used in per-source file names.
    pub fn file_stem(&self) -> String {
        self.name().replace(&['/', '\\', ':'][..], "_")
    }

    /// `owner/repo`, for messages.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

fn default_unordered_fields() -> Vec<String> {
    DEFAULT_UNORDERED_FIELDS
        .iter()
        .map(|f| f.to_string())
        .collect()
}

/// Everything one sync run needs, independent of network credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub mode: RunMode,
    pub data_dir: PathBuf,
    #[serde(default)]
    pub max_pages: Option<u32>,
    #[serde(default = "default_unordered_fields")]
    pub unordered_fields: Vec<String>,
    #[serde(default)]
    pub sources: Vec<SourceRepo>,
}

impl SyncConfig {
    pub fn new(data_dir: impl Into<PathBuf>, sources: Vec<SourceRepo>) -> Self {
        Self {
            mode: RunMode::Live,
            data_dir: data_dir.into(),
            max_pages: None,
            unordered_fields: default_unordered_fields(),
            sources,
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("formatted_issues.json")
    }

    /// Source names key the raw archive files, so they must be unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: BTreeMap<String, &SourceRepo> = BTreeMap::new();
        for source in &self.sources {
            if let Some(first) = seen.insert(source.file_stem(), source) {
                return Err(ConfigError::DuplicateSourceName {
                    name: source.file_stem(),
                    first: first.slug(),
                    second: source.slug(),
                });
            }
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            mode = %self.mode,
            data_dir = %self.data_dir.display(),
            sources_count = self.sources.len(),
            max_pages = ?self.max_pages,
            "Loaded SyncConfig"
        );
        for source in &self.sources {
            info!(owner = %source.owner, repo = %source.repo, name = source.name(), "Loaded source");
        }
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}
