//! File-backed persistence: the normalized snapshot and the per-source raw archive.
//!
//! Both files are pretty-printed JSON with sorted keys so that diffs of the stored
//! artifacts stay reviewable. Writes go through a temporary file in the same
//! directory followed by a rename.

use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::config::SourceRepo;
use crate::contract::{RawArchive, SnapshotStore, StoreError};
use crate::record::NormalizedRecord;

/// The last uploaded full set of normalized records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: Vec<NormalizedRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<NormalizedRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[NormalizedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<NormalizedRecord>> for Snapshot {
    fn from(records: Vec<NormalizedRecord>) -> Self {
        Self::new(records)
    }
}

/// Serialize with every object's keys sorted.
///
/// Going through `Value` uses serde_json's sorted map, which also covers the
/// `objectID` field that `NormalizedRecord` serializes ahead of its flattened fields.
fn to_sorted_pretty_json<T: serde::Serialize>(data: &T) -> Result<String, StoreError> {
    let value = serde_json::to_value(data)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

fn write_atomically(path: &Path, contents: &str) -> Result<(), StoreError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir).map_err(|e| {
            error!(error = ?e, dir = %dir.display(), "Failed to create data directory");
            e
        })?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));
    let written = write_and_sync(&tmp_path, contents).and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        error!(error = ?e, path = %path.display(), "Failed to write file, removing temp file");
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

fn write_and_sync(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut f = fs::File::create(path)?;
    f.write_all(contents.as_bytes())?;
    f.write_all(b"\n")?;
    f.sync_all()
}

pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No snapshot found, starting from an empty snapshot");
            return Ok(Snapshot::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            error!(error = ?e, path = %self.path.display(), "Failed to read snapshot");
            e
        })?;
        let records: Vec<NormalizedRecord> = serde_json::from_str(&content).map_err(|e| {
            error!(error = ?e, path = %self.path.display(), "Failed to parse snapshot");
            e
        })?;
        info!(path = %self.path.display(), count = records.len(), "Loaded snapshot");
        Ok(Snapshot::new(records))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut records: Vec<&NormalizedRecord> = snapshot.records().iter().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        let json = to_sorted_pretty_json(&records)?;
        write_atomically(&self.path, &json)?;
        info!(path = %self.path.display(), count = records.len(), "Saved snapshot");
        Ok(())
    }
}

/// Raw upstream responses, one file per source: `{dir}/issues_{name}.json`.
pub struct FileRawArchive {
    dir: PathBuf,
}

impl FileRawArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, source: &SourceRepo) -> PathBuf {
        self.dir.join(format!("issues_{}.json", source.file_stem()))
    }
}

impl RawArchive for FileRawArchive {
    fn load(&self, source: &SourceRepo) -> Result<Vec<Value>, StoreError> {
        let path = self.path_for(source);
        let content = fs::read_to_string(&path).map_err(|e| {
            error!(error = ?e, path = %path.display(), "Failed to read raw archive");
            format!("failed to read raw archive {}: {e}", path.display())
        })?;
        let raw: Vec<Value> = serde_json::from_str(&content)?;
        info!(source = source.name(), count = raw.len(), "Loaded raw archive");
        Ok(raw)
    }

    fn save(&self, source: &SourceRepo, raw: &[Value]) -> Result<(), StoreError> {
        let path = self.path_for(source);
        let mut sorted: Vec<&Value> = raw.iter().collect();
        sorted.sort_by(|a, b| {
            let url = |v: &Value| v.get("url").and_then(Value::as_str).map(str::to_owned);
            url(*a).cmp(&url(*b))
        });
        let json = to_sorted_pretty_json(&sorted)?;
        write_atomically(&path, &json)?;
        debug!(path = %path.display(), count = sorted.len(), "Saved raw archive");
        Ok(())
    }
}
