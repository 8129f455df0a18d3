//! Classification of records into new, changed, deleted and unchanged.
//!
//! [`compute_change_set`] is a pure function of the previous snapshot and the freshly
//! normalized set. Every id from either input lands in exactly one partition, and the
//! upload set is `new ∪ changed`.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::equality::FieldComparator;
use crate::error::{ChangeSetError, Side};
use crate::record::{NormalizedRecord, RecordId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub new: BTreeSet<RecordId>,
    pub changed: BTreeSet<RecordId>,
    pub deleted: BTreeSet<RecordId>,
    pub unchanged: BTreeSet<RecordId>,
    /// New records first, then changed ones, each in id order.
    upload: Vec<NormalizedRecord>,
}

impl ChangeSet {
    pub fn upload_len(&self) -> usize {
        self.upload.len()
    }

    pub fn is_noop(&self) -> bool {
        self.upload.is_empty() && self.deleted.is_empty()
    }
}

/// The records that must be pushed to the index: `new ∪ changed`.
pub fn records_to_upload(change_set: &ChangeSet) -> Vec<NormalizedRecord> {
    change_set.upload.clone()
}

fn index_by_id(
    records: &[NormalizedRecord],
    side: Side,
) -> Result<BTreeMap<&RecordId, &NormalizedRecord>, ChangeSetError> {
    let mut map = BTreeMap::new();
    for record in records {
        if map.insert(&record.id, record).is_some() {
            return Err(ChangeSetError::DuplicateId {
                id: record.id.clone(),
                side,
            });
        }
    }
    Ok(map)
}

pub fn compute_change_set(
    previous: &[NormalizedRecord],
    current: &[NormalizedRecord],
    comparator: &FieldComparator,
) -> Result<ChangeSet, ChangeSetError> {
    let prev = index_by_id(previous, Side::Previous)?;
    let curr = index_by_id(current, Side::Current)?;

    let mut set = ChangeSet::default();
    let mut changed_records = Vec::new();

    for (id, record) in &curr {
        match prev.get(id) {
            None => {
                debug!(id = %id, "New record");
                set.new.insert((*id).clone());
                set.upload.push((*record).clone());
            }
            Some(old) if comparator.fields_equal(&old.fields, &record.fields) => {
                set.unchanged.insert((*id).clone());
            }
            Some(old) => {
                let differing = comparator.differing_fields(&old.fields, &record.fields);
                debug!(id = %id, fields = ?differing, "Record changed");
                set.changed.insert((*id).clone());
                changed_records.push((*record).clone());
            }
        }
    }
    set.upload.extend(changed_records);

    for id in prev.keys().filter(|id| !curr.contains_key(*id)) {
        debug!(id = %id, "Record deleted");
        set.deleted.insert((*id).clone());
    }

    info!(
        new = set.new.len(),
        changed = set.changed.len(),
        deleted = set.deleted.len(),
        unchanged = set.unchanged.len(),
        "Computed change set"
    );
    Ok(set)
}
