//! Maps one raw upstream record to a flat [`NormalizedRecord`].
//!
//! The output field set is fixed and deterministic:
//! `number`, `title`, `body`, `state`, `labels`, `created_at`, `updated_at`, `closed_at`,
//! `user`, `url`, `comments`, `reactions`, `type`, followed by the caller's extras.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::error::NormalizeError;
use crate::raw::RawIssue;
use crate::record::{Fields, NormalizedRecord, RecordId};

/// Upper bound on the `body` field, in characters.
pub const MAX_BODY_CHARS: usize = 2000;

const ID_FIELD: &str = "objectID";

/// Decode and normalize every raw record of one source.
pub fn normalize_all(
    values: Vec<Value>,
    extra: &Fields,
) -> Result<Vec<NormalizedRecord>, NormalizeError> {
    let records = values
        .into_iter()
        .map(|value| {
            let raw = RawIssue::from_value(value)?;
            normalize(&raw, extra)
        })
        .collect::<Result<Vec<_>, _>>()?;
    info!(count = records.len(), "Normalized records");
    Ok(records)
}

pub fn normalize(raw: &RawIssue, extra: &Fields) -> Result<NormalizedRecord, NormalizeError> {
    let mut fields = Fields::new();
    fields.insert("number".into(), json!(raw.number));
    fields.insert("title".into(), json!(raw.title));
    fields.insert("body".into(), json!(truncated_body(raw)));
    fields.insert("state".into(), json!(raw.state));
    fields.insert("labels".into(), json!(labels(raw)));
    fields.insert(
        "created_at".into(),
        json!(epoch_seconds(&raw.id, "created_at", Some(&raw.created_at))?),
    );
    fields.insert(
        "updated_at".into(),
        json!(epoch_seconds(&raw.id, "updated_at", Some(&raw.updated_at))?),
    );
    fields.insert(
        "closed_at".into(),
        json!(epoch_seconds(&raw.id, "closed_at", raw.closed_at.as_deref())?),
    );
    fields.insert("user".into(), json!(raw.user.login));
    fields.insert("url".into(), json!(raw.html_url));
    fields.insert("comments".into(), json!(raw.comments));
    fields.insert("reactions".into(), json!(raw.reactions.total_count));
    fields.insert("type".into(), json!(record_type(raw)));

    for (key, value) in extra {
        if key == ID_FIELD {
            warn!(id = %raw.id, "Ignoring extra key that would override the record id");
            continue;
        }
        if let Some(previous) = fields.insert(key.clone(), value.clone()) {
            warn!(id = %raw.id, key = %key, ?previous, "Extra key overrides a computed field");
        }
    }

    Ok(NormalizedRecord::new(raw.id.clone(), fields))
}

pub fn record_type(raw: &RawIssue) -> &'static str {
    if raw.is_pull_request {
        "pull_request"
    } else {
        "issue"
    }
}

/// First non-empty body candidate, cut to [`MAX_BODY_CHARS`] characters.
pub fn truncated_body(raw: &RawIssue) -> String {
    // Plain-text rendition first, then markdown.
    [raw.body_text.as_deref(), raw.body.as_deref()]
        .into_iter()
        .flatten()
        .find(|body| !body.is_empty())
        .map(|body| body.chars().take(MAX_BODY_CHARS).collect())
        .unwrap_or_default()
}

/// Upstream label names plus labels derived from the record's shape. Sorted, unique.
pub fn labels(raw: &RawIssue) -> Vec<String> {
    let mut names: BTreeSet<String> = BTreeSet::new();

    match &raw.labels {
        Some(Value::Array(entries)) => {
            for entry in entries {
                match entry.get("name").and_then(Value::as_str) {
                    Some(name) if !name.is_empty() => {
                        names.insert(name.to_owned());
                    }
                    _ => debug!(id = %raw.id, ?entry, "Skipping label entry without a name"),
                }
            }
        }
        other => {
            warn!(id = %raw.id, labels = ?other, "Label list is not an array, using no upstream labels");
        }
    }

    names.insert(record_type(raw).to_owned());
    if !raw.state.is_empty() {
        names.insert(raw.state.clone());
    }
    if let Some(reason) = &raw.state_reason {
        names.insert(reason.clone());
    }
    if raw.draft.unwrap_or(false) {
        names.insert("draft".to_owned());
    }

    names.into_iter().collect()
}

/// ISO-8601 to epoch seconds. `None` and empty strings map to `None`.
pub fn epoch_seconds(
    id: &RecordId,
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<i64>, NormalizeError> {
    let Some(text) = value.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(Some(parsed.timestamp()));
    }
    // Offset-less timestamps are UTC.
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        // Date only: midnight UTC.
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Some(naive.and_utc().timestamp()))
        .ok_or_else(|| NormalizeError::InvalidTimestamp {
            id: id.clone(),
            field,
            value: text.to_owned(),
        })
}
