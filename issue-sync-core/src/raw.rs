//! Typed view of one upstream issue/PR record.
//!
//! Decoding is the only place that touches untyped JSON: required fields are checked
//! here, optional ones become `Option`s, and the label list is kept loose so a
//! malformed list cannot fail the record.

use serde::Deserialize;
use serde_json::Value;

use crate::error::NormalizeError;
use crate::record::RecordId;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawUser {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawReactions {
    pub total_count: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawIssue {
    pub id: RecordId,
    pub number: i64,
    pub title: String,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
    pub user: RawUser,
    pub html_url: String,
    pub comments: i64,
    pub reactions: RawReactions,

    #[serde(default)]
    pub closed_at: Option<String>,
    #[serde(default)]
    pub state_reason: Option<String>,
    #[serde(default)]
    pub draft: Option<bool>,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// Left untyped; see [`crate::normalize`] for how entries are read.
    #[serde(default)]
    pub labels: Option<Value>,

    /// Set when the upstream object carries a `pull_request` key at all.
    #[serde(skip)]
    pub is_pull_request: bool,
}

impl RawIssue {
    /// Decode one upstream JSON object.
    pub fn from_value(value: Value) -> Result<Self, NormalizeError> {
        let is_pull_request = value
            .as_object()
            .is_some_and(|obj| obj.contains_key("pull_request"));
        let id = value
            .get("id")
            .and_then(|v| serde_json::from_value::<RecordId>(v.clone()).ok());

        let mut issue: RawIssue =
            serde_json::from_value(value).map_err(|source| NormalizeError::Decode { id, source })?;
        issue.is_pull_request = is_pull_request;
        Ok(issue)
    }
}
