//! Structural equality of document fields.
//!
//! Maps compare by key/value regardless of insertion order. Arrays compare in order,
//! except for the fields listed as unordered, whose arrays compare as multisets.
//! Serialized bytes are never compared.

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::record::Fields;

/// Array-valued fields whose element order carries no meaning.
///
/// `labels` is the only array the normalizer emits; it is a set of names.
pub const DEFAULT_UNORDERED_FIELDS: &[&str] = &["labels"];

#[derive(Debug, Clone)]
pub struct FieldComparator {
    unordered: BTreeSet<String>,
}

impl Default for FieldComparator {
    fn default() -> Self {
        Self::new(DEFAULT_UNORDERED_FIELDS.iter().copied())
    }
}

impl FieldComparator {
    pub fn new<I, S>(unordered_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unordered: unordered_fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_unordered(&self, field: &str) -> bool {
        self.unordered.contains(field)
    }

    pub fn fields_equal(&self, a: &Fields, b: &Fields) -> bool {
        a.len() == b.len()
            && a.iter().all(|(name, left)| match b.get(name) {
                Some(right) => self.value_equal(name, left, right),
                None => false,
            })
    }

    /// Names of fields that are added, removed or differ between `previous` and `current`.
    pub fn differing_fields(&self, previous: &Fields, current: &Fields) -> Vec<String> {
        let names: BTreeSet<&String> = previous.keys().chain(current.keys()).collect();
        names
            .into_iter()
            .filter(|name| match (previous.get(*name), current.get(*name)) {
                (Some(left), Some(right)) => !self.value_equal(name, left, right),
                _ => true,
            })
            .cloned()
            .collect()
    }

    fn value_equal(&self, field: &str, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Array(l), Value::Array(r)) if self.is_unordered(field) => {
                multiset_equal(l, r)
            }
            _ => left == right,
        }
    }
}

fn multiset_equal(left: &[Value], right: &[Value]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut l: Vec<&Value> = left.iter().collect();
    let mut r: Vec<&Value> = right.iter().collect();
    l.sort_by(|a, b| total_cmp(a, b));
    r.sort_by(|a, b| total_cmp(a, b));
    l == r
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// A total order over JSON values, consistent with `==`, used only to sort multisets.
fn total_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => number_cmp(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(p, q)| total_cmp(p, q))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => {
            let xs: Vec<(&String, &Value)> = sorted_entries(x);
            let ys: Vec<(&String, &Value)> = sorted_entries(y);
            xs.iter()
                .zip(ys.iter())
                .map(|((kx, vx), (ky, vy))| kx.cmp(ky).then_with(|| total_cmp(vx, vy)))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| xs.len().cmp(&ys.len()))
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

fn sorted_entries(map: &serde_json::Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn number_cmp(x: &serde_json::Number, y: &serde_json::Number) -> Ordering {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a.cmp(&b);
    }
    // Mixed representations: fall back to the textual form so equal numbers tie.
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) if a != b => a.total_cmp(&b),
        _ => x.to_string().cmp(&y.to_string()),
    }
}
