use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{Result, SabimError};

/// Name of the raw model output field on an analysis record.
pub const AI_RESULT_FIELD: &str = "AI-Result";

/// A flat record keyed by a unique `id` (the citation key).
///
/// Serialises to a single JSON object: `{"id": "...", "title": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// How an incoming record is folded into an existing record with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Existing non-empty values win; incoming values only fill gaps.
    FillGaps,
    /// Incoming non-empty values win; an empty incoming value never clobbers.
    Refresh,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a field, builder style
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// String value of a field, if present and a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// The raw model output, when one has been stored.
    pub fn ai_result(&self) -> Option<&str> {
        self.get_str(AI_RESULT_FIELD).filter(|s| !s.is_empty())
    }

    /// True once the record carries a non-empty `AI-Result`.
    pub fn is_analysed(&self) -> bool {
        self.ai_result().is_some()
    }

    /// Fold `incoming` into `self` field by field.
    pub fn merge_from(&mut self, incoming: Record, policy: MergePolicy) {
        for (name, value) in incoming.fields {
            if is_blank(&value) {
                // An empty default may only replace a missing or null value
                let keep_existing = self.fields.get(&name).is_some_and(|existing| !existing.is_null());
                if !keep_existing {
                    self.fields.insert(name, value);
                }
                continue;
            }
            match self.fields.get_mut(&name) {
                Some(existing) if policy == MergePolicy::FillGaps && !is_blank(existing) => {}
                Some(existing) => *existing = value,
                None => {
                    self.fields.insert(name, value);
                }
            }
        }
    }
}

/// Null, empty strings, empty arrays and empty objects count as "no value".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Check that a collection can be stored: every id non-empty and unique, and
/// no field shadowing the `id` key.
pub fn validate_collection(records: &[Record]) -> Result<()> {
    let mut seen = HashSet::new();
    for record in records {
        validate_record(record)?;
        if !seen.insert(record.id.as_str()) {
            return Err(SabimError::InvalidInput(format!("duplicate id '{}'", record.id)));
        }
    }
    Ok(())
}

/// Per-record checks shared by every store operation, `append` included.
pub fn validate_record(record: &Record) -> Result<()> {
    if record.id.trim().is_empty() {
        return Err(SabimError::InvalidInput("record with an empty id".to_string()));
    }
    if record.fields.contains_key("id") {
        return Err(SabimError::InvalidInput(format!(
            "record '{}' carries a second 'id' field",
            record.id
        )));
    }
    Ok(())
}

/// Upsert `incoming` into `existing` by id, preserving the existing order and
/// appending unseen ids in incoming order.
pub fn merge_collections(existing: &mut Vec<Record>, incoming: Vec<Record>, policy: MergePolicy) {
    let mut index: HashMap<String, usize> = HashMap::new();
    for (position, record) in existing.iter().enumerate() {
        index.entry(record.id.clone()).or_insert(position);
    }

    for record in incoming {
        match index.get(&record.id) {
            Some(&position) => existing[position].merge_from(record, policy),
            None => {
                index.insert(record.id.clone(), existing.len());
                existing.push(record);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fill_gaps_keeps_existing_values() {
        let mut existing = Record::new("a").field("title", "Kept").field(AI_RESULT_FIELD, Value::Null);
        let incoming = Record::new("a").field("title", "Replaced").field(AI_RESULT_FIELD, "fresh");

        existing.merge_from(incoming, MergePolicy::FillGaps);

        assert_eq!(existing.get_str("title"), Some("Kept"));
        assert_eq!(existing.ai_result(), Some("fresh"));
    }

    #[test]
    fn refresh_never_writes_blank_values() {
        let mut existing = Record::new("a")
            .field(AI_RESULT_FIELD, "old")
            .field("AI-Systems", json!(["2D"]));
        let incoming = Record::new("a")
            .field(AI_RESULT_FIELD, "new")
            .field("AI-Systems", json!([]));

        existing.merge_from(incoming, MergePolicy::Refresh);

        assert_eq!(existing.ai_result(), Some("new"));
        assert_eq!(existing.get("AI-Systems"), Some(&json!(["2D"])));
    }

    #[test]
    fn merge_collections_appends_unknown_ids_in_order() {
        let mut existing = vec![Record::new("b"), Record::new("a")];
        merge_collections(
            &mut existing,
            vec![Record::new("c"), Record::new("a").field("year", "2020")],
            MergePolicy::FillGaps,
        );

        let ids: Vec<&str> = existing.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(existing[1].get_str("year"), Some("2020"));
    }

    #[test]
    fn validate_rejects_duplicates_and_empty_ids() {
        assert!(validate_collection(&[Record::new("x"), Record::new("y")]).is_ok());
        assert!(matches!(
            validate_collection(&[Record::new("x"), Record::new("x")]),
            Err(SabimError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_collection(&[Record::new("  ")]),
            Err(SabimError::InvalidInput(_))
        ));
    }

    #[test]
    fn record_serialises_flat() {
        let record = Record::new("keyA").field("title", "T");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"id": "keyA", "title": "T"}));
    }
}
