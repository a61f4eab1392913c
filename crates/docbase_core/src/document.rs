//! JSON document model and system-field handling.

use crate::error::EngineResult;
use crate::types::DocKey;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// System field holding the document key.
pub const FIELD_ID: &str = "_id";
/// System field holding the creation timestamp (RFC 3339).
pub const FIELD_CREATED_AT: &str = "createdAt";
/// System field holding the last-update timestamp (RFC 3339).
pub const FIELD_UPDATED_AT: &str = "updatedAt";

/// All engine-managed fields, in stamping order.
pub const SYSTEM_FIELDS: [&str; 3] = [FIELD_ID, FIELD_CREATED_AT, FIELD_UPDATED_AT];

/// A JSON document: an object of named fields.
///
/// Documents are schemaless by default; a collection schema, when present,
/// constrains writes. The engine stamps the system fields `_id`,
/// `createdAt`, and `updatedAt` on insert and refreshes `updatedAt`
/// on every update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing JSON object map.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Interprets a JSON value as a document.
    ///
    /// Returns `None` unless the value is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Decodes a document from stored bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a JSON object.
    pub fn from_bytes(bytes: &[u8]) -> EngineResult<Self> {
        let map: Map<String, Value> = serde_json::from_slice(bytes)?;
        Ok(Self(map))
    }

    /// Encodes the document for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> EngineResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    /// Returns the value of `field`, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets `field` to `value`, replacing any existing value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Returns true if the document has a non-null value for `field`.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        matches!(self.0.get(field), Some(v) if !v.is_null())
    }

    /// Returns the document key from `_id`, if stamped.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.0.get(FIELD_ID).and_then(Value::as_str)
    }

    /// Returns the field names in the document.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the document has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying JSON object map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Converts the document into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Stamps the system fields for a freshly inserted document.
    ///
    /// `createdAt` and `updatedAt` are set to the same instant.
    pub fn stamp_new(&mut self, key: &DocKey, now: DateTime<Utc>) {
        let ts = format_timestamp(now);
        self.0
            .insert(FIELD_ID.to_string(), Value::String(key.to_string()));
        self.0
            .insert(FIELD_CREATED_AT.to_string(), Value::String(ts.clone()));
        self.0.insert(FIELD_UPDATED_AT.to_string(), Value::String(ts));
    }

    /// Refreshes `updatedAt`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.0.insert(
            FIELD_UPDATED_AT.to_string(),
            Value::String(format_timestamp(now)),
        );
    }

    /// Applies a merge patch to the document.
    ///
    /// Plain values replace the stored value. An object of the form
    /// `{"increment": n}` or `{"decrement": n}` adjusts the stored numeric
    /// instead, treating an absent or non-numeric field as 0. System fields
    /// in the patch are ignored.
    pub fn apply_patch(&mut self, patch: &Document) {
        for (field, value) in &patch.0 {
            if SYSTEM_FIELDS.contains(&field.as_str()) {
                continue;
            }

            if let Some(delta) = numeric_delta(value) {
                let current = self.0.get(field).and_then(Value::as_f64).unwrap_or(0.0);
                self.0.insert(field.clone(), number_value(current + delta));
            } else {
                self.0.insert(field.clone(), value.clone());
            }
        }
    }

    /// Projects the document onto the requested fields.
    ///
    /// Fields absent from the document are silently skipped.
    #[must_use]
    pub fn project(&self, fields: &[String]) -> Document {
        let mut map = Map::new();
        for field in fields {
            if let Some(value) = self.0.get(field) {
                map.insert(field.clone(), value.clone());
            }
        }
        Self(map)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Formats a timestamp in the engine's RFC 3339 shape.
///
/// Fixed-width microsecond precision keeps lexicographic ordering equal
/// to chronological ordering, which the default `createdAt` sort relies on.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Returns the signed delta if `value` is an increment/decrement object.
fn numeric_delta(value: &Value) -> Option<f64> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    if let Some(n) = map.get("increment").and_then(Value::as_f64) {
        return Some(n);
    }
    if let Some(n) = map.get("decrement").and_then(Value::as_f64) {
        return Some(-n);
    }
    None
}

/// Builds a JSON number, preferring integer representation when exact.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < (i64::MAX as f64) {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(Document::from_value(json!([1, 2])).is_none());
        assert!(Document::from_value(json!("text")).is_none());
        assert!(Document::from_value(json!({"a": 1})).is_some());
    }

    #[test]
    fn stamp_new_sets_all_system_fields() {
        let mut d = doc(json!({"name": "ada"}));
        let key = DocKey::new("k1");
        d.stamp_new(&key, Utc::now());

        assert_eq!(d.key(), Some("k1"));
        assert_eq!(d.get(FIELD_CREATED_AT), d.get(FIELD_UPDATED_AT));
        assert!(d
            .get(FIELD_CREATED_AT)
            .and_then(Value::as_str)
            .unwrap()
            .ends_with('Z'));
    }

    #[test]
    fn touch_refreshes_updated_at_only() {
        let mut d = doc(json!({"name": "ada"}));
        d.stamp_new(&DocKey::new("k1"), Utc::now());
        let created = d.get(FIELD_CREATED_AT).cloned();

        let later = Utc::now() + chrono::Duration::seconds(5);
        d.touch(later);

        assert_eq!(d.get(FIELD_CREATED_AT).cloned(), created);
        assert_ne!(d.get(FIELD_UPDATED_AT), d.get(FIELD_CREATED_AT));
    }

    #[test]
    fn patch_replaces_and_adds_fields() {
        let mut d = doc(json!({"name": "ada", "role": "admin"}));
        d.apply_patch(&doc(json!({"role": "viewer", "active": true})));

        assert_eq!(d.get("role"), Some(&json!("viewer")));
        assert_eq!(d.get("active"), Some(&json!(true)));
        assert_eq!(d.get("name"), Some(&json!("ada")));
    }

    #[test]
    fn patch_increment_and_decrement() {
        let mut d = doc(json!({"count": 10}));
        d.apply_patch(&doc(json!({"count": {"increment": 5}})));
        assert_eq!(d.get("count"), Some(&json!(15)));

        d.apply_patch(&doc(json!({"count": {"decrement": 3}})));
        assert_eq!(d.get("count"), Some(&json!(12)));
    }

    #[test]
    fn patch_increment_on_absent_field_starts_at_zero() {
        let mut d = doc(json!({}));
        d.apply_patch(&doc(json!({"visits": {"increment": 1}})));
        assert_eq!(d.get("visits"), Some(&json!(1)));
    }

    #[test]
    fn patch_increment_on_non_numeric_starts_at_zero() {
        let mut d = doc(json!({"visits": "lots"}));
        d.apply_patch(&doc(json!({"visits": {"decrement": 2}})));
        assert_eq!(d.get("visits"), Some(&json!(-2)));
    }

    #[test]
    fn patch_ordinary_object_value_replaces() {
        let mut d = doc(json!({"meta": {"a": 1}}));
        d.apply_patch(&doc(json!({"meta": {"b": 2}})));
        assert_eq!(d.get("meta"), Some(&json!({"b": 2})));
    }

    #[test]
    fn patch_ignores_system_fields() {
        let mut d = doc(json!({"name": "ada"}));
        d.stamp_new(&DocKey::new("k1"), Utc::now());
        d.apply_patch(&doc(json!({"_id": "forged", "name": "grace"})));

        assert_eq!(d.key(), Some("k1"));
        assert_eq!(d.get("name"), Some(&json!("grace")));
    }

    #[test]
    fn project_keeps_only_existing_requested_fields() {
        let d = doc(json!({"a": 1, "b": 2, "c": 3}));
        let projected = d.project(&["a".to_string(), "c".to_string(), "zzz".to_string()]);

        assert_eq!(projected.len(), 2);
        assert_eq!(projected.get("a"), Some(&json!(1)));
        assert_eq!(projected.get("c"), Some(&json!(3)));
        assert!(projected.get("zzz").is_none());
    }

    #[test]
    fn bytes_round_trip() {
        let d = doc(json!({"name": "ada", "age": 36}));
        let bytes = d.to_bytes().unwrap();
        let decoded = Document::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, d);
    }

    #[test]
    fn timestamp_ordering_is_lexicographic() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::milliseconds(5);
        assert!(format_timestamp(earlier) < format_timestamp(later));
    }
}
