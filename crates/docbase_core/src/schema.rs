//! Per-collection schema contracts and validation.

use crate::document::Document;
use crate::types::TenantId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// Declared type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// JSON string.
    String,
    /// JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON array, element types unconstrained.
    Array,
}

impl FieldType {
    /// Returns true if `value` matches this declared type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
        }
    }

    /// Returns the runtime type name of a JSON value.
    #[must_use]
    pub fn name_of(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
        };
        write!(f, "{name}")
    }
}

/// Constraint for a single schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Declared type of the field.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field must be present and non-null.
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    /// Creates an optional field of the given type.
    #[must_use]
    pub const fn optional(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
        }
    }

    /// Creates a required field of the given type.
    #[must_use]
    pub const fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
        }
    }
}

/// A document's failure to satisfy the collection schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is absent or null.
    #[error("missing required field '{field}'")]
    MissingRequiredField {
        /// The absent field.
        field: String,
    },

    /// A present field has the wrong runtime type.
    #[error("type mismatch on field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// The offending field.
        field: String,
        /// The declared type.
        expected: FieldType,
        /// The runtime type found.
        actual: &'static str,
    },
}

/// Declared field contract for one collection.
///
/// Schemas are additive: fields not mentioned in the schema are always
/// permitted. A schema constrains future writes only; documents stored
/// before the schema was saved are never revalidated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionSchema {
    /// Field constraints by field name.
    pub fields: BTreeMap<String, FieldSpec>,
}

impl CollectionSchema {
    /// Creates an empty schema that admits every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field constraint, replacing any existing one.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Validates a document against this schema.
    ///
    /// Absent or null values pass unless the field is required; present
    /// values must match the declared type. Extra fields always pass.
    ///
    /// # Errors
    ///
    /// Returns the first violation found, fields in name order.
    pub fn validate(&self, document: &Document) -> Result<(), ValidationError> {
        for (field, spec) in &self.fields {
            match document.get(field) {
                None | Some(Value::Null) => {
                    if spec.required {
                        return Err(ValidationError::MissingRequiredField {
                            field: field.clone(),
                        });
                    }
                }
                Some(value) => {
                    if !spec.field_type.matches(value) {
                        return Err(ValidationError::TypeMismatch {
                            field: field.clone(),
                            expected: spec.field_type,
                            actual: FieldType::name_of(value),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Thread-safe registry of collection schemas.
///
/// One schema per (tenant, collection), last write wins.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<(TenantId, String), CollectionSchema>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves a schema for a collection, replacing any existing one.
    pub fn save(&self, tenant: &TenantId, collection: &str, schema: CollectionSchema) {
        self.schemas
            .write()
            .insert((tenant.clone(), collection.to_string()), schema);
    }

    /// Returns the schema for a collection, if one was saved.
    #[must_use]
    pub fn get(&self, tenant: &TenantId, collection: &str) -> Option<CollectionSchema> {
        self.schemas
            .read()
            .get(&(tenant.clone(), collection.to_string()))
            .cloned()
    }
}
