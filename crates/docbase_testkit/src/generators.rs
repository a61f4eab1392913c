//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random tenants, collection
//! names, and documents that maintain required invariants.

use docbase_core::{Filter, FilterOp, TenantId};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for generating valid tenant identifiers.
pub fn tenant_id_strategy() -> impl Strategy<Value = TenantId> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,15}")
        .expect("Invalid regex")
        .prop_map(TenantId::new)
}

/// Strategy for generating valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for generating index-safe field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating scalar JSON values.
///
/// Covers the types the filter grammar coerces to: strings, integers,
/// finite floats, and booleans.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        prop::string::string_regex("[a-zA-Z0-9 ]{0,24}")
            .expect("Invalid regex")
            .prop_map(Value::String),
        any::<i64>().prop_map(Value::from),
        (-1.0e9f64..1.0e9f64).prop_map(Value::from),
        any::<bool>().prop_map(Value::Bool),
    ]
}

/// Strategy for generating flat document bodies.
///
/// Keys are index-safe field names; values are scalars, so every
/// generated document can be filtered, sorted, and indexed.
pub fn document_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(field_name_strategy(), scalar_value_strategy(), 1..8).prop_map(
        |fields| {
            let map: Map<String, Value> = fields.into_iter().collect();
            Value::Object(map)
        },
    )
}

/// Strategy for generating comparison operators.
///
/// `$in` is excluded since it takes an array operand.
pub fn scalar_op_strategy() -> impl Strategy<Value = FilterOp> {
    prop_oneof![
        Just(FilterOp::Eq),
        Just(FilterOp::Gt),
        Just(FilterOp::Lt),
        Just(FilterOp::Gte),
        Just(FilterOp::Lte),
        Just(FilterOp::Ne),
    ]
}

/// Strategy for generating filters over scalar values.
pub fn filter_strategy() -> impl Strategy<Value = Filter> {
    (field_name_strategy(), scalar_op_strategy(), scalar_value_strategy())
        .prop_map(|(field, op, value)| Filter::new(field, op, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn documents_are_flat_objects(doc in document_strategy()) {
            let object = doc.as_object().expect("strategy yields objects");
            prop_assert!(!object.is_empty());
            for value in object.values() {
                prop_assert!(!value.is_object() && !value.is_array());
            }
        }

        #[test]
        fn field_names_are_index_safe(field in field_name_strategy()) {
            prop_assert!(field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
    }
}
