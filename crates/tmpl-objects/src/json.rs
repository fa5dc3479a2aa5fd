// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Converts a `serde_json::Value` tree into engine [`Value`]s, backing
//! objects with [`DictObject`] and arrays with [`SequenceObject`].

use tmpl_engine::Value;

use crate::{DictObject, SequenceObject};

/// Recursively converts `json` into an engine value. Numbers become `F64`
/// regardless of JSON's int/float distinction, matching the evaluator's
/// single numeric type (spec §3).
pub fn value_from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::null(),
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::F64(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            SequenceObject::new(items.iter().map(value_from_json).collect()).into_value()
        }
        serde_json::Value::Object(map) => {
            let entries = map.iter().map(|(k, v)| (k.clone(), value_from_json(v))).collect();
            Value::ObjectHandle(DictObject::from_entries(entries).into_handle())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tmpl_engine::ObjectCapability;

    #[test]
    fn converts_primitives() {
        assert_eq!(value_from_json(&json!(true)), Value::Bool(true));
        assert_eq!(value_from_json(&json!(2.5)), Value::F64(2.5));
        assert_eq!(value_from_json(&json!("hi")), Value::String("hi".into()));
        assert!(value_from_json(&json!(null)).is_null());
    }

    #[test]
    fn converts_array_into_a_sequence_handle() {
        let value = value_from_json(&json!([1, 2, 3]));
        let Value::ObjectHandle(handle) = value else { panic!("expected a sequence handle") };
        let seq = handle.as_sequence().expect("array converts to a sequence");
        assert_eq!(seq.count(), 3);
        assert_eq!(seq.get(1), Some(Value::F64(2.0)));
    }

    #[test]
    fn converts_object_into_a_dict_handle() {
        let value = value_from_json(&json!({"name": "ada"}));
        let Value::ObjectHandle(handle) = value else { panic!("expected a dict handle") };
        assert_eq!(handle.get_property("name").unwrap(), Some(Value::String("ada".into())));
    }
}
