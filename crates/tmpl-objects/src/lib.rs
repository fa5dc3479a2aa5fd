// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Default [`ObjectCapability`]/[`SequenceCapability`] implementations:
//! a dict-backed property bag and an ordered-sequence handle over a `Vec`.
//!
//! Neither type is privileged by `tmpl-engine` — both just satisfy the two
//! trait surfaces the evaluator dispatches against (spec §9 "object-property/
//! object-method capability"). A host embedding the engine is free to supply
//! its own implementations instead; these exist because most templates only
//! need a plain map and a plain list.

use std::sync::{Arc, RwLock};

use tmpl_engine::{Error, ErrorKind, ObjectCapability, SequenceCapability, Value};

mod json;

pub use json::value_from_json;

/// A property bag backed by an insertion-ordered map, usable anywhere the
/// evaluator expects an [`ObjectHandle`](tmpl_engine::Value::ObjectHandle).
#[derive(Debug, Default)]
pub struct DictObject {
    entries: RwLock<Vec<(String, Value)>>,
}

impl DictObject {
    /// An empty dict.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dict from an already-collected list of entries, preserving
    /// their order for `keys`/`values`.
    pub fn from_entries(entries: Vec<(String, Value)>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Wraps `self` as the `Arc<dyn ObjectCapability>` handle the evaluator
    /// stores inside a [`Value::ObjectHandle`].
    pub fn into_handle(self) -> Arc<dyn ObjectCapability> {
        Arc::new(self)
    }
}

impl ObjectCapability for DictObject {
    fn get_property(&self, name: &str) -> Result<Option<Value>, Error> {
        let entries = self.entries.read().expect("dict lock poisoned");
        Ok(entries.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone()))
    }

    fn set_property(&self, name: &str, value: Value) -> Result<bool, Error> {
        let mut entries = self.entries.write().expect("dict lock poisoned");
        if let Some(slot) = entries.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value;
        } else {
            entries.push((name.to_string(), value));
        }
        Ok(true)
    }

    fn invoke_method(&self, name: &str, args: &[Value]) -> Result<Option<Value>, Error> {
        let entries = self.entries.read().expect("dict lock poisoned");
        match name {
            "keys" => {
                let keys: Vec<Value> = entries.iter().map(|(k, _)| Value::String(k.clone())).collect();
                drop(entries);
                Ok(Some(SequenceObject::new(keys).into_value()))
            }
            "values" => {
                let values: Vec<Value> = entries.iter().map(|(_, v)| v.clone()).collect();
                drop(entries);
                Ok(Some(SequenceObject::new(values).into_value()))
            }
            "hasKey" => {
                let key = args.first().map(Value::to_display_string).unwrap_or_default();
                Ok(Some(Value::Bool(entries.iter().any(|(k, _)| *k == key))))
            }
            "len" => Ok(Some(Value::F64(entries.len() as f64))),
            _ => Ok(None),
        }
    }

    fn type_name(&self) -> &str {
        "Dict"
    }
}

/// An ordered, fixed-length sequence, usable as a `{{ for x in .. }}` header
/// (spec §4.7) and as an object with a `len`/`get` method surface.
#[derive(Debug)]
pub struct SequenceObject {
    items: Vec<Value>,
}

impl SequenceObject {
    /// Wraps `items` as a sequence, preserving their order.
    pub fn new(items: Vec<Value>) -> Self {
        Self { items }
    }

    /// Wraps `self` as an engine [`Value`] carrying the object handle.
    pub fn into_value(self) -> Value {
        Value::ObjectHandle(Arc::new(self))
    }
}

impl SequenceCapability for SequenceObject {
    fn count(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Option<Value> {
        self.items.get(index).cloned()
    }
}

impl ObjectCapability for SequenceObject {
    fn get_property(&self, _name: &str) -> Result<Option<Value>, Error> {
        Ok(None)
    }

    fn set_property(&self, _name: &str, _value: Value) -> Result<bool, Error> {
        Ok(false)
    }

    fn invoke_method(&self, name: &str, args: &[Value]) -> Result<Option<Value>, Error> {
        match name {
            "len" => Ok(Some(Value::F64(self.items.len() as f64))),
            "get" => {
                let index = args
                    .first()
                    .ok_or_else(|| Error::new(ErrorKind::SyntaxError, "get() requires one argument"))?
                    .coerce_f64()? as usize;
                Ok(Some(self.items.get(index).cloned().unwrap_or_else(Value::null)))
            }
            _ => Ok(None),
        }
    }

    fn type_name(&self) -> &str {
        "Sequence"
    }

    fn as_sequence(&self) -> Option<&dyn SequenceCapability> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dict_round_trips_a_property() {
        let dict = DictObject::new();
        assert!(dict.set_property("name", Value::String("ada".into())).unwrap());
        assert_eq!(dict.get_property("name").unwrap(), Some(Value::String("ada".into())));
        assert_eq!(dict.get_property("missing").unwrap(), None);
    }

    #[test]
    fn dict_set_property_updates_existing_key_in_place() {
        let dict = DictObject::from_entries(vec![("x".into(), Value::F64(1.0))]);
        dict.set_property("x", Value::F64(2.0)).unwrap();
        assert_eq!(dict.get_property("x").unwrap(), Some(Value::F64(2.0)));
    }

    #[test]
    fn dict_keys_and_values_preserve_insertion_order() {
        let dict = DictObject::from_entries(vec![
            ("a".into(), Value::F64(1.0)),
            ("b".into(), Value::F64(2.0)),
        ]);
        let keys = dict.invoke_method("keys", &[]).unwrap().unwrap();
        let Value::ObjectHandle(handle) = keys else { panic!("expected a sequence handle") };
        let seq = handle.as_sequence().unwrap();
        assert_eq!(seq.count(), 2);
        assert_eq!(seq.get(0), Some(Value::String("a".into())));
        assert_eq!(seq.get(1), Some(Value::String("b".into())));
    }

    #[test]
    fn dict_has_key_reports_presence() {
        let dict = DictObject::from_entries(vec![("a".into(), Value::Bool(true))]);
        assert_eq!(dict.invoke_method("hasKey", &[Value::String("a".into())]).unwrap(), Some(Value::Bool(true)));
        assert_eq!(dict.invoke_method("hasKey", &[Value::String("z".into())]).unwrap(), Some(Value::Bool(false)));
    }

    #[test]
    fn sequence_iterates_and_reports_len() {
        let seq = SequenceObject::new(vec![Value::F64(1.0), Value::F64(2.0), Value::F64(3.0)]);
        assert_eq!(seq.count(), 3);
        assert_eq!(seq.get(1), Some(Value::F64(2.0)));
        assert_eq!(seq.get(9), None);
    }

    #[test]
    fn sequence_as_object_answers_len_and_get() {
        let seq = SequenceObject::new(vec![Value::String("x".into())]);
        assert_eq!(seq.invoke_method("len", &[]).unwrap(), Some(Value::F64(1.0)));
        assert_eq!(
            seq.invoke_method("get", &[Value::F64(0.0)]).unwrap(),
            Some(Value::String("x".into()))
        );
        assert_eq!(seq.invoke_method("get", &[Value::F64(5.0)]).unwrap(), Some(Value::null()));
    }

    #[test]
    fn unknown_method_yields_none_not_an_error() {
        let dict = DictObject::new();
        assert_eq!(dict.invoke_method("explode", &[]).unwrap(), None);
    }
}
