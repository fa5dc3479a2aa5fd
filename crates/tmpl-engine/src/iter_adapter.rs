// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Iteration adapter over strings (by code point) and ordered-sequence
//! handles (spec §4.7).

use std::sync::Arc;

use crate::value::{ObjectCapability, Value};

enum Source {
    CodePoints(Vec<char>),
    Object(Arc<dyn ObjectCapability>),
    Empty,
}

/// A small `next`/`current` adapter built once from a header [`Value`].
pub struct Iter {
    source: Source,
    index: usize,
}

impl Iter {
    /// Builds an adapter from `value`: code points for a string, index/get
    /// for an object handle that exposes an ordered-sequence capability,
    /// empty iteration for anything else.
    pub fn from_value(value: &Value) -> Self {
        let source = match value {
            Value::String(s) => Source::CodePoints(s.chars().collect()),
            Value::ObjectHandle(handle) if handle.as_sequence().is_some() => {
                Source::Object(Arc::clone(handle))
            }
            _ => Source::Empty,
        };
        Self { source, index: 0 }
    }

    /// Advances to the next element; `false` once exhausted.
    pub fn next(&mut self) -> bool {
        let has_more = match &self.source {
            Source::CodePoints(chars) => self.index < chars.len(),
            Source::Object(handle) => {
                self.index < handle.as_sequence().expect("checked at construction").count()
            }
            Source::Empty => false,
        };
        if has_more {
            self.index += 1;
        }
        has_more
    }

    /// The current element, valid only right after a `next()` that returned
    /// `true` (index starts at 0, `next` pre-increments before reporting).
    pub fn current(&self) -> Value {
        match &self.source {
            Source::CodePoints(chars) => chars
                .get(self.index.wrapping_sub(1))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_else(Value::null),
            Source::Object(handle) => handle
                .as_sequence()
                .and_then(|seq| seq.get(self.index.wrapping_sub(1)))
                .unwrap_or_else(Value::null),
            Source::Empty => Value::null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::value::SequenceCapability;

    #[test]
    fn iterates_string_by_code_point() {
        let mut it = Iter::from_value(&Value::String("ab".into()));
        assert!(it.next());
        assert_eq!(it.current(), Value::String("a".into()));
        assert!(it.next());
        assert_eq!(it.current(), Value::String("b".into()));
        assert!(!it.next());
    }

    #[test]
    fn empty_value_yields_no_iterations() {
        let mut it = Iter::from_value(&Value::F64(1.0));
        assert!(!it.next());
    }

    #[derive(Debug)]
    struct VecSeqObject(Vec<Value>);

    impl SequenceCapability for VecSeqObject {
        fn count(&self) -> usize {
            self.0.len()
        }
        fn get(&self, index: usize) -> Option<Value> {
            self.0.get(index).cloned()
        }
    }

    impl ObjectCapability for VecSeqObject {
        fn get_property(&self, _name: &str) -> Result<Option<Value>, Error> {
            Ok(None)
        }
        fn set_property(&self, _name: &str, _value: Value) -> Result<bool, Error> {
            Ok(false)
        }
        fn invoke_method(&self, _name: &str, _args: &[Value]) -> Result<Option<Value>, Error> {
            Ok(None)
        }
        fn type_name(&self) -> &str {
            "VecSeqObject"
        }
        fn as_sequence(&self) -> Option<&dyn SequenceCapability> {
            Some(self)
        }
    }

    #[test]
    fn iterates_ordered_sequence_handle() {
        let handle: Arc<dyn ObjectCapability> =
            Arc::new(VecSeqObject(vec![Value::F64(1.0), Value::F64(2.0)]));
        let mut it = Iter::from_value(&Value::ObjectHandle(handle));
        assert!(it.next());
        assert_eq!(it.current(), Value::F64(1.0));
        assert!(it.next());
        assert_eq!(it.current(), Value::F64(2.0));
        assert!(!it.next());
    }
}
