//! FILENAME: core/row-model/src/row.rs
//! PURPOSE: The opaque row payload carried by data nodes.
//! CONTEXT: The row store never interprets rows beyond reading fields by
//! name (ids, group keys, value columns, data paths).

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::value::RowValue;

/// A single data row: field name -> value.
/// Serialized as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowData {
    fields: BTreeMap<String, RowValue>,
}

impl RowData {
    pub fn new() -> Self {
        RowData {
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<RowValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<RowValue>) -> Option<RowValue> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&RowValue> {
        self.fields.get(field)
    }

    /// Returns the value of a field, treating a missing field as empty.
    pub fn value(&self, field: &str) -> RowValue {
        self.fields.get(field).cloned().unwrap_or(RowValue::Empty)
    }

    /// Returns the field as a non-empty key string (used for row ids).
    pub fn key(&self, field: &str) -> Option<String> {
        match self.fields.get(field) {
            None | Some(RowValue::Empty) => None,
            Some(v) => Some(v.key_string()),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &RowValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<RowValue>> FromIterator<(K, V)> for RowData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        RowData {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
