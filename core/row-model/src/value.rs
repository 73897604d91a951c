//! FILENAME: core/row-model/src/value.rs
//! PURPOSE: Defines the value held by a single field of a row.
//! CONTEXT: Rows arriving from a data source are maps of field -> RowValue.
//! Group keys, pivot keys and aggregate results are all derived from these
//! values, so the type carries ordering and key-string helpers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Label used for rows whose group field is empty.
pub const BLANK_KEY_LABEL: &str = "(Blanks)";

/// The value stored in one field of a row, or produced by an aggregation.
/// Serialized untagged so JSON rows map naturally (`null`, numbers, strings, bools).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum RowValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl RowValue {
    /// Returns the numeric value, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RowValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RowValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RowValue::Empty)
    }

    /// Returns the string used to key this value inside a group level.
    /// Empty values all share the empty key.
    pub fn key_string(&self) -> String {
        match self {
            RowValue::Empty => String::new(),
            RowValue::Number(n) => {
                // Format without unnecessary decimal places
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{:.0}", n)
                } else {
                    format!("{}", n)
                }
            }
            RowValue::Text(s) => s.clone(),
            RowValue::Boolean(b) => {
                if *b { "true" } else { "false" }.to_string()
            }
        }
    }

    /// Returns the display label for this value as a group header.
    pub fn display_value(&self) -> String {
        match self {
            RowValue::Empty => BLANK_KEY_LABEL.to_string(),
            RowValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            other => other.key_string(),
        }
    }

    /// Total ordering used for sorting rows and groups.
    /// Empty < Number < Text < Boolean.
    pub fn compare(&self, other: &RowValue) -> Ordering {
        match (self, other) {
            (RowValue::Empty, RowValue::Empty) => Ordering::Equal,
            (RowValue::Empty, _) => Ordering::Less,
            (_, RowValue::Empty) => Ordering::Greater,

            (RowValue::Number(a), RowValue::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (RowValue::Number(_), _) => Ordering::Less,
            (_, RowValue::Number(_)) => Ordering::Greater,

            (RowValue::Text(a), RowValue::Text(b)) => a.cmp(b),
            (RowValue::Text(_), _) => Ordering::Less,
            (_, RowValue::Text(_)) => Ordering::Greater,

            (RowValue::Boolean(a), RowValue::Boolean(b)) => a.cmp(b),
        }
    }
}

impl From<f64> for RowValue {
    fn from(value: f64) -> Self {
        RowValue::Number(value)
    }
}

impl From<i64> for RowValue {
    fn from(value: i64) -> Self {
        RowValue::Number(value as f64)
    }
}

impl From<i32> for RowValue {
    fn from(value: i32) -> Self {
        RowValue::Number(value as f64)
    }
}

impl From<&str> for RowValue {
    fn from(value: &str) -> Self {
        RowValue::Text(value.to_string())
    }
}

impl From<String> for RowValue {
    fn from(value: String) -> Self {
        RowValue::Text(value)
    }
}

impl From<bool> for RowValue {
    fn from(value: bool) -> Self {
        RowValue::Boolean(value)
    }
}

impl<T: Into<RowValue>> From<Option<T>> for RowValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RowValue::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_string_drops_integral_decimals() {
        assert_eq!(RowValue::Number(2024.0).key_string(), "2024");
        assert_eq!(RowValue::Number(2.5).key_string(), "2.5");
        assert_eq!(RowValue::Empty.key_string(), "");
    }

    #[test]
    fn test_compare_orders_across_types() {
        let mut values = vec![
            RowValue::Boolean(true),
            RowValue::Text("b".to_string()),
            RowValue::Number(3.0),
            RowValue::Empty,
            RowValue::Text("a".to_string()),
            RowValue::Number(-1.0),
        ];
        values.sort_by(|a, b| a.compare(b));
        assert_eq!(
            values,
            vec![
                RowValue::Empty,
                RowValue::Number(-1.0),
                RowValue::Number(3.0),
                RowValue::Text("a".to_string()),
                RowValue::Text("b".to_string()),
                RowValue::Boolean(true),
            ]
        );
    }

    #[test]
    fn test_untagged_json_roundtrip() {
        let parsed: Vec<RowValue> = serde_json::from_str(r#"[null, 4, "x", false]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                RowValue::Empty,
                RowValue::Number(4.0),
                RowValue::Text("x".to_string()),
                RowValue::Boolean(false),
            ]
        );
    }
}
