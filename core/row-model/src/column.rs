//! FILENAME: core/row-model/src/column.rs
//! Column Definitions - the serializable description of value, sort and pivot columns.
//!
//! These structures describe WHAT the row store aggregates and orders by.
//! They are immutable snapshots of configuration; the engine derives its
//! working state from them once per configuration change.

use std::fmt;
use serde::{Deserialize, Serialize};

/// Identifier of a column (value column, pivot result column, sort column).
pub type ColumnId = String;

// ============================================================================
// AGGREGATION
// ============================================================================

/// Aggregation function attached to a value column.
/// Serialized as its lowercase name; unknown names are custom functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AggFuncName {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    First,
    Last,
    /// A user-registered function looked up by name.
    Custom(String),
}

impl Default for AggFuncName {
    fn default() -> Self {
        AggFuncName::Sum
    }
}

impl AggFuncName {
    pub fn parse(name: &str) -> Self {
        match name {
            "sum" => AggFuncName::Sum,
            "avg" => AggFuncName::Avg,
            "min" => AggFuncName::Min,
            "max" => AggFuncName::Max,
            "count" => AggFuncName::Count,
            "first" => AggFuncName::First,
            "last" => AggFuncName::Last,
            other => AggFuncName::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AggFuncName::Sum => "sum",
            AggFuncName::Avg => "avg",
            AggFuncName::Min => "min",
            AggFuncName::Max => "max",
            AggFuncName::Count => "count",
            AggFuncName::First => "first",
            AggFuncName::Last => "last",
            AggFuncName::Custom(name) => name,
        }
    }
}

impl From<String> for AggFuncName {
    fn from(name: String) -> Self {
        AggFuncName::parse(&name)
    }
}

impl From<AggFuncName> for String {
    fn from(func: AggFuncName) -> Self {
        func.name().to_string()
    }
}

impl fmt::Display for AggFuncName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// VALUE COLUMNS
// ============================================================================

/// A column whose values are aggregated into group rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueColumn {
    /// Id of the aggregate entry written to group nodes.
    pub col_id: ColumnId,

    /// Field read from leaf rows.
    pub field: String,

    /// The aggregation function to apply.
    #[serde(default)]
    pub agg_func: AggFuncName,
}

impl ValueColumn {
    /// Creates a value column whose id equals its field.
    pub fn new(field: impl Into<String>, agg_func: AggFuncName) -> Self {
        let field = field.into();
        ValueColumn {
            col_id: field.clone(),
            field,
            agg_func,
        }
    }
}

// ============================================================================
// SORTING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One entry of the sort model, most significant first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortModelItem {
    pub col_id: ColumnId,
    pub sort: SortDirection,
}

impl SortModelItem {
    pub fn asc(col_id: impl Into<ColumnId>) -> Self {
        SortModelItem { col_id: col_id.into(), sort: SortDirection::Asc }
    }

    pub fn desc(col_id: impl Into<ColumnId>) -> Self {
        SortModelItem { col_id: col_id.into(), sort: SortDirection::Desc }
    }
}

// ============================================================================
// PIVOT RESULT COLUMNS
// ============================================================================

/// What a generated pivot column aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PivotColumnKind {
    /// Values of leaf rows matching `pivot_keys`.
    Value,
    /// Total across the pivot columns sharing the first pivot key.
    GroupTotal,
    /// Total across every pivot column of one value column.
    RowTotal,
}

/// A column generated in pivot mode, one per distinct pivot key combination
/// and value column (plus optional totals).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotResultColumn {
    pub col_id: ColumnId,

    /// Pivot key combination (outer to inner). Totals carry the prefix they cover.
    pub pivot_keys: Vec<String>,

    /// The value column this pivot column aggregates.
    pub value_col_id: ColumnId,

    pub kind: PivotColumnKind,

    /// For totals: the already-computed pivot columns being totalled.
    #[serde(default)]
    pub source_col_ids: Vec<ColumnId>,
}
