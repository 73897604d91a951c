//! FILENAME: core/row-engine/src/error.rs

use thiserror::Error;

/// Errors surfaced to callers of the row store.
/// Data problems (failed fetches, missing routes, duplicate keys) are not
/// errors; they are reported through results, node state and warnings.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("refresh requested while another refresh is in progress")]
    RefreshInProgress,

    #[error("value column '{column}' uses aggregation function '{func}' which is not registered")]
    MissingAggregationFunction { column: String, func: String },

    #[error("row not found: {0}")]
    RowNotFound(String),

    #[error("row is not a group and cannot be expanded: {0}")]
    NotAGroup(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
