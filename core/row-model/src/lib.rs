//! FILENAME: core/row-model/src/lib.rs
//! PURPOSE: Shared types for the hierarchical row store.
//! CONTEXT: Re-exports the row payload, value, route and column definitions
//! used by `row-engine` and by the hosts that feed it data.

pub mod column;
pub mod route;
pub mod row;
pub mod value;

// Re-export commonly used types at the crate root
pub use column::{
    AggFuncName, ColumnId, PivotColumnKind, PivotResultColumn, SortDirection, SortModelItem,
    ValueColumn,
};
pub use route::Route;
pub use row::RowData;
pub use value::{RowValue, BLANK_KEY_LABEL};
