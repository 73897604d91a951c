//! FILENAME: core/row-engine/src/lib.rs
//! Hierarchical row store for a data grid.
//!
//! Rows live in a node arena (`node`) shaped into groups, tree paths or a flat
//! list. Two row models sit on top of it:
//! - `client_side`: the whole dataset in memory, reconciled in place and run
//!   through filter, pivot, aggregate, sort and flatten stages
//! - `server_side`: rows paged in blocks from an external `RowSource`, one
//!   `BlockStore` per open hierarchy level
//!
//! Supporting layers:
//! - `reconciler`: turns row batches into minimal tree mutations
//! - `change_path`: tracks which ancestor chains a change touched
//! - `aggregation`: bottom-up group aggregates along the change path
//! - `expansion`: child stores and detail rows following open/close
//! - `events`: the notification queue drained by the host

pub mod logging;

pub mod aggregation;
pub mod block_store;
pub mod change_path;
pub mod client_side;
pub mod config;
pub mod error;
pub mod events;
pub mod expansion;
pub mod filter;
pub mod flatten;
pub mod model;
pub mod node;
pub mod pivot;
pub mod policy;
pub mod reconciler;
pub mod server_side;
pub mod sort;
pub mod source;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use aggregation::{AggregateAccumulator, AggregationEngine};
pub use block_store::{BlockState, BlockStore, RowBlock, StoreArena, StoreId};
pub use change_path::ChangePath;
pub use client_side::ClientSideRowModel;
pub use config::{ConfigWarning, StoreConfig};
pub use error::StoreError;
pub use events::{EventQueue, StoreEvent, StoreWarning};
pub use expansion::{DetailTicket, ExpansionCoordinator, ExpansionState};
pub use model::{RowBounds, RowModel};
pub use node::{
    AggregateRecord, AggregateValue, DuplicateRow, NodeId, NodeKind, RowNode, RowTree,
    FOOTER_NODE_ID, ROOT_NODE_ID,
};
pub use policy::{
    AggregationFunction, DataPathGetter, ExpandPolicy, GroupAggregator, RowFilter,
    RowHeightPolicy,
};
pub use reconciler::{Hierarchy, HierarchyReconciler};
pub use server_side::ServerSideRowModel;
pub use source::{FetchError, FetchTicket, RowRequest, RowResponse, RowSource};
pub use transaction::{RowTransaction, TransactionCallback, TransactionResult};

pub use row_model::{
    AggFuncName, ColumnId, PivotColumnKind, PivotResultColumn, Route, RowData, RowValue,
    SortDirection, SortModelItem, ValueColumn,
};
