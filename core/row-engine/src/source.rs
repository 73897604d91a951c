//! FILENAME: core/row-engine/src/source.rs
//! PURPOSE: Boundary to the external row source used by paged stores.
//! CONTEXT: The store hands out a ticket with every request. The host answers
//! later through `ServerSideRowModel::complete_fetch` with the same ticket;
//! a ticket for a purged store, block or older version is dropped.

use row_model::{Route, RowData, SortModelItem};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block_store::StoreId;

/// Identifies one outstanding block fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub store: StoreId,
    /// Store version when the fetch was issued.
    pub version: u64,
    pub block_number: usize,
    /// Unique per request; a refetch of the same block gets a new one.
    pub seq: u64,
}

/// Range query sent to the row source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRequest {
    pub start_row: usize,
    /// Exclusive.
    pub end_row: usize,
    /// Keys of the group whose children are requested; empty for the top level.
    pub group_keys: Route,
    pub sort_model: Vec<SortModelItem>,
    pub filter_model: serde_json::Value,
}

/// Rows returned for a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowResponse {
    pub rows: Vec<RowData>,
    /// Total row count, when the source knows it.
    #[serde(default)]
    pub last_row: Option<usize>,
}

impl RowResponse {
    pub fn new(rows: Vec<RowData>) -> Self {
        RowResponse { rows, last_row: None }
    }

    pub fn with_last_row(mut self, last_row: usize) -> Self {
        self.last_row = Some(last_row);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("row source failed: {message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        FetchError { message: message.into() }
    }
}

/// External data source answering range queries.
pub trait RowSource {
    /// Starts a fetch. The answer arrives through `complete_fetch`.
    fn request_rows(&mut self, ticket: FetchTicket, request: RowRequest);
}
