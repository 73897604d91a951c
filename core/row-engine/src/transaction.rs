//! FILENAME: core/row-engine/src/transaction.rs
//! PURPOSE: Row transactions and the debounced queue for asynchronous ones.
//! CONTEXT: Asynchronous transactions are held until the debounce window
//! measured from the first queued transaction has passed, then applied
//! together with a single refresh. Time is supplied by the caller, never
//! read from a clock.

use row_model::{Route, RowData};
use serde::{Deserialize, Serialize};

/// Incremental change to the rows of one store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RowTransaction {
    /// Group keys of the store to change (server-side); empty for the top level.
    pub route: Route,
    pub add: Vec<RowData>,
    /// Position for added rows; appended when absent.
    pub add_index: Option<usize>,
    pub remove: Vec<RowData>,
    pub update: Vec<RowData>,
}

impl RowTransaction {
    pub fn new() -> Self {
        RowTransaction::default()
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.route = route;
        self
    }

    pub fn add(mut self, row: RowData) -> Self {
        self.add.push(row);
        self
    }

    pub fn add_at(mut self, index: usize, row: RowData) -> Self {
        self.add_index = Some(index);
        self.add.push(row);
        self
    }

    pub fn remove(mut self, row: RowData) -> Self {
        self.remove.push(row);
        self
    }

    pub fn update(mut self, row: RowData) -> Self {
        self.update.push(row);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.update.is_empty()
    }
}

/// Outcome of a transaction: ids that were added, removed and updated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub route_found: bool,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<String>,
}

impl TransactionResult {
    pub fn found() -> Self {
        TransactionResult { route_found: true, ..TransactionResult::default() }
    }

    pub fn route_not_found() -> Self {
        TransactionResult::default()
    }
}

/// Invoked once the transaction's effect has been committed.
pub type TransactionCallback = Box<dyn FnOnce(&TransactionResult)>;

// ============================================================================
// ASYNC QUEUE
// ============================================================================

pub struct AsyncTransactionQueue {
    wait_millis: u64,
    pending: Vec<(RowTransaction, Option<TransactionCallback>)>,
    /// Time the oldest pending transaction was queued.
    first_queued_at: Option<u64>,
}

impl AsyncTransactionQueue {
    pub fn new(wait_millis: u64) -> Self {
        AsyncTransactionQueue { wait_millis, pending: Vec::new(), first_queued_at: None }
    }

    pub fn push(&mut self, tx: RowTransaction, callback: Option<TransactionCallback>, now_ms: u64) {
        if self.first_queued_at.is_none() {
            self.first_queued_at = Some(now_ms);
        }
        self.pending.push((tx, callback));
    }

    /// True once the debounce window has elapsed.
    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.first_queued_at {
            Some(queued) => now_ms.saturating_sub(queued) >= self.wait_millis,
            None => false,
        }
    }

    pub fn take(&mut self) -> Vec<(RowTransaction, Option<TransactionCallback>)> {
        self.first_queued_at = None;
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
