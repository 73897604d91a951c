//! FILENAME: core/row-engine/src/events.rs
//! PURPOSE: Notifications produced by the row store.
//! CONTEXT: Observers are not called back directly. Every committed change is
//! queued as a `StoreEvent` and the host drains the queue once per refresh,
//! so "what changed" stays data instead of a side effect.

use std::collections::VecDeque;

use row_model::{ColumnId, Route, RowValue};
use serde::{Deserialize, Serialize};

use crate::config::ConfigWarning;
use crate::log_warn;
use crate::transaction::TransactionResult;

// ============================================================================
// EVENT TYPES
// ============================================================================

/// Developer-facing problems that degrade to "row not shown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreWarning {
    /// A second row arrived with an id already present under the same parent.
    DuplicateRowId { parent_id: String, row_id: String },
    /// The data path of a row was missing or empty; the row was skipped.
    InvalidDataPath { row_id: String },
    Config(ConfigWarning),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreEvent {
    /// Something committed; re-query the read API. Carries no payload.
    StoreUpdated,
    /// An aggregate (or edited) cell changed value.
    CellValueChanged {
        row_id: String,
        column: ColumnId,
        old_value: Option<RowValue>,
        new_value: Option<RowValue>,
    },
    RowGroupOpened { row_id: String, expanded: bool },
    /// A selected row was destroyed during reconciliation.
    RowDeselected { row_id: String },
    BlockLoadFailed { route: Route, block_number: usize },
    /// The generated pivot result columns changed.
    PivotColumnsChanged { columns: Vec<ColumnId> },
    AsyncTransactionsFlushed { results: Vec<TransactionResult> },
    Warning(StoreWarning),
}

// ============================================================================
// EVENT QUEUE
// ============================================================================

#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<StoreEvent>,
    /// Cell-change events are only produced when someone listens for them.
    cell_change_listener: bool,
    /// A store-updated notification is owed at the next commit.
    update_pending: bool,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue::default()
    }

    pub fn set_cell_change_listener(&mut self, listening: bool) {
        self.cell_change_listener = listening;
    }

    pub fn has_cell_change_listener(&self) -> bool {
        self.cell_change_listener
    }

    pub fn push(&mut self, event: StoreEvent) {
        self.events.push_back(event);
    }

    /// Queues a cell change if a listener is registered.
    pub fn cell_changed(
        &mut self,
        row_id: &str,
        column: &str,
        old_value: Option<RowValue>,
        new_value: Option<RowValue>,
    ) {
        if !self.cell_change_listener || old_value == new_value {
            return;
        }
        self.events.push_back(StoreEvent::CellValueChanged {
            row_id: row_id.to_string(),
            column: column.to_string(),
            old_value,
            new_value,
        });
    }

    /// Logs a warning and queues it for the host.
    pub fn warn(&mut self, category: &'static str, warning: StoreWarning) {
        log_warn!(category, "{:?}", warning);
        self.events.push_back(StoreEvent::Warning(warning));
    }

    /// Records that the committed state changed.
    pub fn mark_updated(&mut self) {
        self.update_pending = true;
    }

    /// Emits the single store-updated notification owed by this commit, if any.
    pub fn commit(&mut self) {
        if self.update_pending {
            self.update_pending = false;
            self.events.push_back(StoreEvent::StoreUpdated);
        }
    }

    pub fn drain(&mut self) -> Vec<StoreEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
