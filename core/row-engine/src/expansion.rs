//! FILENAME: core/row-engine/src/expansion.rs
//! PURPOSE: Attaches and detaches child stores and detail rows as groups open and close.
//! CONTEXT: A group's child store is created when it expands. On collapse the
//! store is kept for a fast re-expand unless `purge_closed_row_nodes` is set,
//! in which case it is destroyed together with its rows. Master rows get the
//! same treatment for their detail row.

use row_model::Route;
use serde::{Deserialize, Serialize};

use crate::block_store::{StoreArena, StoreId};
use crate::config::StoreConfig;
use crate::node::{NodeId, NodeKind, RowNode, RowTree};
use crate::log_debug;

/// Where a group is in its open/close lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpansionState {
    Collapsed { store_retained: bool },
    /// Open, waiting for the first block (or the detail data).
    Expanding,
    Expanded,
}

/// Identifies one detail load. Only the latest ticket per master is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DetailTicket {
    pub master_id: String,
    pub version: u64,
}

pub struct ExpansionCoordinator {
    purge_closed_row_nodes: bool,
    block_size: usize,
    initial_row_count: usize,
}

impl ExpansionCoordinator {
    pub fn new(config: &StoreConfig) -> Self {
        ExpansionCoordinator {
            purge_closed_row_nodes: config.purge_closed_row_nodes,
            block_size: config.block_size,
            initial_row_count: config.initial_row_count,
        }
    }

    pub fn purges_closed_nodes(&self) -> bool {
        self.purge_closed_row_nodes
    }

    // ------------------------------------------------------------------------
    // Paged groups
    // ------------------------------------------------------------------------

    /// Marks a group open and makes sure it owns a child store.
    /// A retained store is reused with its cached blocks.
    pub fn open_group(&self, tree: &mut RowTree, stores: &mut StoreArena, node: NodeId) -> Option<StoreId> {
        let n = tree.get_mut(node)?;
        if !n.group {
            return None;
        }
        n.expanded = true;
        n.expansion_initialized = true;

        if let Some(existing) = n.child_store.filter(|s| stores.contains(*s)) {
            log_debug!("EXPAND", "re-opening {} with retained store", n.id);
            return Some(existing);
        }

        let level = n.level + 1;
        let route = Route::from_keys(tree.path_keys(node));
        log_debug!("EXPAND", "opening {} route={}", tree[node].id, route);
        let store = stores.create(node, route, level, self.block_size, self.initial_row_count);
        tree[node].child_store = Some(store);
        Some(store)
    }

    /// Marks a group closed. Returns true if its store was destroyed.
    pub fn close_group(&self, tree: &mut RowTree, stores: &mut StoreArena, node: NodeId) -> bool {
        let Some(n) = tree.get_mut(node) else {
            return false;
        };
        n.expanded = false;
        if !self.purge_closed_row_nodes {
            return false;
        }
        match n.child_store.take() {
            Some(store) => {
                log_debug!("EXPAND", "closing {} and destroying its store", tree[node].id);
                stores.destroy(tree, [store]);
                tree.set_children(node, Vec::new());
                true
            }
            None => false,
        }
    }

    pub fn group_state(&self, tree: &RowTree, stores: &StoreArena, node: NodeId) -> Option<ExpansionState> {
        let n = tree.get(node)?;
        let store = n.child_store.and_then(|s| stores.get(s));
        Some(match (n.expanded, store) {
            (false, store) => ExpansionState::Collapsed { store_retained: store.is_some() },
            (true, Some(store)) if store.has_loaded_block() => ExpansionState::Expanded,
            (true, _) => ExpansionState::Expanding,
        })
    }

    // ------------------------------------------------------------------------
    // Master / detail
    // ------------------------------------------------------------------------

    /// Opens a master row and returns its detail node, creating it if needed.
    pub fn open_detail(&self, tree: &mut RowTree, master: NodeId) -> Option<NodeId> {
        let m = tree.get_mut(master)?;
        if !m.master {
            return None;
        }
        m.expanded = true;
        let existing = m.detail_node;
        if let Some(detail) = existing.filter(|d| tree.contains(*d)) {
            return Some(detail);
        }

        let master_id = tree[master].id.clone();
        let mut detail = RowNode::new(format!("detail_{}", master_id), NodeKind::Detail);
        detail.parent = Some(master);
        detail.level = tree[master].level + 1;
        let handle = tree.insert(detail);
        tree[master].detail_node = Some(handle);
        log_debug!("EXPAND", "created detail row for {}", master_id);
        Some(handle)
    }

    /// Closes a master row. Returns true if its detail node was destroyed.
    pub fn close_detail(&self, tree: &mut RowTree, master: NodeId) -> bool {
        let Some(m) = tree.get_mut(master) else {
            return false;
        };
        m.expanded = false;
        if !self.purge_closed_row_nodes {
            return false;
        }
        let detail = m.detail_node;
        match detail {
            Some(detail) => {
                tree.destroy_subtree(detail);
                true
            }
            None => false,
        }
    }

    pub fn detail_state(&self, tree: &RowTree, master: NodeId) -> Option<ExpansionState> {
        let m = tree.get(master)?;
        let detail = m.detail_node.and_then(|d| tree.get(d));
        Some(match (m.expanded, detail) {
            (false, detail) => ExpansionState::Collapsed { store_retained: detail.is_some() },
            (true, Some(d)) if d.data.is_some() => ExpansionState::Expanded,
            (true, _) => ExpansionState::Expanding,
        })
    }
}
