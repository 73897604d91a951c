//! FILENAME: core/row-engine/src/node.rs
//! PURPOSE: The row tree: an arena of row nodes addressed by handles.
//! CONTEXT: Parents own their children lists; the `parent` link is a plain
//! handle, never an owning reference. Handles carry a generation so a handle
//! to a destroyed node can never resolve to the node that reused its slot.

use std::ops::{Index, IndexMut};

use row_model::{ColumnId, RowData, RowValue};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::block_store::StoreId;

/// Id of the synthetic root node.
pub const ROOT_NODE_ID: &str = "ROOT_NODE_ID";

/// Id of the grand total footer row.
pub const FOOTER_NODE_ID: &str = "rowGroupFooter_ROOT_NODE_ID";

// ============================================================================
// HANDLES
// ============================================================================

/// Handle to a node in a `RowTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

// ============================================================================
// NODE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// The synthetic root at level -1.
    Root,
    /// A row backed by source data.
    Row,
    /// A group created from the values of a group field.
    Group,
    /// A placeholder for a tree path whose own data row is missing.
    Filler,
    /// A loading placeholder for a row whose block has not arrived.
    Stub,
    /// The detail row shown under an expanded master row.
    Detail,
    /// The grand total footer.
    Footer,
}

/// A row that lost an id conflict and was kept aside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRow {
    pub id: String,
    pub data: RowData,
}

/// One aggregated value plus the number of leaf values behind it.
/// The count lets `avg` and `count` compose across group levels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateValue {
    pub value: RowValue,
    pub count: u64,
}

impl AggregateValue {
    pub fn new(value: impl Into<RowValue>, count: u64) -> Self {
        AggregateValue { value: value.into(), count }
    }
}

/// Aggregate values of a group node, keyed by column id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateRecord {
    values: FxHashMap<ColumnId, AggregateValue>,
}

impl AggregateRecord {
    pub fn new() -> Self {
        AggregateRecord::default()
    }

    pub fn get(&self, column: &str) -> Option<&RowValue> {
        self.values.get(column).map(|v| &v.value)
    }

    pub fn entry(&self, column: &str) -> Option<&AggregateValue> {
        self.values.get(column)
    }

    pub fn insert(&mut self, column: impl Into<ColumnId>, value: AggregateValue) {
        self.values.insert(column.into(), value);
    }

    pub fn remove(&mut self, column: &str) -> Option<AggregateValue> {
        self.values.remove(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnId> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RowNode {
    /// Unique within the owning store. Structural nodes use synthetic ids.
    pub id: String,
    pub kind: NodeKind,
    /// Source payload; absent on groups, fillers and stubs.
    pub data: Option<RowData>,
    /// Key of this node within its parent (group value, path segment or id).
    pub key: Option<String>,
    /// Group field this node groups by.
    pub field: Option<String>,
    /// Original value of the group field, used for ordering groups.
    pub group_value: Option<RowValue>,
    /// Depth from the root (root = -1).
    pub level: i32,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub children_after_filter: Vec<NodeId>,
    pub children_after_sort: Vec<NodeId>,
    pub group: bool,
    pub expanded: bool,
    /// `None` for leaves.
    pub aggregate_values: Option<AggregateRecord>,
    /// Number of times this node's aggregate has been computed.
    pub aggregation_count: u64,
    pub display_index: Option<usize>,
    pub row_top: Option<f64>,
    pub row_height: Option<f64>,
    /// Height set explicitly for this row.
    pub row_height_override: Option<f64>,
    /// Block store paging this node's children (server-side groups).
    pub child_store: Option<StoreId>,
    /// Detail row of an expanded master.
    pub detail_node: Option<NodeId>,
    pub master: bool,
    pub selected: bool,
    /// Rows that arrived with an id already taken under this node.
    pub duplicates: Vec<DuplicateRow>,
    /// Position in the source data, used to order children.
    pub source_order: u64,

    pub(crate) children_by_key: FxHashMap<String, NodeId>,
    pub(crate) expansion_initialized: bool,
    pub(crate) invalidated_children: Vec<NodeId>,
    pub(crate) queued_in: Option<NodeId>,
    pub(crate) children_changed: bool,
    pub(crate) path_changed: bool,
    pub(crate) data_changed: bool,
}

impl RowNode {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        RowNode {
            id: id.into(),
            kind,
            data: None,
            key: None,
            field: None,
            group_value: None,
            level: 0,
            parent: None,
            children: Vec::new(),
            children_after_filter: Vec::new(),
            children_after_sort: Vec::new(),
            group: matches!(kind, NodeKind::Root | NodeKind::Group),
            expanded: false,
            aggregate_values: None,
            aggregation_count: 0,
            display_index: None,
            row_top: None,
            row_height: None,
            row_height_override: None,
            child_store: None,
            detail_node: None,
            master: false,
            selected: false,
            duplicates: Vec::new(),
            source_order: 0,
            children_by_key: FxHashMap::default(),
            expansion_initialized: false,
            invalidated_children: Vec::new(),
            queued_in: None,
            children_changed: false,
            path_changed: false,
            data_changed: false,
        }
    }

    /// A data row at `key`.
    pub fn row(id: impl Into<String>, key: impl Into<String>, data: RowData) -> Self {
        let mut node = RowNode::new(id, NodeKind::Row);
        node.key = Some(key.into());
        node.data = Some(data);
        node
    }

    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Root
    }

    pub fn is_stub(&self) -> bool {
        self.kind == NodeKind::Stub
    }

    pub fn is_filler(&self) -> bool {
        self.kind == NodeKind::Filler
    }

    /// A displayable row with no children.
    pub fn is_leaf(&self) -> bool {
        !self.group && matches!(self.kind, NodeKind::Row | NodeKind::Stub)
    }

    /// Value used when ordering or filtering this node by `field`.
    pub fn value_for(&self, field: &str) -> RowValue {
        if let Some(value) = self.aggregate_values.as_ref().and_then(|agg| agg.get(field)) {
            return value.clone();
        }
        if self.field.as_deref() == Some(field) {
            if let Some(value) = &self.group_value {
                return value.clone();
            }
        }
        self.data.as_ref().map(|d| d.value(field)).unwrap_or_default()
    }
}

// ============================================================================
// TREE
// ============================================================================

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<RowNode>,
}

/// Arena of row nodes with an id -> handle table and a synthetic root.
#[derive(Debug)]
pub struct RowTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_id: FxHashMap<String, NodeId>,
    root: NodeId,
    live: usize,
}

impl Default for RowTree {
    fn default() -> Self {
        RowTree::new()
    }
}

impl RowTree {
    pub fn new() -> Self {
        let mut tree = RowTree {
            slots: Vec::new(),
            free: Vec::new(),
            by_id: FxHashMap::default(),
            root: NodeId { index: 0, generation: 0 },
            live: 0,
        };
        let mut root = RowNode::new(ROOT_NODE_ID, NodeKind::Root);
        root.level = -1;
        root.expanded = true;
        root.expansion_initialized = true;
        tree.root = tree.insert(root);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live <= 1
    }

    pub fn get(&self, id: NodeId) -> Option<&RowNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut RowNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Resolves a row id to its handle.
    pub fn lookup(&self, id: &str) -> Option<NodeId> {
        self.by_id.get(id).copied()
    }

    pub fn node_by_id(&self, id: &str) -> Option<&RowNode> {
        self.lookup(id).and_then(|handle| self.get(handle))
    }

    /// Registered row ids.
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.by_id.keys()
    }

    /// Adds a detached node. Stubs are not entered in the id table.
    pub fn insert(&mut self, node: RowNode) -> NodeId {
        let register = node.kind != NodeKind::Stub && !node.id.is_empty();
        let id_string = node.id.clone();

        let handle = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        };

        self.live += 1;
        if register {
            self.by_id.insert(id_string, handle);
        }
        handle
    }

    /// Changes a node's id, keeping its handle.
    pub fn set_id(&mut self, node: NodeId, new_id: impl Into<String>) {
        let new_id = new_id.into();
        let old_id = std::mem::replace(&mut self[node].id, new_id.clone());
        if self.by_id.get(&old_id) == Some(&node) {
            self.by_id.remove(&old_id);
        }
        if self[node].kind != NodeKind::Stub && !new_id.is_empty() {
            self.by_id.insert(new_id, node);
        }
    }

    /// Links `child` as the last child of `parent` and fixes levels below it.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        let key = self[child].key.clone();
        self[child].parent = Some(parent);

        let p = &mut self[parent];
        p.children.push(child);
        if let Some(key) = key {
            p.children_by_key.insert(key, child);
        }

        let level = self[parent].level + 1;
        self.set_level(child, level);
    }

    /// Unlinks a node from its parent. Returns the former parent.
    pub fn detach(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.get_mut(child)?.parent.take()?;
        let key = self[child].key.clone();
        self[child].queued_in = None;

        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != child);
            p.children_after_filter.retain(|c| *c != child);
            p.children_after_sort.retain(|c| *c != child);
            p.invalidated_children.retain(|c| *c != child);
            if let Some(key) = key {
                if p.children_by_key.get(&key) == Some(&child) {
                    p.children_by_key.remove(&key);
                }
            }
            if p.detail_node == Some(child) {
                p.detail_node = None;
            }
        }
        Some(parent)
    }

    /// Changes the key of a node in place.
    pub fn rekey(&mut self, node: NodeId, new_key: impl Into<String>) {
        let new_key = new_key.into();
        let old_key = self[node].key.replace(new_key.clone());
        if let Some(parent) = self[node].parent {
            let p = &mut self[parent];
            if let Some(old_key) = old_key {
                if p.children_by_key.get(&old_key) == Some(&node) {
                    p.children_by_key.remove(&old_key);
                }
            }
            p.children_by_key.insert(new_key, node);
        }
    }

    /// Replaces the children of `parent` wholesale (paged stores rebuild
    /// their parent's children from block order).
    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        let level = self[parent].level + 1;
        let mut by_key = FxHashMap::default();
        for &child in &children {
            let node = &mut self[child];
            node.parent = Some(parent);
            if let Some(key) = &node.key {
                by_key.insert(key.clone(), child);
            }
            self.set_level(child, level);
        }
        let p = &mut self[parent];
        p.children_after_filter = children.clone();
        p.children_after_sort = children.clone();
        p.children = children;
        p.children_by_key = by_key;
    }

    /// The child of `parent` registered under `key`.
    pub fn child_by_key(&self, parent: NodeId, key: &str) -> Option<NodeId> {
        self.get(parent).and_then(|p| p.children_by_key.get(key).copied())
    }

    fn set_level(&mut self, node: NodeId, level: i32) {
        let mut stack = vec![(node, level)];
        while let Some((current, level)) = stack.pop() {
            let n = &mut self[current];
            n.level = level;
            stack.extend(n.children.iter().map(|c| (*c, level + 1)));
            if let Some(detail) = n.detail_node {
                stack.push((detail, level + 1));
            }
        }
    }

    /// Destroys a node and everything below it (children and detail rows).
    /// Returns the child stores that were owned by destroyed nodes; the
    /// caller must destroy them.
    pub fn destroy_subtree(&mut self, node: NodeId) -> Vec<StoreId> {
        let mut stores = Vec::new();
        if !self.contains(node) || node == self.root {
            return stores;
        }
        self.detach(node);

        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index as usize) else {
                continue;
            };
            if slot.generation != current.generation {
                continue;
            }
            let Some(removed) = slot.node.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
            self.live -= 1;

            if self.by_id.get(&removed.id) == Some(&current) {
                self.by_id.remove(&removed.id);
            }
            if let Some(store) = removed.child_store {
                stores.push(store);
            }
            stack.extend(removed.children);
            stack.extend(removed.detail_node);
        }
        stores
    }

    /// Group keys from the top level down to `node`.
    pub fn path_keys(&self, node: NodeId) -> Vec<String> {
        let mut keys = Vec::new();
        let mut current = self.get(node);
        while let Some(n) = current {
            if n.is_root() {
                break;
            }
            if let Some(key) = &n.key {
                keys.push(key.clone());
            }
            current = n.parent.and_then(|p| self.get(p));
        }
        keys.reverse();
        keys
    }

    /// Visits every node below the root in depth-first pre-order.
    pub fn for_each_node(&self, visit: &mut dyn FnMut(&RowNode)) {
        let mut stack: Vec<NodeId> = self[self.root].children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            visit(node);
            stack.extend(node.children.iter().rev().copied());
        }
    }

    /// Handles of every node below the root in depth-first pre-order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.get(node) {
            Some(n) => n.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(current) = stack.pop() {
            if let Some(n) = self.get(current) {
                out.push(current);
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }
}

impl Index<NodeId> for RowTree {
    type Output = RowNode;

    fn index(&self, id: NodeId) -> &RowNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("stale node handle {:?}", id),
        }
    }
}

impl IndexMut<NodeId> for RowTree {
    fn index_mut(&mut self, id: NodeId) -> &mut RowNode {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("stale node handle {:?}", id),
        }
    }
}
