//! FILENAME: core/row-engine/src/reconciler.rs
//! Hierarchy Reconciler - turns row batches into minimal tree mutations.
//!
//! Works in two phases. The invalidate phase places every incoming row at its
//! target path, creating group or filler nodes for missing segments and moving
//! rows whose path changed. Each touched node queues itself on its parent.
//! The commit phase then walks those queues depth-first: children are
//! reordered, group flags and initial expansion are settled, and empty
//! structural nodes are dropped. Rows removed and not re-added in the same
//! batch are destroyed last.
//!
//! Node handles survive moves, re-keys and filler conversion, so expansion
//! state and attached stores are never lost to an unrelated update.

use row_model::{RowData, RowValue};
use rustc_hash::FxHashSet;

use crate::change_path::ChangePath;
use crate::config::StoreConfig;
use crate::events::{EventQueue, StoreEvent, StoreWarning};
use crate::node::{DuplicateRow, NodeId, NodeKind, RowNode, RowTree};
use crate::policy::Policies;
use crate::transaction::{RowTransaction, TransactionResult};
use crate::{log_debug, log_enter, log_exit};

// ============================================================================
// TYPES
// ============================================================================

/// How rows are placed in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Hierarchy {
    /// Every row is a direct child of the root.
    Flat,
    /// Rows are grouped by the values of these fields, outer first.
    GroupBy(Vec<String>),
    /// Rows carry their own path; missing segments become fillers.
    TreeData,
}

impl Hierarchy {
    pub fn from_config(config: &StoreConfig) -> Self {
        if config.tree_data {
            Hierarchy::TreeData
        } else if !config.group_fields.is_empty() {
            Hierarchy::GroupBy(config.group_fields.clone())
        } else {
            Hierarchy::Flat
        }
    }
}

/// The state a reconciliation pass mutates.
pub struct ReconcileScope<'a> {
    pub tree: &'a mut RowTree,
    pub change_path: &'a mut ChangePath,
    pub events: &'a mut EventQueue,
    pub policies: &'a Policies,
}

/// Where a row belongs: the keys of its ancestors and its own key.
struct Placement {
    parent_keys: Vec<(String, RowValue)>,
    own_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpsertMode {
    Reload,
    Add,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upsert {
    Added,
    Updated,
    Unchanged,
    Duplicate,
    Invalid,
    Missing,
}

// ============================================================================
// RECONCILER
// ============================================================================

pub struct HierarchyReconciler {
    hierarchy: Hierarchy,
    id_field: String,
    group_default_expanded: i32,
    master_detail: bool,
    /// (parent id, row id) pairs already reported as duplicates.
    warned_duplicates: FxHashSet<(String, String)>,
    pending_destroy: Vec<NodeId>,
    next_source_order: u64,
    next_synthetic_id: u64,
}

impl HierarchyReconciler {
    pub fn new(config: &StoreConfig) -> Self {
        HierarchyReconciler {
            hierarchy: Hierarchy::from_config(config),
            id_field: config.row_id_field.clone(),
            group_default_expanded: config.group_default_expanded,
            master_detail: config.master_detail,
            warned_duplicates: FxHashSet::default(),
            pending_destroy: Vec::new(),
            next_source_order: 0,
            next_synthetic_id: 0,
        }
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Replaces the whole row set. Rows are matched to existing nodes by id;
    /// rows without an id get a positional id. Unchanged rows are untouched.
    pub fn set_row_data(&mut self, scope: &mut ReconcileScope<'_>, rows: Vec<RowData>) -> TransactionResult {
        log_enter!("RECONCILE", "set_row_data", "rows={}", rows.len());
        let row_count = rows.len() as u64;

        // Side-sets are rebuilt from this batch.
        let root = scope.tree.root();
        scope.tree[root].duplicates.clear();
        for node in scope.tree.descendants(root) {
            scope.tree[node].duplicates.clear();
        }

        let mut result = TransactionResult::found();
        let mut seen: FxHashSet<String> = FxHashSet::default();

        for (index, data) in rows.into_iter().enumerate() {
            let id = data.key(&self.id_field).unwrap_or_else(|| format!("row-{}", index));
            if seen.contains(&id) {
                let parent = scope
                    .tree
                    .lookup(&id)
                    .and_then(|n| scope.tree[n].parent)
                    .unwrap_or(root);
                self.record_duplicate(scope, parent, &id, data);
                continue;
            }
            let outcome = self.upsert(scope, &id, data, UpsertMode::Reload, Some(index as u64));
            match outcome {
                Upsert::Invalid => continue,
                Upsert::Added => result.added.push(id.clone()),
                Upsert::Updated => result.updated.push(id.clone()),
                _ => {}
            }
            seen.insert(id);
        }
        self.next_source_order = self.next_source_order.max(row_count);

        let stale: Vec<NodeId> = scope
            .tree
            .descendants(root)
            .into_iter()
            .filter(|n| {
                let node = &scope.tree[*n];
                node.kind == NodeKind::Row && !seen.contains(&node.id)
            })
            .collect();
        for node in stale {
            if let Some(id) = scope.tree.get(node).map(|n| n.id.clone()) {
                self.remove_node(scope, node);
                result.removed.push(id);
            }
        }

        self.commit(scope);
        log_exit!(
            "RECONCILE",
            "set_row_data",
            "added={} updated={} removed={}",
            result.added.len(),
            result.updated.len(),
            result.removed.len()
        );
        result
    }

    /// Applies one transaction and commits it.
    pub fn apply_transaction(&mut self, scope: &mut ReconcileScope<'_>, tx: &RowTransaction) -> TransactionResult {
        let result = self.stage_transaction(scope, tx);
        self.commit(scope);
        result
    }

    /// Runs the invalidate phase of a transaction without committing, so
    /// several transactions can share one commit.
    pub fn stage_transaction(&mut self, scope: &mut ReconcileScope<'_>, tx: &RowTransaction) -> TransactionResult {
        log_debug!(
            "RECONCILE",
            "stage transaction add={} update={} remove={}",
            tx.add.len(),
            tx.update.len(),
            tx.remove.len()
        );
        let mut result = TransactionResult::found();

        for data in &tx.remove {
            let Some(id) = data.key(&self.id_field) else {
                continue;
            };
            let Some(node) = scope.tree.lookup(&id) else {
                continue;
            };
            let n = &scope.tree[node];
            if n.kind != NodeKind::Row || n.parent.is_none() {
                continue;
            }
            self.remove_node(scope, node);
            result.removed.push(id);
        }

        for data in &tx.update {
            let Some(id) = data.key(&self.id_field) else {
                continue;
            };
            match self.upsert(scope, &id, data.clone(), UpsertMode::Update, None) {
                Upsert::Updated | Upsert::Unchanged => result.updated.push(id),
                _ => {}
            }
        }

        for data in &tx.add {
            let id = match data.key(&self.id_field) {
                Some(id) => id,
                None => {
                    self.next_synthetic_id += 1;
                    format!("row-tx-{}", self.next_synthetic_id)
                }
            };
            let order = self.next_source_order;
            self.next_source_order += 1;
            if self.upsert(scope, &id, data.clone(), UpsertMode::Add, Some(order)) == Upsert::Added {
                result.added.push(id);
            }
        }
        result
    }

    // ------------------------------------------------------------------------
    // Invalidate phase
    // ------------------------------------------------------------------------

    fn placement(&self, policies: &Policies, id: &str, data: &RowData) -> Option<Placement> {
        match &self.hierarchy {
            Hierarchy::Flat => Some(Placement { parent_keys: Vec::new(), own_key: id.to_string() }),
            Hierarchy::GroupBy(fields) => Some(Placement {
                parent_keys: fields
                    .iter()
                    .map(|f| {
                        let value = data.value(f);
                        (value.key_string(), value)
                    })
                    .collect(),
                own_key: id.to_string(),
            }),
            Hierarchy::TreeData => {
                let mut path = policies.data_path.data_path(data)?;
                if path.iter().any(|segment| segment.is_empty()) {
                    return None;
                }
                let own_key = path.pop()?;
                Some(Placement {
                    parent_keys: path
                        .into_iter()
                        .map(|segment| (segment.clone(), RowValue::Text(segment)))
                        .collect(),
                    own_key,
                })
            }
        }
    }

    fn upsert(
        &mut self,
        scope: &mut ReconcileScope<'_>,
        id: &str,
        data: RowData,
        mode: UpsertMode,
        order: Option<u64>,
    ) -> Upsert {
        let Some(placement) = self.placement(scope.policies, id, &data) else {
            scope.events.warn("RECONCILE", StoreWarning::InvalidDataPath { row_id: id.to_string() });
            return Upsert::Invalid;
        };

        let existing = scope
            .tree
            .lookup(id)
            .filter(|n| scope.tree[*n].kind == NodeKind::Row);
        let attached_parent = existing.and_then(|n| scope.tree[n].parent);

        if mode == UpsertMode::Add {
            if let Some(parent) = attached_parent {
                self.record_duplicate(scope, parent, id, data);
                return Upsert::Duplicate;
            }
        }
        if mode == UpsertMode::Update && existing.is_none() {
            return Upsert::Missing;
        }

        let parent = self.ensure_parent(scope, &placement.parent_keys, order);
        let slot = scope.tree.child_by_key(parent, &placement.own_key);

        // Same place: update in place.
        if let (Some(node), Some(slot)) = (existing, slot) {
            if node == slot {
                let changed = self.assign(scope.tree, node, data, order);
                return if changed { Upsert::Updated } else { Upsert::Unchanged };
            }
        }

        // The slot is held by another data row.
        let filler = match slot {
            Some(other) if scope.tree[other].kind == NodeKind::Filler => Some(other),
            Some(_) => {
                self.record_duplicate(scope, parent, id, data);
                return Upsert::Duplicate;
            }
            None => None,
        };

        match existing {
            Some(node) => {
                self.move_node(scope.tree, node, parent, &placement.own_key, filler);
                self.assign(scope.tree, node, data, order);
                if attached_parent.is_some() {
                    Upsert::Updated
                } else {
                    Upsert::Added
                }
            }
            None => {
                if let Some(filler) = filler {
                    self.convert_filler(scope.tree, filler, id, data, order);
                } else {
                    let mut node = RowNode::row(id, placement.own_key.clone(), data);
                    node.master = self.master_detail;
                    node.source_order = order.unwrap_or(self.next_source_order);
                    node.data_changed = true;
                    let handle = scope.tree.insert(node);
                    scope.tree.attach(parent, handle);
                    scope.tree[parent].children_changed = true;
                    invalidate(scope.tree, handle);
                }
                Upsert::Added
            }
        }
    }

    /// Writes new data and source order onto a node. Returns true on change.
    fn assign(&self, tree: &mut RowTree, node: NodeId, data: RowData, order: Option<u64>) -> bool {
        let mut changed = false;
        let n = &mut tree[node];
        if n.data.as_ref() != Some(&data) {
            n.data = Some(data);
            n.data_changed = true;
            changed = true;
        }
        if let Some(order) = order {
            if n.source_order != order {
                n.source_order = order;
                if let Some(parent) = n.parent {
                    tree[parent].children_changed = true;
                }
                changed = true;
            }
        }
        if changed {
            invalidate(tree, node);
        }
        changed
    }

    /// Walks the parent keys from the root, creating groups or fillers for
    /// segments that have no node yet.
    fn ensure_parent(
        &mut self,
        scope: &mut ReconcileScope<'_>,
        keys: &[(String, RowValue)],
        order: Option<u64>,
    ) -> NodeId {
        let tree = &mut *scope.tree;
        let mut current = tree.root();

        for (depth, (key, value)) in keys.iter().enumerate() {
            if let Some(child) = tree.child_by_key(current, key) {
                current = child;
                continue;
            }

            let mut node = match &self.hierarchy {
                Hierarchy::GroupBy(fields) => {
                    let id = fields
                        .iter()
                        .zip(keys.iter())
                        .take(depth + 1)
                        .fold(String::from("row-group"), |acc, (f, (k, _))| format!("{}-{}-{}", acc, f, k));
                    let mut group = RowNode::new(id, NodeKind::Group);
                    group.field = fields.get(depth).cloned();
                    group.group_value = Some(value.clone());
                    group
                }
                _ => {
                    let path: Vec<&str> = keys.iter().take(depth + 1).map(|(k, _)| k.as_str()).collect();
                    RowNode::new(format!("filler_{}", path.join("/")), NodeKind::Filler)
                }
            };
            node.key = Some(key.clone());
            node.source_order = order.unwrap_or(self.next_source_order);
            node.children_changed = true;

            log_debug!("RECONCILE", "creating {:?} {}", node.kind, node.id);
            let handle = tree.insert(node);
            tree.attach(current, handle);
            tree[current].children_changed = true;
            invalidate(tree, handle);
            current = handle;
        }
        current
    }

    /// Moves (or re-keys) a node to `parent` under `key`. A filler holding
    /// the target slot hands its children over and is dropped.
    fn move_node(&mut self, tree: &mut RowTree, node: NodeId, parent: NodeId, key: &str, filler: Option<NodeId>) {
        if let Some(filler) = filler {
            let adopted = tree[filler].children.clone();
            for child in adopted {
                tree.detach(child);
                tree.attach(node, child);
            }
            tree[node].children_changed = true;
            tree.destroy_subtree(filler);
        }

        let old_parent = tree[node].parent;
        let key_changed = tree[node].key.as_deref() != Some(key);

        if old_parent == Some(parent) {
            if key_changed {
                log_debug!("RECONCILE", "re-keying {} to {}", tree[node].id, key);
                tree.rekey(node, key);
                tree[node].path_changed = true;
            }
        } else {
            if let Some(old) = old_parent {
                tree.detach(node);
                tree[old].children_changed = true;
                invalidate(tree, old);
            }
            tree[node].key = Some(key.to_string());
            if key_changed || old_parent.is_some() {
                tree[node].path_changed = true;
            }
            tree.attach(parent, node);
            tree[parent].children_changed = true;
        }
        invalidate(tree, node);
    }

    /// Turns a filler into the data row for its path, keeping its handle.
    fn convert_filler(&mut self, tree: &mut RowTree, filler: NodeId, id: &str, data: RowData, order: Option<u64>) {
        log_debug!("RECONCILE", "filling {} with row {}", tree[filler].id, id);
        {
            let n = &mut tree[filler];
            n.kind = NodeKind::Row;
            n.data = Some(data);
            n.master = self.master_detail;
            n.data_changed = true;
            if let Some(order) = order {
                n.source_order = order;
            }
        }
        tree.set_id(filler, id);
        invalidate(tree, filler);
    }

    /// Removes a row. A tree row that still has children degrades to a filler.
    fn remove_node(&mut self, scope: &mut ReconcileScope<'_>, node: NodeId) {
        let tree = &mut *scope.tree;
        let keeps_children = self.hierarchy == Hierarchy::TreeData && !tree[node].children.is_empty();

        if keeps_children {
            let path = tree.path_keys(node).join("/");
            log_debug!("RECONCILE", "row {} keeps children, becoming filler", tree[node].id);
            if tree[node].selected {
                scope.events.push(StoreEvent::RowDeselected { row_id: tree[node].id.clone() });
            }
            {
                let n = &mut tree[node];
                n.kind = NodeKind::Filler;
                n.data = None;
                n.master = false;
                n.selected = false;
                n.data_changed = true;
            }
            if let Some(detail) = tree[node].detail_node {
                tree.destroy_subtree(detail);
            }
            tree.set_id(node, format!("filler_{}", path));
            invalidate(tree, node);
        } else {
            if let Some(parent) = tree.detach(node) {
                tree[parent].children_changed = true;
                invalidate(tree, parent);
            }
            self.pending_destroy.push(node);
        }
    }

    fn record_duplicate(&mut self, scope: &mut ReconcileScope<'_>, parent: NodeId, id: &str, data: RowData) {
        let parent_id = scope.tree[parent].id.clone();
        scope.tree[parent].duplicates.push(DuplicateRow { id: id.to_string(), data });
        if self.warned_duplicates.insert((parent_id.clone(), id.to_string())) {
            scope.events.warn(
                "RECONCILE",
                StoreWarning::DuplicateRowId { parent_id, row_id: id.to_string() },
            );
        }
    }

    // ------------------------------------------------------------------------
    // Commit phase
    // ------------------------------------------------------------------------

    /// Processes the invalidation queues from the root, then destroys rows
    /// that were removed and not re-added.
    pub fn commit(&mut self, scope: &mut ReconcileScope<'_>) {
        let root = scope.tree.root();
        self.commit_node(scope, root);
        self.finalize(scope);
    }

    fn commit_node(&mut self, scope: &mut ReconcileScope<'_>, node: NodeId) {
        let queue = std::mem::take(&mut scope.tree[node].invalidated_children);
        for child in queue {
            match scope.tree.get_mut(child) {
                Some(c) if c.parent == Some(node) => c.queued_in = None,
                _ => continue,
            }
            self.commit_node(scope, child);
        }
        self.commit_post_order(scope, node);
    }

    fn commit_post_order(&mut self, scope: &mut ReconcileScope<'_>, node: NodeId) {
        let tree = &mut *scope.tree;
        let is_root = node == tree.root();

        if tree[node].children_changed {
            let mut children = std::mem::take(&mut tree[node].children);
            children.sort_by_key(|c| tree[*c].source_order);
            tree[node].children = children;
        }

        let kind = tree[node].kind;
        if matches!(kind, NodeKind::Group | NodeKind::Filler) {
            let first = tree[node].children.iter().map(|c| tree[*c].source_order).min();
            if let Some(first) = first {
                if first != tree[node].source_order {
                    tree[node].source_order = first;
                    if let Some(parent) = tree[node].parent {
                        tree[parent].children_changed = true;
                    }
                }
            }
        }

        // Structural nodes with nothing under them have no path to represent.
        if !is_root && tree[node].children.is_empty() && matches!(kind, NodeKind::Group | NodeKind::Filler) {
            log_debug!("RECONCILE", "dropping empty {:?} {}", kind, tree[node].id);
            if let Some(parent) = tree.detach(node) {
                tree[parent].children_changed = true;
                scope.change_path.add_parent_node(tree, parent, None);
            }
            tree.destroy_subtree(node);
            return;
        }

        let was_group = tree[node].group;
        let group = is_root || kind == NodeKind::Group || !tree[node].children.is_empty();
        let flipped = was_group != group;
        if flipped {
            let n = &mut tree[node];
            n.group = group;
            n.expansion_initialized = false;
            if !group {
                n.expanded = false;
            }
        }

        if group && !is_root && !tree[node].expansion_initialized {
            let expanded = scope.policies.initial_expanded(&tree[node], self.group_default_expanded);
            let n = &mut tree[node];
            n.expanded = expanded;
            n.expansion_initialized = true;
        }

        let n = &tree[node];
        if n.children_changed || n.data_changed || n.path_changed || flipped {
            scope.change_path.add_parent_node(tree, node, None);
        }

        let n = &mut tree[node];
        n.children_changed = false;
        n.data_changed = false;
        n.path_changed = false;
    }

    fn finalize(&mut self, scope: &mut ReconcileScope<'_>) {
        for node in std::mem::take(&mut self.pending_destroy) {
            let Some(n) = scope.tree.get(node) else {
                continue;
            };
            if n.parent.is_some() {
                continue;
            }

            let mut doomed = vec![node];
            doomed.extend(scope.tree.descendants(node));
            for handle in doomed {
                let d = &scope.tree[handle];
                if d.selected {
                    scope.events.push(StoreEvent::RowDeselected { row_id: d.id.clone() });
                }
            }
            log_debug!("RECONCILE", "destroying {}", scope.tree[node].id);
            scope.tree.destroy_subtree(node);
        }
    }
}

/// Queues `node` on its parent, and each ancestor on its own parent, until
/// reaching a link that is already queued.
fn invalidate(tree: &mut RowTree, node: NodeId) {
    let mut current = node;
    while let Some(parent) = tree.get(current).and_then(|n| n.parent) {
        if tree[current].queued_in == Some(parent) {
            break;
        }
        tree[current].queued_in = Some(parent);
        tree[parent].invalidated_children.push(current);
        current = parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        tree: RowTree,
        change_path: ChangePath,
        events: EventQueue,
        policies: Policies,
        reconciler: HierarchyReconciler,
    }

    impl Fixture {
        fn new(config: StoreConfig) -> Self {
            Fixture {
                tree: RowTree::new(),
                change_path: ChangePath::inactive(),
                events: EventQueue::new(),
                policies: Policies::new(&config.data_path_field),
                reconciler: HierarchyReconciler::new(&config),
            }
        }

        fn reload(&mut self, rows: Vec<RowData>) -> TransactionResult {
            self.change_path = ChangePath::inactive();
            let mut scope = ReconcileScope {
                tree: &mut self.tree,
                change_path: &mut self.change_path,
                events: &mut self.events,
                policies: &self.policies,
            };
            self.reconciler.set_row_data(&mut scope, rows)
        }

        fn apply(&mut self, tx: RowTransaction) -> TransactionResult {
            self.change_path = ChangePath::active();
            let mut scope = ReconcileScope {
                tree: &mut self.tree,
                change_path: &mut self.change_path,
                events: &mut self.events,
                policies: &self.policies,
            };
            self.reconciler.apply_transaction(&mut scope, &tx)
        }

        fn ids_under(&self, id: &str) -> Vec<String> {
            let node = self.tree.lookup(id).unwrap();
            self.tree[node].children.iter().map(|c| self.tree[*c].id.clone()).collect()
        }
    }

    fn row(id: &str, path: &str) -> RowData {
        RowData::new().with("id", id).with("path", path)
    }

    fn tree_config() -> StoreConfig {
        StoreConfig { tree_data: true, ..StoreConfig::default() }
    }

    #[test]
    fn test_tree_data_creates_fillers() {
        let mut fx = Fixture::new(tree_config());
        fx.reload(vec![row("c", "a/b/c")]);

        let a = fx.tree.lookup("filler_a").unwrap();
        assert!(fx.tree[a].group);
        assert_eq!(fx.ids_under("filler_a"), vec!["filler_a/b"]);
        assert_eq!(fx.ids_under("filler_a/b"), vec!["c"]);
        assert_eq!(fx.tree[fx.tree.lookup("c").unwrap()].level, 2);
    }

    #[test]
    fn test_filler_is_filled_in_place() {
        let mut fx = Fixture::new(tree_config());
        fx.reload(vec![row("c", "a/c")]);
        let filler = fx.tree.lookup("filler_a").unwrap();
        fx.tree[filler].expanded = true;

        fx.apply(RowTransaction::new().add(row("a", "a")));
        let a = fx.tree.lookup("a").unwrap();
        assert_eq!(a, filler);
        assert!(fx.tree[a].expanded);
        assert_eq!(fx.tree[a].kind, NodeKind::Row);
        assert!(fx.tree.lookup("filler_a").is_none());
    }

    #[test]
    fn test_removing_parent_row_keeps_children_under_filler() {
        let mut fx = Fixture::new(tree_config());
        fx.reload(vec![row("a", "a"), row("b", "a/b")]);
        let a = fx.tree.lookup("a").unwrap();

        let result = fx.apply(RowTransaction::new().remove(row("a", "a")));
        assert_eq!(result.removed, vec!["a"]);
        assert_eq!(fx.tree.lookup("filler_a"), Some(a));
        assert_eq!(fx.ids_under("filler_a"), vec!["b"]);

        fx.apply(RowTransaction::new().remove(row("b", "a/b")));
        assert!(fx.tree.lookup("filler_a").is_none());
        assert!(fx.tree[fx.tree.root()].children.is_empty());
    }

    #[test]
    fn test_invalid_path_is_skipped_with_warning() {
        let mut fx = Fixture::new(tree_config());
        fx.reload(vec![RowData::new().with("id", "x"), row("y", "y")]);

        assert!(fx.tree.lookup("x").is_none());
        assert!(fx.tree.lookup("y").is_some());
        let events = fx.events.drain();
        assert!(events.contains(&StoreEvent::Warning(StoreWarning::InvalidDataPath { row_id: "x".to_string() })));
    }

    #[test]
    fn test_rekey_preserves_identity() {
        let mut fx = Fixture::new(tree_config());
        fx.reload(vec![row("a", "a"), row("b", "a/b")]);
        let a = fx.tree.lookup("a").unwrap();
        fx.tree[a].expanded = true;

        fx.apply(RowTransaction::new().update(row("a", "renamed")));
        assert_eq!(fx.tree.lookup("a"), Some(a));
        assert_eq!(fx.tree[a].key.as_deref(), Some("renamed"));
        assert!(fx.tree[a].expanded);
        assert_eq!(fx.ids_under("a"), vec!["b"]);
    }

    #[test]
    fn test_group_by_moves_row_and_drops_empty_group() {
        let config = StoreConfig { group_fields: vec!["country".to_string()], ..StoreConfig::default() };
        let mut fx = Fixture::new(config);
        fx.reload(vec![
            RowData::new().with("id", "1").with("country", "IE"),
            RowData::new().with("id", "2").with("country", "FR"),
        ]);
        let one = fx.tree.lookup("1").unwrap();
        assert_eq!(fx.ids_under("row-group-country-IE"), vec!["1"]);

        fx.apply(RowTransaction::new().update(RowData::new().with("id", "1").with("country", "FR")));
        assert_eq!(fx.tree.lookup("1"), Some(one));
        assert!(fx.tree.lookup("row-group-country-IE").is_none());
        assert_eq!(fx.ids_under("row-group-country-FR"), vec!["1", "2"]);
    }

    #[test]
    fn test_initial_expansion_uses_default_depth() {
        let config = StoreConfig {
            group_fields: vec!["country".to_string(), "year".to_string()],
            group_default_expanded: 1,
            ..StoreConfig::default()
        };
        let mut fx = Fixture::new(config);
        fx.reload(vec![RowData::new().with("id", "1").with("country", "IE").with("year", 2020)]);

        let country = fx.tree.node_by_id("row-group-country-IE").unwrap();
        let year = fx.tree.node_by_id("row-group-country-IE-year-2020").unwrap();
        assert!(country.expanded);
        assert!(!year.expanded);
    }

    #[test]
    fn test_duplicate_add_goes_to_side_set() {
        let mut fx = Fixture::new(StoreConfig::default());
        fx.reload(vec![RowData::new().with("id", "A").with("v", 1)]);
        let result = fx.apply(RowTransaction::new().add(RowData::new().with("id", "A").with("v", 2)));

        assert!(result.added.is_empty());
        let root = fx.tree.root();
        assert_eq!(fx.tree[root].duplicates.len(), 1);
        assert_eq!(fx.tree[root].children.len(), 1);
    }

    #[test]
    fn test_removed_selected_row_is_deselected() {
        let mut fx = Fixture::new(StoreConfig::default());
        fx.reload(vec![RowData::new().with("id", "1"), RowData::new().with("id", "2")]);
        let one = fx.tree.lookup("1").unwrap();
        fx.tree[one].selected = true;
        fx.events.drain();

        fx.reload(vec![RowData::new().with("id", "2")]);
        assert!(fx.tree.get(one).is_none());
        assert_eq!(fx.events.drain(), vec![StoreEvent::RowDeselected { row_id: "1".to_string() }]);
    }
}
