//! FILENAME: core/row-engine/src/change_path.rs
//! PURPOSE: Tracks which ancestor chains were touched during one refresh.
//! CONTEXT: Aggregation walks only the registered chains, children before
//! parents. A full reload leaves the path inactive, and an inactive path
//! walks the whole tree.

use row_model::ColumnId;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::node::{NodeId, RowTree};

#[derive(Debug, Default)]
struct PathEntry {
    children: Vec<NodeId>,
    /// Columns to recompute at this node. `None` means every column.
    columns: Option<FxHashSet<ColumnId>>,
}

#[derive(Debug, Default)]
pub struct ChangePath {
    active: bool,
    entries: FxHashMap<NodeId, PathEntry>,
    /// Column restriction applying to every node (used by inactive paths).
    columns: Option<FxHashSet<ColumnId>>,
}

impl ChangePath {
    /// An inactive path: everything counts as changed.
    pub fn inactive() -> Self {
        ChangePath::default()
    }

    /// An active path with nothing registered yet.
    pub fn active() -> Self {
        ChangePath { active: true, ..ChangePath::default() }
    }

    /// Restricts recomputation to the given columns for every visited node.
    pub fn with_columns<I: IntoIterator<Item = ColumnId>>(mut self, columns: I) -> Self {
        self.columns = Some(columns.into_iter().collect());
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_inactive(&mut self) {
        self.active = false;
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if the node is on a registered chain (always true when inactive).
    pub fn is_in_path(&self, node: NodeId) -> bool {
        !self.active || self.entries.contains_key(&node)
    }

    /// Registers `node` and all of its ancestors up to the root.
    /// `columns` limits recomputation to a subset; `None` means all columns.
    pub fn add_parent_node(&mut self, tree: &RowTree, node: NodeId, columns: Option<&[ColumnId]>) {
        if !self.active {
            return;
        }
        let mut current = node;
        let mut child: Option<NodeId> = None;
        loop {
            let entry = self.entries.entry(current);
            let is_new = matches!(entry, std::collections::hash_map::Entry::Vacant(_));
            let entry = entry.or_insert_with(|| PathEntry {
                children: Vec::new(),
                columns: columns.map(|c| c.iter().cloned().collect()),
            });

            if !is_new {
                match (&mut entry.columns, columns) {
                    (Some(existing), Some(cols)) => existing.extend(cols.iter().cloned()),
                    (slot, None) => *slot = None,
                    (None, Some(_)) => {}
                }
            }
            if let Some(child) = child {
                if !entry.children.contains(&child) {
                    entry.children.push(child);
                }
            }

            // An existing entry already links its own ancestors; only the
            // column set may still need widening further up.
            let Some(parent) = tree.get(current).and_then(|n| n.parent) else {
                break;
            };
            if !is_new && columns.is_some() && self.parent_covers(parent, current, columns) {
                break;
            }
            child = Some(current);
            current = parent;
        }
    }

    fn parent_covers(&self, parent: NodeId, child: NodeId, columns: Option<&[ColumnId]>) -> bool {
        let Some(entry) = self.entries.get(&parent) else {
            return false;
        };
        if !entry.children.contains(&child) {
            return false;
        }
        match (&entry.columns, columns) {
            (None, _) => true,
            (Some(existing), Some(cols)) => cols.iter().all(|c| existing.contains(c)),
            (Some(_), None) => false,
        }
    }

    /// Columns to recompute at `node`; `None` means every column.
    pub fn columns_for(&self, node: NodeId) -> Option<&FxHashSet<ColumnId>> {
        if self.active {
            if let Some(entry) = self.entries.get(&node) {
                if entry.columns.is_some() {
                    return entry.columns.as_ref();
                }
            }
        }
        self.columns.as_ref()
    }

    /// Changed nodes in depth-first post-order, children before parents.
    /// The root is only included when `include_root` is set.
    pub fn changed_nodes_depth_first(&self, tree: &RowTree, include_root: bool) -> Vec<NodeId> {
        let root = tree.root();
        let mut out = Vec::new();
        let mut stack = vec![(root, false)];

        while let Some((node, children_done)) = stack.pop() {
            if !tree.contains(node) {
                continue;
            }
            if children_done {
                if node != root || include_root {
                    out.push(node);
                }
                continue;
            }
            stack.push((node, true));

            if self.active {
                let Some(entry) = self.entries.get(&node) else {
                    continue;
                };
                for child in entry.children.iter().rev() {
                    if tree.get(*child).and_then(|c| c.parent) == Some(node) {
                        stack.push((*child, false));
                    }
                }
            } else {
                for child in tree[node].children.iter().rev() {
                    stack.push((*child, false));
                }
            }
        }
        out
    }

    /// Calls `visit` for each changed node, children before parents.
    pub fn for_each_changed_node_depth_first(
        &self,
        tree: &RowTree,
        include_root: bool,
        visit: &mut dyn FnMut(NodeId),
    ) {
        for node in self.changed_nodes_depth_first(tree, include_root) {
            visit(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, RowNode};
    use row_model::RowData;

    fn group(tree: &mut RowTree, parent: NodeId, key: &str) -> NodeId {
        let mut node = RowNode::new(format!("row-group-{}", key), NodeKind::Group);
        node.key = Some(key.to_string());
        let id = tree.insert(node);
        tree.attach(parent, id);
        id
    }

    fn leaf(tree: &mut RowTree, parent: NodeId, id: &str) -> NodeId {
        let node = tree.insert(RowNode::row(id, id, RowData::new()));
        tree.attach(parent, node);
        node
    }

    #[test]
    fn test_active_path_visits_only_registered_chain() {
        let mut tree = RowTree::new();
        let root = tree.root();
        let x = group(&mut tree, root, "X");
        let y = group(&mut tree, root, "Y");
        let a = leaf(&mut tree, x, "a");
        leaf(&mut tree, y, "b");

        let mut path = ChangePath::active();
        path.add_parent_node(&tree, a, None);

        let visited = path.changed_nodes_depth_first(&tree, true);
        assert_eq!(visited, vec![a, x, root]);
        assert!(!path.is_in_path(y));
    }

    #[test]
    fn test_inactive_path_visits_everything_post_order() {
        let mut tree = RowTree::new();
        let root = tree.root();
        let x = group(&mut tree, root, "X");
        let a = leaf(&mut tree, x, "a");
        let b = leaf(&mut tree, root, "b");

        let path = ChangePath::inactive();
        assert_eq!(path.changed_nodes_depth_first(&tree, false), vec![a, x, b]);
    }

    #[test]
    fn test_column_subsets_merge() {
        let mut tree = RowTree::new();
        let root = tree.root();
        let x = group(&mut tree, root, "X");
        let a = leaf(&mut tree, x, "a");

        let mut path = ChangePath::active();
        path.add_parent_node(&tree, x, Some(&["sales".to_string()]));
        path.add_parent_node(&tree, x, Some(&["units".to_string()]));
        let cols = path.columns_for(root).unwrap();
        assert!(cols.contains("sales") && cols.contains("units"));

        path.add_parent_node(&tree, a, None);
        assert!(path.columns_for(x).is_none());
        assert!(path.columns_for(root).is_none());
    }
}
