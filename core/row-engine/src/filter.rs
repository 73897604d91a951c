//! FILENAME: core/row-engine/src/filter.rs
//! PURPOSE: Filter stage of the client-side pipeline.
//! CONTEXT: Fills `children_after_filter` on every node. A group stays
//! visible while any child passes, or while its own data row passes.

use crate::node::{NodeId, RowTree};
use crate::policy::Policies;

/// Applies the row filter to the whole tree. Returns the number of
/// top-level nodes that passed.
pub fn filter_tree(tree: &mut RowTree, policies: &Policies) -> usize {
    let root = tree.root();
    filter_node(tree, policies, root);
    tree[root].children_after_filter.len()
}

fn filter_node(tree: &mut RowTree, policies: &Policies, node: NodeId) -> bool {
    let children = tree[node].children.clone();
    let mut kept = Vec::with_capacity(children.len());
    for child in children {
        if filter_node(tree, policies, child) {
            kept.push(child);
        }
    }

    let n = &tree[node];
    let passes = if n.is_root() {
        true
    } else if n.group {
        !kept.is_empty() || (n.data.is_some() && policies.passes_filter(n.data.as_ref()))
    } else {
        policies.passes_filter(n.data.as_ref())
    };
    tree[node].children_after_filter = kept;
    passes
}
