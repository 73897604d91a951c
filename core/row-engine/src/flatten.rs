//! FILENAME: core/row-engine/src/flatten.rs
//! PURPOSE: Flatten stage: lays out the visible rows in display order.
//! CONTEXT: Display indices and row tops are recomputed for the whole visible
//! sequence on every structural change, never patched in place.

use crate::config::StoreConfig;
use crate::node::{NodeId, RowNode, RowTree};
use crate::policy::Policies;

/// Height of a row: explicit override, then the height policy when dynamic
/// heights are on, then the configured default.
pub fn row_height(node: &RowNode, config: &StoreConfig, policies: &Policies) -> f64 {
    node.row_height_override
        .or_else(|| {
            if config.dynamic_row_height {
                policies.row_height.row_height(node)
            } else {
                None
            }
        })
        .unwrap_or(config.row_height)
}

/// Builds the display sequence and assigns display indices, tops and heights.
/// Nodes in `previous` that are no longer visible lose their display index.
pub fn flatten(
    tree: &mut RowTree,
    config: &StoreConfig,
    policies: &Policies,
    previous: &[NodeId],
    footer: Option<NodeId>,
) -> Vec<NodeId> {
    for id in previous {
        if let Some(node) = tree.get_mut(*id) {
            node.display_index = None;
            node.row_top = None;
        }
    }

    let root = tree.root();
    let mut rows = Vec::new();
    // Pivoting without row groups shows the grand total as the only row.
    if config.pivot_mode && config.group_fields.is_empty() && !config.tree_data {
        rows.push(root);
    } else {
        collect(tree, config, root, &mut rows);
    }

    if let Some(footer) = footer {
        let totals = tree[root].aggregate_values.clone();
        tree[footer].aggregate_values = totals;
        rows.push(footer);
    }

    let mut top = 0.0;
    for (index, id) in rows.iter().enumerate() {
        let height = row_height(&tree[*id], config, policies);
        let node = &mut tree[*id];
        node.display_index = Some(index);
        node.row_top = Some(top);
        node.row_height = Some(height);
        top += height;
    }
    rows
}

fn collect(tree: &RowTree, config: &StoreConfig, node: NodeId, rows: &mut Vec<NodeId>) {
    for &child in &tree[node].children_after_sort {
        let c = &tree[child];
        if config.pivot_mode && !c.group {
            continue;
        }
        rows.push(child);

        if c.group && c.expanded {
            // Pivot leaf groups stand for their hidden leaves.
            let leaf_group = config.pivot_mode && c.children.iter().all(|k| !tree[*k].group);
            if !leaf_group {
                collect(tree, config, child, rows);
            }
        }

        if config.master_detail && c.master && !c.group && c.expanded {
            if let Some(detail) = c.detail_node {
                rows.push(detail);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use row_model::RowData;

    fn build() -> (RowTree, NodeId) {
        let mut tree = RowTree::new();
        let root = tree.root();
        let mut group = RowNode::new("g", NodeKind::Group);
        group.key = Some("g".to_string());
        let g = tree.insert(group);
        tree.attach(root, g);
        for id in ["1", "2"] {
            let leaf = tree.insert(RowNode::row(id, id, RowData::new()));
            tree.attach(g, leaf);
        }
        for n in [root, g] {
            let kids = tree[n].children.clone();
            tree[n].children_after_filter = kids.clone();
            tree[n].children_after_sort = kids;
        }
        (tree, g)
    }

    #[test]
    fn test_collapsed_group_hides_children() {
        let (mut tree, g) = build();
        let config = StoreConfig::default();
        let policies = Policies::new("path");

        let rows = flatten(&mut tree, &config, &policies, &[], None);
        assert_eq!(rows, vec![g]);

        tree[g].expanded = true;
        let rows = flatten(&mut tree, &config, &policies, &rows, None);
        assert_eq!(rows.len(), 3);
        assert_eq!(tree[rows[2]].row_top, Some(50.0));
    }

    #[test]
    fn test_dynamic_heights_are_contiguous() {
        let (mut tree, g) = build();
        tree[g].expanded = true;
        let config = StoreConfig { dynamic_row_height: true, ..StoreConfig::default() };
        let mut policies = Policies::new("path");
        policies.row_height = Box::new(|n: &RowNode| if n.group { Some(40.0) } else { None });

        let rows = flatten(&mut tree, &config, &policies, &[], None);
        let mut expected_top = 0.0;
        for id in &rows {
            let node = &tree[*id];
            assert_eq!(node.row_top, Some(expected_top));
            expected_top += node.row_height.unwrap();
        }
        assert_eq!(expected_top, 90.0);
    }
}
