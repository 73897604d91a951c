//! FILENAME: core/row-engine/src/sort.rs
//! PURPOSE: Sort stage of the client-side pipeline.
//! CONTEXT: Fills `children_after_sort` from `children_after_filter`. Leaves
//! sort by field value; groups sort by their aggregate for the column, or by
//! their own key when the column is their group field. Ties keep source order.

use std::cmp::Ordering;

use row_model::{SortDirection, SortModelItem};

use crate::node::{RowNode, RowTree};

pub fn sort_tree(tree: &mut RowTree, sort_model: &[SortModelItem]) {
    let mut stack = vec![tree.root()];
    while let Some(node) = stack.pop() {
        let mut children = tree[node].children_after_filter.clone();
        if !sort_model.is_empty() {
            children.sort_by(|a, b| compare_nodes(&tree[*a], &tree[*b], sort_model));
        }
        stack.extend(children.iter().copied().filter(|c| tree[*c].group));
        tree[node].children_after_sort = children;
    }
}

pub fn compare_nodes(a: &RowNode, b: &RowNode, sort_model: &[SortModelItem]) -> Ordering {
    for item in sort_model {
        let ordering = a.value_for(&item.col_id).compare(&b.value_for(&item.col_id));
        let ordering = match item.sort {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use row_model::RowData;

    #[test]
    fn test_sort_is_stable_and_directional() {
        let mut tree = RowTree::new();
        let root = tree.root();
        for (id, v) in [("a", 2), ("b", 1), ("c", 2)] {
            let node = tree.insert(RowNode::row(id, id, RowData::new().with("v", v)));
            tree.attach(root, node);
        }
        tree[root].children_after_filter = tree[root].children.clone();

        sort_tree(&mut tree, &[SortModelItem::desc("v")]);
        let ids: Vec<&str> = tree[root].children_after_sort.iter().map(|c| tree[*c].id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);

        sort_tree(&mut tree, &[]);
        let ids: Vec<&str> = tree[root].children_after_sort.iter().map(|c| tree[*c].id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
