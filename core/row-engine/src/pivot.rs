//! FILENAME: core/row-engine/src/pivot.rs
//! PURPOSE: Derives the pivot result columns from the filtered leaf rows.
//! CONTEXT: One column per distinct pivot key combination and value column,
//! plus optional totals. Totals list the columns they reduce so aggregation
//! can total already-computed values instead of raw rows.

use std::collections::BTreeSet;

use row_model::{PivotColumnKind, PivotResultColumn, RowData, ValueColumn};

use crate::config::StoreConfig;
use crate::node::RowTree;

/// Pivot key combination of a row, outer field first.
pub fn pivot_keys_of(data: &RowData, pivot_fields: &[String]) -> Vec<String> {
    pivot_fields.iter().map(|f| data.value(f).key_string()).collect()
}

/// Builds the pivot result columns for the leaves that pass the filter.
pub fn derive_pivot_columns(
    tree: &RowTree,
    config: &StoreConfig,
    value_columns: &[ValueColumn],
) -> Vec<PivotResultColumn> {
    if !config.pivot_active() || value_columns.is_empty() {
        return Vec::new();
    }

    let mut combos: BTreeSet<Vec<String>> = BTreeSet::new();
    let mut stack = vec![tree.root()];
    while let Some(current) = stack.pop() {
        let Some(node) = tree.get(current) else {
            continue;
        };
        if node.group {
            stack.extend(node.children_after_filter.iter().copied());
        } else if let Some(data) = &node.data {
            combos.insert(pivot_keys_of(data, &config.pivot_fields));
        }
    }

    let with_group_totals = config.pivot_column_group_totals && config.pivot_fields.len() > 1;
    let mut columns = Vec::new();
    let mut current_group: Option<String> = None;
    let mut group_sources: Vec<Vec<String>> = vec![Vec::new(); value_columns.len()];

    let flush_group_totals =
        |group: &str, sources: &mut Vec<Vec<String>>, columns: &mut Vec<PivotResultColumn>| {
            for (vc, ids) in value_columns.iter().zip(sources.iter_mut()) {
                columns.push(PivotResultColumn {
                    col_id: format!("pivot_total_{}_{}", group, vc.col_id),
                    pivot_keys: vec![group.to_string()],
                    value_col_id: vc.col_id.clone(),
                    kind: PivotColumnKind::GroupTotal,
                    source_col_ids: std::mem::take(ids),
                });
            }
        };

    for combo in &combos {
        let first = combo.first().cloned().unwrap_or_default();
        if with_group_totals {
            if let Some(group) = current_group.as_deref() {
                if group != first {
                    flush_group_totals(group, &mut group_sources, &mut columns);
                }
            }
            current_group = Some(first);
        }

        for (i, vc) in value_columns.iter().enumerate() {
            let col_id = format!("pivot_{}_{}", combo.join("_"), vc.col_id);
            group_sources[i].push(col_id.clone());
            columns.push(PivotResultColumn {
                col_id,
                pivot_keys: combo.clone(),
                value_col_id: vc.col_id.clone(),
                kind: PivotColumnKind::Value,
                source_col_ids: Vec::new(),
            });
        }
    }
    if let Some(group) = current_group.as_deref() {
        flush_group_totals(group, &mut group_sources, &mut columns);
    }

    if config.pivot_row_totals {
        for vc in value_columns {
            let sources = columns
                .iter()
                .filter(|c| c.kind == PivotColumnKind::Value && c.value_col_id == vc.col_id)
                .map(|c| c.col_id.clone())
                .collect();
            columns.push(PivotResultColumn {
                col_id: format!("pivot_row_total_{}", vc.col_id),
                pivot_keys: Vec::new(),
                value_col_id: vc.col_id.clone(),
                kind: PivotColumnKind::RowTotal,
                source_col_ids: sources,
            });
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::RowNode;
    use row_model::AggFuncName;

    fn tree_with(rows: &[(&str, &str, &str)]) -> RowTree {
        let mut tree = RowTree::new();
        let root = tree.root();
        for (id, year, quarter) in rows {
            let data = RowData::new().with("id", *id).with("year", *year).with("q", *quarter).with("sales", 1.0);
            let node = tree.insert(RowNode::row(*id, *id, data));
            tree.attach(root, node);
            tree[root].children_after_filter.push(node);
        }
        tree
    }

    fn pivot_config() -> StoreConfig {
        StoreConfig {
            pivot_mode: true,
            pivot_fields: vec!["year".to_string(), "q".to_string()],
            ..StoreConfig::default()
        }
    }

    #[test]
    fn test_columns_are_sorted_distinct_combinations() {
        let tree = tree_with(&[("1", "2021", "Q2"), ("2", "2020", "Q1"), ("3", "2021", "Q2")]);
        let cols = derive_pivot_columns(&tree, &pivot_config(), &[ValueColumn::new("sales", AggFuncName::Sum)]);
        let ids: Vec<&str> = cols.iter().map(|c| c.col_id.as_str()).collect();
        assert_eq!(ids, vec!["pivot_2020_Q1_sales", "pivot_2021_Q2_sales"]);
    }

    #[test]
    fn test_group_and_row_totals() {
        let tree = tree_with(&[("1", "2020", "Q1"), ("2", "2020", "Q2"), ("3", "2021", "Q1")]);
        let config = StoreConfig {
            pivot_column_group_totals: true,
            pivot_row_totals: true,
            ..pivot_config()
        };
        let cols = derive_pivot_columns(&tree, &config, &[ValueColumn::new("sales", AggFuncName::Sum)]);
        let ids: Vec<&str> = cols.iter().map(|c| c.col_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "pivot_2020_Q1_sales",
                "pivot_2020_Q2_sales",
                "pivot_total_2020_sales",
                "pivot_2021_Q1_sales",
                "pivot_total_2021_sales",
                "pivot_row_total_sales",
            ]
        );
        assert_eq!(cols[2].source_col_ids, vec!["pivot_2020_Q1_sales", "pivot_2020_Q2_sales"]);
        assert_eq!(cols[5].source_col_ids.len(), 3);
    }
}
