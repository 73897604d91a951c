//! FILENAME: core/row-engine/src/aggregation.rs
//! Aggregation Engine - bottom-up recomputation of group aggregates.
//!
//! Nodes are visited in change-path order (children before parents), so a
//! group only ever reads its direct children: leaf values, or the aggregate
//! records its child groups already hold. Every intermediate result carries
//! a leaf count so `avg` and `count` stay exact across levels.

use row_model::{AggFuncName, ColumnId, PivotColumnKind, PivotResultColumn, RowValue, ValueColumn};
use rustc_hash::FxHashMap;

use crate::change_path::ChangePath;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::events::EventQueue;
use crate::node::{AggregateRecord, AggregateValue, NodeId, RowNode, RowTree};
use crate::pivot::pivot_keys_of;
use crate::policy::{AggregationFunction, GroupAggregator};
use crate::{log_debug, log_enter, log_exit};

// ============================================================================
// ACCUMULATOR
// ============================================================================

/// Running state for one built-in aggregation over a list of inputs.
#[derive(Debug, Clone, Default)]
pub struct AggregateAccumulator {
    pub sum: f64,
    /// Sum of value * count, for count-weighted averages.
    pub weighted_sum: f64,
    /// Leaf values seen, numeric or not.
    pub count: u64,
    /// Leaf values behind the numeric inputs.
    pub count_numbers: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub first: Option<RowValue>,
    pub last: Option<RowValue>,
    pub has_number: bool,
}

impl AggregateAccumulator {
    pub fn new() -> Self {
        AggregateAccumulator::default()
    }

    /// Adds one input (a leaf value or a child group's result).
    pub fn add(&mut self, input: &AggregateValue) {
        self.count += input.count;

        if self.first.is_none() {
            self.first = Some(input.value.clone());
        }
        self.last = Some(input.value.clone());

        if let Some(value) = input.value.as_number() {
            self.has_number = true;
            self.sum += value;
            self.weighted_sum += value * input.count as f64;
            self.count_numbers += input.count;
            self.min = Some(self.min.map_or(value, |m| m.min(value)));
            self.max = Some(self.max.map_or(value, |m| m.max(value)));
        }
    }

    /// Merges another accumulator into this one.
    pub fn merge(&mut self, other: &AggregateAccumulator) {
        if other.count == 0 && other.first.is_none() {
            return;
        }
        self.sum += other.sum;
        self.weighted_sum += other.weighted_sum;
        self.count += other.count;
        self.count_numbers += other.count_numbers;
        self.has_number |= other.has_number;

        if let Some(other_min) = other.min {
            self.min = Some(self.min.map_or(other_min, |m| m.min(other_min)));
        }
        if let Some(other_max) = other.max {
            self.max = Some(self.max.map_or(other_max, |m| m.max(other_max)));
        }
        if self.first.is_none() {
            self.first = other.first.clone();
        }
        if other.last.is_some() {
            self.last = other.last.clone();
        }
    }

    /// Computes the final value of a built-in function.
    /// Returns `None` for custom functions.
    pub fn compute(&self, func: &AggFuncName) -> Option<AggregateValue> {
        let number = |v: Option<f64>| v.map(RowValue::Number).unwrap_or_default();
        let result = match func {
            AggFuncName::Sum => AggregateValue::new(
                if self.has_number { RowValue::Number(self.sum) } else { RowValue::Empty },
                self.count,
            ),
            AggFuncName::Avg => {
                let value = if self.count_numbers > 0 {
                    RowValue::Number(self.weighted_sum / self.count_numbers as f64)
                } else {
                    RowValue::Empty
                };
                AggregateValue::new(value, self.count_numbers)
            }
            AggFuncName::Min => AggregateValue::new(number(self.min), self.count),
            AggFuncName::Max => AggregateValue::new(number(self.max), self.count),
            AggFuncName::Count => AggregateValue::new(RowValue::Number(self.count as f64), self.count),
            AggFuncName::First => {
                AggregateValue::new(self.first.clone().unwrap_or_default(), self.count)
            }
            AggFuncName::Last => {
                AggregateValue::new(self.last.clone().unwrap_or_default(), self.count)
            }
            AggFuncName::Custom(_) => return None,
        };
        Some(result)
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct AggregationEngine {
    value_columns: Vec<ValueColumn>,
    functions: FxHashMap<String, Box<dyn AggregationFunction>>,
    group_aggregator: Option<Box<dyn GroupAggregator>>,
}

impl Default for AggregationEngine {
    fn default() -> Self {
        AggregationEngine::new()
    }
}

impl AggregationEngine {
    pub fn new() -> Self {
        AggregationEngine {
            value_columns: Vec::new(),
            functions: FxHashMap::default(),
            group_aggregator: None,
        }
    }

    pub fn value_columns(&self) -> &[ValueColumn] {
        &self.value_columns
    }

    pub fn set_value_columns(&mut self, columns: Vec<ValueColumn>) {
        self.value_columns = columns;
    }

    /// Changes the function of one value column.
    pub fn set_agg_func(&mut self, col_id: &str, func: AggFuncName) -> Result<(), StoreError> {
        let column = self
            .value_columns
            .iter_mut()
            .find(|c| c.col_id == col_id)
            .ok_or_else(|| StoreError::InvalidConfig(format!("unknown value column '{}'", col_id)))?;
        column.agg_func = func;
        Ok(())
    }

    pub fn register_function(&mut self, name: impl Into<String>, func: Box<dyn AggregationFunction>) {
        self.functions.insert(name.into(), func);
    }

    pub fn set_group_aggregator(&mut self, aggregator: Option<Box<dyn GroupAggregator>>) {
        self.group_aggregator = aggregator;
    }

    pub fn has_group_aggregator(&self) -> bool {
        self.group_aggregator.is_some()
    }

    /// Fails when a value column names a custom function that is not registered.
    pub fn validate(&self) -> Result<(), StoreError> {
        for column in &self.value_columns {
            if let AggFuncName::Custom(name) = &column.agg_func {
                if !self.functions.contains_key(name) {
                    return Err(StoreError::MissingAggregationFunction {
                        column: column.col_id.clone(),
                        func: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Reduces inputs with the named function.
    pub fn reduce(
        &self,
        column: &str,
        func: &AggFuncName,
        inputs: &[AggregateValue],
    ) -> Result<AggregateValue, StoreError> {
        if let AggFuncName::Custom(name) = func {
            let custom = self.functions.get(name).ok_or_else(|| {
                StoreError::MissingAggregationFunction {
                    column: column.to_string(),
                    func: name.clone(),
                }
            })?;
            return Ok(custom.aggregate(inputs));
        }

        let mut acc = AggregateAccumulator::new();
        for input in inputs {
            acc.add(input);
        }
        Ok(acc.compute(func).unwrap_or_default())
    }

    /// Recomputes aggregates along the change path. Returns the number of
    /// group nodes whose aggregate was computed.
    pub fn aggregate(
        &self,
        tree: &mut RowTree,
        change_path: &ChangePath,
        config: &StoreConfig,
        pivot_columns: &[PivotResultColumn],
        events: &mut EventQueue,
    ) -> Result<usize, StoreError> {
        self.validate()?;

        let pivoting = config.pivot_mode && !pivot_columns.is_empty();
        if self.value_columns.is_empty()
            && self.group_aggregator.is_none()
            && change_path.is_active()
            && !config.pivot_mode
        {
            return Ok(0);
        }

        log_enter!("AGG", "aggregate", "active={} pivot={}", change_path.is_active(), pivoting);

        let include_root = config.always_aggregate_at_root_level
            || config.group_include_total_footer
            || config.pivot_mode;
        let order = change_path.changed_nodes_depth_first(tree, include_root);

        let mut computed = 0;
        for node in order {
            if !tree[node].group || tree[node].is_stub() {
                self.clear_leaf(tree, node, events);
                continue;
            }

            let old = tree[node].aggregate_values.take();
            let columns = if self.group_aggregator.is_none() && !pivoting {
                change_path.columns_for(node)
            } else {
                None
            };

            let mut record = match (&old, columns) {
                (Some(previous), Some(_)) => previous.clone(),
                _ => AggregateRecord::new(),
            };

            if let Some(aggregator) = &self.group_aggregator {
                let node_ref = &tree[node];
                let children: Vec<&RowNode> = self
                    .aggregation_children(node_ref, config)
                    .iter()
                    .filter_map(|c| tree.get(*c))
                    .collect();
                let row = aggregator.aggregate(node_ref, &children);
                for (col, value) in row.fields() {
                    record.insert(col.clone(), AggregateValue::new(value.clone(), 1));
                }
            } else if pivoting {
                self.aggregate_pivot(tree, node, config, pivot_columns, &mut record)?;
            } else {
                for column in &self.value_columns {
                    if let Some(cols) = columns {
                        if !cols.contains(&column.col_id) {
                            continue;
                        }
                    }
                    let inputs = self.column_inputs(tree, node, config, column);
                    let value = self.reduce(&column.col_id, &column.agg_func, &inputs)?;
                    record.insert(column.col_id.clone(), value);
                }
            }

            emit_changes(&tree[node].id, old.as_ref(), Some(&record), events);
            let n = &mut tree[node];
            n.aggregate_values = Some(record);
            n.aggregation_count += 1;
            computed += 1;
        }

        log_exit!("AGG", "aggregate", "computed={}", computed);
        Ok(computed)
    }

    /// Leaves never hold aggregates; a stale record is dropped.
    fn clear_leaf(&self, tree: &mut RowTree, node: NodeId, events: &mut EventQueue) {
        if let Some(stale) = tree[node].aggregate_values.take() {
            log_debug!("AGG", "clearing stale aggregate on {}", tree[node].id);
            emit_changes(&tree[node].id, Some(&stale), None, events);
        }
    }

    fn aggregation_children<'a>(&self, node: &'a RowNode, config: &StoreConfig) -> &'a [NodeId] {
        if config.suppress_agg_filtered_only {
            &node.children
        } else {
            &node.children_after_filter
        }
    }

    /// One input per child: the leaf value, or the child group's aggregate.
    fn column_inputs(
        &self,
        tree: &RowTree,
        node: NodeId,
        config: &StoreConfig,
        column: &ValueColumn,
    ) -> Vec<AggregateValue> {
        self.aggregation_children(&tree[node], config)
            .iter()
            .filter_map(|c| tree.get(*c))
            .filter_map(|child| {
                if child.group {
                    child
                        .aggregate_values
                        .as_ref()
                        .and_then(|agg| agg.entry(&column.col_id))
                        .cloned()
                } else {
                    child
                        .data
                        .as_ref()
                        .map(|data| AggregateValue::new(data.value(&column.field), 1))
                }
            })
            .collect()
    }

    fn aggregate_pivot(
        &self,
        tree: &RowTree,
        node: NodeId,
        config: &StoreConfig,
        pivot_columns: &[PivotResultColumn],
        record: &mut AggregateRecord,
    ) -> Result<(), StoreError> {
        let children: Vec<&RowNode> = self
            .aggregation_children(&tree[node], config)
            .iter()
            .filter_map(|c| tree.get(*c))
            .collect();

        // Bucket leaf children by pivot key combination once per node.
        let mut buckets: FxHashMap<Vec<String>, Vec<&RowNode>> = FxHashMap::default();
        for child in children.iter().copied().filter(|c| !c.group) {
            if let Some(data) = &child.data {
                buckets.entry(pivot_keys_of(data, &config.pivot_fields)).or_default().push(child);
            }
        }

        for pivot_col in pivot_columns {
            let Some(value_col) = self.value_columns.iter().find(|c| c.col_id == pivot_col.value_col_id) else {
                continue;
            };

            let inputs: Vec<AggregateValue> = match pivot_col.kind {
                PivotColumnKind::Value => {
                    let mut inputs: Vec<AggregateValue> = children
                        .iter()
                        .filter(|c| c.group)
                        .filter_map(|c| {
                            c.aggregate_values
                                .as_ref()
                                .and_then(|agg| agg.entry(&pivot_col.col_id))
                                .cloned()
                        })
                        .collect();
                    if let Some(leaves) = buckets.get(&pivot_col.pivot_keys) {
                        inputs.extend(leaves.iter().filter_map(|leaf| {
                            leaf.data
                                .as_ref()
                                .map(|d| AggregateValue::new(d.value(&value_col.field), 1))
                        }));
                    }
                    inputs
                }
                PivotColumnKind::GroupTotal | PivotColumnKind::RowTotal => pivot_col
                    .source_col_ids
                    .iter()
                    .filter_map(|source| record.entry(source).cloned())
                    .collect(),
            };

            let value = self.reduce(&pivot_col.col_id, &value_col.agg_func, &inputs)?;
            record.insert(pivot_col.col_id.clone(), value);
        }
        Ok(())
    }
}

/// Queues a cell change for every column whose value differs.
fn emit_changes(
    row_id: &str,
    old: Option<&AggregateRecord>,
    new: Option<&AggregateRecord>,
    events: &mut EventQueue,
) {
    if !events.has_cell_change_listener() {
        return;
    }
    let mut columns: Vec<&ColumnId> = Vec::new();
    if let Some(old) = old {
        columns.extend(old.columns());
    }
    if let Some(new) = new {
        columns.extend(new.columns().filter(|c| old.map_or(true, |o| o.entry(c).is_none())));
    }
    columns.sort();

    for column in columns {
        let before = old.and_then(|o| o.get(column)).cloned();
        let after = new.and_then(|n| n.get(column)).cloned();
        events.cell_changed(row_id, column, before, after);
    }
}
