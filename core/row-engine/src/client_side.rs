//! FILENAME: core/row-engine/src/client_side.rs
//! Client-Side Row Model - the whole dataset in memory, reconciled in place.
//!
//! Every change runs one refresh: reconcile, then filter, pivot, aggregate,
//! sort and flatten, in that order. A change enters the pipeline at the first
//! stage it affects (an expansion only re-flattens, an aggregation function
//! change only re-aggregates and what follows). Each refresh ends with a single
//! `StoreUpdated` event.

use row_model::{AggFuncName, ColumnId, PivotResultColumn, Route, RowData, RowValue, SortModelItem, ValueColumn};
use rustc_hash::FxHashMap;

use crate::aggregation::AggregationEngine;
use crate::change_path::ChangePath;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::events::{EventQueue, StoreEvent, StoreWarning};
use crate::expansion::{DetailTicket, ExpansionCoordinator, ExpansionState};
use crate::filter::filter_tree;
use crate::flatten::flatten;
use crate::model::{index_at_pixel, RowBounds, RowModel};
use crate::node::{DuplicateRow, NodeId, NodeKind, RowNode, RowTree, FOOTER_NODE_ID};
use crate::pivot::derive_pivot_columns;
use crate::policy::{AggregationFunction, DataPathGetter, ExpandPolicy, GroupAggregator, Policies, RowFilter, RowHeightPolicy};
use crate::reconciler::{HierarchyReconciler, ReconcileScope};
use crate::sort::sort_tree;
use crate::transaction::{AsyncTransactionQueue, RowTransaction, TransactionCallback, TransactionResult};
use crate::{log_debug, log_enter, log_exit, log_info};

/// First pipeline stage a change has to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Filter,
    Pivot,
    Aggregate,
    Sort,
    Flatten,
}

pub struct ClientSideRowModel {
    config: StoreConfig,
    tree: RowTree,
    events: EventQueue,
    reconciler: HierarchyReconciler,
    aggregation: AggregationEngine,
    expansion: ExpansionCoordinator,
    policies: Policies,
    sort_model: Vec<SortModelItem>,
    pivot_columns: Vec<PivotResultColumn>,
    rows_to_display: Vec<NodeId>,
    footer: Option<NodeId>,
    async_queue: AsyncTransactionQueue,
    clock_ms: u64,
    refreshing: bool,
    /// Latest detail load per master id.
    detail_versions: FxHashMap<String, u64>,
}

impl ClientSideRowModel {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let warnings = config.validate()?;
        let mut events = EventQueue::new();
        for warning in warnings {
            events.warn("CONFIG", StoreWarning::Config(warning));
        }

        let mut tree = RowTree::new();
        let footer = if config.group_include_total_footer {
            let mut node = RowNode::new(FOOTER_NODE_ID, NodeKind::Footer);
            node.parent = Some(tree.root());
            Some(tree.insert(node))
        } else {
            None
        };

        log_info!("MODEL", "client-side model created: groups={:?} treeData={}", config.group_fields, config.tree_data);
        Ok(ClientSideRowModel {
            reconciler: HierarchyReconciler::new(&config),
            expansion: ExpansionCoordinator::new(&config),
            policies: Policies::new(&config.data_path_field),
            async_queue: AsyncTransactionQueue::new(config.async_transaction_wait_millis),
            config,
            tree,
            events,
            aggregation: AggregationEngine::new(),
            sort_model: Vec::new(),
            pivot_columns: Vec::new(),
            rows_to_display: Vec::new(),
            footer,
            clock_ms: 0,
            refreshing: false,
            detail_versions: FxHashMap::default(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn tree(&self) -> &RowTree {
        &self.tree
    }

    pub fn node_by_id(&self, id: &str) -> Option<&RowNode> {
        self.tree.node_by_id(id)
    }

    /// Rows set aside because their id was already taken under `parent_id`.
    pub fn duplicates_of(&self, parent_id: &str) -> &[DuplicateRow] {
        self.tree
            .node_by_id(parent_id)
            .map(|n| n.duplicates.as_slice())
            .unwrap_or(&[])
    }

    pub fn pivot_columns(&self) -> &[PivotResultColumn] {
        &self.pivot_columns
    }

    /// Ids of the displayed rows, in display order.
    pub fn displayed_ids(&self) -> Vec<String> {
        self.rows_to_display
            .iter()
            .filter_map(|n| self.tree.get(*n))
            .map(|n| n.id.clone())
            .collect()
    }

    // ========================================================================
    // DATA
    // ========================================================================

    /// Replaces the row set, keeping the identity of rows whose id survives.
    pub fn set_row_data(&mut self, rows: Vec<RowData>) -> Result<TransactionResult, StoreError> {
        let mut change_path = ChangePath::inactive();
        let result = {
            let mut scope = ReconcileScope {
                tree: &mut self.tree,
                change_path: &mut change_path,
                events: &mut self.events,
                policies: &self.policies,
            };
            self.reconciler.set_row_data(&mut scope, rows)
        };
        self.refresh(Stage::Filter, change_path)?;
        Ok(result)
    }

    pub fn apply_transaction(&mut self, tx: RowTransaction) -> Result<TransactionResult, StoreError> {
        if resolve_route(&self.tree, &tx.route).is_none() {
            log_debug!("TXN", "route {} not found", tx.route);
            return Ok(TransactionResult::route_not_found());
        }
        let mut change_path = ChangePath::active();
        let result = {
            let mut scope = ReconcileScope {
                tree: &mut self.tree,
                change_path: &mut change_path,
                events: &mut self.events,
                policies: &self.policies,
            };
            self.reconciler.apply_transaction(&mut scope, &tx)
        };
        self.refresh(Stage::Filter, change_path)?;
        Ok(result)
    }

    /// Queues a transaction for the next flush. The callback runs once the
    /// transaction's effect has been committed.
    pub fn apply_transaction_async(&mut self, tx: RowTransaction, callback: Option<TransactionCallback>) {
        self.async_queue.push(tx, callback, self.clock_ms);
    }

    pub fn pending_async_transactions(&self) -> usize {
        self.async_queue.len()
    }

    /// Advances the clock and flushes the async queue once its wait elapsed.
    /// Returns true if a flush happened.
    pub fn tick(&mut self, now_ms: u64) -> Result<bool, StoreError> {
        self.clock_ms = now_ms;
        if !self.async_queue.is_due(now_ms) {
            return Ok(false);
        }
        self.flush_async_transactions()?;
        Ok(true)
    }

    /// Applies every queued transaction with one shared commit and refresh.
    pub fn flush_async_transactions(&mut self) -> Result<Vec<TransactionResult>, StoreError> {
        let batch = self.async_queue.take();
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        log_enter!("TXN", "flush_async_transactions", "count={}", batch.len());

        let mut change_path = ChangePath::active();
        let mut results = Vec::with_capacity(batch.len());
        let mut callbacks = Vec::with_capacity(batch.len());
        {
            let mut scope = ReconcileScope {
                tree: &mut self.tree,
                change_path: &mut change_path,
                events: &mut self.events,
                policies: &self.policies,
            };
            for (tx, callback) in batch {
                let result = if resolve_route(&*scope.tree, &tx.route).is_some() {
                    self.reconciler.stage_transaction(&mut scope, &tx)
                } else {
                    TransactionResult::route_not_found()
                };
                results.push(result);
                callbacks.push(callback);
            }
            self.reconciler.commit(&mut scope);
        }
        self.refresh(Stage::Filter, change_path)?;

        for (callback, result) in callbacks.into_iter().zip(&results) {
            if let Some(callback) = callback {
                callback(result);
            }
        }
        self.events.push(StoreEvent::AsyncTransactionsFlushed { results: results.clone() });
        log_exit!("TXN", "flush_async_transactions");
        Ok(results)
    }

    /// Edits one cell. Value columns reading the field are re-aggregated
    /// along the row's ancestors only, or every column when the edit flips
    /// the row through the filter. An edit to a field that decides the
    /// row's place in the hierarchy is applied as an update transaction.
    pub fn set_data_value(&mut self, id: &str, field: &str, value: impl Into<RowValue>) -> Result<(), StoreError> {
        let value = value.into();
        let node = self.tree.lookup(id).ok_or_else(|| StoreError::RowNotFound(id.to_string()))?;
        let mut data = self.tree[node]
            .data
            .clone()
            .ok_or_else(|| StoreError::RowNotFound(id.to_string()))?;
        let old = data.set(field, value.clone());
        if old.as_ref() == Some(&value) {
            return Ok(());
        }

        let structural = self.config.group_fields.iter().any(|f| f == field)
            || (self.config.pivot_active() && self.config.pivot_fields.iter().any(|f| f == field))
            || (self.config.tree_data && field == self.config.data_path_field);
        if structural {
            self.events.cell_changed(id, field, old, Some(value));
            self.apply_transaction(RowTransaction::new().update(data))?;
            return Ok(());
        }

        let was_shown = self.policies.passes_filter(self.tree[node].data.as_ref());
        let shown = self.policies.passes_filter(Some(&data));
        self.tree[node].data = Some(data);
        self.events.cell_changed(id, field, old, Some(value));

        let columns: Vec<ColumnId> = self
            .aggregation
            .value_columns()
            .iter()
            .filter(|c| c.field == field)
            .map(|c| c.col_id.clone())
            .collect();
        let mut change_path = ChangePath::active();
        if let Some(parent) = self.tree[node].parent {
            if was_shown != shown {
                // The row joins or leaves its parents' filtered children.
                change_path.add_parent_node(&self.tree, parent, None);
            } else if !columns.is_empty() {
                change_path.add_parent_node(&self.tree, parent, Some(&columns));
            }
        }
        self.refresh(Stage::Filter, change_path)
    }

    // ========================================================================
    // AGGREGATION
    // ========================================================================

    pub fn set_value_columns(&mut self, columns: Vec<ValueColumn>) -> Result<(), StoreError> {
        self.aggregation.set_value_columns(columns);
        self.refresh(Stage::Pivot, ChangePath::inactive())
    }

    pub fn value_columns(&self) -> &[ValueColumn] {
        self.aggregation.value_columns()
    }

    /// Switches one column's function and recomputes only that column.
    pub fn set_agg_func(&mut self, col_id: &str, func: AggFuncName) -> Result<(), StoreError> {
        self.aggregation.set_agg_func(col_id, func)?;
        self.refresh(Stage::Aggregate, ChangePath::inactive().with_columns([col_id.to_string()]))
    }

    pub fn register_agg_function(
        &mut self,
        name: impl Into<String>,
        func: impl AggregationFunction + 'static,
    ) -> Result<(), StoreError> {
        self.aggregation.register_function(name, Box::new(func));
        self.refresh(Stage::Aggregate, ChangePath::inactive())
    }

    /// Installs (or removes) a whole-row aggregation callback that replaces
    /// the per-column functions.
    pub fn set_group_aggregator(&mut self, aggregator: Option<Box<dyn GroupAggregator>>) -> Result<(), StoreError> {
        self.aggregation.set_group_aggregator(aggregator);
        self.refresh(Stage::Aggregate, ChangePath::inactive())
    }

    // ========================================================================
    // POLICIES
    // ========================================================================

    pub fn set_filter(&mut self, filter: Option<Box<dyn RowFilter>>) -> Result<(), StoreError> {
        self.policies.filter = filter;
        self.refresh(Stage::Filter, ChangePath::inactive())
    }

    pub fn set_sort_model(&mut self, sort_model: Vec<SortModelItem>) -> Result<(), StoreError> {
        self.sort_model = sort_model;
        self.refresh(Stage::Sort, ChangePath::active())
    }

    /// Applies to groups created from now on.
    pub fn set_expand_policy(&mut self, policy: impl ExpandPolicy + 'static) {
        self.policies.expand = Box::new(policy);
    }

    pub fn set_row_height_policy(&mut self, policy: impl RowHeightPolicy + 'static) -> Result<(), StoreError> {
        self.policies.row_height = Box::new(policy);
        self.refresh(Stage::Flatten, ChangePath::active())
    }

    /// Applies to rows placed from now on.
    pub fn set_data_path_getter(&mut self, getter: impl DataPathGetter + 'static) {
        self.policies.data_path = Box::new(getter);
    }

    pub fn set_cell_change_listener(&mut self, listening: bool) {
        self.events.set_cell_change_listener(listening);
    }

    // ========================================================================
    // ROW STATE
    // ========================================================================

    /// Opens or closes a group, or a master row's detail.
    pub fn set_row_expanded(&mut self, id: &str, expanded: bool) -> Result<(), StoreError> {
        let node = self.tree.lookup(id).ok_or_else(|| StoreError::RowNotFound(id.to_string()))?;
        let n = &self.tree[node];
        if n.group {
            if n.expanded == expanded {
                return Ok(());
            }
            let n = &mut self.tree[node];
            n.expanded = expanded;
            n.expansion_initialized = true;
        } else if n.master && self.config.master_detail {
            if expanded {
                self.expansion.open_detail(&mut self.tree, node);
            } else {
                self.expansion.close_detail(&mut self.tree, node);
            }
        } else {
            return Err(StoreError::NotAGroup(id.to_string()));
        }

        self.events.push(StoreEvent::RowGroupOpened { row_id: id.to_string(), expanded });
        self.refresh(Stage::Flatten, ChangePath::active())
    }

    pub fn expand_all(&mut self) -> Result<(), StoreError> {
        self.set_all_expanded(true)
    }

    pub fn collapse_all(&mut self) -> Result<(), StoreError> {
        self.set_all_expanded(false)
    }

    fn set_all_expanded(&mut self, expanded: bool) -> Result<(), StoreError> {
        for node in self.tree.descendants(self.tree.root()) {
            let n = &mut self.tree[node];
            if n.group {
                n.expanded = expanded;
                n.expansion_initialized = true;
            }
        }
        self.refresh(Stage::Flatten, ChangePath::active())
    }

    pub fn expansion_state(&self, id: &str) -> Option<ExpansionState> {
        let node = self.tree.lookup(id)?;
        let n = &self.tree[node];
        if n.master && !n.group {
            return self.expansion.detail_state(&self.tree, node);
        }
        Some(if n.expanded {
            ExpansionState::Expanded
        } else {
            ExpansionState::Collapsed { store_retained: true }
        })
    }

    pub fn set_selected(&mut self, id: &str, selected: bool) -> Result<(), StoreError> {
        let node = self.tree.lookup(id).ok_or_else(|| StoreError::RowNotFound(id.to_string()))?;
        self.tree[node].selected = selected;
        Ok(())
    }

    /// Sets (or clears) an explicit height for one row.
    pub fn set_row_height(&mut self, id: &str, height: Option<f64>) -> Result<(), StoreError> {
        let node = self.tree.lookup(id).ok_or_else(|| StoreError::RowNotFound(id.to_string()))?;
        self.tree[node].row_height_override = height;
        self.refresh(Stage::Flatten, ChangePath::active())
    }

    // ========================================================================
    // MASTER / DETAIL
    // ========================================================================

    /// Starts a detail load for a master row. A later load for the same
    /// master supersedes this one.
    pub fn load_detail(&mut self, master_id: &str) -> Result<DetailTicket, StoreError> {
        let node = self
            .tree
            .lookup(master_id)
            .ok_or_else(|| StoreError::RowNotFound(master_id.to_string()))?;
        if !self.tree[node].master {
            return Err(StoreError::NotAGroup(master_id.to_string()));
        }
        let version = self.detail_versions.entry(master_id.to_string()).or_insert(0);
        *version += 1;
        log_debug!("EXPAND", "detail load {} v{}", master_id, version);
        Ok(DetailTicket { master_id: master_id.to_string(), version: *version })
    }

    /// Applies detail data. Returns false for a superseded ticket or a
    /// master that is gone or no longer holds a detail row.
    pub fn complete_detail(&mut self, ticket: &DetailTicket, data: RowData) -> Result<bool, StoreError> {
        if self.detail_versions.get(&ticket.master_id) != Some(&ticket.version) {
            log_debug!("EXPAND", "dropping stale detail for {} v{}", ticket.master_id, ticket.version);
            return Ok(false);
        }
        let detail = self
            .tree
            .lookup(&ticket.master_id)
            .and_then(|m| self.tree[m].detail_node)
            .filter(|d| self.tree.contains(*d));
        let Some(detail) = detail else {
            return Ok(false);
        };
        self.tree[detail].data = Some(data);
        self.refresh(Stage::Flatten, ChangePath::active())?;
        Ok(true)
    }

    // ========================================================================
    // REFRESH
    // ========================================================================

    fn refresh(&mut self, from: Stage, change_path: ChangePath) -> Result<(), StoreError> {
        if self.refreshing {
            return Err(StoreError::RefreshInProgress);
        }
        self.refreshing = true;
        let result = self.run_stages(from, change_path);
        self.refreshing = false;
        result
    }

    fn run_stages(&mut self, from: Stage, mut change_path: ChangePath) -> Result<(), StoreError> {
        log_enter!("MODEL", "refresh", "from={:?} active={}", from, change_path.is_active());

        if from <= Stage::Filter {
            filter_tree(&mut self.tree, &self.policies);
        }
        if from <= Stage::Pivot {
            self.refresh_pivot_columns(&mut change_path);
        }
        if from <= Stage::Aggregate {
            self.aggregation.aggregate(
                &mut self.tree,
                &change_path,
                &self.config,
                &self.pivot_columns,
                &mut self.events,
            )?;
        }
        if from <= Stage::Sort {
            sort_tree(&mut self.tree, &self.sort_model);
        }
        self.rows_to_display = flatten(
            &mut self.tree,
            &self.config,
            &self.policies,
            &self.rows_to_display,
            self.footer,
        );

        self.events.mark_updated();
        self.events.commit();
        log_exit!("MODEL", "refresh", "rows={}", self.rows_to_display.len());
        Ok(())
    }

    /// Re-derives the pivot columns. New columns invalidate every aggregate.
    fn refresh_pivot_columns(&mut self, change_path: &mut ChangePath) {
        let columns = derive_pivot_columns(&self.tree, &self.config, self.aggregation.value_columns());
        if columns == self.pivot_columns {
            return;
        }
        log_info!("MODEL", "pivot columns changed: {} -> {}", self.pivot_columns.len(), columns.len());
        self.events.push(StoreEvent::PivotColumnsChanged {
            columns: columns.iter().map(|c| c.col_id.clone()).collect(),
        });
        self.pivot_columns = columns;
        change_path.set_inactive();
    }

    fn bounds_at(&self, display_index: usize) -> RowBounds {
        self.rows_to_display
            .get(display_index)
            .and_then(|n| self.tree.get(*n))
            .map(|n| RowBounds {
                top: n.row_top.unwrap_or(0.0),
                height: n.row_height.unwrap_or(self.config.row_height),
            })
            .unwrap_or(RowBounds { top: 0.0, height: 0.0 })
    }
}

/// The group addressed by `route`; the empty route is the root.
fn resolve_route(tree: &RowTree, route: &Route) -> Option<NodeId> {
    let mut current = tree.root();
    for key in route.keys() {
        current = tree.child_by_key(current, key)?;
    }
    Some(current)
}

impl RowModel for ClientSideRowModel {
    fn get_row(&mut self, display_index: usize) -> Option<&RowNode> {
        let node = *self.rows_to_display.get(display_index)?;
        self.tree.get(node)
    }

    fn get_row_count(&self) -> usize {
        self.rows_to_display.len()
    }

    fn for_each_node(&self, visit: &mut dyn FnMut(&RowNode)) {
        self.tree.for_each_node(visit);
    }

    fn get_row_bounds(&self, display_index: usize) -> Option<RowBounds> {
        if display_index >= self.rows_to_display.len() {
            return None;
        }
        Some(self.bounds_at(display_index))
    }

    fn get_row_index_at_pixel(&self, pixel: f64) -> Option<usize> {
        index_at_pixel(self.rows_to_display.len(), pixel, |i| self.bounds_at(i))
    }

    /// Client-side rows are not paged; there is never a store to purge.
    fn purge_store(&mut self, _route: &Route) -> bool {
        false
    }

    fn drain_events(&mut self) -> Vec<StoreEvent> {
        self.events.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> Vec<RowData> {
        vec![
            RowData::new().with("id", "1").with("region", "North").with("amount", 2),
            RowData::new().with("id", "2").with("region", "North").with("amount", 4),
            RowData::new().with("id", "3").with("region", "South").with("amount", 6),
        ]
    }

    fn grouped() -> ClientSideRowModel {
        let config = StoreConfig { group_fields: vec!["region".to_string()], ..StoreConfig::default() };
        let mut model = ClientSideRowModel::new(config).unwrap();
        model.set_value_columns(vec![ValueColumn::new("amount", AggFuncName::Sum)]).unwrap();
        model.set_row_data(sales()).unwrap();
        model
    }

    #[test]
    fn test_groups_start_collapsed() {
        let model = grouped();
        assert_eq!(model.displayed_ids(), vec!["row-group-region-North", "row-group-region-South"]);
        let north = model.node_by_id("row-group-region-North").unwrap();
        assert_eq!(north.aggregate_values.as_ref().unwrap().get("amount"), Some(&RowValue::Number(6.0)));
    }

    #[test]
    fn test_expand_reflattens_only() {
        let mut model = grouped();
        model.drain_events();
        let before = model.node_by_id("row-group-region-North").unwrap().aggregation_count;

        model.set_row_expanded("row-group-region-North", true).unwrap();
        assert_eq!(model.get_row_count(), 4);
        assert_eq!(model.node_by_id("row-group-region-North").unwrap().aggregation_count, before);
        assert_eq!(
            model.drain_events(),
            vec![
                StoreEvent::RowGroupOpened { row_id: "row-group-region-North".to_string(), expanded: true },
                StoreEvent::StoreUpdated,
            ]
        );
    }

    #[test]
    fn test_expanding_leaf_is_an_error() {
        let mut model = grouped();
        assert!(matches!(model.set_row_expanded("1", true), Err(StoreError::NotAGroup(_))));
        assert!(matches!(model.set_row_expanded("nope", true), Err(StoreError::RowNotFound(_))));
    }

    #[test]
    fn test_unknown_route_is_reported() {
        let mut model = grouped();
        let tx = RowTransaction::new()
            .with_route(Route::from_keys(["Nowhere"]))
            .add(RowData::new().with("id", "9"));
        let result = model.apply_transaction(tx).unwrap();
        assert!(!result.route_found);
        assert!(model.node_by_id("9").is_none());
    }

    #[test]
    fn test_footer_carries_grand_total() {
        let config = StoreConfig {
            group_fields: vec!["region".to_string()],
            group_include_total_footer: true,
            ..StoreConfig::default()
        };
        let mut model = ClientSideRowModel::new(config).unwrap();
        model.set_value_columns(vec![ValueColumn::new("amount", AggFuncName::Sum)]).unwrap();
        model.set_row_data(sales()).unwrap();

        let count = model.get_row_count();
        let footer = model.get_row(count - 1).unwrap();
        assert_eq!(footer.id, FOOTER_NODE_ID);
        assert_eq!(footer.aggregate_values.as_ref().unwrap().get("amount"), Some(&RowValue::Number(12.0)));
    }
}
