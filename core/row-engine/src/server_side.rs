//! FILENAME: core/row-engine/src/server_side.rs
//! Server-Side Row Model - lazily paged rows, one block store per open level.
//!
//! The top level is served by the root store; every expanded group owns a
//! child store for the level below it. Display order is laid out as segments:
//! one segment per resident row (loaded or loading) and one per run of rows
//! that have no block yet. Reading a row inside such a gap creates its block,
//! asks the row source for it and returns a loading stub.
//!
//! Fetches complete through `complete_fetch`. A ticket is honoured only while
//! its store, block and version are unchanged, so results for purged or
//! superseded requests are dropped without error.

use row_model::{Route, SortModelItem};
use rustc_hash::FxHashSet;

use crate::block_store::{BlockState, LoadOutcome, StoreArena, StoreContext, StoreId};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::events::{EventQueue, StoreEvent, StoreWarning};
use crate::expansion::{ExpansionCoordinator, ExpansionState};
use crate::flatten::row_height;
use crate::model::{RowBounds, RowModel};
use crate::node::{DuplicateRow, NodeId, RowNode, RowTree};
use crate::policy::{ExpandPolicy, Policies, RowHeightPolicy};
use crate::source::{FetchError, FetchTicket, RowRequest, RowResponse, RowSource};
use crate::transaction::{AsyncTransactionQueue, RowTransaction, TransactionCallback, TransactionResult};
use crate::{log_debug, log_enter, log_exit, log_info, log_warn};

// ============================================================================
// LAYOUT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum SegmentKind {
    /// One resident row (a loaded row or a loading stub).
    Row { node: NodeId, block_number: usize },
    /// Rows with no block yet, starting at this source row.
    Gap { first_row: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    store: StoreId,
    kind: SegmentKind,
    len: usize,
    display_start: usize,
    top: f64,
    /// Height of each row in the segment.
    row_height: f64,
}

impl Segment {
    fn bottom(&self) -> f64 {
        self.top + self.row_height * self.len as f64
    }

    fn bounds(&self, display_index: usize) -> RowBounds {
        let offset = display_index.saturating_sub(self.display_start);
        RowBounds { top: self.top + self.row_height * offset as f64, height: self.row_height }
    }
}

// ============================================================================
// MODEL
// ============================================================================

pub struct ServerSideRowModel<S: RowSource> {
    config: StoreConfig,
    source: S,
    tree: RowTree,
    stores: StoreArena,
    root_store: StoreId,
    events: EventQueue,
    policies: Policies,
    expansion: ExpansionCoordinator,
    sort_model: Vec<SortModelItem>,
    filter_model: serde_json::Value,
    warned_duplicates: FxHashSet<(String, String)>,
    /// Routes of groups that were open before a full purge; they reopen
    /// when a group with the same route loads again.
    reopen_routes: FxHashSet<Route>,
    segments: Vec<Segment>,
    row_count: usize,
    access_seq: u64,
    fetch_seq: u64,
    async_queue: AsyncTransactionQueue,
    clock_ms: u64,
}

impl<S: RowSource> ServerSideRowModel<S> {
    pub fn new(config: StoreConfig, source: S) -> Result<Self, StoreError> {
        let warnings = config.validate()?;
        let mut events = EventQueue::new();
        for warning in warnings {
            events.warn("CONFIG", StoreWarning::Config(warning));
        }
        if config.tree_data {
            return Err(StoreError::InvalidConfig(
                "treeData is not supported by the server-side model".to_string(),
            ));
        }

        let tree = RowTree::new();
        let mut stores = StoreArena::new();
        let root_store = stores.create(tree.root(), Route::root(), 0, config.block_size, config.initial_row_count);

        log_info!(
            "MODEL",
            "server-side model created: blockSize={} maxBlocks={:?} groups={:?}",
            config.block_size,
            config.max_blocks_in_cache,
            config.group_fields
        );
        let mut model = ServerSideRowModel {
            expansion: ExpansionCoordinator::new(&config),
            policies: Policies::new(&config.data_path_field),
            async_queue: AsyncTransactionQueue::new(config.async_transaction_wait_millis),
            config,
            source,
            tree,
            stores,
            root_store,
            events,
            sort_model: Vec::new(),
            filter_model: serde_json::Value::Null,
            warned_duplicates: FxHashSet::default(),
            reopen_routes: FxHashSet::default(),
            segments: Vec::new(),
            row_count: 0,
            access_seq: 0,
            fetch_seq: 0,
            clock_ms: 0,
        };
        let root = model.tree.root();
        model.tree[root].child_store = Some(root_store);
        model.relayout();
        Ok(model)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn tree(&self) -> &RowTree {
        &self.tree
    }

    pub fn node_by_id(&self, id: &str) -> Option<&RowNode> {
        self.tree.node_by_id(id)
    }

    pub fn duplicates_of(&self, parent_id: &str) -> &[DuplicateRow] {
        self.tree
            .node_by_id(parent_id)
            .map(|n| n.duplicates.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_expand_policy(&mut self, policy: impl ExpandPolicy + 'static) {
        self.policies.expand = Box::new(policy);
    }

    pub fn set_row_height_policy(&mut self, policy: impl RowHeightPolicy + 'static) {
        self.policies.row_height = Box::new(policy);
        self.commit_layout();
    }

    // ========================================================================
    // STORES
    // ========================================================================

    /// The store serving the level addressed by `route`, if that level is open.
    pub fn store_for_route(&self, route: &Route) -> Option<StoreId> {
        let mut current = self.root_store;
        for key in route.keys() {
            let store = self.stores.get(current)?;
            let node = self.tree.child_by_key(store.parent_node, key)?;
            current = self.tree.get(node)?.child_store.filter(|s| self.stores.contains(*s))?;
        }
        Some(current)
    }

    /// Resident blocks of the store at `route`.
    pub fn block_count(&self, route: &Route) -> Option<usize> {
        let store = self.store_for_route(route)?;
        self.stores.get(store).map(|s| s.block_count())
    }

    /// Row count estimate of the store at `route`.
    pub fn store_row_count(&self, route: &Route) -> Option<usize> {
        let store = self.store_for_route(route)?;
        self.stores.get(store).map(|s| s.row_count())
    }

    pub fn block_state(&self, route: &Route, block_number: usize) -> Option<BlockState> {
        let store = self.store_for_route(route)?;
        self.stores.get(store)?.block(block_number).map(|b| b.state)
    }

    fn next_access(&mut self) -> u64 {
        self.access_seq += 1;
        self.access_seq
    }

    /// Issues a fetch for a block, replacing any outstanding one.
    fn issue_fetch(&mut self, store_id: StoreId, block_number: usize) {
        self.fetch_seq += 1;
        let seq = self.fetch_seq;
        let Some(store) = self.stores.get_mut(store_id) else {
            return;
        };
        let Some(start_row) = store.block_mut(block_number).map(|block| {
            block.state = BlockState::Loading { seq };
            block.start_row
        }) else {
            return;
        };

        let ticket = FetchTicket { store: store_id, version: store.version(), block_number, seq };
        let request = RowRequest {
            start_row,
            end_row: start_row + store.block_size(),
            group_keys: store.route.clone(),
            sort_model: self.sort_model.clone(),
            filter_model: self.filter_model.clone(),
        };
        log_debug!(
            "BLOCK",
            "fetching {} rows {}..{} (seq {})",
            request.group_keys,
            request.start_row,
            request.end_row,
            seq
        );
        self.source.request_rows(ticket, request);
    }

    /// Creates and fetches a block that has no entry yet.
    fn ensure_block(&mut self, store_id: StoreId, block_number: usize) {
        let seq = self.next_access();
        let Some(store) = self.stores.get_mut(store_id) else {
            return;
        };
        if let Some(block) = store.block(block_number) {
            // A gap inside a resident block is the tail a removal shifted in.
            let refetch = !matches!(block.state, BlockState::Loading { .. });
            store.touch(block_number, seq);
            if refetch {
                log_debug!("BLOCK", "topping up short block {}", block_number);
                self.issue_fetch(store_id, block_number);
            }
            return;
        }
        store.create_block(&mut self.tree, block_number, seq);
        self.issue_fetch(store_id, block_number);
        self.evict(store_id, block_number);
    }

    /// Enforces the block cap of one store, sparing `keep`.
    fn evict(&mut self, store_id: StoreId, keep: usize) {
        if !self.config.eviction_enabled() {
            return;
        }
        let Some(max) = self.config.max_blocks_in_cache else {
            return;
        };
        let Some(store) = self.stores.get_mut(store_id) else {
            return;
        };
        if store.block_count() <= max {
            return;
        }
        let orphans = store.evict_to(&mut self.tree, max, keep);
        store.sync_children(&mut self.tree);
        self.stores.destroy(&mut self.tree, orphans);
    }

    /// Destroys orphaned stores, re-routes stores below renamed groups and
    /// opens the groups that start expanded.
    fn follow_up(&mut self, outcome: LoadOutcome) {
        self.stores.destroy(&mut self.tree, outcome.orphaned_stores);
        if !outcome.rekeyed_groups.is_empty() {
            self.stores.refresh_routes(&self.tree);
        }
        for group in outcome.expanded_groups {
            self.expansion.open_group(&mut self.tree, &mut self.stores, group);
        }
    }

    /// Reopens groups that were open before the last full purge.
    fn reopen_remembered(&mut self, store_id: StoreId, block_number: usize) {
        if self.reopen_routes.is_empty() {
            return;
        }
        let rows = match self.stores.get(store_id).and_then(|s| s.block(block_number)) {
            Some(block) => block.rows.clone(),
            None => return,
        };
        for row in rows {
            if !self.tree.get(row).map_or(false, |n| n.group) {
                continue;
            }
            let route = Route::from_keys(self.tree.path_keys(row));
            if self.reopen_routes.remove(&route) {
                self.expansion.open_group(&mut self.tree, &mut self.stores, row);
            }
        }
    }

    /// Applies the answer to a fetch. Returns false when the ticket is stale.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, result: Result<RowResponse, FetchError>) -> bool {
        let accepted = self.stores.get(ticket.store).map_or(false, |s| s.accepts(&ticket));
        if !accepted {
            log_debug!("BLOCK", "dropping stale fetch block={} seq={}", ticket.block_number, ticket.seq);
            return false;
        }

        match result {
            Err(err) => {
                let route = match self.stores.get_mut(ticket.store) {
                    Some(store) => {
                        store.fail_block(ticket.block_number);
                        store.route.clone()
                    }
                    None => return false,
                };
                log_warn!("BLOCK", "fetch failed for {} block {}: {}", route, ticket.block_number, err);
                self.events.push(StoreEvent::BlockLoadFailed { route, block_number: ticket.block_number });
            }
            Ok(response) => {
                let seq = self.next_access();
                let Some(store) = self.stores.get_mut(ticket.store) else {
                    return false;
                };
                let mut ctx = StoreContext {
                    tree: &mut self.tree,
                    events: &mut self.events,
                    policies: &self.policies,
                    config: &self.config,
                    warned_duplicates: &mut self.warned_duplicates,
                };
                let outcome = store.load_block(&mut ctx, ticket.block_number, response.rows, response.last_row, seq);
                store.sync_children(&mut self.tree);
                self.follow_up(outcome);
                self.reopen_remembered(ticket.store, ticket.block_number);
                self.evict(ticket.store, ticket.block_number);
            }
        }
        self.commit_layout();
        true
    }

    /// Drops every block of every store and starts over from the top level.
    /// Open groups are remembered by route and reopen when they reload.
    fn purge_all(&mut self) {
        let mut open = Vec::new();
        self.tree.for_each_node(&mut |n| {
            if n.group && n.expanded {
                open.push(n.id.clone());
            }
        });
        for id in open {
            if let Some(node) = self.tree.lookup(&id) {
                self.reopen_routes.insert(Route::from_keys(self.tree.path_keys(node)));
            }
        }
        self.purge_store_by_id(self.root_store);
    }

    fn purge_store_by_id(&mut self, store_id: StoreId) -> bool {
        let Some(store) = self.stores.get_mut(store_id) else {
            return false;
        };
        let orphans = store.purge(&mut self.tree);
        store.sync_children(&mut self.tree);
        self.stores.destroy(&mut self.tree, orphans);
        true
    }

    pub fn set_sort_model(&mut self, sort_model: Vec<SortModelItem>) {
        log_info!("MODEL", "sort model changed, purging stores");
        self.sort_model = sort_model;
        self.purge_all();
        self.commit_layout();
    }

    /// Sets the opaque filter model passed to the row source.
    pub fn set_filter_model(&mut self, filter_model: serde_json::Value) {
        log_info!("MODEL", "filter model changed, purging stores");
        self.filter_model = filter_model;
        self.purge_all();
        self.commit_layout();
    }

    // ========================================================================
    // TRANSACTIONS
    // ========================================================================

    fn apply_to_store(&mut self, tx: &RowTransaction) -> TransactionResult {
        let Some(store_id) = self.store_for_route(&tx.route) else {
            log_debug!("TXN", "route {} not found", tx.route);
            return TransactionResult::route_not_found();
        };
        let seq = self.next_access();
        let Some(store) = self.stores.get_mut(store_id) else {
            return TransactionResult::route_not_found();
        };
        let mut ctx = StoreContext {
            tree: &mut self.tree,
            events: &mut self.events,
            policies: &self.policies,
            config: &self.config,
            warned_duplicates: &mut self.warned_duplicates,
        };
        let (result, outcome) = store.apply_transaction(&mut ctx, tx, seq);
        store.sync_children(&mut self.tree);
        self.follow_up(outcome);
        self.evict(store_id, usize::MAX);
        result
    }

    pub fn apply_transaction(&mut self, tx: RowTransaction) -> TransactionResult {
        let result = self.apply_to_store(&tx);
        if result.route_found {
            self.commit_layout();
        }
        result
    }

    pub fn apply_transaction_async(&mut self, tx: RowTransaction, callback: Option<TransactionCallback>) {
        self.async_queue.push(tx, callback, self.clock_ms);
    }

    pub fn pending_async_transactions(&self) -> usize {
        self.async_queue.len()
    }

    /// Advances the clock and flushes the async queue once its wait elapsed.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        self.clock_ms = now_ms;
        if !self.async_queue.is_due(now_ms) {
            return false;
        }
        self.flush_async_transactions();
        true
    }

    /// Applies every queued transaction, then lays out and notifies once.
    pub fn flush_async_transactions(&mut self) -> Vec<TransactionResult> {
        let batch = self.async_queue.take();
        if batch.is_empty() {
            return Vec::new();
        }
        log_enter!("TXN", "flush_async_transactions", "count={}", batch.len());
        let mut results = Vec::with_capacity(batch.len());
        let mut callbacks = Vec::with_capacity(batch.len());
        for (tx, callback) in batch {
            results.push(self.apply_to_store(&tx));
            callbacks.push(callback);
        }
        self.commit_layout();

        for (callback, result) in callbacks.into_iter().zip(&results) {
            if let Some(callback) = callback {
                callback(result);
            }
        }
        self.events.push(StoreEvent::AsyncTransactionsFlushed { results: results.clone() });
        log_exit!("TXN", "flush_async_transactions");
        results
    }

    // ========================================================================
    // ROW STATE
    // ========================================================================

    pub fn set_row_expanded(&mut self, id: &str, expanded: bool) -> Result<(), StoreError> {
        let node = self.tree.lookup(id).ok_or_else(|| StoreError::RowNotFound(id.to_string()))?;
        if !self.tree[node].group {
            return Err(StoreError::NotAGroup(id.to_string()));
        }
        if self.tree[node].expanded == expanded {
            return Ok(());
        }
        if expanded {
            self.expansion.open_group(&mut self.tree, &mut self.stores, node);
        } else {
            self.expansion.close_group(&mut self.tree, &mut self.stores, node);
        }
        self.events.push(StoreEvent::RowGroupOpened { row_id: id.to_string(), expanded });
        self.commit_layout();
        Ok(())
    }

    pub fn expansion_state(&self, id: &str) -> Option<ExpansionState> {
        let node = self.tree.lookup(id)?;
        self.expansion.group_state(&self.tree, &self.stores, node)
    }

    pub fn set_selected(&mut self, id: &str, selected: bool) -> Result<(), StoreError> {
        let node = self.tree.lookup(id).ok_or_else(|| StoreError::RowNotFound(id.to_string()))?;
        self.tree[node].selected = selected;
        Ok(())
    }

    pub fn set_row_height(&mut self, id: &str, height: Option<f64>) -> Result<(), StoreError> {
        let node = self.tree.lookup(id).ok_or_else(|| StoreError::RowNotFound(id.to_string()))?;
        self.tree[node].row_height_override = height;
        self.commit_layout();
        Ok(())
    }

    pub fn set_cell_change_listener(&mut self, listening: bool) {
        self.events.set_cell_change_listener(listening);
    }

    // ========================================================================
    // LAYOUT
    // ========================================================================

    fn commit_layout(&mut self) {
        self.relayout();
        self.events.mark_updated();
        self.events.commit();
    }

    /// Rebuilds the display segments from the root store down.
    fn relayout(&mut self) {
        for segment in &self.segments {
            if let SegmentKind::Row { node, .. } = segment.kind {
                if let Some(n) = self.tree.get_mut(node) {
                    n.display_index = None;
                    n.row_top = None;
                }
            }
        }

        let mut segments = Vec::new();
        let mut display = 0;
        let mut top = 0.0;
        self.layout_store(self.root_store, &mut segments, &mut display, &mut top);
        log_debug!("MODEL", "layout: {} segments, {} rows", segments.len(), display);
        self.segments = segments;
        self.row_count = display;
    }

    fn layout_store(&mut self, store_id: StoreId, segments: &mut Vec<Segment>, display: &mut usize, top: &mut f64) {
        let Some(store) = self.stores.get(store_id) else {
            return;
        };
        let row_count = store.row_count();
        let blocks: Vec<(usize, usize, usize, Vec<NodeId>)> = store
            .blocks()
            .map(|b| (b.block_number, b.start_row, b.covered, b.rows.clone()))
            .collect();
        let default_height = self.config.row_height;

        let push_gap = |segments: &mut Vec<Segment>, display: &mut usize, top: &mut f64, first_row: usize, len: usize| {
            if len == 0 {
                return;
            }
            segments.push(Segment {
                store: store_id,
                kind: SegmentKind::Gap { first_row },
                len,
                display_start: *display,
                top: *top,
                row_height: default_height,
            });
            *display += len;
            *top += default_height * len as f64;
        };

        let mut next_row = 0;
        for (block_number, start_row, covered, rows) in blocks {
            if start_row > next_row {
                push_gap(segments, display, top, next_row, start_row - next_row);
            }
            for node in rows {
                self.layout_row(store_id, block_number, node, segments, display, top);
            }
            next_row = start_row + covered;
        }
        if row_count > next_row {
            push_gap(segments, display, top, next_row, row_count - next_row);
        }
    }

    fn layout_row(
        &mut self,
        store_id: StoreId,
        block_number: usize,
        node: NodeId,
        segments: &mut Vec<Segment>,
        display: &mut usize,
        top: &mut f64,
    ) {
        let Some(n) = self.tree.get(node) else {
            return;
        };
        let height = row_height(n, &self.config, &self.policies);
        let child_store = if n.group && n.expanded { n.child_store } else { None };

        let n = &mut self.tree[node];
        n.display_index = Some(*display);
        n.row_top = Some(*top);
        n.row_height = Some(height);
        segments.push(Segment {
            store: store_id,
            kind: SegmentKind::Row { node, block_number },
            len: 1,
            display_start: *display,
            top: *top,
            row_height: height,
        });
        *display += 1;
        *top += height;

        if let Some(child) = child_store {
            self.layout_store(child, segments, display, top);
        }
    }

    fn segment_at(&self, display_index: usize) -> Option<&Segment> {
        let index = self
            .segments
            .partition_point(|s| s.display_start + s.len <= display_index);
        self.segments.get(index)
    }
}

impl<S: RowSource> RowModel for ServerSideRowModel<S> {
    /// Returns the row at `display_index`. A row without a block gets one:
    /// the block is fetched and a loading stub is returned. A row in a
    /// failed block is fetched again.
    fn get_row(&mut self, display_index: usize) -> Option<&RowNode> {
        let segment = *self.segment_at(display_index)?;
        match segment.kind {
            SegmentKind::Row { node, block_number } => {
                let seq = self.next_access();
                let failed = match self.stores.get_mut(segment.store) {
                    Some(store) => {
                        store.touch(block_number, seq);
                        store.block(block_number).map_or(false, |b| b.state == BlockState::Failed)
                    }
                    None => false,
                };
                if failed {
                    log_debug!("BLOCK", "retrying failed block {}", block_number);
                    self.issue_fetch(segment.store, block_number);
                }
                self.tree.get(node)
            }
            SegmentKind::Gap { first_row } => {
                let row = first_row + (display_index - segment.display_start);
                let block_number = self.stores.get(segment.store)?.block_for_row(row);
                self.ensure_block(segment.store, block_number);
                // Stubs replace the gap; consumers hear about it when rows arrive.
                self.relayout();
                match self.segment_at(display_index)?.kind {
                    SegmentKind::Row { node, .. } => self.tree.get(node),
                    SegmentKind::Gap { .. } => None,
                }
            }
        }
    }

    fn get_row_count(&self) -> usize {
        self.row_count
    }

    fn for_each_node(&self, visit: &mut dyn FnMut(&RowNode)) {
        self.tree.for_each_node(visit);
    }

    fn get_row_bounds(&self, display_index: usize) -> Option<RowBounds> {
        self.segment_at(display_index).map(|s| s.bounds(display_index))
    }

    fn get_row_index_at_pixel(&self, pixel: f64) -> Option<usize> {
        if pixel < 0.0 {
            return None;
        }
        let index = self.segments.partition_point(|s| s.bottom() <= pixel);
        let segment = self.segments.get(index)?;
        let offset = ((pixel - segment.top) / segment.row_height).floor() as usize;
        Some(segment.display_start + offset.min(segment.len - 1))
    }

    fn purge_store(&mut self, route: &Route) -> bool {
        let Some(store_id) = self.store_for_route(route) else {
            return false;
        };
        self.purge_store_by_id(store_id);
        self.commit_layout();
        true
    }

    fn drain_events(&mut self) -> Vec<StoreEvent> {
        self.events.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use row_model::RowData;

    #[derive(Default)]
    struct Recorder {
        requests: Vec<(FetchTicket, RowRequest)>,
    }

    impl RowSource for Recorder {
        fn request_rows(&mut self, ticket: FetchTicket, request: RowRequest) {
            self.requests.push((ticket, request));
        }
    }

    fn rows(range: std::ops::Range<usize>) -> Vec<RowData> {
        range.map(|i| RowData::new().with("id", format!("r{}", i))).collect()
    }

    #[test]
    fn test_first_read_returns_stub_and_fetches() {
        let config = StoreConfig { block_size: 10, ..StoreConfig::default() };
        let mut model = ServerSideRowModel::new(config, Recorder::default()).unwrap();
        assert_eq!(model.get_row_count(), 1);

        assert!(model.get_row(0).unwrap().is_stub());
        assert_eq!(model.source().requests.len(), 1);
        let (ticket, request) = model.source_mut().requests.remove(0);
        assert_eq!((request.start_row, request.end_row), (0, 10));

        assert!(model.complete_fetch(ticket, Ok(RowResponse::new(rows(0..10)))));
        assert_eq!(model.get_row_count(), 11);
        assert_eq!(model.get_row(3).unwrap().id, "r3");
        assert!(!model.complete_fetch(ticket, Ok(RowResponse::new(rows(0..10)))));
    }

    #[test]
    fn test_pixel_lookup_spans_gaps() {
        let config = StoreConfig { block_size: 10, ..StoreConfig::default() };
        let mut model = ServerSideRowModel::new(config, Recorder::default()).unwrap();
        model.get_row(0);
        let (ticket, _) = model.source_mut().requests.remove(0);
        model.complete_fetch(ticket, Ok(RowResponse::new(rows(0..10)).with_last_row(30)));

        assert_eq!(model.get_row_count(), 30);
        assert_eq!(model.get_row_index_at_pixel(0.0), Some(0));
        assert_eq!(model.get_row_index_at_pixel(26.0 * 25.0 + 1.0), Some(26));
        assert_eq!(model.get_row_bounds(12), Some(RowBounds { top: 300.0, height: 25.0 }));
        assert_eq!(model.get_row_index_at_pixel(30.0 * 25.0), None);
    }
}
