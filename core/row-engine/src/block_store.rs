//! FILENAME: core/row-engine/src/block_store.rs
//! Block Store - the paged row cache of one hierarchy level.
//!
//! A store covers the rows of one group (or the whole top level) and keeps
//! them in fixed-size blocks fetched from the row source. Rows of a block
//! that has not arrived are stub nodes. Each access stamps the block with a
//! global sequence number; when a store holds more blocks than the cache
//! allows, the least recently accessed one is evicted.
//!
//! Every store is owned by exactly one node (its `parent_node`); stores live
//! in a `StoreArena` and are destroyed together with their owner.

use std::collections::BTreeMap;

use row_model::{Route, RowData};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::StoreConfig;
use crate::events::{EventQueue, StoreEvent, StoreWarning};
use crate::node::{DuplicateRow, NodeId, NodeKind, RowNode, RowTree};
use crate::policy::Policies;
use crate::source::FetchTicket;
use crate::transaction::{RowTransaction, TransactionResult};
use crate::{log_debug, log_info};

// ============================================================================
// TYPES
// ============================================================================

/// Handle to a `BlockStore` in a `StoreArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(u32);

impl StoreId {
    pub fn new(raw: u32) -> Self {
        StoreId(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// A fetch is outstanding; `seq` identifies the request.
    Loading { seq: u64 },
    Loaded,
    /// The fetch failed; the next access asks again.
    Failed,
}

#[derive(Debug, Clone)]
pub struct RowBlock {
    pub block_number: usize,
    pub start_row: usize,
    /// Source rows this block spans. Loaded blocks may hold fewer nodes when
    /// duplicates were set aside.
    pub covered: usize,
    pub state: BlockState,
    /// Stub nodes while loading, row nodes once loaded.
    pub rows: Vec<NodeId>,
    pub last_accessed: u64,
}

impl RowBlock {
    pub fn is_loaded(&self) -> bool {
        self.state == BlockState::Loaded
    }
}

/// What the caller must follow up on after a block load.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Groups created expanded; they need a child store.
    pub expanded_groups: Vec<NodeId>,
    /// Stores whose owners were destroyed.
    pub orphaned_stores: Vec<StoreId>,
    /// Groups whose key changed; routes of the stores below them are stale.
    pub rekeyed_groups: Vec<NodeId>,
}

/// State a block load or transaction mutates.
pub struct StoreContext<'a> {
    pub tree: &'a mut RowTree,
    pub events: &'a mut EventQueue,
    pub policies: &'a Policies,
    pub config: &'a StoreConfig,
    pub warned_duplicates: &'a mut FxHashSet<(String, String)>,
}

// ============================================================================
// BLOCK STORE
// ============================================================================

#[derive(Debug)]
pub struct BlockStore {
    pub id: StoreId,
    /// Node owning this store (the root for the top level).
    pub parent_node: NodeId,
    pub route: Route,
    /// Level of the rows in this store.
    pub level: i32,
    block_size: usize,
    blocks: BTreeMap<usize, RowBlock>,
    row_count: usize,
    last_row_known: bool,
    /// Bumped on purge and transaction; fetches issued earlier are stale.
    version: u64,
}

impl BlockStore {
    pub fn new(
        id: StoreId,
        parent_node: NodeId,
        route: Route,
        level: i32,
        block_size: usize,
        initial_row_count: usize,
    ) -> Self {
        BlockStore {
            id,
            parent_node,
            route,
            level,
            block_size: block_size.max(1),
            blocks: BTreeMap::new(),
            row_count: initial_row_count,
            last_row_known: false,
            version: 0,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Best current estimate of the number of source rows.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn last_row_known(&self) -> bool {
        self.last_row_known
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn blocks(&self) -> impl Iterator<Item = &RowBlock> {
        self.blocks.values()
    }

    pub fn block(&self, block_number: usize) -> Option<&RowBlock> {
        self.blocks.get(&block_number)
    }

    pub fn block_mut(&mut self, block_number: usize) -> Option<&mut RowBlock> {
        self.blocks.get_mut(&block_number)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn has_loaded_block(&self) -> bool {
        self.blocks.values().any(RowBlock::is_loaded)
    }

    pub fn block_for_row(&self, row: usize) -> usize {
        row / self.block_size
    }

    /// Row nodes of loaded blocks, in row order.
    pub fn loaded_rows(&self) -> Vec<NodeId> {
        self.blocks
            .values()
            .filter(|b| b.is_loaded())
            .flat_map(|b| b.rows.iter().copied())
            .collect()
    }

    /// Creates a block of stub rows for a range that has none.
    pub fn create_block(&mut self, tree: &mut RowTree, block_number: usize, access_seq: u64) -> &RowBlock {
        let start_row = block_number * self.block_size;
        let covered = self.block_size.min(self.row_count.saturating_sub(start_row)).max(1);

        let rows = (0..covered)
            .map(|offset| {
                let mut stub = RowNode::new(format!("stub-{}-{}", self.id.0, start_row + offset), NodeKind::Stub);
                stub.parent = Some(self.parent_node);
                stub.level = self.level;
                tree.insert(stub)
            })
            .collect();

        log_debug!("BLOCK", "store {} creating block {} rows={}", self.route, block_number, covered);
        self.blocks.entry(block_number).or_insert(RowBlock {
            block_number,
            start_row,
            covered,
            state: BlockState::Loading { seq: 0 },
            rows,
            last_accessed: access_seq,
        })
    }

    pub fn touch(&mut self, block_number: usize, access_seq: u64) {
        if let Some(block) = self.blocks.get_mut(&block_number) {
            block.last_accessed = access_seq;
        }
    }

    /// True if the ticket answers the current request for its block.
    pub fn accepts(&self, ticket: &FetchTicket) -> bool {
        ticket.version == self.version
            && self
                .blocks
                .get(&ticket.block_number)
                .map_or(false, |b| b.state == BlockState::Loading { seq: ticket.seq })
    }

    pub fn fail_block(&mut self, block_number: usize) {
        if let Some(block) = self.blocks.get_mut(&block_number) {
            block.state = BlockState::Failed;
        }
    }

    /// Least recently accessed block other than `keep`.
    pub fn lru_victim(&self, keep: usize) -> Option<usize> {
        self.blocks
            .values()
            .filter(|b| b.block_number != keep)
            .min_by_key(|b| b.last_accessed)
            .map(|b| b.block_number)
    }

    /// Evicts blocks until at most `max_blocks` remain, never evicting `keep`.
    pub fn evict_to(&mut self, tree: &mut RowTree, max_blocks: usize, keep: usize) -> Vec<StoreId> {
        let mut orphans = Vec::new();
        while self.blocks.len() > max_blocks {
            let Some(victim) = self.lru_victim(keep) else {
                break;
            };
            log_debug!("BLOCK", "store {} evicting block {}", self.route, victim);
            orphans.extend(self.remove_block(tree, victim));
        }
        orphans
    }

    /// Removes a block and destroys its nodes.
    pub fn remove_block(&mut self, tree: &mut RowTree, block_number: usize) -> Vec<StoreId> {
        let mut orphans = Vec::new();
        if let Some(block) = self.blocks.remove(&block_number) {
            for row in block.rows {
                orphans.extend(tree.destroy_subtree(row));
            }
        }
        orphans
    }

    /// Drops every block; the next access fetches again. The row count is
    /// kept as an estimate until the source reports a new one.
    pub fn purge(&mut self, tree: &mut RowTree) -> Vec<StoreId> {
        log_info!("BLOCK", "purging store {} ({} blocks)", self.route, self.blocks.len());
        let numbers: Vec<usize> = self.blocks.keys().copied().collect();
        let mut orphans = Vec::new();
        for n in numbers {
            orphans.extend(self.remove_block(tree, n));
        }
        self.version += 1;
        self.last_row_known = false;
        if self.row_count == 0 {
            self.row_count = 1;
        }
        orphans
    }

    /// Mirrors the loaded rows into the owner's children.
    pub fn sync_children(&self, tree: &mut RowTree) {
        if tree.contains(self.parent_node) {
            tree.set_children(self.parent_node, self.loaded_rows());
        }
    }

    fn id_prefix(&self, tree: &RowTree) -> String {
        match tree.get(self.parent_node) {
            Some(parent) if !parent.is_root() => parent.id.clone(),
            _ => "ROOT".to_string(),
        }
    }

    /// Id of a source row: its id field, else `<owner id>-<row index>`.
    fn row_id(&self, tree: &RowTree, config: &StoreConfig, data: &RowData, row_index: usize) -> String {
        data.key(&config.row_id_field)
            .unwrap_or_else(|| format!("{}-{}", self.id_prefix(tree), row_index))
    }

    /// Id under which this store keeps a row whose id another owner holds.
    fn scoped_id(&self, tree: &RowTree, id: &str) -> String {
        format!("{}/{}", self.id_prefix(tree), id)
    }

    /// Decides the node an incoming row goes to. `own` holds rows the
    /// caller is reloading; a claimed row leaves the set.
    fn place(
        &self,
        tree: &RowTree,
        config: &StoreConfig,
        data: &RowData,
        row_index: usize,
        own: &mut FxHashSet<NodeId>,
    ) -> Placement {
        let id = self.row_id(tree, config, data, row_index);
        if let Some(placement) = self.claim(tree, &id, own) {
            return placement;
        }
        // Taken below another owner: the row lives under a scoped id here.
        let scoped = self.scoped_id(tree, &id);
        self.claim(tree, &scoped, own).unwrap_or(Placement::Duplicate(scoped))
    }

    /// Resolves `id` against this store; `None` when another owner holds it.
    fn claim(&self, tree: &RowTree, id: &str, own: &mut FxHashSet<NodeId>) -> Option<Placement> {
        let Some(node) = tree.lookup(id) else {
            return Some(Placement::New(id.to_string()));
        };
        if own.remove(&node) {
            return Some(Placement::Existing(node, id.to_string()));
        }
        if tree.get(node).map_or(false, |n| n.parent == Some(self.parent_node)) {
            return Some(Placement::Duplicate(id.to_string()));
        }
        None
    }

    /// Index in `rows` of the row a transaction names by `id`.
    fn find_row(&self, tree: &RowTree, rows: &[NodeId], id: &str) -> Option<usize> {
        let scoped = self.scoped_id(tree, id);
        rows.iter()
            .position(|n| tree.get(*n).map_or(false, |n| n.id == id || n.id == scoped))
    }

    /// Sets a row aside when its id is already in use.
    fn record_duplicate(&self, ctx: &mut StoreContext<'_>, id: String, data: RowData) {
        let Some(parent) = ctx.tree.get_mut(self.parent_node) else {
            return;
        };
        parent.duplicates.push(DuplicateRow { id: id.clone(), data });
        let parent_id = parent.id.clone();
        if ctx.warned_duplicates.insert((parent_id.clone(), id.clone())) {
            ctx.events.warn("BLOCK", StoreWarning::DuplicateRowId { parent_id, row_id: id });
        }
    }

    /// Turns `node` into the row for `data`. Returns true for a new group
    /// that starts expanded.
    fn fill_node(&self, ctx: &mut StoreContext<'_>, node: NodeId, id: String, data: RowData, row_index: usize) -> bool {
        let level = self.level.max(0) as usize;
        let group_field = ctx.config.group_fields.get(level).cloned();

        {
            let n = &mut ctx.tree[node];
            n.level = self.level;
            n.source_order = row_index as u64;
            match &group_field {
                Some(field) => {
                    let value = data.value(field);
                    n.kind = NodeKind::Group;
                    n.group = true;
                    n.key = Some(value.key_string());
                    n.field = Some(field.clone());
                    n.group_value = Some(value);
                }
                None => {
                    n.kind = NodeKind::Row;
                    n.group = false;
                    n.key = Some(id.clone());
                    n.master = ctx.config.master_detail;
                }
            }
            n.data = Some(data);
        }
        ctx.tree.set_id(node, id);

        if group_field.is_some() && !ctx.tree[node].expansion_initialized {
            let expanded = ctx
                .policies
                .initial_expanded(&ctx.tree[node], ctx.config.group_default_expanded);
            let n = &mut ctx.tree[node];
            n.expanded = expanded;
            n.expansion_initialized = true;
            return expanded;
        }
        false
    }

    /// A fresh node under this store's owner, filled later.
    fn blank_node(&self, tree: &mut RowTree) -> NodeId {
        let mut node = RowNode::new(String::new(), NodeKind::Stub);
        node.parent = Some(self.parent_node);
        node.level = self.level;
        tree.insert(node)
    }

    /// Destroys a row the source no longer has, deselecting what goes with it.
    fn destroy_row(ctx: &mut StoreContext<'_>, node: NodeId, orphans: &mut Vec<StoreId>) {
        let mut doomed = vec![node];
        doomed.extend(ctx.tree.descendants(node));
        for handle in doomed {
            let n = &ctx.tree[handle];
            if n.selected {
                ctx.events.push(StoreEvent::RowDeselected { row_id: n.id.clone() });
            }
        }
        orphans.extend(ctx.tree.destroy_subtree(node));
    }

    /// Applies a successful response to a loading block. Rows the block
    /// already holds keep their nodes, so a reload preserves expansion and
    /// selection.
    pub fn load_block(
        &mut self,
        ctx: &mut StoreContext<'_>,
        block_number: usize,
        rows: Vec<RowData>,
        last_row: Option<usize>,
        access_seq: u64,
    ) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        let Some(block) = self.blocks.get(&block_number) else {
            return outcome;
        };
        let start = block.start_row;
        let previous = block.rows.clone();
        let received = rows.len();

        let (mut spare, resident): (Vec<NodeId>, Vec<NodeId>) = previous
            .iter()
            .copied()
            .partition(|n| ctx.tree.get(*n).map_or(true, |n| n.kind == NodeKind::Stub));
        spare.reverse();
        let mut own: FxHashSet<NodeId> = resident.iter().copied().collect();

        let mut loaded = Vec::with_capacity(received);
        for (offset, data) in rows.into_iter().enumerate() {
            let row_index = start + offset;
            let (node, id) = match self.place(ctx.tree, ctx.config, &data, row_index, &mut own) {
                Placement::Existing(node, id) => (node, id),
                Placement::New(id) => {
                    let node = match spare.pop() {
                        Some(stub) => stub,
                        None => self.blank_node(ctx.tree),
                    };
                    (node, id)
                }
                Placement::Duplicate(id) => {
                    self.record_duplicate(ctx, id, data);
                    continue;
                }
            };
            let old_key = ctx.tree[node].key.clone();
            let was_group = ctx.tree[node].group;
            if self.fill_node(ctx, node, id, data, row_index) {
                outcome.expanded_groups.push(node);
            }
            if was_group && old_key.is_some() && ctx.tree[node].key != old_key {
                outcome.rekeyed_groups.push(node);
            }
            loaded.push(node);
        }
        for leftover in spare {
            outcome.orphaned_stores.extend(ctx.tree.destroy_subtree(leftover));
        }
        for gone in resident.into_iter().filter(|n| own.contains(n)) {
            Self::destroy_row(ctx, gone, &mut outcome.orphaned_stores);
        }

        if let Some(block) = self.blocks.get_mut(&block_number) {
            block.rows = loaded;
            block.covered = received;
            block.state = BlockState::Loaded;
            block.last_accessed = access_seq;
        }

        match last_row {
            Some(last) => {
                self.row_count = last;
                self.last_row_known = true;
            }
            None if received < self.block_size => {
                self.row_count = start + received;
                self.last_row_known = true;
            }
            None if !self.last_row_known => {
                self.row_count = self.row_count.max(start + self.block_size + 1);
            }
            None => {}
        }

        // Blocks past the end of the data no longer exist.
        let beyond: Vec<usize> = self
            .blocks
            .values()
            .filter(|b| b.block_number != block_number && b.start_row >= self.row_count)
            .map(|b| b.block_number)
            .collect();
        for n in beyond {
            outcome.orphaned_stores.extend(self.remove_block(ctx.tree, n));
        }

        log_debug!(
            "BLOCK",
            "store {} loaded block {} rows={} row_count={} known={}",
            self.route,
            block_number,
            received,
            self.row_count,
            self.last_row_known
        );
        outcome
    }

    /// Groups the loaded blocks into runs of rows that are contiguous in the
    /// source. Blocks that are loading or failed are returned separately.
    fn split_runs(&mut self) -> (Vec<LoadedRun>, Vec<RowBlock>) {
        let block_size = self.block_size;
        let mut runs: Vec<LoadedRun> = Vec::new();
        let mut pending = Vec::new();
        for block in std::mem::take(&mut self.blocks).into_values() {
            if !block.is_loaded() {
                pending.push(block);
                continue;
            }
            let extends = runs.last().map_or(false, |run| {
                run.next_block() == block.block_number
                    && run.blocks.last().map_or(false, |b| b.covered == block_size)
            });
            if !extends {
                runs.push(LoadedRun::new(block.block_number, block_size));
            }
            if let Some(run) = runs.last_mut() {
                run.push(block);
            }
        }
        (runs, pending)
    }

    /// Applies a transaction to the loaded rows. Each row stays in the run
    /// of loaded blocks it was found in; only an edited run is re-chunked.
    /// A run that grows or shrinks moves every row after it, so blocks
    /// further down are dropped and fetched again on access. Adds outside
    /// the loaded rows are left to the source and not reported as added.
    pub fn apply_transaction(
        &mut self,
        ctx: &mut StoreContext<'_>,
        tx: &RowTransaction,
        access_seq: u64,
    ) -> (TransactionResult, LoadOutcome) {
        let mut result = TransactionResult::found();
        let mut outcome = LoadOutcome::default();
        let block_size = self.block_size;
        let old_row_count = self.row_count;
        let end_known = self.last_row_known;

        let (mut runs, pending) = self.split_runs();
        for run in &mut runs {
            run.terminal = end_known && run.start_row() + run.span == old_row_count;
        }

        for data in &tx.remove {
            let Some(id) = data.key(&ctx.config.row_id_field) else {
                continue;
            };
            let found = runs
                .iter()
                .enumerate()
                .find_map(|(r, run)| self.find_row(&*ctx.tree, &run.rows, &id).map(|i| (r, i)));
            let Some((r, i)) = found else {
                continue;
            };
            let node = runs[r].rows.remove(i);
            runs[r].edited = true;
            Self::destroy_row(ctx, node, &mut outcome.orphaned_stores);
            result.removed.push(id);
        }

        for data in &tx.update {
            let Some(id) = data.key(&ctx.config.row_id_field) else {
                continue;
            };
            let found = runs
                .iter()
                .find_map(|run| self.find_row(&*ctx.tree, &run.rows, &id).map(|i| run.rows[i]));
            let Some(node) = found else {
                continue;
            };
            let new_key = ctx.tree[node]
                .field
                .as_ref()
                .map(|field| data.value(field));
            if let Some(value) = new_key {
                let key = value.key_string();
                if ctx.tree[node].key.as_deref() != Some(key.as_str()) {
                    ctx.tree.rekey(node, key);
                    ctx.tree[node].group_value = Some(value);
                    outcome.rekeyed_groups.push(node);
                }
            }
            ctx.tree[node].data = Some(data.clone());
            result.updated.push(id);
        }

        if end_known && old_row_count == 0 && runs.is_empty() && !tx.add.is_empty() {
            let mut run = LoadedRun::new(0, block_size);
            run.terminal = true;
            runs.push(run);
        }
        let mut insert_at = tx.add_index;
        let mut added = Vec::new();
        for data in &tx.add {
            let target = match insert_at {
                Some(index) => runs
                    .iter()
                    .position(|run| index >= run.start_row() && index <= run.start_row() + run.rows.len()),
                None => runs.iter().position(|run| run.terminal),
            };
            let Some(r) = target else {
                log_debug!("BLOCK", "store {} add lands outside the loaded rows", self.route);
                continue;
            };
            let run_len = runs[r].rows.len();
            let offset = insert_at.map_or(run_len, |i| i - runs[r].start_row()).min(run_len);
            let row_index = runs[r].start_row() + offset;
            let id = match self.place(ctx.tree, ctx.config, data, row_index, &mut FxHashSet::default()) {
                Placement::New(id) => id,
                Placement::Existing(_, id) | Placement::Duplicate(id) => {
                    self.record_duplicate(ctx, id, data.clone());
                    continue;
                }
            };
            let node = self.blank_node(ctx.tree);
            if self.fill_node(ctx, node, id.clone(), data.clone(), row_index) {
                outcome.expanded_groups.push(node);
            }
            runs[r].rows.insert(offset, node);
            runs[r].edited = true;
            if let Some(i) = insert_at.as_mut() {
                *i += 1;
            }
            added.push((id, node));
        }

        // The first run whose length changed moves everything after it.
        let shifted_from = runs
            .iter()
            .find(|run| run.rows.len() != run.len_before)
            .map(|run| run.start_row() + run.span);

        for run in runs {
            if shifted_from.map_or(false, |from| run.start_row() >= from) {
                for node in run.rows {
                    outcome.orphaned_stores.extend(ctx.tree.destroy_subtree(node));
                }
                continue;
            }
            if !run.edited {
                for block in run.blocks {
                    self.blocks.insert(block.block_number, block);
                }
                continue;
            }
            self.rechunk(ctx, run, access_seq, &mut outcome.orphaned_stores);
        }

        for mut block in pending {
            let moved = shifted_from.map_or(false, |from| block.start_row >= from);
            let stubs_only = block
                .rows
                .iter()
                .all(|n| ctx.tree.get(*n).map_or(true, |n| n.kind == NodeKind::Stub));
            if moved || stubs_only || self.blocks.contains_key(&block.block_number) {
                for node in block.rows {
                    outcome.orphaned_stores.extend(ctx.tree.destroy_subtree(node));
                }
                continue;
            }
            // Rows from before a reload stay; the next access asks again.
            block.state = BlockState::Failed;
            self.blocks.insert(block.block_number, block);
        }

        let loaded_end = self
            .blocks
            .values()
            .map(|b| b.start_row + b.covered)
            .max()
            .unwrap_or(0);
        let estimate = (old_row_count + added.len()).saturating_sub(result.removed.len());
        self.row_count = estimate.max(loaded_end + usize::from(!end_known));
        self.version += 1;

        result.added = added
            .into_iter()
            .filter(|(_, node)| ctx.tree.contains(*node))
            .map(|(id, _)| id)
            .collect();

        log_info!(
            "BLOCK",
            "store {} transaction added={} removed={} updated={} rows={}",
            self.route,
            result.added.len(),
            result.removed.len(),
            result.updated.len(),
            self.row_count
        );
        outcome.expanded_groups.retain(|g| ctx.tree.contains(*g));
        (result, outcome)
    }

    /// Lays an edited run back into blocks from its first block. A run with
    /// rows after it keeps its span; rows pushed past the span are unloaded.
    fn rechunk(&mut self, ctx: &mut StoreContext<'_>, mut run: LoadedRun, access_seq: u64, orphans: &mut Vec<StoreId>) {
        if !run.terminal && run.rows.len() > run.span {
            for node in run.rows.split_off(run.span) {
                orphans.extend(ctx.tree.destroy_subtree(node));
            }
        }
        let last_accessed = run.blocks.iter().map(|b| b.last_accessed).max().unwrap_or(access_seq);
        for (k, chunk) in run.rows.chunks(self.block_size).enumerate() {
            let block_number = run.first_block + k;
            self.blocks.insert(
                block_number,
                RowBlock {
                    block_number,
                    start_row: block_number * self.block_size,
                    covered: chunk.len(),
                    state: BlockState::Loaded,
                    rows: chunk.to_vec(),
                    last_accessed,
                },
            );
        }
    }
}

/// Where an incoming row goes.
enum Placement {
    /// The id is free.
    New(String),
    /// The row is already resident in the block being reloaded.
    Existing(NodeId, String),
    /// The id is already taken under this store's owner.
    Duplicate(String),
}

/// Consecutive loaded blocks whose rows are contiguous in the source.
struct LoadedRun {
    first_block: usize,
    block_size: usize,
    blocks: Vec<RowBlock>,
    rows: Vec<NodeId>,
    /// Source rows the run spanned before the transaction.
    span: usize,
    len_before: usize,
    /// Ends at the last source row.
    terminal: bool,
    edited: bool,
}

impl LoadedRun {
    fn new(first_block: usize, block_size: usize) -> Self {
        LoadedRun {
            first_block,
            block_size,
            blocks: Vec::new(),
            rows: Vec::new(),
            span: 0,
            len_before: 0,
            terminal: false,
            edited: false,
        }
    }

    fn start_row(&self) -> usize {
        self.first_block * self.block_size
    }

    fn next_block(&self) -> usize {
        self.first_block + self.blocks.len()
    }

    fn push(&mut self, block: RowBlock) {
        self.rows.extend(block.rows.iter().copied());
        self.len_before = self.rows.len();
        self.span += block.covered;
        self.blocks.push(block);
    }
}

// ============================================================================
// STORE ARENA
// ============================================================================

#[derive(Debug, Default)]
pub struct StoreArena {
    stores: FxHashMap<StoreId, BlockStore>,
    next_id: u32,
}

impl StoreArena {
    pub fn new() -> Self {
        StoreArena::default()
    }

    pub fn create(
        &mut self,
        parent_node: NodeId,
        route: Route,
        level: i32,
        block_size: usize,
        initial_row_count: usize,
    ) -> StoreId {
        let id = StoreId(self.next_id);
        self.next_id += 1;
        self.stores.insert(id, BlockStore::new(id, parent_node, route, level, block_size, initial_row_count));
        id
    }

    pub fn get(&self, id: StoreId) -> Option<&BlockStore> {
        self.stores.get(&id)
    }

    pub fn get_mut(&mut self, id: StoreId) -> Option<&mut BlockStore> {
        self.stores.get_mut(&id)
    }

    pub fn contains(&self, id: StoreId) -> bool {
        self.stores.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Recomputes each store's route from the current keys above its owner.
    pub fn refresh_routes(&mut self, tree: &RowTree) {
        for store in self.stores.values_mut() {
            if tree.contains(store.parent_node) {
                store.route = Route::from_keys(tree.path_keys(store.parent_node));
            }
        }
    }

    /// Destroys stores and, recursively, the stores owned by their rows.
    pub fn destroy(&mut self, tree: &mut RowTree, ids: impl IntoIterator<Item = StoreId>) {
        let mut pending: Vec<StoreId> = ids.into_iter().collect();
        while let Some(store_id) = pending.pop() {
            let Some(store) = self.stores.remove(&store_id) else {
                continue;
            };
            log_debug!("BLOCK", "destroying store {}", store.route);
            if let Some(owner) = tree.get_mut(store.parent_node) {
                if owner.child_store == Some(store_id) {
                    owner.child_store = None;
                }
            }
            for block in store.blocks.into_values() {
                for row in block.rows {
                    pending.extend(tree.destroy_subtree(row));
                }
            }
        }
    }
}
