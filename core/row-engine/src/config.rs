//! FILENAME: core/row-engine/src/config.rs
//! Store Configuration - the serializable options of a row model.
//!
//! A configuration is an immutable snapshot of user intent. Models read it
//! once when built; callbacks are supplied separately as capability traits
//! (see `policy.rs`).

use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// Default number of rows requested per block.
pub const DEFAULT_BLOCK_SIZE: usize = 100;

/// Default row height in pixels.
pub const DEFAULT_ROW_HEIGHT: f64 = 25.0;

/// Default debounce window for asynchronous transactions.
pub const DEFAULT_ASYNC_TRANSACTION_WAIT_MILLIS: u64 = 50;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Rows per block requested from the row source.
    pub block_size: usize,

    /// Maximum resident blocks per store. `None` keeps every block.
    pub max_blocks_in_cache: Option<usize>,

    /// Height used for rows without an explicit height.
    pub row_height: f64,

    /// Rows may report their own heights (variable row height).
    pub dynamic_row_height: bool,

    /// Destroy child stores / detail rows when their group collapses.
    pub purge_closed_row_nodes: bool,

    /// Levels expanded by default when a group is created. -1 expands all.
    pub group_default_expanded: i32,

    /// Compute aggregates for the root node even without a grand total.
    pub always_aggregate_at_root_level: bool,

    /// Display a grand total footer row carrying the root aggregates.
    pub group_include_total_footer: bool,

    /// Aggregate over all children rather than only those passing the filter.
    pub suppress_agg_filtered_only: bool,

    /// Debounce window for `apply_transaction_async`.
    pub async_transaction_wait_millis: u64,

    /// Field holding the row id. Rows without it get positional ids.
    pub row_id_field: String,

    /// Fields to group by, outer to inner.
    pub group_fields: Vec<String>,

    /// Rows describe their own position through a data path.
    pub tree_data: bool,

    /// Field holding a `/`-separated data path when `tree_data` is set.
    pub data_path_field: String,

    pub pivot_mode: bool,

    /// Fields whose distinct values generate pivot result columns.
    pub pivot_fields: Vec<String>,

    /// Generate total columns per first-level pivot key.
    pub pivot_column_group_totals: bool,

    /// Generate a total column per value column across all pivot keys.
    pub pivot_row_totals: bool,

    /// Leaf rows can be expanded to show a detail row.
    pub master_detail: bool,

    /// Row count assumed for a store before its first block loads.
    pub initial_row_count: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            block_size: DEFAULT_BLOCK_SIZE,
            max_blocks_in_cache: None,
            row_height: DEFAULT_ROW_HEIGHT,
            dynamic_row_height: false,
            purge_closed_row_nodes: false,
            group_default_expanded: 0,
            always_aggregate_at_root_level: false,
            group_include_total_footer: false,
            suppress_agg_filtered_only: false,
            async_transaction_wait_millis: DEFAULT_ASYNC_TRANSACTION_WAIT_MILLIS,
            row_id_field: "id".to_string(),
            group_fields: Vec::new(),
            tree_data: false,
            data_path_field: "path".to_string(),
            pivot_mode: false,
            pivot_fields: Vec::new(),
            pivot_column_group_totals: false,
            pivot_row_totals: false,
            master_detail: false,
            initial_row_count: 1,
        }
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Non-fatal configuration findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigWarning {
    /// Variable row heights make row-top bookkeeping depend on every row,
    /// so blocks are never evicted while both options are set.
    EvictionDisabledForDynamicRowHeight { max_blocks_in_cache: usize },

    /// Pivot fields are ignored outside pivot mode.
    PivotFieldsWithoutPivotMode,
}

impl StoreConfig {
    /// Parses a configuration from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Checks the configuration, returning warnings for combinations that
    /// are accepted but restricted.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, StoreError> {
        if self.block_size == 0 {
            return Err(StoreError::InvalidConfig("blockSize must be at least 1".to_string()));
        }
        if self.max_blocks_in_cache == Some(0) {
            return Err(StoreError::InvalidConfig(
                "maxBlocksInCache must be at least 1".to_string(),
            ));
        }
        if !(self.row_height > 0.0) {
            return Err(StoreError::InvalidConfig("rowHeight must be positive".to_string()));
        }
        if self.tree_data && !self.group_fields.is_empty() {
            return Err(StoreError::InvalidConfig(
                "treeData and groupFields cannot be combined".to_string(),
            ));
        }

        let mut warnings = Vec::new();
        if let (true, Some(max)) = (self.dynamic_row_height, self.max_blocks_in_cache) {
            warnings.push(ConfigWarning::EvictionDisabledForDynamicRowHeight {
                max_blocks_in_cache: max,
            });
        }
        if !self.pivot_mode && !self.pivot_fields.is_empty() {
            warnings.push(ConfigWarning::PivotFieldsWithoutPivotMode);
        }
        Ok(warnings)
    }

    /// True when blocks may be evicted to honour `max_blocks_in_cache`.
    pub fn eviction_enabled(&self) -> bool {
        self.max_blocks_in_cache.is_some() && !self.dynamic_row_height
    }

    /// Pivot columns are generated only in pivot mode with pivot fields.
    pub fn pivot_active(&self) -> bool {
        self.pivot_mode && !self.pivot_fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = StoreConfig::from_json("{}").unwrap();
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.row_id_field, "id");
        assert_eq!(config.initial_row_count, 1);
        assert!(config.validate().unwrap().is_empty());
    }

    #[test]
    fn test_dynamic_height_with_cache_limit_warns() {
        let config = StoreConfig::from_json(
            r#"{"maxBlocksInCache": 2, "dynamicRowHeight": true}"#,
        )
        .unwrap();
        let warnings = config.validate().unwrap();
        assert_eq!(
            warnings,
            vec![ConfigWarning::EvictionDisabledForDynamicRowHeight { max_blocks_in_cache: 2 }]
        );
        assert!(!config.eviction_enabled());
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let config = StoreConfig { block_size: 0, ..StoreConfig::default() };
        assert!(matches!(config.validate(), Err(StoreError::InvalidConfig(_))));
    }
}
