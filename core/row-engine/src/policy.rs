//! FILENAME: core/row-engine/src/policy.rs
//! PURPOSE: Capability traits for user-supplied behaviour.
//! CONTEXT: Each optional callback is a trait with a fallback implementation.
//! Closures implement the traits directly, so hosts can pass `|node| ...`.
//! The set in use is held in `Policies` and replaced as a whole when the
//! configuration changes.

use row_model::{RowData, RowValue};

use crate::node::{AggregateValue, RowNode};

// ============================================================================
// TRAITS
// ============================================================================

/// Decides the initial expansion of a newly created group.
/// `None` defers to `group_default_expanded`.
pub trait ExpandPolicy {
    fn is_expanded_by_default(&self, node: &RowNode) -> Option<bool>;
}

/// Client-side row filter applied to leaf data.
pub trait RowFilter {
    fn passes(&self, data: &RowData) -> bool;
}

/// A named aggregation function. Inputs are leaf values (count 1) or child
/// group results carrying their own counts.
pub trait AggregationFunction {
    fn aggregate(&self, inputs: &[AggregateValue]) -> AggregateValue;
}

/// Whole-row aggregation: replaces every per-column function when set.
/// Returns the aggregate record as a row of values.
pub trait GroupAggregator {
    fn aggregate(&self, group: &RowNode, children: &[&RowNode]) -> RowData;
}

/// Height of a row when dynamic row height is on. `None` uses the default.
pub trait RowHeightPolicy {
    fn row_height(&self, node: &RowNode) -> Option<f64>;
}

/// Extracts the tree path of a row in tree-data mode.
pub trait DataPathGetter {
    fn data_path(&self, data: &RowData) -> Option<Vec<String>>;
}

impl<F: Fn(&RowNode) -> Option<bool>> ExpandPolicy for F {
    fn is_expanded_by_default(&self, node: &RowNode) -> Option<bool> {
        self(node)
    }
}

impl<F: Fn(&RowData) -> bool> RowFilter for F {
    fn passes(&self, data: &RowData) -> bool {
        self(data)
    }
}

impl<F: Fn(&[AggregateValue]) -> AggregateValue> AggregationFunction for F {
    fn aggregate(&self, inputs: &[AggregateValue]) -> AggregateValue {
        self(inputs)
    }
}

impl<F: Fn(&RowNode, &[&RowNode]) -> RowData> GroupAggregator for F {
    fn aggregate(&self, group: &RowNode, children: &[&RowNode]) -> RowData {
        self(group, children)
    }
}

impl<F: Fn(&RowNode) -> Option<f64>> RowHeightPolicy for F {
    fn row_height(&self, node: &RowNode) -> Option<f64> {
        self(node)
    }
}

impl<F: Fn(&RowData) -> Option<Vec<String>>> DataPathGetter for F {
    fn data_path(&self, data: &RowData) -> Option<Vec<String>> {
        self(data)
    }
}

// ============================================================================
// FALLBACKS
// ============================================================================

/// Leaves every group to `group_default_expanded`.
pub struct DefaultExpand;

impl ExpandPolicy for DefaultExpand {
    fn is_expanded_by_default(&self, _node: &RowNode) -> Option<bool> {
        None
    }
}

/// Every row uses the configured row height.
pub struct FixedRowHeight;

impl RowHeightPolicy for FixedRowHeight {
    fn row_height(&self, _node: &RowNode) -> Option<f64> {
        None
    }
}

/// Reads a `/`-separated path from a text field.
pub struct FieldDataPath {
    pub field: String,
}

impl DataPathGetter for FieldDataPath {
    fn data_path(&self, data: &RowData) -> Option<Vec<String>> {
        match data.get(&self.field)? {
            RowValue::Text(path) => {
                let segments: Vec<String> = path
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                if segments.is_empty() {
                    None
                } else {
                    Some(segments)
                }
            }
            _ => None,
        }
    }
}

/// The callbacks in effect for one configuration.
pub struct Policies {
    pub expand: Box<dyn ExpandPolicy>,
    /// `None` disables filtering.
    pub filter: Option<Box<dyn RowFilter>>,
    pub row_height: Box<dyn RowHeightPolicy>,
    pub data_path: Box<dyn DataPathGetter>,
}

impl Policies {
    pub fn new(data_path_field: &str) -> Self {
        Policies {
            expand: Box::new(DefaultExpand),
            filter: None,
            row_height: Box::new(FixedRowHeight),
            data_path: Box::new(FieldDataPath { field: data_path_field.to_string() }),
        }
    }

    /// Initial expansion of a new group: callback, then default depth, then collapsed.
    pub fn initial_expanded(&self, node: &RowNode, group_default_expanded: i32) -> bool {
        if let Some(expanded) = self.expand.is_expanded_by_default(node) {
            return expanded;
        }
        group_default_expanded == -1 || node.level < group_default_expanded
    }

    /// Whether a leaf passes the filter. Rows without data always pass.
    pub fn passes_filter(&self, data: Option<&RowData>) -> bool {
        match (&self.filter, data) {
            (Some(filter), Some(data)) => filter.passes(data),
            _ => true,
        }
    }
}
