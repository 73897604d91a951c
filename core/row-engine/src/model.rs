//! FILENAME: core/row-engine/src/model.rs
//! PURPOSE: The read API shared by the client-side and server-side models.
//! CONTEXT: Rendering code only reads through this trait and reflects the
//! last committed state. `get_row` takes `&mut self` because a paged model
//! may start a fetch for an unloaded row.

use row_model::Route;
use serde::{Deserialize, Serialize};

use crate::events::StoreEvent;
use crate::node::RowNode;

/// Vertical position of a displayed row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowBounds {
    pub top: f64,
    pub height: f64,
}

pub trait RowModel {
    /// The row at a display index. Unloaded rows come back as loading stubs.
    fn get_row(&mut self, display_index: usize) -> Option<&RowNode>;

    /// Number of displayed rows (may be an estimate while loading).
    fn get_row_count(&self) -> usize;

    /// Visits every node below the root in tree order.
    fn for_each_node(&self, visit: &mut dyn FnMut(&RowNode));

    fn get_row_bounds(&self, display_index: usize) -> Option<RowBounds>;

    fn get_row_index_at_pixel(&self, pixel: f64) -> Option<usize>;

    /// Drops loaded data for the store addressed by `route`.
    /// Returns false when no store matches.
    fn purge_store(&mut self, route: &Route) -> bool;

    /// Takes every queued event in commit order.
    fn drain_events(&mut self) -> Vec<StoreEvent>;
}

/// Finds the row containing `pixel` given rows sorted by top.
/// `bounds(i)` returns the bounds of row `i`.
pub fn index_at_pixel(count: usize, pixel: f64, bounds: impl Fn(usize) -> RowBounds) -> Option<usize> {
    if count == 0 || pixel < 0.0 {
        return None;
    }
    let (mut lo, mut hi) = (0usize, count);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let b = bounds(mid);
        if b.top + b.height <= pixel {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    if lo < count {
        Some(lo)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_at_pixel() {
        let heights = [10.0, 30.0, 10.0];
        let tops = [0.0, 10.0, 40.0];
        let bounds = |i: usize| RowBounds { top: tops[i], height: heights[i] };

        assert_eq!(index_at_pixel(3, 0.0, bounds), Some(0));
        assert_eq!(index_at_pixel(3, 10.0, bounds), Some(1));
        assert_eq!(index_at_pixel(3, 39.9, bounds), Some(1));
        assert_eq!(index_at_pixel(3, 45.0, bounds), Some(2));
        assert_eq!(index_at_pixel(3, 50.0, bounds), None);
        assert_eq!(index_at_pixel(3, -1.0, bounds), None);
    }
}
