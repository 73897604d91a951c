//! FILENAME: tests/test_aggregation.rs
//! Integration tests for group aggregation: built-in and custom functions,
//! whole-row aggregators, pivot columns, root totals and filtered aggregates.

mod common;

use common::{assert_number, group_id, SalesFixture, TestHarness};
use row_engine::{
    AggFuncName, AggregateValue, ClientSideRowModel, RowData, RowModel, RowNode, RowTransaction,
    RowValue, StoreConfig, StoreError, StoreEvent, ValueColumn, FOOTER_NODE_ID, ROOT_NODE_ID,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn north() -> String {
    group_id("region", "North")
}

fn pivot_harness(row_totals: bool) -> TestHarness {
    let config = StoreConfig {
        group_fields: vec!["region".to_string()],
        pivot_mode: true,
        pivot_fields: vec!["quarter".to_string()],
        pivot_row_totals: row_totals,
        ..StoreConfig::default()
    };
    let mut harness = TestHarness::new(config);
    harness
        .model
        .set_value_columns(vec![ValueColumn::new("sales", AggFuncName::Sum)])
        .unwrap();
    harness.model.set_row_data(SalesFixture::rows()).unwrap();
    harness
}

/// Spread between the largest and smallest numeric input.
fn range(inputs: &[AggregateValue]) -> AggregateValue {
    let numbers: Vec<f64> = inputs.iter().filter_map(|i| i.value.as_number()).collect();
    let max = numbers.iter().cloned().fold(f64::MIN, f64::max);
    let min = numbers.iter().cloned().fold(f64::MAX, f64::min);
    let count = inputs.iter().map(|i| i.count).sum();
    if numbers.is_empty() {
        AggregateValue::new(RowValue::Empty, count)
    } else {
        AggregateValue::new(max - min, count)
    }
}

fn ids(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

// ============================================================================
// FUNCTIONS
// ============================================================================

#[test]
fn test_sum_per_group() {
    let harness = TestHarness::with_sales(&["region"]);
    assert_number(harness.aggregate(&north(), "sales"), 39000.0);
    assert_number(harness.aggregate(&group_id("region", "South"), "sales"), 53000.0);
    assert_number(harness.aggregate(&group_id("region", "East"), "quantity"), 355.0);
    assert!(harness.aggregate("s1", "sales").is_none());
}

#[test]
fn test_changing_agg_func_recomputes_that_column_only() {
    let mut harness = TestHarness::with_sales(&["region"]);
    harness.model.set_cell_change_listener(true);

    harness.model.set_agg_func("quantity", AggFuncName::Avg).unwrap();
    assert_number(harness.aggregate(&north(), "quantity"), 97.5);
    assert_number(harness.aggregate(&group_id("region", "East"), "quantity"), 88.75);
    assert_number(harness.aggregate(&north(), "sales"), 39000.0);

    let events = harness.events();
    let changed: Vec<(&str, &str)> = events
        .iter()
        .filter_map(|e| match e {
            StoreEvent::CellValueChanged { row_id, column, .. } => Some((row_id.as_str(), column.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(changed.len(), 3);
    assert!(changed.iter().all(|(_, column)| *column == "quantity"));
    assert_eq!(events.last(), Some(&StoreEvent::StoreUpdated));
}

#[test]
fn test_unknown_value_column_is_rejected() {
    let mut harness = TestHarness::with_sales(&["region"]);
    assert!(matches!(
        harness.model.set_agg_func("margin", AggFuncName::Max),
        Err(StoreError::InvalidConfig(_))
    ));
}

#[test]
fn test_avg_weights_by_leaf_count_across_levels() {
    let config = StoreConfig {
        group_fields: vec!["region".to_string(), "product".to_string()],
        group_include_total_footer: true,
        ..StoreConfig::default()
    };
    let mut harness = TestHarness::new(config);
    harness
        .model
        .set_value_columns(vec![ValueColumn::new("sales", AggFuncName::Avg)])
        .unwrap();
    harness.model.set_row_data(SalesFixture::rows()).unwrap();

    assert_number(harness.aggregate(&north(), "sales"), 9750.0);
    assert_number(harness.aggregate(FOOTER_NODE_ID, "sales"), 10625.0);
}

#[test]
fn test_custom_function_must_be_registered() {
    let config = StoreConfig { group_fields: vec!["region".to_string()], ..StoreConfig::default() };
    let mut harness = TestHarness::new(config);

    let result = harness
        .model
        .set_value_columns(vec![ValueColumn::new("sales", AggFuncName::parse("range"))]);
    assert!(matches!(
        result,
        Err(StoreError::MissingAggregationFunction { ref column, ref func }) if column == "sales" && func == "range"
    ));

    harness.model.register_agg_function("range", range).unwrap();
    harness.model.set_row_data(SalesFixture::rows()).unwrap();
    assert_number(harness.aggregate(&north(), "sales"), 4000.0);
    assert_number(harness.aggregate(&group_id("region", "East"), "sales"), 4000.0);
}

#[test]
fn test_group_aggregator_replaces_column_functions() {
    let mut harness = TestHarness::with_sales(&["region"]);
    harness
        .model
        .set_group_aggregator(Some(Box::new(|group: &RowNode, children: &[&RowNode]| {
            RowData::new()
                .with("rows", children.len() as i64)
                .with("label", format!("{} ({})", group.key.clone().unwrap_or_default(), children.len()))
        })))
        .unwrap();

    assert_number(harness.aggregate(&north(), "rows"), 4.0);
    assert_eq!(harness.aggregate(&north(), "label"), Some(RowValue::from("North (4)")));
    assert!(harness.aggregate(&north(), "sales").is_none());

    harness.model.set_group_aggregator(None).unwrap();
    assert_number(harness.aggregate(&north(), "sales"), 39000.0);
}

// ============================================================================
// ROOT AND FOOTER
// ============================================================================

#[test]
fn test_root_is_only_aggregated_when_asked() {
    let harness = TestHarness::with_sales(&["region"]);
    assert!(harness.aggregate(ROOT_NODE_ID, "sales").is_none());

    let config = StoreConfig {
        group_fields: vec!["region".to_string()],
        always_aggregate_at_root_level: true,
        ..StoreConfig::default()
    };
    let mut harness = TestHarness::new(config);
    harness
        .model
        .set_value_columns(vec![ValueColumn::new("sales", AggFuncName::Sum)])
        .unwrap();
    harness.model.set_row_data(SalesFixture::rows()).unwrap();
    assert_number(harness.aggregate(ROOT_NODE_ID, "sales"), 127500.0);
    assert!(!harness.displayed().iter().any(|id| id == FOOTER_NODE_ID));
}

#[test]
fn test_footer_follows_transactions() {
    let config = StoreConfig {
        group_fields: vec!["region".to_string()],
        group_include_total_footer: true,
        ..StoreConfig::default()
    };
    let mut harness = TestHarness::new(config);
    harness
        .model
        .set_value_columns(vec![ValueColumn::new("quantity", AggFuncName::Sum)])
        .unwrap();
    harness.model.set_row_data(SalesFixture::rows()).unwrap();
    assert_eq!(harness.displayed().last().map(String::as_str), Some(FOOTER_NODE_ID));
    assert_number(harness.aggregate(FOOTER_NODE_ID, "quantity"), 1275.0);

    harness
        .model
        .apply_transaction(RowTransaction::new().remove(RowData::new().with("id", "s12")))
        .unwrap();
    assert_number(harness.aggregate(FOOTER_NODE_ID, "quantity"), 1190.0);
}

// ============================================================================
// FILTERED AGGREGATES
// ============================================================================

#[test]
fn test_aggregates_can_include_filtered_rows() {
    let config = StoreConfig {
        group_fields: vec!["region".to_string()],
        suppress_agg_filtered_only: true,
        ..StoreConfig::default()
    };
    let mut harness = TestHarness::new(config);
    harness
        .model
        .set_value_columns(vec![ValueColumn::new("sales", AggFuncName::Sum)])
        .unwrap();
    harness.model.set_row_data(SalesFixture::rows()).unwrap();

    harness
        .model
        .set_filter(Some(Box::new(|row: &RowData| row.value("product") == RowValue::from("Widget"))))
        .unwrap();
    assert_number(harness.aggregate(&north(), "sales"), 39000.0);

    harness.model.set_row_expanded(&north(), true).unwrap();
    assert_eq!(harness.model.get_row_count(), 5);
}

// ============================================================================
// PIVOT
// ============================================================================

#[test]
fn test_pivot_columns_per_quarter() {
    let mut harness = pivot_harness(false);
    let columns: Vec<&str> = harness.model.pivot_columns().iter().map(|c| c.col_id.as_str()).collect();
    assert_eq!(columns, vec!["pivot_Q1_sales", "pivot_Q2_sales"]);

    assert_number(harness.aggregate(&north(), "pivot_Q1_sales"), 18000.0);
    assert_number(harness.aggregate(&north(), "pivot_Q2_sales"), 21000.0);
    assert_number(harness.aggregate(ROOT_NODE_ID, "pivot_Q1_sales"), 60000.0);
    assert!(harness.events().contains(&StoreEvent::PivotColumnsChanged {
        columns: ids(&["pivot_Q1_sales", "pivot_Q2_sales"]),
    }));
}

#[test]
fn test_new_pivot_key_adds_a_column() {
    let mut harness = pivot_harness(true);
    assert_number(harness.aggregate(&north(), "pivot_row_total_sales"), 39000.0);
    harness.events();

    let row = RowData::new()
        .with("id", "s13")
        .with("region", "North")
        .with("product", "Widget")
        .with("quarter", "Q3")
        .with("sales", 500.0)
        .with("quantity", 5.0);
    harness.model.apply_transaction(RowTransaction::new().add(row)).unwrap();

    assert_eq!(
        harness.events().first(),
        Some(&StoreEvent::PivotColumnsChanged {
            columns: ids(&["pivot_Q1_sales", "pivot_Q2_sales", "pivot_Q3_sales", "pivot_row_total_sales"]),
        })
    );
    assert_number(harness.aggregate(&north(), "pivot_Q3_sales"), 500.0);
    assert_number(harness.aggregate(&north(), "pivot_row_total_sales"), 39500.0);
    assert!(harness.aggregate(&group_id("region", "South"), "pivot_Q3_sales").is_some());
}

#[test]
fn test_pivot_fields_ignored_outside_pivot_mode() {
    let config = StoreConfig {
        group_fields: vec!["region".to_string()],
        pivot_fields: vec!["quarter".to_string()],
        ..StoreConfig::default()
    };
    let mut model = ClientSideRowModel::new(config).unwrap();
    model.set_value_columns(vec![ValueColumn::new("sales", AggFuncName::Sum)]).unwrap();
    model.set_row_data(SalesFixture::rows()).unwrap();
    assert!(model.pivot_columns().is_empty());
    assert!(model.drain_events().iter().any(|e| matches!(e, StoreEvent::Warning(_))));
}
