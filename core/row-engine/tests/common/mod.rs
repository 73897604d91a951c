//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for row-engine integration tests.

#![allow(dead_code)]

use row_engine::{
    AggFuncName, ClientSideRowModel, FetchError, FetchTicket, RowData, RowModel, RowRequest,
    RowResponse, RowSource, RowValue, ServerSideRowModel, StoreConfig, StoreEvent, ValueColumn,
};

// ============================================================================
// ROW SOURCE
// ============================================================================

/// Row source that records every request and answers from an in-memory
/// dataset when asked to. Group levels are derived from `group_fields`.
pub struct MockRowSource {
    pub rows: Vec<RowData>,
    pub group_fields: Vec<String>,
    pub requests: Vec<(FetchTicket, RowRequest)>,
    /// Total number of requests ever received.
    pub request_count: usize,
}

impl MockRowSource {
    pub fn new(rows: Vec<RowData>, group_fields: &[&str]) -> Self {
        MockRowSource {
            rows,
            group_fields: group_fields.iter().map(|f| f.to_string()).collect(),
            requests: Vec::new(),
            request_count: 0,
        }
    }

    /// Takes the requests received since the last call.
    pub fn take_requests(&mut self) -> Vec<(FetchTicket, RowRequest)> {
        std::mem::take(&mut self.requests)
    }

    /// Builds the answer the dataset gives for a request.
    pub fn respond(&self, request: &RowRequest) -> RowResponse {
        let keys = request.group_keys.keys();
        let matching: Vec<&RowData> = self
            .rows
            .iter()
            .filter(|row| {
                keys.iter()
                    .zip(&self.group_fields)
                    .all(|(key, field)| row.value(field).key_string() == *key)
            })
            .collect();

        let level_rows: Vec<RowData> = match self.group_fields.get(keys.len()) {
            Some(field) => {
                let mut seen: Vec<String> = Vec::new();
                let mut groups = Vec::new();
                for row in matching {
                    let value = row.value(field);
                    let key = value.key_string();
                    if seen.contains(&key) {
                        continue;
                    }
                    seen.push(key.clone());
                    let mut path: Vec<String> = keys.to_vec();
                    path.push(key);
                    groups.push(RowData::new().with("id", path.join("-")).with(field.as_str(), value));
                }
                groups
            }
            None => matching.into_iter().cloned().collect(),
        };

        let total = level_rows.len();
        let start = request.start_row.min(total);
        let end = request.end_row.min(total);
        let response = RowResponse::new(level_rows[start..end].to_vec());
        if request.end_row >= total {
            response.with_last_row(total)
        } else {
            response
        }
    }
}

impl RowSource for MockRowSource {
    fn request_rows(&mut self, ticket: FetchTicket, request: RowRequest) {
        self.request_count += 1;
        self.requests.push((ticket, request));
    }
}

// ============================================================================
// HARNESSES
// ============================================================================

/// Test harness wrapping a client-side model.
pub struct TestHarness {
    pub model: ClientSideRowModel,
}

impl TestHarness {
    pub fn new(config: StoreConfig) -> Self {
        TestHarness {
            model: ClientSideRowModel::new(config).unwrap(),
        }
    }

    /// Create a harness grouped by the given fields, loaded with the sales
    /// fixture and summing sales and quantity.
    pub fn with_sales(group_fields: &[&str]) -> Self {
        let config = StoreConfig {
            group_fields: group_fields.iter().map(|f| f.to_string()).collect(),
            ..StoreConfig::default()
        };
        let mut harness = Self::new(config);
        harness
            .model
            .set_value_columns(vec![
                ValueColumn::new("sales", AggFuncName::Sum),
                ValueColumn::new("quantity", AggFuncName::Sum),
            ])
            .unwrap();
        harness.model.set_row_data(SalesFixture::rows()).unwrap();
        harness.model.drain_events();
        harness
    }

    pub fn displayed(&self) -> Vec<String> {
        self.model.displayed_ids()
    }

    pub fn aggregate(&self, id: &str, column: &str) -> Option<RowValue> {
        self.model
            .node_by_id(id)
            .and_then(|n| n.aggregate_values.as_ref())
            .and_then(|agg| agg.get(column))
            .cloned()
    }

    pub fn aggregation_count(&self, id: &str) -> u64 {
        self.model.node_by_id(id).map(|n| n.aggregation_count).unwrap_or(0)
    }

    pub fn events(&mut self) -> Vec<StoreEvent> {
        self.model.drain_events()
    }
}

/// Test harness wrapping a server-side model fed by a `MockRowSource`.
pub struct ServerHarness {
    pub model: ServerSideRowModel<MockRowSource>,
}

impl ServerHarness {
    pub fn new(config: StoreConfig, rows: Vec<RowData>) -> Self {
        let fields: Vec<&str> = config.group_fields.iter().map(|f| f.as_str()).collect();
        let source = MockRowSource::new(rows, &fields);
        ServerHarness {
            model: ServerSideRowModel::new(config, source).unwrap(),
        }
    }

    /// A flat store of `count` rows with ids `r0..`.
    pub fn flat(block_size: usize, count: usize) -> Self {
        let config = StoreConfig { block_size, ..StoreConfig::default() };
        Self::new(config, numbered_rows(count))
    }

    /// Answers every outstanding request. Returns how many were answered.
    pub fn serve(&mut self) -> usize {
        let requests = self.model.source_mut().take_requests();
        let count = requests.len();
        for (ticket, request) in requests {
            let response = self.model.source().respond(&request);
            self.model.complete_fetch(ticket, Ok(response));
        }
        count
    }

    /// Fails every outstanding request.
    pub fn fail(&mut self, message: &str) -> usize {
        let requests = self.model.source_mut().take_requests();
        let count = requests.len();
        for (ticket, _) in requests {
            self.model.complete_fetch(ticket, Err(FetchError::new(message)));
        }
        count
    }

    /// Reads a row and answers the fetch it caused, if any.
    pub fn read(&mut self, display_index: usize) -> Option<String> {
        self.model.get_row(display_index);
        self.serve();
        self.model.get_row(display_index).map(|n| n.id.clone())
    }

    pub fn pending(&self) -> usize {
        self.model.source().requests.len()
    }

    pub fn request_count(&self) -> usize {
        self.model.source().request_count
    }

    /// Ids of every loaded displayed row, stubs excluded, in display order.
    pub fn loaded_ids(&mut self) -> Vec<String> {
        let mut ids = Vec::new();
        let mut rows: Vec<(usize, String)> = Vec::new();
        self.model.for_each_node(&mut |n| {
            if let (Some(index), false) = (n.display_index, n.is_stub()) {
                rows.push((index, n.id.clone()));
            }
        });
        rows.sort();
        ids.extend(rows.into_iter().map(|(_, id)| id));
        ids
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Regional sales by product and quarter.
pub struct SalesFixture;

impl SalesFixture {
    pub fn data() -> Vec<(&'static str, &'static str, &'static str, f64, f64)> {
        vec![
            ("North", "Widget", "Q1", 10000.0, 100.0),
            ("North", "Widget", "Q2", 12000.0, 120.0),
            ("North", "Gadget", "Q1", 8000.0, 80.0),
            ("North", "Gadget", "Q2", 9000.0, 90.0),
            ("South", "Widget", "Q1", 15000.0, 150.0),
            ("South", "Widget", "Q2", 14000.0, 140.0),
            ("South", "Gadget", "Q1", 11000.0, 110.0),
            ("South", "Gadget", "Q2", 13000.0, 130.0),
            ("East", "Widget", "Q1", 9000.0, 90.0),
            ("East", "Widget", "Q2", 11000.0, 110.0),
            ("East", "Gadget", "Q1", 7000.0, 70.0),
            ("East", "Gadget", "Q2", 8500.0, 85.0),
        ]
    }

    /// The data as rows with ids `s1..s12`.
    pub fn rows() -> Vec<RowData> {
        Self::data()
            .into_iter()
            .enumerate()
            .map(|(i, (region, product, quarter, sales, quantity))| {
                RowData::new()
                    .with("id", format!("s{}", i + 1))
                    .with("region", region)
                    .with("product", product)
                    .with("quarter", quarter)
                    .with("sales", sales)
                    .with("quantity", quantity)
            })
            .collect()
    }
}

/// `count` rows with ids `r0..` and a numeric `value` field.
pub fn numbered_rows(count: usize) -> Vec<RowData> {
    (0..count)
        .map(|i| RowData::new().with("id", format!("r{}", i)).with("value", i as f64))
        .collect()
}

pub fn group_id(field: &str, key: &str) -> String {
    format!("row-group-{}-{}", field, key)
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

/// Assert that a value is the expected number.
pub fn assert_number(value: Option<RowValue>, expected: f64) {
    match value {
        Some(RowValue::Number(n)) => {
            assert!((n - expected).abs() < 0.001, "expected {} but got {}", expected, n);
        }
        other => panic!("expected Number({}) but got {:?}", expected, other),
    }
}

/// Assert that display indices run 0..count with no gaps and that every
/// row starts where the previous one ends.
pub fn assert_contiguous<M: RowModel>(model: &mut M) {
    let count = model.get_row_count();
    let mut expected_top = 0.0;
    for index in 0..count {
        let bounds = model
            .get_row_bounds(index)
            .unwrap_or_else(|| panic!("row {} has no bounds", index));
        assert!(
            (bounds.top - expected_top).abs() < 0.001,
            "row {} starts at {} but the previous row ends at {}",
            index, bounds.top, expected_top
        );
        assert_eq!(model.get_row_index_at_pixel(bounds.top), Some(index));
        expected_top += bounds.height;
    }
    assert_eq!(model.get_row_index_at_pixel(expected_top), None);
}
