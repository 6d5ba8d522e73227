//! Common test utilities for perch-frame tests

use perch_frame::loader::load_csv;
use perch_frame::schema::{EVENT_DATE_COLUMNS, WINDOW_DATE_COLUMNS};
use perch_frame::Table;
use std::path::PathBuf;

/// Path of a fixture under `tests/data`
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Load the event fixture
pub fn events() -> Table {
    load_csv(&fixture("events.csv"), "event table", EVENT_DATE_COLUMNS).unwrap()
}

/// Load the window fixture
#[allow(dead_code)]
pub fn windows() -> Table {
    load_csv(&fixture("windows.csv"), "window table", WINDOW_DATE_COLUMNS).unwrap()
}
