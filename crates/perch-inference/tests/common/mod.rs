//! Common test utilities for perch-inference tests

use perch_frame::{ContingencyTable, Level};

/// 2×2 table over 0/1 levels
pub fn two_by_two(counts: [[u64; 2]; 2]) -> ContingencyTable {
    let levels = vec![Level::Number(0.0), Level::Number(1.0)];
    ContingencyTable::from_counts(
        "risk",
        "reward",
        levels.clone(),
        levels,
        counts.iter().map(|r| r.to_vec()).collect(),
    )
    .unwrap()
}

/// Evenly spaced values `start, start + step, ...`
pub fn ramp(n: usize, start: f64, step: f64) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}
