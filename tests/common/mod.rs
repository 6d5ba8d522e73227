//! Common test utilities for the perch pipeline tests

use perch_stats::{AnalysisConfig, Dataset};
use std::path::{Path, PathBuf};

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Default configuration over the fixtures, writing into a fresh directory
pub fn config(run: &str) -> AnalysisConfig {
    let output_dir = std::env::temp_dir().join(format!("perch-{}-{run}", std::process::id()));
    let _ = std::fs::remove_dir_all(&output_dir);
    AnalysisConfig {
        events_path: fixture("events.csv"),
        windows_path: fixture("windows.csv"),
        output_dir,
        ..AnalysisConfig::default()
    }
}

pub fn dataset(config: &AnalysisConfig) -> Dataset {
    Dataset::load(config).unwrap()
}
