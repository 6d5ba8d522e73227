//! Common test utilities for perch-report tests

use std::path::PathBuf;

/// Fresh scratch directory under the system temp dir
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("perch-report-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Read a rendered file and check it is an SVG document
pub fn assert_svg(path: &std::path::Path) -> String {
    let body = std::fs::read_to_string(path).unwrap();
    assert!(body.contains("<svg"), "{} is not an SVG", path.display());
    body
}
