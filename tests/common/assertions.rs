//! Assertions over the output directory and cursor file

use std::path::Path;

/// Sorted names of the files in `dir`
pub fn output_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Assert `dir` contains exactly `expected` (order-insensitive)
pub fn assert_outputs(dir: &Path, expected: &[&str]) {
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(output_names(dir), expected, "unexpected files in {dir:?}");
}

/// Contents of the cursor file, trimmed
pub fn read_cursor(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

/// Assert the cursor file holds `expected`
pub fn assert_cursor(path: &Path, expected: &str) {
    assert_eq!(
        read_cursor(path).as_deref(),
        Some(expected),
        "cursor file {path:?} does not hold the expected link"
    );
}
