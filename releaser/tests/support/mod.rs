//! Test support utilities for releaser behavioural tests.
//!
//! Behavioural tests drive the pipelines against real temporary projects and
//! real shell commands; these helpers cover the shared setup.

use camino::Utf8PathBuf;
use tempfile::TempDir;

/// Creates a temporary project root, returning the guard and its UTF-8 path.
pub fn temp_root() -> (TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().expect("failed to create temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
        .expect("temp dir path was not UTF-8");
    (temp, root)
}

/// Wraps a shell script in an `sh -c` argv.
pub fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_owned(), "-c".to_owned(), script.to_owned()]
}
