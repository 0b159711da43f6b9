//! Built-artifact discovery.
//!
//! The build step writes artifacts into the dist directory; this module
//! scans it and produces the file list the bundle and publish steps consume.

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::{ReleaseError, Result};

/// Regular files in the dist directory, sorted by name.
///
/// Hidden files and subdirectories are skipped. An empty result is an error:
/// a release with nothing to archive points at a misconfigured build.
///
/// # Errors
///
/// Returns an error when the directory cannot be read or contains no
/// artifacts.
pub fn discover_artifacts(dist_dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let entries = dist_dir.read_dir_utf8().map_err(|source| ReleaseError::ReadFailed {
        path: dist_dir.to_path_buf(),
        source,
    })?;

    let mut artifacts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ReleaseError::ReadFailed {
            path: dist_dir.to_path_buf(),
            source,
        })?;
        if entry.file_name().starts_with('.') {
            continue;
        }
        let file_type = entry.file_type().map_err(|source| ReleaseError::ReadFailed {
            path: entry.path().to_path_buf(),
            source,
        })?;
        if !file_type.is_file() {
            continue;
        }
        log::trace!("discovered artifact {}", entry.path());
        artifacts.push(entry.into_path());
    }

    artifacts.sort();
    if artifacts.is_empty() {
        return Err(ReleaseError::NoArtifacts {
            dist_dir: dist_dir.to_path_buf(),
        });
    }
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dist_with(files: &[&str]) -> (TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 path");
        for name in files {
            std::fs::write(dir.join(name), b"data").expect("write artifact");
        }
        (temp, dir)
    }

    #[test]
    fn artifacts_are_sorted_by_name() {
        let (_temp, dir) = dist_with(&["b.whl", "a.tar.gz"]);
        let artifacts = discover_artifacts(&dir).expect("artifacts");
        let names: Vec<&str> = artifacts.iter().filter_map(|p| p.file_name()).collect();
        assert_eq!(names, ["a.tar.gz", "b.whl"]);
    }

    #[test]
    fn hidden_files_and_directories_are_skipped() {
        let (_temp, dir) = dist_with(&["pkg.whl", ".DS_Store"]);
        std::fs::create_dir(dir.join("nested")).expect("create subdir");
        let artifacts = discover_artifacts(&dir).expect("artifacts");
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].file_name(), Some("pkg.whl"));
    }

    #[test]
    fn an_empty_dist_directory_is_an_error() {
        let (_temp, dir) = dist_with(&[]);
        assert!(matches!(
            discover_artifacts(&dir),
            Err(ReleaseError::NoArtifacts { .. })
        ));
    }

    #[test]
    fn a_missing_dist_directory_is_an_error() {
        let (_temp, dir) = dist_with(&[]);
        let missing = dir.join("missing");
        assert!(matches!(
            discover_artifacts(&missing),
            Err(ReleaseError::ReadFailed { .. })
        ));
    }
}
