//! Error types for the release pipeline.
//!
//! Every fallible step surfaces a [`ReleaseError`]. Module-specific errors
//! (configuration, command execution, git, packaging, the archive store and
//! the package index) convert into it with `?`, so the pipeline reports one
//! error type to the CLI layer.

use camino::Utf8PathBuf;
use slipway_common::changelog::ChangelogError;
use slipway_common::manifest::ManifestError;
use slipway_common::tag::TagError;
use thiserror::Error;

use crate::bundle::PackagingError;
use crate::config::ConfigError;
use crate::git::GitError;
use crate::publish::PublishError;
use crate::runner::RunnerError;
use crate::store::StoreError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Errors that abort a release or checks run.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// The release tag was malformed or did not match the requested channel.
    #[error(transparent)]
    Tag(#[from] TagError),

    /// The package manifest failed to parse or rewrite.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The changelog failed to parse.
    #[error(transparent)]
    Changelog(#[from] ChangelogError),

    /// The project configuration was missing a key or malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An external command could not be run to completion.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// A git query failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Bundle creation failed.
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// The archive store rejected an operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The package index rejected an upload.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// A report could not be encoded as JSON.
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A project file could not be read.
    #[error("could not read {path}: {source}")]
    ReadFailed {
        /// File that was being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A project file could not be written.
    #[error("could not write {path}: {source}")]
    WriteFailed {
        /// File that was being written.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No changelog exists where the configuration points.
    #[error("changelog not found at {path}")]
    ChangelogNotFound {
        /// Path that was consulted.
        path: Utf8PathBuf,
    },

    /// The changelog has no entry for the version being released.
    #[error("no changelog entry for {version}; add one before releasing")]
    MissingChangelogEntry {
        /// Version the release requested.
        version: String,
    },

    /// The build command exited unsuccessfully.
    #[error("build failed: {reason}")]
    BuildFailed {
        /// Diagnostic tail captured from the build.
        reason: String,
    },

    /// The build produced nothing to release.
    #[error("no artifacts found in {dist_dir}; check build.command and build.dist-dir")]
    NoArtifacts {
        /// Directory that was scanned.
        dist_dir: Utf8PathBuf,
    },

    /// A filesystem path was not valid UTF-8.
    #[error("path `{path}` is not valid UTF-8")]
    NonUtf8Path {
        /// Lossy rendering of the offending path.
        path: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_path() {
        let error = ReleaseError::NoArtifacts {
            dist_dir: Utf8PathBuf::from("out/dist"),
        };
        assert!(error.to_string().contains("out/dist"));
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn read() -> Result<String> {
            Ok(std::fs::read_to_string("/nonexistent/slipway-error-test")?)
        }
        assert!(matches!(read(), Err(ReleaseError::Io(_))));
    }
}
