//! Package index client.
//!
//! Artifacts publish to the configured index over HTTP `PUT`, one request
//! per file, authenticated with a bearer token read from the environment.
//! [`PackageIndex`] is the seam the release pipeline talks to; tests
//! substitute a mock and never open a socket.

use std::sync::OnceLock;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::bundle::Sha256Digest;

/// Time limit for one upload request.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

/// One artifact ready to publish.
#[derive(Debug, Clone)]
pub struct ArtifactUpload {
    /// Package being released.
    pub package: String,
    /// Version being released.
    pub version: String,
    /// File name at the index.
    pub filename: String,
    /// File contents.
    pub body: Vec<u8>,
    /// Digest of the contents, sent for server-side verification.
    pub sha256: Sha256Digest,
}

/// Errors raised while publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The token environment variable is unset or blank.
    #[error("publish token not found; set the `{variable}` environment variable")]
    MissingToken {
        /// Variable that was consulted.
        variable: String,
    },

    /// The index already has this file for this version.
    #[error("{filename} is already published at the index")]
    AlreadyPublished {
        /// File the index rejected.
        filename: String,
    },

    /// The index rejected the publish token.
    #[error("the package index rejected the publish token (HTTP {status})")]
    AuthRejected {
        /// Status the index returned.
        status: u16,
    },

    /// The index refused the upload.
    #[error("the package index rejected {filename}: HTTP {status}")]
    IndexRejected {
        /// File the index refused.
        filename: String,
        /// Status the index returned.
        status: u16,
    },

    /// The request could not be completed.
    #[error("publish request for {filename} failed: {reason}")]
    Transport {
        /// File being uploaded.
        filename: String,
        /// Failure description.
        reason: String,
    },

    /// Reading an artifact from disk failed.
    #[error("could not read artifact {path}: {source}")]
    UnreadableArtifact {
        /// Artifact path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Publishes artifacts to a package index.
#[cfg_attr(test, mockall::automock)]
pub trait PackageIndex {
    /// Publish one artifact.
    ///
    /// # Errors
    ///
    /// Returns an error when the upload is rejected or cannot complete.
    fn publish(&self, upload: &ArtifactUpload) -> Result<(), PublishError>;
}

/// Index client speaking HTTP with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpPackageIndex {
    base_url: String,
    token: String,
}

impl HttpPackageIndex {
    /// Client for the given index URL and token.
    ///
    /// A trailing slash on the URL is tolerated.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            token: token.into(),
        }
    }

    /// Upload URL for one artifact:
    /// `{index-url}/{package}/{version}/{filename}`.
    #[must_use]
    pub fn upload_url(&self, upload: &ArtifactUpload) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url, upload.package, upload.version, upload.filename
        )
    }
}

impl PackageIndex for HttpPackageIndex {
    fn publish(&self, upload: &ArtifactUpload) -> Result<(), PublishError> {
        let url = self.upload_url(upload);
        log::trace!("uploading {} to {url}", upload.filename);
        http_agent()
            .put(&url)
            .header("Authorization", &format!("Bearer {}", self.token))
            .header("X-Checksum-Sha256", upload.sha256.as_str())
            .header("Content-Type", "application/octet-stream")
            .send(upload.body.as_slice())
            .map_err(|error| map_ureq_error(&upload.filename, &error))?;
        Ok(())
    }
}

/// Read the publish token from the named environment variable.
///
/// # Errors
///
/// Returns [`PublishError::MissingToken`] when the variable is unset or
/// blank.
pub fn resolve_token(variable: &str) -> Result<String, PublishError> {
    match std::env::var(variable) {
        Ok(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(PublishError::MissingToken {
            variable: variable.to_owned(),
        }),
    }
}

/// Shared HTTP agent with a global request timeout.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(PUBLISH_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

fn map_ureq_error(filename: &str, error: &ureq::Error) -> PublishError {
    match error {
        ureq::Error::StatusCode(409) => PublishError::AlreadyPublished {
            filename: filename.to_owned(),
        },
        ureq::Error::StatusCode(status @ (401 | 403)) => {
            PublishError::AuthRejected { status: *status }
        }
        ureq::Error::StatusCode(status) => PublishError::IndexRejected {
            filename: filename.to_owned(),
            status: *status,
        },
        other => PublishError::Transport {
            filename: filename.to_owned(),
            reason: other.to_string(),
        },
    }
}
