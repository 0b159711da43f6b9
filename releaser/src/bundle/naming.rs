//! Bundle archive naming policy.
//!
//! Constructs deterministic archive names of the form
//! `<package>-<version>.tar.zst`, with a `.sha256` sidecar alongside.

use std::fmt;

use slipway_common::manifest::PackageName;

/// The fixed file extension for bundle archives.
const BUNDLE_EXTENSION: &str = ".tar.zst";

/// The suffix appended to the archive name for its digest sidecar.
const SIDECAR_SUFFIX: &str = ".sha256";

/// A fully-qualified bundle archive name.
///
/// # Examples
///
/// ```
/// use slipway_common::manifest::PackageName;
/// use slipway_releaser::bundle::naming::BundleName;
///
/// let package: PackageName = "acme-models".try_into().expect("valid name");
/// let name = BundleName::new(package, "1.4.2");
/// assert_eq!(name.to_string(), "acme-models-1.4.2.tar.zst");
/// assert_eq!(name.sidecar_filename(), "acme-models-1.4.2.tar.zst.sha256");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleName {
    package: PackageName,
    version: String,
}

impl BundleName {
    /// Create a bundle name from a validated package name and a version.
    #[must_use]
    pub fn new(package: PackageName, version: impl Into<String>) -> Self {
        Self {
            package,
            version: version.into(),
        }
    }

    /// Archive file name including the extension.
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}-{}{BUNDLE_EXTENSION}", self.package, self.version)
    }

    /// Digest sidecar file name.
    #[must_use]
    pub fn sidecar_filename(&self) -> String {
        format!("{}{SIDECAR_SUFFIX}", self.filename())
    }

    /// Package the bundle belongs to.
    #[must_use]
    pub fn package(&self) -> &PackageName {
        &self.package
    }

    /// Version the bundle was built from.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for BundleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filename())
    }
}
