//! Bundle metadata schema.
//!
//! Every archive embeds a `bundle.json` document describing the release it
//! was built from and the artifacts it holds. The types here validate on
//! deserialisation, so a tampered or hand-edited document fails to load.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use slipway_common::manifest::PackageName;
use slipway_common::tag::{ReleaseChannel, ReleaseTag};
use thiserror::Error;

/// Schema version this build writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Name of the metadata file inside a bundle.
pub const BUNDLE_MANIFEST_FILENAME: &str = "bundle.json";

/// Errors raised while validating bundle metadata fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleMetadataError {
    /// The schema version is zero or newer than this build understands.
    #[error("unsupported bundle schema version {version}; expected 1 to {max}")]
    UnsupportedSchemaVersion {
        /// Version the document declared.
        version: u32,
        /// Newest version this build reads.
        max: u32,
    },

    /// A digest was not 64 lowercase hex characters.
    #[error("invalid SHA-256 digest `{digest}`")]
    InvalidDigest {
        /// Text that failed validation.
        digest: String,
    },

    /// A timestamp was not ISO-8601 UTC with second precision.
    #[error("invalid generated-at timestamp `{timestamp}`")]
    InvalidTimestamp {
        /// Text that failed validation.
        timestamp: String,
    },
}

/// Validated metadata schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SchemaVersion(u32);

impl SchemaVersion {
    /// Schema version written by this build.
    pub const CURRENT: Self = Self(CURRENT_SCHEMA_VERSION);

    /// Numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for SchemaVersion {
    type Error = BundleMetadataError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 || value > CURRENT_SCHEMA_VERSION {
            return Err(BundleMetadataError::UnsupportedSchemaVersion {
                version: value,
                max: CURRENT_SCHEMA_VERSION,
            });
        }
        Ok(Self(value))
    }
}

impl From<SchemaVersion> for u32 {
    fn from(version: SchemaVersion) -> Self {
        version.0
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated lowercase-hex SHA-256 digest.
///
/// # Examples
///
/// ```
/// use slipway_releaser::bundle::manifest::Sha256Digest;
///
/// let digest = Sha256Digest::try_from(
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
/// )
/// .expect("valid digest");
/// assert_eq!(digest.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Digest as hex text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digest from raw 32-byte hash output.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        use std::fmt::Write as _;
        let mut hex = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = BundleMetadataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let valid = value.len() == 64
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !valid {
            return Err(BundleMetadataError::InvalidDigest { digest: value });
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = BundleMetadataError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_owned())
    }
}

impl From<Sha256Digest> for String {
    fn from(digest: Sha256Digest) -> Self {
        digest.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated `YYYY-MM-DDThh:mm:ssZ` creation timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GeneratedAt(String);

impl GeneratedAt {
    /// Timestamp for the current moment, in UTC.
    #[must_use]
    pub fn now() -> Self {
        let epoch_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        Self(format_epoch_secs(epoch_secs))
    }

    /// Timestamp as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GeneratedAt {
    type Error = BundleMetadataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !is_iso8601_utc(&value) {
            return Err(BundleMetadataError::InvalidTimestamp { timestamp: value });
        }
        Ok(Self(value))
    }
}

impl From<GeneratedAt> for String {
    fn from(timestamp: GeneratedAt) -> Self {
        timestamp.0
    }
}

impl fmt::Display for GeneratedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One artifact recorded in the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleFile {
    /// File name within the archive.
    pub name: String,
    /// SHA-256 of the file contents.
    pub sha256: Sha256Digest,
}

/// Metadata document stored as `bundle.json` inside each archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Metadata schema version.
    pub schema_version: SchemaVersion,
    /// Package the bundle belongs to.
    pub package: String,
    /// Version the bundle was built from.
    pub version: String,
    /// Channel the release targeted, `stable` or `prerelease`.
    pub channel: String,
    /// Commit the release was cut from, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    /// Creation time.
    pub generated_at: GeneratedAt,
    /// Artifacts inside the archive, in archive order.
    pub files: Vec<BundleFile>,
}

impl BundleManifest {
    /// Build metadata for a fresh bundle.
    #[must_use]
    pub fn new(
        package: &PackageName,
        tag: &ReleaseTag,
        channel: ReleaseChannel,
        git_sha: Option<String>,
        files: Vec<BundleFile>,
    ) -> Self {
        Self {
            schema_version: SchemaVersion::CURRENT,
            package: package.to_string(),
            version: tag.version_string().to_owned(),
            channel: channel.as_str().to_owned(),
            git_sha,
            generated_at: GeneratedAt::now(),
            files,
        }
    }

    /// Serialise to pretty JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error when serialisation fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Parse and validate a metadata document.
    ///
    /// # Errors
    ///
    /// Returns an error when the document is malformed or a field fails
    /// validation.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Format a Unix epoch timestamp as `YYYY-MM-DDThh:mm:ssZ`.
fn format_epoch_secs(epoch_secs: u64) -> String {
    let (year, month, day) = civil_from_epoch(epoch_secs);
    let day_secs = epoch_secs % 86_400;
    let hour = day_secs / 3_600;
    let minute = (day_secs % 3_600) / 60;
    let second = day_secs % 60;
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z")
}

/// Convert a Unix epoch timestamp to a `(year, month, day)` triple.
///
/// Adapted from Howard Hinnant's public-domain `civil_from_days` algorithm.
fn civil_from_epoch(epoch_secs: u64) -> (i64, u64, u64) {
    let z = (epoch_secs / 86_400) as i64 + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097) as u64; // day of era [0, 146_096]
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = (yoe as i64) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // day of year
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

fn is_iso8601_utc(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() != 20 {
        return false;
    }
    const DIGITS: [usize; 14] = [0, 1, 2, 3, 5, 6, 8, 9, 11, 12, 14, 15, 17, 18];
    DIGITS.iter().all(|&i| bytes[i].is_ascii_digit())
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes[10] == b'T'
        && bytes[13] == b':'
        && bytes[16] == b':'
        && bytes[19] == b'Z'
}
