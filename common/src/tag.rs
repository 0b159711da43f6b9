//! Release tag parsing and channel validation.
//!
//! A release tag names exactly one package version: an optional `v` prefix,
//! a dotted `MAJOR.MINOR.PATCH` core, and an optional pre-release suffix in
//! either the compact (`1.4.0b2`, `1.4.0rc1`) or the hyphenated
//! (`1.4.0-beta.2`, `1.4.0-rc.1`) spelling. Parsing records the original
//! text so a tag reprints exactly as written, while equality and ordering
//! use the parsed value, so both spellings of the same pre-release compare
//! equal.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// Dotted `MAJOR.MINOR.PATCH` core of a release version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Kind of pre-release a tag announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreReleaseMarker {
    /// A beta build, spelt `b2` or `-beta.2`.
    Beta,
    /// A release candidate, spelt `rc1` or `-rc.1`.
    ReleaseCandidate,
}

impl PreReleaseMarker {
    /// Short label used in messages and reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Beta => "beta",
            Self::ReleaseCandidate => "rc",
        }
    }
}

impl fmt::Display for PreReleaseMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pre-release component of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreRelease {
    /// Whether the tag names a beta or a release candidate.
    pub marker: PreReleaseMarker,
    /// Sequence number within the marker series.
    pub number: u32,
}

/// Channel a release run targets.
///
/// The channel comes from the release request (the pre-release flag), never
/// from the tag; [`ReleaseTag::expect_channel`] checks that the two agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseChannel {
    /// A stable release; the tag must not carry a pre-release marker.
    Stable,
    /// A pre-release; the tag must carry a beta or rc marker.
    PreRelease,
}

impl ReleaseChannel {
    /// Lowercase name used in reports and bundle metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::PreRelease => "prerelease",
        }
    }
}

impl fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while parsing or validating a release tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    /// The tag was empty, or consisted only of the `v` prefix.
    #[error("release tag is empty")]
    Empty,
    /// The dotted core did not have exactly three components.
    #[error("release tag `{tag}` must have a MAJOR.MINOR.PATCH core")]
    MalformedCore {
        /// Offending tag text.
        tag: String,
    },
    /// A core component was empty, non-numeric, or carried a leading zero.
    #[error("release tag `{tag}` has an invalid numeric component `{component}`")]
    InvalidNumber {
        /// Offending tag text.
        tag: String,
        /// Component that failed to parse.
        component: String,
    },
    /// The pre-release suffix was not `b<N>`, `rc<N>`, `-beta.<N>` or
    /// `-rc.<N>`.
    #[error("release tag `{tag}` has an unrecognised pre-release suffix `{suffix}`")]
    MalformedSuffix {
        /// Offending tag text.
        tag: String,
        /// Suffix that failed to parse.
        suffix: String,
    },
    /// A pre-release was requested but the tag has no beta or rc marker.
    #[error("pre-release requested but tag `{tag}` has no beta or rc marker")]
    MissingPreReleaseMarker {
        /// Offending tag text.
        tag: String,
    },
    /// A stable release was requested but the tag carries a pre-release
    /// marker.
    #[error("stable release requested but tag `{tag}` is marked {marker}")]
    UnexpectedPreReleaseMarker {
        /// Offending tag text.
        tag: String,
        /// Marker the tag carries.
        marker: PreReleaseMarker,
    },
}

/// A parsed release tag.
///
/// Equality, ordering and hashing consider the parsed value only, so the
/// compact and hyphenated spellings of the same pre-release compare equal
/// and an optional `v` prefix never distinguishes two tags. [`fmt::Display`]
/// reproduces the tag exactly as it was written.
///
/// # Examples
///
/// ```
/// use slipway_common::tag::{ReleaseChannel, ReleaseTag};
///
/// let tag = ReleaseTag::parse("v1.4.0rc2")?;
/// assert_eq!(tag.channel(), ReleaseChannel::PreRelease);
/// assert_eq!(tag.version_string(), "1.4.0rc2");
/// assert_eq!(tag.to_string(), "v1.4.0rc2");
/// # Ok::<(), slipway_common::tag::TagError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ReleaseTag {
    raw: String,
    version: Version,
    prerelease: Option<PreRelease>,
}

impl ReleaseTag {
    /// Parses a tag from its textual form.
    ///
    /// # Errors
    ///
    /// Returns a [`TagError`] describing the first malformation found: an
    /// empty tag, a core that is not three dot-separated numbers, a numeric
    /// component with a leading zero, or an unrecognised pre-release suffix.
    pub fn parse(text: &str) -> Result<Self, TagError> {
        let body = text.strip_prefix('v').unwrap_or(text);
        if body.is_empty() {
            return Err(TagError::Empty);
        }
        let split = body
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(body.len());
        let (core, suffix) = body.split_at(split);
        let version = parse_core(text, core)?;
        let prerelease = if suffix.is_empty() {
            None
        } else {
            Some(parse_suffix(text, suffix)?)
        };
        Ok(Self {
            raw: text.to_owned(),
            version,
            prerelease,
        })
    }

    /// Dotted core version of the tag.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Pre-release component, when the tag carries one.
    #[must_use]
    pub const fn prerelease(&self) -> Option<PreRelease> {
        self.prerelease
    }

    /// Whether the tag carries a beta or rc marker.
    #[must_use]
    pub const fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// Channel the tag belongs to, derived from its marker.
    #[must_use]
    pub const fn channel(&self) -> ReleaseChannel {
        match self.prerelease {
            Some(_) => ReleaseChannel::PreRelease,
            None => ReleaseChannel::Stable,
        }
    }

    /// Checks that the tag agrees with the requested release channel.
    ///
    /// A pre-release request requires a beta or rc marker; a stable request
    /// forbids one. This is the gate a release run passes before any work
    /// happens.
    ///
    /// # Examples
    ///
    /// ```
    /// use slipway_common::tag::{ReleaseChannel, ReleaseTag};
    ///
    /// let stable = ReleaseTag::parse("1.4.0")?;
    /// assert!(stable.expect_channel(ReleaseChannel::Stable).is_ok());
    /// assert!(stable.expect_channel(ReleaseChannel::PreRelease).is_err());
    /// # Ok::<(), slipway_common::tag::TagError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`TagError::MissingPreReleaseMarker`] when a pre-release is
    /// requested for an unmarked tag, and
    /// [`TagError::UnexpectedPreReleaseMarker`] when a stable release is
    /// requested for a marked one.
    pub fn expect_channel(&self, channel: ReleaseChannel) -> Result<(), TagError> {
        match (channel, self.prerelease) {
            (ReleaseChannel::PreRelease, None) => Err(TagError::MissingPreReleaseMarker {
                tag: self.raw.clone(),
            }),
            (ReleaseChannel::Stable, Some(prerelease)) => {
                Err(TagError::UnexpectedPreReleaseMarker {
                    tag: self.raw.clone(),
                    marker: prerelease.marker,
                })
            }
            _ => Ok(()),
        }
    }

    /// The tag exactly as written, minus any `v` prefix.
    ///
    /// This is the string a release run writes into the package manifest.
    #[must_use]
    pub fn version_string(&self) -> &str {
        self.raw.strip_prefix('v').unwrap_or(&self.raw)
    }

    /// Sort key ranking betas below release candidates below stable.
    fn sort_key(&self) -> (Version, u8, u32) {
        match self.prerelease {
            None => (self.version, 2, 0),
            Some(PreRelease { marker, number }) => {
                let rank = match marker {
                    PreReleaseMarker::Beta => 0,
                    PreReleaseMarker::ReleaseCandidate => 1,
                };
                (self.version, rank, number)
            }
        }
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for ReleaseTag {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for ReleaseTag {}

impl Hash for ReleaseTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

impl PartialOrd for ReleaseTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl FromStr for ReleaseTag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ReleaseTag {
    type Error = TagError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

fn parse_core(tag: &str, core: &str) -> Result<Version, TagError> {
    let mut parts = core.split('.');
    let (Some(major), Some(minor), Some(patch), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TagError::MalformedCore {
            tag: tag.to_owned(),
        });
    };
    Ok(Version {
        major: parse_component(tag, major)?,
        minor: parse_component(tag, minor)?,
        patch: parse_component(tag, patch)?,
    })
}

fn parse_component(tag: &str, component: &str) -> Result<u64, TagError> {
    if !is_plain_number(component) {
        return Err(TagError::InvalidNumber {
            tag: tag.to_owned(),
            component: component.to_owned(),
        });
    }
    component.parse().map_err(|_| TagError::InvalidNumber {
        tag: tag.to_owned(),
        component: component.to_owned(),
    })
}

fn parse_suffix(tag: &str, suffix: &str) -> Result<PreRelease, TagError> {
    let malformed = || TagError::MalformedSuffix {
        tag: tag.to_owned(),
        suffix: suffix.to_owned(),
    };
    let (marker, digits) = if let Some(rest) = suffix.strip_prefix("-beta.") {
        (PreReleaseMarker::Beta, rest)
    } else if let Some(rest) = suffix.strip_prefix("-rc.") {
        (PreReleaseMarker::ReleaseCandidate, rest)
    } else if let Some(rest) = suffix.strip_prefix("rc") {
        (PreReleaseMarker::ReleaseCandidate, rest)
    } else if let Some(rest) = suffix.strip_prefix('b') {
        (PreReleaseMarker::Beta, rest)
    } else {
        return Err(malformed());
    };
    if !is_plain_number(digits) {
        return Err(malformed());
    }
    let number = digits.parse().map_err(|_| malformed())?;
    Ok(PreRelease { marker, number })
}

/// Digits only, and no leading zero unless the number is exactly `0`.
fn is_plain_number(text: &str) -> bool {
    !text.is_empty()
        && text.chars().all(|c| c.is_ascii_digit())
        && (text == "0" || !text.starts_with('0'))
}
