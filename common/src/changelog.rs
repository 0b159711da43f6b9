//! Changelog parsing.
//!
//! Changelogs follow the Keep a Changelog layout. A released version is
//! introduced by a `## ` heading carrying the version (optionally bracketed,
//! optionally `v`-prefixed) and an optional ` - YYYY-MM-DD` date; the text
//! below the heading up to the next `## ` heading forms the entry's notes.
//! An optional `Unreleased` section may precede the released entries.
//! Released entries must be strictly descending by version, so the newest
//! release is always the first entry.
//!
//! Headings that clearly do not name a version (an `About` section in the
//! preamble, say) are tolerated before the first released entry; after it,
//! every `## ` heading must name a version.

use std::cmp::Ordering;

use thiserror::Error;

use crate::tag::{ReleaseTag, TagError};

/// Errors raised while parsing a changelog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangelogError {
    /// A heading that should name a version failed to parse.
    #[error("changelog heading `{heading}` does not name a version: {source}")]
    InvalidHeading {
        /// Offending heading line.
        heading: String,
        /// Underlying grammar error.
        #[source]
        source: TagError,
    },
    /// A heading date was not `YYYY-MM-DD`.
    #[error("changelog heading `{heading}` has a malformed date `{date}`")]
    InvalidDate {
        /// Offending heading line.
        heading: String,
        /// Date text that was rejected.
        date: String,
    },
    /// An entry is newer than the one above it.
    #[error("changelog entry `{current}` must come before `{previous}` (entries are newest first)")]
    OutOfOrder {
        /// Version of the preceding entry.
        previous: String,
        /// Version of the offending entry.
        current: String,
    },
    /// The same version appears twice.
    #[error("changelog lists version `{version}` more than once")]
    DuplicateVersion {
        /// Version that was repeated.
        version: String,
    },
    /// An `Unreleased` section appeared after released entries, or twice.
    #[error("the Unreleased section must be the first and only one")]
    MisplacedUnreleased,
}

/// One released version and its notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    /// Version the entry documents.
    pub version: ReleaseTag,
    /// Release date recorded in the heading, when present.
    pub date: Option<String>,
    /// Entry body up to the next heading, trimmed.
    pub notes: String,
}

/// A parsed changelog: optional unreleased notes plus released entries,
/// newest first.
///
/// # Examples
///
/// ```
/// use slipway_common::changelog::Changelog;
/// use slipway_common::tag::ReleaseTag;
///
/// let log = Changelog::parse(
///     "## [1.4.2] - 2024-06-01\n- fixes\n\n## [1.4.1] - 2024-05-01\n- earlier\n",
/// )?;
/// let tag = ReleaseTag::parse("v1.4.2")?;
/// assert_eq!(log.release_notes(&tag), Some("- fixes"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changelog {
    unreleased: Option<String>,
    entries: Vec<ChangelogEntry>,
}

impl Changelog {
    /// Parses a changelog document.
    ///
    /// # Errors
    ///
    /// Returns a [`ChangelogError`] when a version heading or its date is
    /// malformed, when entries are out of order or duplicated, or when an
    /// `Unreleased` section appears anywhere but first.
    pub fn parse(text: &str) -> Result<Self, ChangelogError> {
        let mut log = Self::default();
        let mut current: Option<Heading> = None;
        let mut body = String::new();
        for line in text.lines() {
            let heading_text = line.strip_prefix("## ").filter(|r| !r.starts_with('#'));
            let Some(rest) = heading_text else {
                if current.is_some() {
                    body.push_str(line);
                    body.push('\n');
                }
                continue;
            };
            log.flush(current.take(), &mut body)?;
            current = log.classify_heading(line, rest)?;
        }
        log.flush(current, &mut body)?;
        Ok(log)
    }

    /// Notes collected under the `Unreleased` heading, when present.
    #[must_use]
    pub fn unreleased(&self) -> Option<&str> {
        self.unreleased.as_deref()
    }

    /// Released entries, newest first.
    #[must_use]
    pub fn entries(&self) -> &[ChangelogEntry] {
        &self.entries
    }

    /// Entry documenting the tagged version, matched on the parsed value.
    #[must_use]
    pub fn entry_for(&self, tag: &ReleaseTag) -> Option<&ChangelogEntry> {
        self.entries.iter().find(|entry| entry.version == *tag)
    }

    /// Most recent released entry.
    #[must_use]
    pub fn latest(&self) -> Option<&ChangelogEntry> {
        self.entries.first()
    }

    /// Notes for the tagged version, when an entry exists.
    #[must_use]
    pub fn release_notes(&self, tag: &ReleaseTag) -> Option<&str> {
        self.entry_for(tag).map(|entry| entry.notes.as_str())
    }

    /// Classifies a `## ` heading, or ignores it when the preamble allows.
    fn classify_heading(
        &self,
        line: &str,
        rest: &str,
    ) -> Result<Option<Heading>, ChangelogError> {
        let (token, date) = match rest.trim().split_once(" - ") {
            Some((token, date)) => (token.trim(), Some(date.trim())),
            None => (rest.trim(), None),
        };
        let bracketed = token.starts_with('[');
        let name = token
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .unwrap_or(token);
        if name.eq_ignore_ascii_case("unreleased") {
            if self.unreleased.is_some() || !self.entries.is_empty() {
                return Err(ChangelogError::MisplacedUnreleased);
            }
            return Ok(Some(Heading::Unreleased));
        }
        match ReleaseTag::parse(name) {
            Ok(version) => {
                let date = match date {
                    Some(text) if !is_iso_date(text) => {
                        return Err(ChangelogError::InvalidDate {
                            heading: line.to_owned(),
                            date: text.to_owned(),
                        });
                    }
                    Some(text) => Some(text.to_owned()),
                    None => None,
                };
                Ok(Some(Heading::Version { version, date }))
            }
            Err(source) => {
                let mandatory = bracketed || looks_like_version(name) || !self.entries.is_empty();
                if mandatory {
                    Err(ChangelogError::InvalidHeading {
                        heading: line.to_owned(),
                        source,
                    })
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Closes the current section, recording its trimmed body.
    fn flush(&mut self, current: Option<Heading>, body: &mut String) -> Result<(), ChangelogError> {
        let notes = body.trim().to_owned();
        body.clear();
        match current {
            None => {}
            Some(Heading::Unreleased) => {
                self.unreleased = Some(notes);
            }
            Some(Heading::Version { version, date }) => {
                if let Some(previous) = self.entries.last() {
                    match version.cmp(&previous.version) {
                        Ordering::Less => {}
                        Ordering::Equal => {
                            return Err(ChangelogError::DuplicateVersion {
                                version: version.to_string(),
                            });
                        }
                        Ordering::Greater => {
                            return Err(ChangelogError::OutOfOrder {
                                previous: previous.version.to_string(),
                                current: version.to_string(),
                            });
                        }
                    }
                }
                self.entries.push(ChangelogEntry {
                    version,
                    date,
                    notes,
                });
            }
        }
        Ok(())
    }
}

/// Section heading recognised during the parse.
#[derive(Debug)]
enum Heading {
    Unreleased,
    Version {
        version: ReleaseTag,
        date: Option<String>,
    },
}

/// Whether a failed heading token was clearly meant to be a version.
fn looks_like_version(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('v') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Structural `YYYY-MM-DD` check with plausible month and day ranges.
fn is_iso_date(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let digit_positions = [0usize, 1, 2, 3, 5, 6, 8, 9];
    if !digit_positions
        .iter()
        .all(|&idx| bytes.get(idx).is_some_and(u8::is_ascii_digit))
    {
        return false;
    }
    let month = (bytes[5] - b'0') * 10 + (bytes[6] - b'0');
    let day = (bytes[8] - b'0') * 10 + (bytes[9] - b'0');
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TYPICAL: &str = "\
# Changelog

All notable changes to this package are documented here.

## [Unreleased]

### Added
- provider flags for upcoming players

## [1.4.2] - 2024-06-01

### Fixed
- timestamps serialise in UTC

## [1.4.2-rc.1] - 2024-05-20

- candidate build

## [1.4.1] - 2024-05-01

### Changed
- tightened URI validation
";

    fn parse_ok(text: &str) -> Changelog {
        Changelog::parse(text).unwrap_or_else(|error| panic!("changelog should parse: {error}"))
    }

    fn parse_tag(text: &str) -> ReleaseTag {
        ReleaseTag::parse(text).unwrap_or_else(|error| panic!("`{text}` should parse: {error}"))
    }

    #[test]
    fn parses_a_typical_changelog() {
        let log = parse_ok(TYPICAL);
        assert_eq!(log.entries().len(), 3);
        let latest = log.latest().map(|entry| entry.version.to_string());
        assert_eq!(latest.as_deref(), Some("1.4.2"));
        assert!(
            log.unreleased()
                .is_some_and(|notes| notes.contains("provider flags"))
        );
        let notes = log.release_notes(&parse_tag("1.4.2"));
        assert!(notes.is_some_and(|n| n.starts_with("### Fixed")));
    }

    #[test]
    fn entry_for_matches_either_spelling() {
        let log = parse_ok(TYPICAL);
        let entry = log.entry_for(&parse_tag("v1.4.2rc1"));
        assert!(entry.is_some_and(|e| e.notes == "- candidate build"));
        assert_eq!(
            entry.and_then(|e| e.date.as_deref()),
            Some("2024-05-20")
        );
    }

    #[test]
    fn missing_versions_have_no_entry() {
        let log = parse_ok(TYPICAL);
        assert!(log.entry_for(&parse_tag("9.9.9")).is_none());
        assert!(log.release_notes(&parse_tag("9.9.9")).is_none());
    }

    #[rstest]
    #[case::ascending("## [1.0.0] - 2024-01-01\n- a\n\n## [1.1.0] - 2024-02-01\n- b\n")]
    #[case::duplicate("## [1.1.0]\n- a\n\n## [1.1.0]\n- b\n")]
    #[case::duplicate_spelling("## [1.1.0b1]\n- a\n\n## [1.1.0-beta.1]\n- b\n")]
    fn rejects_misordered_entries(#[case] text: &str) {
        assert!(Changelog::parse(text).is_err(), "{text}");
    }

    #[test]
    fn tolerates_preamble_headings() {
        let log = parse_ok("## About\nBackground notes.\n\n## [1.0.0] - 2024-01-01\n- first\n");
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn rejects_prose_headings_after_entries() {
        let text = "## [1.0.0] - 2024-01-01\n- first\n\n## Thanks\n- everyone\n";
        match Changelog::parse(text) {
            Err(ChangelogError::InvalidHeading { heading, .. }) => {
                assert_eq!(heading, "## Thanks");
            }
            other => panic!("expected InvalidHeading, got {other:?}"),
        }
    }

    #[rstest]
    #[case::wrong_shape("## [1.0.0] - June 1st\n- a\n", "June 1st")]
    #[case::bad_month("## [1.0.0] - 2024-13-01\n- a\n", "2024-13-01")]
    #[case::bad_day("## [1.0.0] - 2024-01-32\n- a\n", "2024-01-32")]
    fn rejects_malformed_dates(#[case] text: &str, #[case] date: &str) {
        match Changelog::parse(text) {
            Err(ChangelogError::InvalidDate { date: found, .. }) => assert_eq!(found, date),
            other => panic!("expected InvalidDate, got {other:?}"),
        }
    }

    #[test]
    fn rejects_a_late_unreleased_section() {
        let text = "## [1.0.0] - 2024-01-01\n- first\n\n## [Unreleased]\n- next\n";
        assert_eq!(
            Changelog::parse(text),
            Err(ChangelogError::MisplacedUnreleased)
        );
    }

    #[test]
    fn empty_documents_parse_to_an_empty_changelog() {
        let log = parse_ok("# Changelog\n\nNothing released yet.\n");
        assert!(log.entries().is_empty());
        assert!(log.unreleased().is_none());
        assert!(log.latest().is_none());
    }

    #[test]
    fn handles_windows_line_endings() {
        let log = parse_ok("## [1.0.0] - 2024-01-01\r\n- first\r\n");
        let notes = log.release_notes(&parse_tag("1.0.0"));
        assert_eq!(notes, Some("- first"));
    }

    #[test]
    fn malformed_version_heading_reports_the_grammar_error() {
        let text = "## [1.0] - 2024-01-01\n- a\n";
        match Changelog::parse(text) {
            Err(ChangelogError::InvalidHeading { source, .. }) => {
                assert!(matches!(source, TagError::MalformedCore { .. }));
            }
            other => panic!("expected InvalidHeading, got {other:?}"),
        }
    }
}
