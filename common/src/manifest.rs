//! Package manifest model.
//!
//! The manifest is a TOML document with a `[package]` table naming the
//! package and its version, an optional `[dependencies]` table mapping
//! dependency names to version-requirement strings, and zero or more
//! optional `[dependency-groups.<group>]` tables of the same shape. The
//! parser keeps the original document text so the release pipeline can
//! rewrite the version line without disturbing any other byte of the file.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::tag::{ReleaseTag, TagError};

/// Separators permitted inside a package name.
const NAME_SEPARATORS: [char; 3] = ['-', '_', '.'];

/// Errors raised while parsing or rewriting a package manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The document was not valid TOML.
    #[error("manifest is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    /// The document has no `[package]` table.
    #[error("manifest has no [package] table")]
    MissingPackageTable,
    /// A required `[package]` key was absent or not a string.
    #[error("manifest [package] is missing a string `{key}` entry")]
    MissingPackageKey {
        /// Key that was absent or mistyped.
        key: &'static str,
    },
    /// The package name does not follow the naming rules.
    #[error("invalid package name `{name}`: {reason}")]
    InvalidPackageName {
        /// Name that was rejected.
        name: String,
        /// Rule the name violated.
        reason: &'static str,
    },
    /// The package version does not follow the release version grammar.
    #[error("invalid package version `{version}`: {source}")]
    InvalidVersion {
        /// Version text that was rejected.
        version: String,
        /// Underlying grammar error.
        #[source]
        source: TagError,
    },
    /// The package version carried a tag prefix.
    #[error("package version `{version}` must not carry a `v` prefix")]
    PrefixedVersion {
        /// Version text that was rejected.
        version: String,
    },
    /// A table expected to map names to requirement strings had another
    /// shape.
    #[error("manifest table `{table}` must map dependency names to requirement strings")]
    MalformedTable {
        /// Dotted name of the offending table.
        table: String,
    },
    /// A dependency entry mapped to something other than a string.
    #[error("dependency `{name}` in `{table}` must map to a requirement string")]
    InvalidRequirement {
        /// Dotted name of the table holding the entry.
        table: String,
        /// Dependency whose value was rejected.
        name: String,
    },
    /// No `version = "..."` line was found under `[package]`.
    #[error("could not locate the [package] version line to rewrite")]
    VersionLineNotFound,
    /// The rewritten document did not report the requested version.
    #[error("failed to apply version `{version}` to the manifest")]
    RewriteFailed {
        /// Version that should have been applied.
        version: String,
    },
}

/// Validated package name.
///
/// Names are non-empty ASCII: lowercase letters and digits separated by
/// single `-`, `_` or `.` characters, starting and ending with a letter or
/// digit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageName(String);

impl PackageName {
    /// Name as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for PackageName {
    type Error = ManifestError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let invalid = |reason: &'static str| ManifestError::InvalidPackageName {
            name: value.to_owned(),
            reason,
        };
        if value.is_empty() {
            return Err(invalid("name is empty"));
        }
        let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
        if !value.chars().all(|c| alnum(c) || NAME_SEPARATORS.contains(&c)) {
            return Err(invalid(
                "only lowercase letters, digits, `-`, `_` and `.` are allowed",
            ));
        }
        let first_last_ok = value.starts_with(alnum) && value.ends_with(alnum);
        if !first_last_ok {
            return Err(invalid("name must start and end with a letter or digit"));
        }
        let mut previous_was_separator = false;
        for c in value.chars() {
            let separator = NAME_SEPARATORS.contains(&c);
            if separator && previous_was_separator {
                return Err(invalid("separators must not be adjacent"));
            }
            previous_was_separator = separator;
        }
        Ok(Self(value.to_owned()))
    }
}

/// A parsed package manifest.
///
/// # Examples
///
/// ```
/// use slipway_common::manifest::PackageManifest;
/// use slipway_common::tag::ReleaseTag;
///
/// let manifest = PackageManifest::parse(
///     "[package]\nname = \"acme-models\"\nversion = \"1.4.1\"\n",
/// )?;
/// let tag = ReleaseTag::parse("v1.4.2")?;
/// let updated = manifest.set_version(&tag)?;
/// assert!(updated.contains("version = \"1.4.2\""));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct PackageManifest {
    name: PackageName,
    version: ReleaseTag,
    dependencies: BTreeMap<String, String>,
    dependency_groups: BTreeMap<String, BTreeMap<String, String>>,
    text: String,
}

impl PackageManifest {
    /// Parses and validates a manifest document.
    ///
    /// # Errors
    ///
    /// Returns a [`ManifestError`] when the document is not TOML, the
    /// `[package]` table or its `name`/`version` strings are missing, the
    /// name or version is malformed, or a dependency table has the wrong
    /// shape.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let table: toml::Table = text.parse()?;
        let package = table
            .get("package")
            .and_then(toml::Value::as_table)
            .ok_or(ManifestError::MissingPackageTable)?;
        let name_text = package
            .get("name")
            .and_then(toml::Value::as_str)
            .ok_or(ManifestError::MissingPackageKey { key: "name" })?;
        let name = PackageName::try_from(name_text)?;
        let version_text = package
            .get("version")
            .and_then(toml::Value::as_str)
            .ok_or(ManifestError::MissingPackageKey { key: "version" })?;
        let version = parse_version(version_text)?;
        let dependencies = read_requirements(table.get("dependencies"), "dependencies")?;
        let mut dependency_groups = BTreeMap::new();
        if let Some(groups) = table.get("dependency-groups") {
            let groups = groups
                .as_table()
                .ok_or_else(|| ManifestError::MalformedTable {
                    table: "dependency-groups".to_owned(),
                })?;
            for (group, value) in groups {
                let table_name = format!("dependency-groups.{group}");
                let requirements = read_requirements(Some(value), &table_name)?;
                dependency_groups.insert(group.clone(), requirements);
            }
        }
        Ok(Self {
            name,
            version,
            dependencies,
            dependency_groups,
            text: text.to_owned(),
        })
    }

    /// Package name.
    #[must_use]
    pub const fn name(&self) -> &PackageName {
        &self.name
    }

    /// Version exactly as recorded in the document.
    #[must_use]
    pub fn version(&self) -> &str {
        self.version.version_string()
    }

    /// Version parsed under the release grammar.
    #[must_use]
    pub const fn version_tag(&self) -> &ReleaseTag {
        &self.version
    }

    /// Direct dependencies, name to requirement.
    #[must_use]
    pub const fn dependencies(&self) -> &BTreeMap<String, String> {
        &self.dependencies
    }

    /// Optional dependency groups, group name to requirements.
    #[must_use]
    pub const fn dependency_groups(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.dependency_groups
    }

    /// Number of requirements across `[dependencies]` and every group.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
            + self
                .dependency_groups
                .values()
                .map(BTreeMap::len)
                .sum::<usize>()
    }

    /// The document exactly as parsed.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the document text with the `[package]` version replaced by
    /// the tag's version string.
    ///
    /// The rewrite edits a single line and leaves every other byte of the
    /// document untouched, then re-parses the result to confirm it reports
    /// the new version.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::VersionLineNotFound`] when no
    /// `version = "..."` line exists under a `[package]` section header, and
    /// [`ManifestError::RewriteFailed`] when the edited document does not
    /// parse back to the requested version.
    pub fn set_version(&self, tag: &ReleaseTag) -> Result<String, ManifestError> {
        let version = tag.version_string();
        let mut output = String::with_capacity(self.text.len() + version.len());
        let mut in_package = false;
        let mut replaced = false;
        for line in self.text.split_inclusive('\n') {
            if !replaced {
                let content = line.trim_end_matches(['\n', '\r']).trim_start();
                if let Some(section) = section_header(content) {
                    in_package = section == "package";
                } else if in_package && line_key(content) == Some("version") {
                    let Some(rewritten) = rewrite_version_line(line, version) else {
                        return Err(ManifestError::RewriteFailed {
                            version: version.to_owned(),
                        });
                    };
                    output.push_str(&rewritten);
                    replaced = true;
                    continue;
                }
            }
            output.push_str(line);
        }
        if !replaced {
            return Err(ManifestError::VersionLineNotFound);
        }
        let reparsed = Self::parse(&output)?;
        if reparsed.version() != version {
            return Err(ManifestError::RewriteFailed {
                version: version.to_owned(),
            });
        }
        Ok(output)
    }
}

fn parse_version(text: &str) -> Result<ReleaseTag, ManifestError> {
    if text.starts_with('v') {
        return Err(ManifestError::PrefixedVersion {
            version: text.to_owned(),
        });
    }
    ReleaseTag::parse(text).map_err(|source| ManifestError::InvalidVersion {
        version: text.to_owned(),
        source,
    })
}

fn read_requirements(
    value: Option<&toml::Value>,
    table: &str,
) -> Result<BTreeMap<String, String>, ManifestError> {
    let Some(value) = value else {
        return Ok(BTreeMap::new());
    };
    let entries = value
        .as_table()
        .ok_or_else(|| ManifestError::MalformedTable {
            table: table.to_owned(),
        })?;
    let mut requirements = BTreeMap::new();
    for (name, entry) in entries {
        let Some(requirement) = entry.as_str() else {
            return Err(ManifestError::InvalidRequirement {
                table: table.to_owned(),
                name: name.clone(),
            });
        };
        requirements.insert(name.clone(), requirement.to_owned());
    }
    Ok(requirements)
}

/// Section name when the line opens a `[section]` or `[[section]]` header.
fn section_header(content: &str) -> Option<&str> {
    let rest = content.strip_prefix('[')?;
    let inner = rest.strip_prefix('[').unwrap_or(rest);
    let end = inner.find(']')?;
    Some(inner[..end].trim())
}

/// Bare key of a `key = value` line, ignoring comments.
fn line_key(content: &str) -> Option<&str> {
    if content.starts_with('#') {
        return None;
    }
    let (key, _) = content.split_once('=')?;
    Some(key.trim())
}

/// Replaces the double-quoted value of an assignment line, keeping the key,
/// spacing, trailing comment and line ending.
fn rewrite_version_line(line: &str, version: &str) -> Option<String> {
    let eq = line.find('=')?;
    let (head, tail) = line.split_at(eq + 1);
    let open = tail.find('"')?;
    let value_and_rest = tail.get(open + 1..)?;
    let close = value_and_rest.find('"')?;
    let mut rewritten = String::with_capacity(line.len() + version.len());
    rewritten.push_str(head);
    rewritten.push_str(tail.get(..=open)?);
    rewritten.push_str(version);
    rewritten.push_str(value_and_rest.get(close..)?);
    Some(rewritten)
}
