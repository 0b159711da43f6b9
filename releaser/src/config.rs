//! Project configuration.
//!
//! `slipway.toml` at the project root describes the package being released,
//! the build and check commands, the publish endpoint and the archive store.
//! Every section is optional; defaults cover the common layout.
//!
//! ```toml
//! [package]
//! manifest = "package.toml"
//! changelog = "CHANGELOG.md"
//!
//! [build]
//! command = ["python", "-m", "build"]
//! dist-dir = "dist"
//!
//! [checks]
//! lint = [["ruff", "check", "."]]
//! test = [["pytest", "-q"]]
//!
//! [publish]
//! index-url = "https://pkg.example.dev/api"
//! ```

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

/// Name of the configuration file at the project root.
pub const CONFIG_FILE_NAME: &str = "slipway.toml";

/// Errors raised while loading or consulting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read configuration at {path}: {source}")]
    Unreadable {
        /// Path that was attempted.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document was not valid for this schema.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] toml::de::Error),

    /// A command list entry was empty.
    #[error("configuration key `{key}` contains an empty command")]
    EmptyCommand {
        /// Dotted key of the offending list.
        key: &'static str,
    },

    /// A key required by the requested operation is not set.
    #[error("configuration is missing `{key}`, required {purpose}")]
    MissingKey {
        /// Dotted key that must be set.
        key: &'static str,
        /// What the key is needed for.
        purpose: &'static str,
    },

    /// The requested check selection has no commands to run.
    #[error("no {selection} commands are configured")]
    NoChecksConfigured {
        /// Selection that came up empty.
        selection: &'static str,
    },
}

/// Root configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Package being released.
    pub package: PackageConfig,
    /// Build step.
    pub build: BuildConfig,
    /// Lint and test commands.
    pub checks: ChecksConfig,
    /// Package index endpoint.
    pub publish: PublishConfig,
    /// Archive store overrides.
    pub store: StoreConfig,
}

/// Package locations within the project.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PackageConfig {
    /// Manifest path, relative to the project root.
    pub manifest: Utf8PathBuf,
    /// Changelog path, relative to the project root.
    pub changelog: Utf8PathBuf,
    /// Whether stable releases must have a changelog entry.
    pub require_changelog_entry: bool,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            manifest: Utf8PathBuf::from("package.toml"),
            changelog: Utf8PathBuf::from("CHANGELOG.md"),
            require_changelog_entry: true,
        }
    }
}

/// Build step configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BuildConfig {
    /// Build command argv; an empty list means no build is configured.
    pub command: Vec<String>,
    /// Directory the build writes artifacts into, relative to the root.
    pub dist_dir: Utf8PathBuf,
    /// Time limit for the build, in seconds.
    pub timeout_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            dist_dir: Utf8PathBuf::from("dist"),
            timeout_secs: 600,
        }
    }
}

/// Lint and test commands.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ChecksConfig {
    /// Lint command argvs, run in order.
    pub lint: Vec<Vec<String>>,
    /// Test command argvs, run after the lints.
    pub test: Vec<Vec<String>>,
    /// Time limit per command, in seconds.
    pub timeout_secs: u64,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            lint: Vec::new(),
            test: Vec::new(),
            timeout_secs: 600,
        }
    }
}

/// Package index endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PublishConfig {
    /// Base URL of the package index; required when publishing.
    pub index_url: Option<String>,
    /// Environment variable holding the upload token.
    pub token_env: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            index_url: None,
            token_env: "SLIPWAY_TOKEN".to_owned(),
        }
    }
}

/// Archive store location.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct StoreConfig {
    /// Store root override; the platform data directory is used when unset.
    pub dir: Option<Utf8PathBuf>,
}

impl Config {
    /// Load configuration from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or does not parse.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Load the configuration that applies to a project root.
    ///
    /// Reads `slipway.toml` when present, otherwise returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing file cannot be read or parsed.
    pub fn load_or_default(root: &Utf8Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            log::trace!("no {CONFIG_FILE_NAME} at {root}; using defaults");
            Ok(Self::default())
        }
    }

    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error when the document does not match the schema or a
    /// configured command list is empty.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Build command, required for a release run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] when no build command is set.
    pub fn build_command(&self) -> Result<&[String], ConfigError> {
        if self.build.command.is_empty() {
            return Err(ConfigError::MissingKey {
                key: "build.command",
                purpose: "to build the package",
            });
        }
        Ok(&self.build.command)
    }

    /// Index URL, required to publish.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] when no index URL is set.
    pub fn index_url(&self) -> Result<&str, ConfigError> {
        self.publish.index_url.as_deref().ok_or(ConfigError::MissingKey {
            key: "publish.index-url",
            purpose: "to publish artifacts",
        })
    }

    /// Time limit for each check command.
    #[must_use]
    pub const fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.checks.timeout_secs)
    }

    /// Time limit for the build command.
    #[must_use]
    pub const fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for argv in &self.checks.lint {
            if argv.is_empty() {
                return Err(ConfigError::EmptyCommand { key: "checks.lint" });
            }
        }
        for argv in &self.checks.test {
            if argv.is_empty() {
                return Err(ConfigError::EmptyCommand { key: "checks.test" });
            }
        }
        Ok(())
    }
}
