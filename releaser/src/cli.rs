//! CLI argument definitions for slipway.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use slipway_common::tag::ReleaseChannel;

use crate::checks::CheckSelection;

/// Release tagged packages to a package index.
#[derive(Parser, Debug)]
#[command(name = "slipway")]
#[command(version, about)]
#[command(long_about = concat!(
    "Release tagged packages to a package index.\n\n",
    "slipway drives a release from an annotated tag: it validates the tag ",
    "against the requested channel, sets the package manifest version, runs ",
    "the configured build, bundles the artifacts into a local archive store, ",
    "and publishes them to the package index.\n\n",
    "Stable tags carry a bare version (v1.4.2); pre-release tags carry a ",
    "marker (v1.4.2b1, v1.4.2-rc.1). Requesting the wrong channel for a tag ",
    "aborts before anything is modified.\n\n",
    "Configuration is read from slipway.toml at the project root.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Release the tag at HEAD to the stable channel:\n",
    "    $ slipway release\n\n",
    "  Release an explicit pre-release tag:\n",
    "    $ slipway release --tag v1.5.0-rc.1 --prerelease\n\n",
    "  Preview a release without side effects:\n",
    "    $ slipway release --tag v1.4.2 --dry-run\n\n",
    "  Run the configured lints and tests:\n",
    "    $ slipway check\n\n",
    "  Validate a tag against a channel:\n",
    "    $ slipway validate v1.4.2b1 --prerelease\n\n",
    "  Print the changelog entry for a tag:\n",
    "    $ slipway notes v1.4.2",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file [default: slipway.toml in the project root].
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Project root directory [default: current directory].
    #[arg(long, value_name = "DIR", global = true)]
    pub root: Option<Utf8PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Release a tagged version of the package.
    Release(ReleaseArgs),

    /// Run the configured lint and test commands.
    Check(CheckArgs),

    /// Validate a tag against a release channel.
    Validate(ValidateArgs),

    /// Print the changelog entry for a tag.
    Notes(NotesArgs),
}

/// Arguments for the release command.
#[derive(Parser, Debug, Clone)]
pub struct ReleaseArgs {
    /// Tag to release [default: the tag at HEAD].
    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Release to the pre-release channel.
    #[arg(long)]
    pub prerelease: bool,

    /// Show the release plan and exit without side effects.
    #[arg(long)]
    pub dry_run: bool,

    /// Build and bundle, but skip the package index upload.
    #[arg(long)]
    pub no_publish: bool,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the check command.
#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    /// Run only the lint commands.
    #[arg(long, conflicts_with = "tests_only")]
    pub lint_only: bool,

    /// Run only the test commands.
    #[arg(long)]
    pub tests_only: bool,

    /// Output the report in JSON format for scripting.
    #[arg(long)]
    pub json: bool,

    /// Suppress progress output (the report is still shown).
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the validate command.
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Tag to validate.
    #[arg(value_name = "TAG")]
    pub tag: String,

    /// Expect a pre-release tag.
    #[arg(long)]
    pub prerelease: bool,
}

/// Arguments for the notes command.
#[derive(Parser, Debug, Clone)]
pub struct NotesArgs {
    /// Tag to look up.
    #[arg(value_name = "TAG")]
    pub tag: String,
}

impl ReleaseArgs {
    /// Returns the channel the arguments request.
    ///
    /// # Examples
    ///
    /// ```
    /// use slipway_common::tag::ReleaseChannel;
    /// use slipway_releaser::cli::ReleaseArgs;
    ///
    /// let args = ReleaseArgs {
    ///     prerelease: true,
    ///     ..ReleaseArgs::default()
    /// };
    /// assert_eq!(args.channel(), ReleaseChannel::PreRelease);
    /// ```
    #[must_use]
    pub const fn channel(&self) -> ReleaseChannel {
        if self.prerelease {
            ReleaseChannel::PreRelease
        } else {
            ReleaseChannel::Stable
        }
    }
}

impl Default for ReleaseArgs {
    /// Creates a `ReleaseArgs` instance targeting a stable release of the
    /// tag at HEAD.
    ///
    /// # Examples
    ///
    /// ```
    /// use slipway_releaser::cli::ReleaseArgs;
    ///
    /// let args = ReleaseArgs::default();
    /// assert!(args.tag.is_none());
    /// assert!(!args.prerelease);
    /// assert!(!args.dry_run);
    /// ```
    fn default() -> Self {
        Self {
            tag: None,
            prerelease: false,
            dry_run: false,
            no_publish: false,
            quiet: false,
        }
    }
}

impl CheckArgs {
    /// Returns the check selection the flags describe.
    ///
    /// # Examples
    ///
    /// ```
    /// use slipway_releaser::checks::CheckSelection;
    /// use slipway_releaser::cli::CheckArgs;
    ///
    /// let args = CheckArgs {
    ///     lint_only: true,
    ///     ..CheckArgs::default()
    /// };
    /// assert_eq!(args.selection(), CheckSelection::LintOnly);
    /// ```
    #[must_use]
    pub const fn selection(&self) -> CheckSelection {
        if self.lint_only {
            CheckSelection::LintOnly
        } else if self.tests_only {
            CheckSelection::TestsOnly
        } else {
            CheckSelection::All
        }
    }
}

impl Default for CheckArgs {
    /// Creates a `CheckArgs` instance that runs every configured check.
    ///
    /// # Examples
    ///
    /// ```
    /// use slipway_releaser::cli::CheckArgs;
    ///
    /// let args = CheckArgs::default();
    /// assert!(!args.lint_only);
    /// assert!(!args.tests_only);
    /// assert!(!args.json);
    /// ```
    fn default() -> Self {
        Self {
            lint_only: false,
            tests_only: false,
            json: false,
            quiet: false,
        }
    }
}

impl ValidateArgs {
    /// Returns the channel the arguments expect the tag to carry.
    #[must_use]
    pub const fn channel(&self) -> ReleaseChannel {
        if self.prerelease {
            ReleaseChannel::PreRelease
        } else {
            ReleaseChannel::Stable
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
