//! Git queries used to resolve a release request.
//!
//! The pipeline only reads from git: the commit hash recorded in bundle
//! metadata and, when no `--tag` is given, the tag pointing at `HEAD`.

use std::time::Duration;

use camino::Utf8Path;
use thiserror::Error;

use crate::runner::{CommandRunner, CommandSpec, RunOutput, RunnerError};

/// Time limit for git queries.
const GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by git queries.
#[derive(Debug, Error)]
pub enum GitError {
    /// git could not be run.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// git ran but reported failure.
    #[error("git {operation} failed: {message}")]
    CommandFailed {
        /// Query that failed.
        operation: &'static str,
        /// Trimmed git stderr.
        message: String,
    },

    /// No tag points at `HEAD`.
    #[error("HEAD does not carry a release tag; tag the commit or pass --tag")]
    UntaggedHead,

    /// git returned a commit hash with an unexpected shape.
    #[error("git reported an invalid commit hash `{hash}`")]
    InvalidHash {
        /// Hash text returned by git.
        hash: String,
    },
}

/// Commit hash of `HEAD` as 7 to 40 lowercase hex characters.
///
/// # Errors
///
/// Returns an error when git cannot run, reports failure, or prints
/// something that is not a commit hash.
pub fn head_sha(runner: &dyn CommandRunner, root: &Utf8Path) -> Result<String, GitError> {
    let output = run_git(runner, root, &["rev-parse", "--short=12", "HEAD"])?;
    if !output.success {
        return Err(GitError::CommandFailed {
            operation: "rev-parse",
            message: output.stderr.trim().to_owned(),
        });
    }
    let hash = output.stdout.trim().to_owned();
    if !is_commit_hash(&hash) {
        return Err(GitError::InvalidHash { hash });
    }
    Ok(hash)
}

/// Tag pointing exactly at `HEAD`.
///
/// # Errors
///
/// Returns [`GitError::UntaggedHead`] when `HEAD` carries no tag (or the
/// directory is not a repository), and a runner error when git cannot run.
pub fn tag_at_head(runner: &dyn CommandRunner, root: &Utf8Path) -> Result<String, GitError> {
    let output = run_git(runner, root, &["describe", "--tags", "--exact-match", "HEAD"])?;
    if !output.success {
        log::trace!("git describe failed: {}", output.stderr.trim());
        return Err(GitError::UntaggedHead);
    }
    let tag = output.stdout.trim().to_owned();
    if tag.is_empty() {
        return Err(GitError::UntaggedHead);
    }
    Ok(tag)
}

fn run_git(
    runner: &dyn CommandRunner,
    root: &Utf8Path,
    args: &[&str],
) -> Result<RunOutput, GitError> {
    let argv: Vec<String> = std::iter::once("git")
        .chain(args.iter().copied())
        .map(str::to_owned)
        .collect();
    let spec = CommandSpec::from_argv(&argv, Some(root), GIT_TIMEOUT)?;
    Ok(runner.run(&spec)?)
}

fn is_commit_hash(text: &str) -> bool {
    (7..=40).contains(&text.len())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}
