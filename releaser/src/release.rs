//! The release pipeline.
//!
//! A release run is a linear script: validate the tag against the requested
//! channel and the project files, set the manifest version, build, bundle
//! the artifacts into the archive store, and publish them to the package
//! index. The first failure aborts the run; nothing is retried.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

use slipway_common::changelog::Changelog;
use slipway_common::manifest::PackageManifest;
use slipway_common::tag::{ReleaseChannel, ReleaseTag};

use crate::bundle::{BundleOutput, BundleParams, package_bundle};
use crate::config::{Config, ConfigError};
use crate::dist::discover_artifacts;
use crate::error::{ReleaseError, Result};
use crate::git;
use crate::output::{ReleasePlan, count_noun, success_message, tail, write_stderr_line};
use crate::publish::{ArtifactUpload, PackageIndex, PublishError};
use crate::runner::{CommandRunner, CommandSpec, RunOutput};
use crate::store::{ArchiveStore, PlacedBundle};

/// Lines of build stderr kept for the failure message.
const BUILD_STDERR_TAIL_LINES: usize = 20;

/// A validated release request.
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    /// Tag being released.
    pub tag: ReleaseTag,
    /// Channel the request targets.
    pub channel: ReleaseChannel,
    /// Show the plan without side effects.
    pub dry_run: bool,
    /// Skip the publish step.
    pub no_publish: bool,
    /// Suppress progress output.
    pub quiet: bool,
}

/// Collaborators a release run needs.
pub struct ReleaseContext<'a> {
    /// Project configuration.
    pub config: &'a Config,
    /// Project root directory.
    pub root: &'a Utf8Path,
    /// Runner for the build command and git queries.
    pub runner: &'a dyn CommandRunner,
    /// Package index client, present when publishing is possible.
    pub index: Option<&'a dyn PackageIndex>,
    /// Archive store bundles land in.
    pub store: &'a ArchiveStore,
}

/// Summary of a completed release run.
#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    /// Package that was released.
    pub package: String,
    /// Version that was released.
    pub version: String,
    /// Channel that was released.
    pub channel: ReleaseChannel,
    /// Number of artifacts the build produced.
    pub artifact_count: usize,
    /// Final bundle path in the store; absent for dry runs.
    pub bundle_path: Option<Utf8PathBuf>,
    /// Number of artifacts published; `None` when publishing was skipped.
    pub published: Option<usize>,
}

/// Facts gathered during validation.
struct Validated {
    manifest: PackageManifest,
    manifest_path: Utf8PathBuf,
    has_changelog_entry: bool,
    git_sha: Option<String>,
}

/// Run the release pipeline to completion.
///
/// # Errors
///
/// Returns the first error any step raises: a tag or channel mismatch, an
/// invalid manifest or changelog, a failed or empty build, a store failure,
/// or a rejected upload.
pub fn run_release(
    context: &ReleaseContext<'_>,
    request: &ReleaseRequest,
    stderr: &mut dyn Write,
) -> Result<ReleaseOutcome> {
    let validated = validate(context, request)?;

    if request.dry_run {
        let plan = build_plan(context, request, &validated);
        write_stderr_line(stderr, plan.display_text());
        return Ok(ReleaseOutcome {
            package: validated.manifest.name().to_string(),
            version: request.tag.version_string().to_owned(),
            channel: request.channel,
            artifact_count: 0,
            bundle_path: None,
            published: None,
        });
    }

    apply_version(request, &validated, stderr)?;
    let artifacts = build_package(context, request, stderr)?;
    let (bundle, placed) = archive_bundle(context, request, &validated, &artifacts, stderr)?;
    let published = publish_artifacts(context, request, &bundle, &artifacts, stderr)?;

    let outcome = ReleaseOutcome {
        package: validated.manifest.name().to_string(),
        version: request.tag.version_string().to_owned(),
        channel: request.channel,
        artifact_count: artifacts.len(),
        bundle_path: Some(placed.archive_path),
        published,
    };
    if !request.quiet {
        write_stderr_line(
            stderr,
            success_message(
                &outcome.package,
                &outcome.version,
                outcome.channel,
                outcome.artifact_count,
                outcome.published,
            ),
        );
    }
    Ok(outcome)
}

/// Load and parse the changelog at `path`.
///
/// A missing file is `Ok(None)`; any other read failure or a parse failure
/// is an error.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_changelog(path: &Utf8Path) -> Result<Option<Changelog>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ReleaseError::ReadFailed {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    Ok(Some(Changelog::parse(&text)?))
}

/// Load and parse the package manifest at `path`.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn load_manifest(path: &Utf8Path) -> Result<PackageManifest> {
    let text = std::fs::read_to_string(path).map_err(|source| ReleaseError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(PackageManifest::parse(&text)?)
}

fn validate(context: &ReleaseContext<'_>, request: &ReleaseRequest) -> Result<Validated> {
    request.tag.expect_channel(request.channel)?;

    let manifest_path = context.root.join(&context.config.package.manifest);
    let manifest = load_manifest(&manifest_path)?;

    let changelog_path = context.root.join(&context.config.package.changelog);
    let changelog = load_changelog(&changelog_path)?;
    let has_changelog_entry = changelog
        .as_ref()
        .is_some_and(|log| log.entry_for(&request.tag).is_some());

    if request.channel == ReleaseChannel::Stable
        && context.config.package.require_changelog_entry
        && !has_changelog_entry
    {
        return Err(ReleaseError::MissingChangelogEntry {
            version: request.tag.version_string().to_owned(),
        });
    }

    let git_sha = match git::head_sha(context.runner, context.root) {
        Ok(sha) => Some(sha),
        Err(error) => {
            log::trace!("omitting commit hash from bundle metadata: {error}");
            None
        }
    };

    Ok(Validated {
        manifest,
        manifest_path,
        has_changelog_entry,
        git_sha,
    })
}

fn build_plan<'a>(
    context: &'a ReleaseContext<'_>,
    request: &'a ReleaseRequest,
    validated: &'a Validated,
) -> ReleasePlan<'a> {
    let publish_target = if request.no_publish {
        None
    } else {
        Some(
            context
                .config
                .publish
                .index_url
                .as_deref()
                .unwrap_or("(publish.index-url not set)"),
        )
    };
    ReleasePlan {
        package: validated.manifest.name().as_str(),
        current_version: validated.manifest.version(),
        release_version: request.tag.version_string(),
        channel: request.channel,
        has_changelog_entry: validated.has_changelog_entry,
        git_sha: validated.git_sha.as_deref(),
        build_command: context
            .config
            .build_command()
            .ok()
            .map(|argv| argv.join(" ")),
        dist_dir: &context.config.build.dist_dir,
        store_root: context.store.root(),
        publish_target,
    }
}

fn apply_version(
    request: &ReleaseRequest,
    validated: &Validated,
    stderr: &mut dyn Write,
) -> Result<()> {
    if !request.quiet {
        write_stderr_line(
            stderr,
            format!(
                "Setting {} version to {}",
                validated.manifest.name(),
                request.tag.version_string()
            ),
        );
    }
    let updated = validated.manifest.set_version(&request.tag)?;
    std::fs::write(&validated.manifest_path, updated).map_err(|source| {
        ReleaseError::WriteFailed {
            path: validated.manifest_path.clone(),
            source,
        }
    })?;
    Ok(())
}

fn build_package(
    context: &ReleaseContext<'_>,
    request: &ReleaseRequest,
    stderr: &mut dyn Write,
) -> Result<Vec<Utf8PathBuf>> {
    let argv = context.config.build_command()?;
    let spec = CommandSpec::from_argv(argv, Some(context.root), context.config.build_timeout())?;
    if !request.quiet {
        write_stderr_line(stderr, format!("Building with `{}`", spec.display_line()));
    }
    let output = context.runner.run(&spec)?;
    if !output.success {
        return Err(ReleaseError::BuildFailed {
            reason: build_failure_reason(&output),
        });
    }
    let dist_dir = context.root.join(&context.config.build.dist_dir);
    discover_artifacts(&dist_dir)
}

fn build_failure_reason(output: &RunOutput) -> String {
    tail(&output.stderr, BUILD_STDERR_TAIL_LINES)
        .unwrap_or_else(|| "build command exited unsuccessfully".to_owned())
}

fn archive_bundle(
    context: &ReleaseContext<'_>,
    request: &ReleaseRequest,
    validated: &Validated,
    artifacts: &[Utf8PathBuf],
    stderr: &mut dyn Write,
) -> Result<(BundleOutput, PlacedBundle)> {
    if !request.quiet {
        write_stderr_line(
            stderr,
            format!("Bundling {}", count_noun(artifacts.len(), "artifact")),
        );
    }

    let staging = tempfile::tempdir()?;
    let staging_dir = Utf8PathBuf::from_path_buf(staging.path().to_path_buf())
        .map_err(|path| ReleaseError::NonUtf8Path {
            path: path.display().to_string(),
        })?;

    let params = BundleParams {
        package: validated.manifest.name(),
        tag: &request.tag,
        channel: request.channel,
        git_sha: validated.git_sha.clone(),
        artifacts,
        output_dir: &staging_dir,
    };
    let bundle = package_bundle(&params)?;

    let placed = context.store.place(validated.manifest.name(), &bundle)?;
    let recorded = context.store.record_release(
        validated.manifest.name(),
        request.tag.version_string(),
        request.channel,
        bundle.manifest.generated_at.as_str(),
    )?;
    if recorded.recovered_from_corrupt_file() && !request.quiet {
        write_stderr_line(stderr, "Release history was corrupt and has been reset");
    }
    log::trace!("{}", recorded.history().summary_line());

    if !request.quiet {
        write_stderr_line(stderr, format!("Bundle stored at {}", placed.archive_path));
    }
    Ok((bundle, placed))
}

fn publish_artifacts(
    context: &ReleaseContext<'_>,
    request: &ReleaseRequest,
    bundle: &BundleOutput,
    artifacts: &[Utf8PathBuf],
    stderr: &mut dyn Write,
) -> Result<Option<usize>> {
    if request.no_publish {
        if !request.quiet {
            write_stderr_line(stderr, "Skipping publish (--no-publish)");
        }
        return Ok(None);
    }
    let Some(index) = context.index else {
        return Err(ConfigError::MissingKey {
            key: "publish.index-url",
            purpose: "to publish artifacts",
        }
        .into());
    };

    let mut published = 0;
    for (file, path) in bundle.manifest.files.iter().zip(artifacts) {
        let body = std::fs::read(path).map_err(|source| PublishError::UnreadableArtifact {
            path: path.clone(),
            source,
        })?;
        let upload = ArtifactUpload {
            package: bundle.manifest.package.clone(),
            version: bundle.manifest.version.clone(),
            filename: file.name.clone(),
            body,
            sha256: file.sha256.clone(),
        };
        if !request.quiet {
            write_stderr_line(stderr, format!("Publishing {}", file.name));
        }
        index.publish(&upload)?;
        published += 1;
    }
    Ok(Some(published))
}
