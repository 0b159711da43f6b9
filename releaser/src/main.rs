//! Slipway CLI entrypoint.
//!
//! This binary releases tagged packages: it validates the tag, sets the
//! manifest version, builds, bundles into the local archive store, and
//! publishes to the package index. It also runs the configured lint and test
//! commands and answers tag and changelog queries.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;

use slipway_common::tag::ReleaseTag;
use slipway_releaser::checks::run_checks;
use slipway_releaser::cli::{CheckArgs, Cli, Command, NotesArgs, ReleaseArgs, ValidateArgs};
use slipway_releaser::config::Config;
use slipway_releaser::error::{ReleaseError, Result};
use slipway_releaser::git;
use slipway_releaser::output::write_stderr_line;
use slipway_releaser::publish::{HttpPackageIndex, PackageIndex, resolve_token};
use slipway_releaser::release::{ReleaseContext, ReleaseRequest, load_changelog, run_release};
use slipway_releaser::runner::SystemRunner;
use slipway_releaser::store::{ArchiveStore, SystemBaseDirs};

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<i32> {
    let root = resolve_root(cli)?;
    let config = load_config(cli, &root)?;

    match &cli.command {
        Command::Release(args) => run_release_command(args, &config, &root, stderr),
        Command::Check(args) => run_check_command(args, &config, &root, stdout, stderr),
        Command::Validate(args) => run_validate_command(args, stderr),
        Command::Notes(args) => run_notes_command(args, &config, &root, stdout),
    }
}

/// Determines the project root from the CLI or the current directory.
fn resolve_root(cli: &Cli) -> Result<Utf8PathBuf> {
    if let Some(root) = &cli.root {
        return Ok(root.clone());
    }
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::from_path_buf(cwd).map_err(|path| ReleaseError::NonUtf8Path {
        path: path.display().to_string(),
    })
}

/// Loads the explicit configuration file, or the one at the project root.
fn load_config(cli: &Cli, root: &Utf8Path) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(root)?,
    };
    Ok(config)
}

/// Runs the release pipeline for the requested tag.
fn run_release_command(
    args: &ReleaseArgs,
    config: &Config,
    root: &Utf8Path,
    stderr: &mut dyn Write,
) -> Result<i32> {
    let runner = SystemRunner;
    let tag_text = match &args.tag {
        Some(tag) => tag.clone(),
        None => git::tag_at_head(&runner, root)?,
    };
    let tag = ReleaseTag::parse(&tag_text)?;
    let store = ArchiveStore::resolve(config.store.dir.as_deref(), &SystemBaseDirs)?;
    let index = build_index(args, config)?;

    let context = ReleaseContext {
        config,
        root,
        runner: &runner,
        index: index.as_ref().map(|http| http as &dyn PackageIndex),
        store: &store,
    };
    let request = ReleaseRequest {
        tag,
        channel: args.channel(),
        dry_run: args.dry_run,
        no_publish: args.no_publish,
        quiet: args.quiet,
    };
    run_release(&context, &request, stderr)?;
    Ok(0)
}

/// Builds the index client when the run will reach the publish step.
///
/// Resolving the URL and token up front means a misconfigured run aborts
/// before it modifies anything.
fn build_index(args: &ReleaseArgs, config: &Config) -> Result<Option<HttpPackageIndex>> {
    if args.dry_run || args.no_publish {
        return Ok(None);
    }
    let url = config.index_url()?;
    let token = resolve_token(&config.publish.token_env)?;
    Ok(Some(HttpPackageIndex::new(url, token)))
}

/// Runs the configured checks and prints the report to stdout.
fn run_check_command(
    args: &CheckArgs,
    config: &Config,
    root: &Utf8Path,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32> {
    let runner = SystemRunner;
    let report = run_checks(config, &runner, args.selection(), root, args.quiet, stderr)?;
    let rendered = if args.json {
        report.format_json()?
    } else {
        report.format_human()
    };
    writeln!(stdout, "{rendered}")?;
    Ok(if report.passed() { 0 } else { 1 })
}

/// Parses a tag and confirms it matches the requested channel.
fn run_validate_command(args: &ValidateArgs, stderr: &mut dyn Write) -> Result<i32> {
    let tag = ReleaseTag::parse(&args.tag)?;
    tag.expect_channel(args.channel())?;
    write_stderr_line(
        stderr,
        format!("{} is a valid {} tag", args.tag, tag.channel()),
    );
    Ok(0)
}

/// Prints the changelog entry for a tag to stdout.
fn run_notes_command(
    args: &NotesArgs,
    config: &Config,
    root: &Utf8Path,
    stdout: &mut dyn Write,
) -> Result<i32> {
    let tag = ReleaseTag::parse(&args.tag)?;
    let path = root.join(&config.package.changelog);
    let changelog = load_changelog(&path)?.ok_or(ReleaseError::ChangelogNotFound { path })?;
    let notes = changelog
        .release_notes(&tag)
        .ok_or_else(|| ReleaseError::MissingChangelogEntry {
            version: tag.version_string().to_owned(),
        })?;
    writeln!(stdout, "{notes}")?;
    Ok(0)
}

fn exit_code_for_run_result(result: Result<i32>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(error) => {
            write_stderr_line(stderr, error);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 path");
        (temp, root)
    }

    fn run_argv(argv: &[&str]) -> (Result<i32>, String, String) {
        let cli = Cli::parse_from(argv);
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let result = run(&cli, &mut stdout, &mut stderr);
        (
            result,
            String::from_utf8(stdout).expect("stdout was not UTF-8"),
            String::from_utf8(stderr).expect("stderr was not UTF-8"),
        )
    }

    #[test]
    fn exit_code_for_run_result_passes_the_code_through() {
        let mut stderr = Vec::new();
        assert_eq!(exit_code_for_run_result(Ok(0), &mut stderr), 0);
        assert_eq!(exit_code_for_run_result(Ok(1), &mut stderr), 1);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = ReleaseError::BuildFailed {
            reason: "wheel build exploded".to_owned(),
        };

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("wheel build exploded"));
    }

    #[test]
    fn resolve_root_prefers_the_flag() {
        let cli = Cli::parse_from(["slipway", "--root", "/work/pkg", "check"]);
        let root = resolve_root(&cli).expect("root resolves");
        assert_eq!(root, "/work/pkg");
    }

    #[test]
    fn an_explicit_config_path_must_exist() {
        let (_temp, root) = temp_root();
        let (result, _, _) = run_argv(&[
            "slipway",
            "--root",
            root.as_str(),
            "--config",
            "/nonexistent/slipway.toml",
            "check",
        ]);
        let error = result.expect_err("missing config");
        assert!(error.to_string().contains("/nonexistent/slipway.toml"));
    }

    #[rstest]
    #[case::stable(&["slipway", "validate", "v1.4.2"], "stable")]
    #[case::prerelease(&["slipway", "validate", "v1.4.2b1", "--prerelease"], "prerelease")]
    fn validate_confirms_matching_tags(#[case] argv: &[&str], #[case] channel: &str) {
        let (result, _, stderr) = run_argv(argv);
        assert_eq!(result.expect("tag validates"), 0);
        assert!(stderr.contains(&format!("is a valid {channel} tag")));
    }

    #[rstest]
    #[case::unexpected_marker(&["slipway", "validate", "v1.4.2b1"])]
    #[case::missing_marker(&["slipway", "validate", "v1.4.2", "--prerelease"])]
    #[case::malformed(&["slipway", "validate", "v1.4"])]
    fn validate_rejects_mismatched_tags(#[case] argv: &[&str]) {
        let (result, _, _) = run_argv(argv);
        assert!(matches!(result, Err(ReleaseError::Tag(_))));
    }

    #[test]
    fn notes_prints_the_entry_for_a_tag() {
        let (_temp, root) = temp_root();
        std::fs::write(
            root.join("CHANGELOG.md"),
            "## [1.4.2] - 2024-06-01\n- Fixed rounding in totals.\n",
        )
        .expect("write changelog");

        let (result, stdout, _) =
            run_argv(&["slipway", "--root", root.as_str(), "notes", "v1.4.2"]);
        assert_eq!(result.expect("notes print"), 0);
        assert_eq!(stdout, "- Fixed rounding in totals.\n");
    }

    #[test]
    fn notes_for_an_unknown_version_is_an_error() {
        let (_temp, root) = temp_root();
        std::fs::write(root.join("CHANGELOG.md"), "## [1.4.2]\n- notes\n")
            .expect("write changelog");

        let (result, _, _) = run_argv(&["slipway", "--root", root.as_str(), "notes", "v9.9.9"]);
        assert!(matches!(
            result,
            Err(ReleaseError::MissingChangelogEntry { version }) if version == "9.9.9"
        ));
    }

    #[test]
    fn notes_without_a_changelog_is_an_error() {
        let (_temp, root) = temp_root();
        let (result, _, _) = run_argv(&["slipway", "--root", root.as_str(), "notes", "v1.4.2"]);
        assert!(matches!(result, Err(ReleaseError::ChangelogNotFound { .. })));
    }

    #[test]
    fn check_without_configured_commands_is_an_error() {
        let (_temp, root) = temp_root();
        let (result, _, _) = run_argv(&["slipway", "--root", root.as_str(), "check"]);
        let error = result.expect_err("nothing configured");
        assert!(error.to_string().contains("no lint or test commands"));
    }
}
