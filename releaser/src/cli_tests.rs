//! Tests for slipway CLI parsing and default behaviours.

use super::*;
use rstest::rstest;

#[test]
fn cli_parses_release_defaults() {
    let cli = Cli::parse_from(["slipway", "release"]);
    assert!(cli.config.is_none());
    assert!(cli.root.is_none());
    match cli.command {
        Command::Release(args) => {
            assert!(args.tag.is_none());
            assert!(!args.prerelease);
            assert!(!args.dry_run);
            assert!(!args.no_publish);
            assert!(!args.quiet);
        }
        _ => panic!("expected Release command"),
    }
}

#[test]
fn cli_parses_an_explicit_tag() {
    let cli = Cli::parse_from(["slipway", "release", "--tag", "v1.4.2"]);
    match cli.command {
        Command::Release(args) => assert_eq!(args.tag.as_deref(), Some("v1.4.2")),
        _ => panic!("expected Release command"),
    }
}

/// Parameterised tests for boolean release flags.
#[rstest]
#[case::prerelease(&["slipway", "release", "--prerelease"], |args: &ReleaseArgs| args.prerelease)]
#[case::dry_run(&["slipway", "release", "--dry-run"], |args: &ReleaseArgs| args.dry_run)]
#[case::no_publish(&["slipway", "release", "--no-publish"], |args: &ReleaseArgs| args.no_publish)]
#[case::quiet_short(&["slipway", "release", "-q"], |args: &ReleaseArgs| args.quiet)]
#[case::quiet_long(&["slipway", "release", "--quiet"], |args: &ReleaseArgs| args.quiet)]
fn cli_parses_release_flags(#[case] argv: &[&str], #[case] check: fn(&ReleaseArgs) -> bool) {
    let cli = Cli::parse_from(argv);
    match cli.command {
        Command::Release(args) => assert!(check(&args)),
        _ => panic!("expected Release command"),
    }
}

#[rstest]
#[case::stable(false, ReleaseChannel::Stable)]
#[case::prerelease(true, ReleaseChannel::PreRelease)]
fn release_args_map_to_a_channel(#[case] prerelease: bool, #[case] expected: ReleaseChannel) {
    let args = ReleaseArgs {
        prerelease,
        ..ReleaseArgs::default()
    };
    assert_eq!(args.channel(), expected);
}

#[test]
fn cli_parses_check_defaults() {
    let cli = Cli::parse_from(["slipway", "check"]);
    match cli.command {
        Command::Check(args) => {
            assert!(!args.lint_only);
            assert!(!args.tests_only);
            assert!(!args.json);
            assert_eq!(args.selection(), CheckSelection::All);
        }
        _ => panic!("expected Check command"),
    }
}

#[rstest]
#[case::lint_only(&["slipway", "check", "--lint-only"], CheckSelection::LintOnly)]
#[case::tests_only(&["slipway", "check", "--tests-only"], CheckSelection::TestsOnly)]
#[case::all(&["slipway", "check"], CheckSelection::All)]
fn check_flags_map_to_a_selection(#[case] argv: &[&str], #[case] expected: CheckSelection) {
    let cli = Cli::parse_from(argv);
    match cli.command {
        Command::Check(args) => assert_eq!(args.selection(), expected),
        _ => panic!("expected Check command"),
    }
}

#[test]
fn cli_parses_check_with_json() {
    let cli = Cli::parse_from(["slipway", "check", "--json"]);
    match cli.command {
        Command::Check(args) => assert!(args.json),
        _ => panic!("expected Check command"),
    }
}

#[test]
fn cli_rejects_conflicting_check_selections() {
    Cli::try_parse_from(["slipway", "check", "--lint-only", "--tests-only"])
        .expect_err("expected clap to reject conflicting flags");
}

#[test]
fn cli_parses_validate_with_a_tag() {
    let cli = Cli::parse_from(["slipway", "validate", "v1.4.2b1", "--prerelease"]);
    match cli.command {
        Command::Validate(args) => {
            assert_eq!(args.tag, "v1.4.2b1");
            assert_eq!(args.channel(), ReleaseChannel::PreRelease);
        }
        _ => panic!("expected Validate command"),
    }
}

#[test]
fn validate_requires_a_tag() {
    Cli::try_parse_from(["slipway", "validate"]).expect_err("expected clap to require TAG");
}

#[test]
fn cli_parses_notes_with_a_tag() {
    let cli = Cli::parse_from(["slipway", "notes", "v1.4.2"]);
    match cli.command {
        Command::Notes(args) => assert_eq!(args.tag, "v1.4.2"),
        _ => panic!("expected Notes command"),
    }
}

#[test]
fn notes_requires_a_tag() {
    Cli::try_parse_from(["slipway", "notes"]).expect_err("expected clap to require TAG");
}

#[rstest]
#[case::before_subcommand(&["slipway", "--root", "/work/pkg", "check"])]
#[case::after_subcommand(&["slipway", "check", "--root", "/work/pkg"])]
fn global_root_is_accepted_anywhere(#[case] argv: &[&str]) {
    let cli = Cli::parse_from(argv);
    assert_eq!(cli.root, Some(Utf8PathBuf::from("/work/pkg")));
}

#[test]
fn global_config_is_accepted_after_a_subcommand() {
    let cli = Cli::parse_from(["slipway", "release", "--config", "/etc/slipway.toml"]);
    assert_eq!(cli.config, Some(Utf8PathBuf::from("/etc/slipway.toml")));
}

#[test]
fn release_args_default_is_valid() {
    let args = ReleaseArgs::default();
    assert!(args.tag.is_none());
    assert_eq!(args.channel(), ReleaseChannel::Stable);
    assert!(!args.no_publish);
}

#[test]
fn check_args_default_is_valid() {
    let args = CheckArgs::default();
    assert_eq!(args.selection(), CheckSelection::All);
    assert!(!args.json);
}
