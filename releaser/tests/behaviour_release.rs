//! Behaviour-driven coverage for the release pipeline against a real
//! temporary project, shell build commands and archive store.

mod support;

use std::cell::RefCell;
use std::fmt::Write as _;

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use slipway_common::tag::{ReleaseChannel, ReleaseTag, TagError};
use slipway_releaser::bundle::compute_sha256;
use slipway_releaser::config::Config;
use slipway_releaser::error::ReleaseError;
use slipway_releaser::release::{ReleaseContext, ReleaseOutcome, ReleaseRequest, run_release};
use slipway_releaser::runner::SystemRunner;
use slipway_releaser::store::ArchiveStore;

use support::{sh, temp_root};

struct ReleaseWorld {
    _temp: TempDir,
    root: Utf8PathBuf,
    config: RefCell<Config>,
    changelog: RefCell<String>,
    outcome: RefCell<Option<Result<ReleaseOutcome, ReleaseError>>>,
}

impl ReleaseWorld {
    fn new() -> Self {
        let (temp, root) = temp_root();
        Self {
            _temp: temp,
            root,
            config: RefCell::new(Config::default()),
            changelog: RefCell::new(String::new()),
            outcome: RefCell::new(None),
        }
    }

    fn store_root(&self) -> Utf8PathBuf {
        self.root.join("store")
    }

    fn release(&self, tag: &str, channel: ReleaseChannel, dry_run: bool) {
        let tag = ReleaseTag::parse(tag)
            .unwrap_or_else(|error| panic!("`{tag}` should parse: {error}"));
        let config = self.config.borrow();
        let runner = SystemRunner;
        let store = ArchiveStore::new(self.store_root());
        let context = ReleaseContext {
            config: &config,
            root: &self.root,
            runner: &runner,
            index: None,
            store: &store,
        };
        let request = ReleaseRequest {
            tag,
            channel,
            dry_run,
            no_publish: true,
            quiet: true,
        };
        let mut sink = Vec::new();
        let outcome = run_release(&context, &request, &mut sink);
        self.outcome.replace(Some(outcome));
    }

    fn manifest_text(&self) -> String {
        std::fs::read_to_string(self.root.join("package.toml")).expect("manifest is readable")
    }

    fn bundle_path(&self) -> Utf8PathBuf {
        match self.outcome.borrow().as_ref() {
            Some(Ok(outcome)) => outcome
                .bundle_path
                .clone()
                .unwrap_or_else(|| panic!("the release should have stored a bundle")),
            Some(Err(error)) => panic!("the release should succeed: {error}"),
            None => panic!("a release must run first"),
        }
    }

    fn assert_succeeded(&self) {
        match self.outcome.borrow().as_ref() {
            Some(Ok(_)) => {}
            Some(Err(error)) => panic!("the release should succeed: {error}"),
            None => panic!("a release must run first"),
        }
    }
}

fn parse_channel(text: &str) -> ReleaseChannel {
    match text {
        "stable" => ReleaseChannel::Stable,
        "prerelease" => ReleaseChannel::PreRelease,
        other => panic!("unknown channel `{other}`"),
    }
}

#[fixture]
fn world() -> ReleaseWorld {
    ReleaseWorld::new()
}

#[given("a project whose manifest records version \"{version}\"")]
fn given_manifest(world: &ReleaseWorld, version: String) {
    let manifest = format!(
        "[package]\nname = \"acme-models\"\nversion = \"{version}\"\n\n[dependencies]\nserde = \">=1.0\"\n"
    );
    std::fs::write(world.root.join("package.toml"), manifest).expect("manifest is writable");
}

#[given("a changelog entry for \"{version}\"")]
fn given_changelog_entry(world: &ReleaseWorld, version: String) {
    let mut document = world.changelog.borrow_mut();
    writeln!(document, "## [{version}] - 2024-06-01\n- notes for {version}\n")
        .unwrap_or_else(|error| panic!("writing to a String cannot fail: {error}"));
    std::fs::write(world.root.join("CHANGELOG.md"), document.as_str())
        .expect("changelog is writable");
}

#[given("a build command that stages \"{filename}\"")]
fn given_build_command(world: &ReleaseWorld, filename: String) {
    let script = format!("mkdir -p dist && printf wheel > dist/{filename}");
    world.config.borrow_mut().build.command = sh(&script);
}

#[when("tag \"{tag}\" is released to the \"{channel}\" channel")]
fn when_released(world: &ReleaseWorld, tag: String, channel: String) {
    world.release(&tag, parse_channel(&channel), false);
}

#[when("the release of tag \"{tag}\" is previewed")]
fn when_previewed(world: &ReleaseWorld, tag: String) {
    world.release(&tag, ReleaseChannel::Stable, true);
}

#[then("the release succeeds")]
fn then_succeeds(world: &ReleaseWorld) {
    world.assert_succeeded();
}

#[then("the release is rejected for an unexpected pre-release marker")]
fn then_rejected_marker(world: &ReleaseWorld) {
    let outcome = world.outcome.borrow();
    match outcome.as_ref() {
        Some(Err(ReleaseError::Tag(TagError::UnexpectedPreReleaseMarker { .. }))) => {}
        other => panic!("expected an unexpected-marker rejection, got {other:?}"),
    }
}

#[then("the release is rejected for a missing changelog entry")]
fn then_rejected_changelog(world: &ReleaseWorld) {
    let outcome = world.outcome.borrow();
    match outcome.as_ref() {
        Some(Err(ReleaseError::MissingChangelogEntry { .. })) => {}
        other => panic!("expected a missing-entry rejection, got {other:?}"),
    }
}

#[then("the manifest records version \"{version}\"")]
fn then_manifest_version(world: &ReleaseWorld, version: String) {
    let expected = format!("version = \"{version}\"");
    let manifest = world.manifest_text();
    assert!(
        manifest.contains(&expected),
        "manifest should contain `{expected}`:\n{manifest}"
    );
}

#[then("the store holds \"{filename}\"")]
fn then_store_holds(world: &ReleaseWorld, filename: String) {
    let stored = world.store_root().join("acme-models").join(&filename);
    assert!(stored.is_file(), "expected {stored} to exist");
    let sidecar = world
        .store_root()
        .join("acme-models")
        .join(format!("{filename}.sha256"));
    assert!(sidecar.is_file(), "expected {sidecar} to exist");
}

#[then("the stored digest matches the bundle")]
fn then_digest_matches(world: &ReleaseWorld) {
    let bundle_path = world.bundle_path();
    let sidecar_path = Utf8PathBuf::from(format!("{bundle_path}.sha256"));
    let sidecar = std::fs::read_to_string(&sidecar_path).expect("sidecar is readable");

    let mut parts = sidecar.split_whitespace();
    let recorded = parts.next().expect("sidecar records a digest");
    let named = parts.next().expect("sidecar records a filename");

    let computed = compute_sha256(&bundle_path).expect("bundle is hashable");
    assert_eq!(recorded, computed.as_str());
    assert_eq!(Some(named), bundle_path.file_name());
}

#[then("the store is empty")]
fn then_store_empty(world: &ReleaseWorld) {
    assert!(
        !world.store_root().exists(),
        "expected no store directory at {}",
        world.store_root()
    );
}

#[scenario(
    path = "tests/features/release.feature",
    name = "A stable tag is released end to end"
)]
fn scenario_stable_release(world: ReleaseWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/release.feature",
    name = "A pre-release tag is released without a changelog"
)]
fn scenario_prerelease_release(world: ReleaseWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/release.feature",
    name = "A marked tag cannot be released as stable"
)]
fn scenario_marked_tag_rejected(world: ReleaseWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/release.feature",
    name = "A stable release needs a changelog entry"
)]
fn scenario_changelog_gate(world: ReleaseWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/release.feature",
    name = "A dry run leaves the project untouched"
)]
fn scenario_dry_run(world: ReleaseWorld) {
    let _ = world;
}
