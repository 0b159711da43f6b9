//! Local archive store.
//!
//! Bundles land in a per-package directory under the store root, next to a
//! `history.json` document recording every release run. The default root
//! lives in the platform data directory; `[store] dir` overrides it.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use slipway_common::manifest::PackageName;
use slipway_common::tag::ReleaseChannel;

use crate::bundle::{BundleName, BundleOutput};

/// History file name within a package directory.
const HISTORY_FILENAME: &str = "history.json";

/// Probe file used to verify the store is writable.
const PROBE_FILENAME: &str = ".slipway-write-test";

/// Source of platform base directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Per-user local data directory, when the platform provides one.
    fn data_dir(&self) -> Option<Utf8PathBuf>;
}

/// Base directories resolved from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn data_dir(&self) -> Option<Utf8PathBuf> {
        directories_next::BaseDirs::new()
            .map(|dirs| dirs.data_local_dir().to_path_buf())
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
    }
}

/// Errors raised by the archive store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No store root was configured and the platform offers no data dir.
    #[error("could not determine a store directory; set [store] dir in slipway.toml")]
    NoStoreDir,

    /// The store directory could not be written to.
    #[error("store directory {path} is not writable: {source}")]
    NotWritable {
        /// Directory that failed the probe.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// History encoding failed.
    #[error("failed to encode release history: {0}")]
    History(#[from] serde_json::Error),
}

/// Release counters kept per package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseHistory {
    total_releases: u64,
    stable_releases: u64,
    prerelease_releases: u64,
    last_version: Option<String>,
    last_released_at: Option<String>,
}

impl ReleaseHistory {
    /// Number of recorded release runs.
    #[must_use]
    pub fn total_releases(&self) -> u64 {
        self.total_releases
    }

    /// Runs that released the stable channel.
    #[must_use]
    pub fn stable_releases(&self) -> u64 {
        self.stable_releases
    }

    /// Runs that released the pre-release channel.
    #[must_use]
    pub fn prerelease_releases(&self) -> u64 {
        self.prerelease_releases
    }

    /// Version of the most recent run.
    #[must_use]
    pub fn last_version(&self) -> Option<&str> {
        self.last_version.as_deref()
    }

    /// Timestamp of the most recent run.
    #[must_use]
    pub fn last_released_at(&self) -> Option<&str> {
        self.last_released_at.as_deref()
    }

    /// Record one release run.
    pub fn record(&mut self, version: &str, channel: ReleaseChannel, released_at: &str) {
        self.total_releases = self.total_releases.saturating_add(1);
        match channel {
            ReleaseChannel::Stable => {
                self.stable_releases = self.stable_releases.saturating_add(1);
            }
            ReleaseChannel::PreRelease => {
                self.prerelease_releases = self.prerelease_releases.saturating_add(1);
            }
        }
        self.last_version = Some(version.to_owned());
        self.last_released_at = Some(released_at.to_owned());
    }

    /// Human-readable history summary line.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "{} release run(s) recorded ({} stable, {} pre-release)",
            self.total_releases, self.stable_releases, self.prerelease_releases
        )
    }
}

/// Outcome details returned after recording a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    history: ReleaseHistory,
    recovered_from_corrupt_file: bool,
}

impl RecordOutcome {
    /// Counters after the update.
    #[must_use]
    pub fn history(&self) -> &ReleaseHistory {
        &self.history
    }

    /// Whether a malformed history file was reset to defaults.
    #[must_use]
    pub fn recovered_from_corrupt_file(&self) -> bool {
        self.recovered_from_corrupt_file
    }
}

/// Paths a bundle occupies once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedBundle {
    /// Final archive path.
    pub archive_path: Utf8PathBuf,
    /// Final sidecar path.
    pub sidecar_path: Utf8PathBuf,
}

/// Archive store rooted at a directory.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: Utf8PathBuf,
}

impl ArchiveStore {
    /// Store at an explicit root.
    #[must_use]
    pub const fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    /// Store at the configured root, or the platform default.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoStoreDir`] when nothing is configured and the
    /// platform provides no data directory.
    pub fn resolve(configured: Option<&Utf8Path>, dirs: &dyn BaseDirs) -> Result<Self, StoreError> {
        if let Some(dir) = configured {
            return Ok(Self::new(dir.to_path_buf()));
        }
        let data_dir = dirs.data_dir().ok_or(StoreError::NoStoreDir)?;
        Ok(Self::new(data_dir.join("slipway").join("bundles")))
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory bundles for a package land in.
    #[must_use]
    pub fn package_dir(&self, package: &PackageName) -> Utf8PathBuf {
        self.root.join(package.as_str())
    }

    /// Ensure the package directory exists and is writable.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created or written.
    pub fn prepare(&self, package: &PackageName) -> Result<Utf8PathBuf, StoreError> {
        let dir = self.package_dir(package);
        std::fs::create_dir_all(&dir)?;

        // Verify writability by attempting to create a probe file.
        let probe = dir.join(PROBE_FILENAME);
        match std::fs::write(&probe, b"test") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                Ok(dir)
            }
            Err(source) => Err(StoreError::NotWritable { path: dir, source }),
        }
    }

    /// Copy a bundle and its sidecar into the package directory.
    ///
    /// Re-releasing a version overwrites the files already stored for it.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is not writable or the copy fails.
    pub fn place(
        &self,
        package: &PackageName,
        bundle: &BundleOutput,
    ) -> Result<PlacedBundle, StoreError> {
        let dir = self.prepare(package)?;
        let name = BundleName::new(package.clone(), bundle.manifest.version.clone());
        let archive_path = dir.join(name.filename());
        let sidecar_path = dir.join(name.sidecar_filename());
        std::fs::copy(&bundle.archive_path, &archive_path)?;
        std::fs::copy(&bundle.sidecar_path, &sidecar_path)?;
        log::trace!("stored bundle at {archive_path}");
        Ok(PlacedBundle {
            archive_path,
            sidecar_path,
        })
    }

    /// Append a run to the package history, resetting a corrupt file.
    ///
    /// # Errors
    ///
    /// Returns an error when the history cannot be encoded or written.
    pub fn record_release(
        &self,
        package: &PackageName,
        version: &str,
        channel: ReleaseChannel,
        released_at: &str,
    ) -> Result<RecordOutcome, StoreError> {
        let dir = self.prepare(package)?;
        let path = dir.join(HISTORY_FILENAME);
        let (mut history, recovered_from_corrupt_file) = load_history(&path);
        history.record(version, channel, released_at);
        let mut json = serde_json::to_string_pretty(&history)?;
        json.push('\n');
        std::fs::write(&path, json)?;
        Ok(RecordOutcome {
            history,
            recovered_from_corrupt_file,
        })
    }
}

fn load_history(path: &Utf8Path) -> (ReleaseHistory, bool) {
    if !path.exists() {
        return (ReleaseHistory::default(), false);
    }
    let Ok(text) = std::fs::read_to_string(path) else {
        return (ReleaseHistory::default(), false);
    };
    match serde_json::from_str(&text) {
        Ok(history) => (history, false),
        Err(error) => {
            log::trace!("resetting corrupt history at {path}: {error}");
            (ReleaseHistory::default(), true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8(temp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 path")
    }

    fn package() -> PackageName {
        PackageName::try_from("acme-models").expect("valid name")
    }

    #[test]
    fn configured_roots_win_over_platform_dirs() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_data_dir().never();
        let configured = Utf8PathBuf::from("/var/lib/slipway");
        let store = ArchiveStore::resolve(Some(&configured), &dirs).expect("store");
        assert_eq!(store.root(), "/var/lib/slipway");
    }

    #[test]
    fn the_default_root_extends_the_data_dir() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_data_dir()
            .return_once(|| Some(Utf8PathBuf::from("/home/dev/.local/share")));
        let store = ArchiveStore::resolve(None, &dirs).expect("store");
        assert_eq!(store.root(), "/home/dev/.local/share/slipway/bundles");
    }

    #[test]
    fn a_platform_without_data_dirs_is_an_error() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_data_dir().return_once(|| None);
        assert!(matches!(
            ArchiveStore::resolve(None, &dirs),
            Err(StoreError::NoStoreDir)
        ));
    }

    #[test]
    fn prepare_creates_the_package_directory() {
        let temp = tempfile::tempdir().expect("temp dir");
        let store = ArchiveStore::new(utf8(&temp).join("store"));
        let dir = store.prepare(&package()).expect("prepare");
        assert!(dir.is_dir());
        assert!(dir.as_str().ends_with("acme-models"));
        assert!(!dir.join(PROBE_FILENAME).exists());
    }

    #[test]
    fn recording_accumulates_per_channel_counters() {
        let temp = tempfile::tempdir().expect("temp dir");
        let store = ArchiveStore::new(utf8(&temp));
        let when = "2024-05-20T10:00:00Z";

        store
            .record_release(&package(), "1.4.1", ReleaseChannel::Stable, when)
            .expect("record");
        store
            .record_release(&package(), "1.4.2-rc.1", ReleaseChannel::PreRelease, when)
            .expect("record");
        let outcome = store
            .record_release(&package(), "1.4.2", ReleaseChannel::Stable, when)
            .expect("record");

        let history = outcome.history();
        assert_eq!(history.total_releases(), 3);
        assert_eq!(history.stable_releases(), 2);
        assert_eq!(history.prerelease_releases(), 1);
        assert_eq!(history.last_version(), Some("1.4.2"));
        assert_eq!(history.last_released_at(), Some(when));
        assert!(!outcome.recovered_from_corrupt_file());
    }

    #[test]
    fn corrupt_history_files_are_reset() {
        let temp = tempfile::tempdir().expect("temp dir");
        let store = ArchiveStore::new(utf8(&temp));
        let dir = store.prepare(&package()).expect("prepare");
        std::fs::write(dir.join(HISTORY_FILENAME), "not json").expect("write corruption");

        let outcome = store
            .record_release(&package(), "1.4.2", ReleaseChannel::Stable, "2024-05-20T10:00:00Z")
            .expect("record");
        assert!(outcome.recovered_from_corrupt_file());
        assert_eq!(outcome.history().total_releases(), 1);
    }

    #[test]
    fn summary_lines_report_the_counters() {
        let mut history = ReleaseHistory::default();
        history.record("1.4.2", ReleaseChannel::Stable, "2024-05-20T10:00:00Z");
        assert_eq!(
            history.summary_line(),
            "1 release run(s) recorded (1 stable, 0 pre-release)"
        );
    }
}
