//! Release domain model shared by the slipway tools: version tags and
//! channels, package manifests, and changelogs.

pub mod changelog;
pub mod manifest;
pub mod tag;

pub use changelog::{Changelog, ChangelogEntry, ChangelogError};
pub use manifest::{ManifestError, PackageManifest, PackageName};
pub use tag::{PreRelease, PreReleaseMarker, ReleaseChannel, ReleaseTag, TagError, Version};
