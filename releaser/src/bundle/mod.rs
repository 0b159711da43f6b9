//! Bundle naming, metadata and archive packaging.
//!
//! A bundle is the unit the archive store holds for one release: a
//! zstd-compressed tar archive of the built artifacts plus an embedded
//! `bundle.json` metadata document, with the archive digest written to a
//! `.sha256` sidecar.
//!
//! # Sub-modules
//!
//! - [`manifest`]: metadata schema types (`BundleManifest`, `Sha256Digest`).
//! - [`naming`]: bundle archive naming policy (`BundleName`).
//! - [`packaging`]: archive creation and metadata emission.

pub mod manifest;
pub mod naming;
pub mod packaging;

pub use manifest::{
    BundleFile, BundleManifest, BundleMetadataError, GeneratedAt, SchemaVersion, Sha256Digest,
};
pub use naming::BundleName;
pub use packaging::{BundleOutput, BundleParams, PackagingError, compute_sha256, package_bundle};
