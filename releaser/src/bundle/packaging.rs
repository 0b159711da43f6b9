//! Bundle archive creation and metadata emission.
//!
//! Packaging writes three things into the output directory: the
//! `bundle.json` metadata document, the `.tar.zst` archive holding the
//! document plus every artifact, and a `.sha256` sidecar carrying the digest
//! of the archive bytes. Keeping the archive digest outside the archive
//! avoids a self-referential second packaging pass.

use std::fs;
use std::io::{Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use thiserror::Error;

use slipway_common::manifest::PackageName;
use slipway_common::tag::{ReleaseChannel, ReleaseTag};

use super::manifest::{BUNDLE_MANIFEST_FILENAME, BundleFile, BundleManifest, Sha256Digest};
use super::naming::BundleName;

/// zstd compression level; 0 selects the library default.
const ZSTD_LEVEL: i32 = 0;

/// Errors raised while creating a bundle.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// No artifacts were provided.
    #[error("cannot create an empty bundle")]
    EmptyFileList,

    /// An artifact path had no file name component.
    #[error("artifact path `{path}` has no file name")]
    UnnamedArtifact {
        /// Path that could not be named.
        path: Utf8PathBuf,
    },

    /// Two artifacts would collide inside the archive.
    #[error("duplicate artifact name `{name}` in the bundle")]
    DuplicateArtifact {
        /// Name that appeared twice.
        name: String,
    },

    /// Metadata could not be serialised.
    #[error("failed to encode bundle metadata: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O operation failed.
    #[error("I/O error while packaging: {0}")]
    Io(#[from] std::io::Error),
}

/// Inputs to bundle creation.
#[derive(Debug)]
pub struct BundleParams<'a> {
    /// Package the bundle belongs to.
    pub package: &'a PackageName,
    /// Tag being released.
    pub tag: &'a ReleaseTag,
    /// Channel the release targets.
    pub channel: ReleaseChannel,
    /// Commit the release was cut from, when known.
    pub git_sha: Option<String>,
    /// Artifact files to include, in archive order.
    pub artifacts: &'a [Utf8PathBuf],
    /// Directory the archive and sidecar are written into.
    pub output_dir: &'a Utf8Path,
}

/// A created bundle.
#[derive(Debug)]
pub struct BundleOutput {
    /// Archive path.
    pub archive_path: Utf8PathBuf,
    /// Sidecar digest file path.
    pub sidecar_path: Utf8PathBuf,
    /// Digest of the archive bytes.
    pub archive_sha256: Sha256Digest,
    /// Metadata embedded in the archive.
    pub manifest: BundleManifest,
}

/// Create the archive, its embedded metadata and the digest sidecar.
///
/// # Errors
///
/// Returns an error when the artifact list is empty or collides, metadata
/// cannot be encoded, or an I/O operation fails.
pub fn package_bundle(params: &BundleParams<'_>) -> Result<BundleOutput, PackagingError> {
    if params.artifacts.is_empty() {
        return Err(PackagingError::EmptyFileList);
    }

    let mut files = Vec::with_capacity(params.artifacts.len());
    for path in params.artifacts {
        let name = path
            .file_name()
            .ok_or_else(|| PackagingError::UnnamedArtifact { path: path.clone() })?;
        if files.iter().any(|file: &BundleFile| file.name == name) {
            return Err(PackagingError::DuplicateArtifact {
                name: name.to_owned(),
            });
        }
        files.push(BundleFile {
            name: name.to_owned(),
            sha256: compute_sha256(path)?,
        });
    }

    let manifest = BundleManifest::new(
        params.package,
        params.tag,
        params.channel,
        params.git_sha.clone(),
        files,
    );
    let name = BundleName::new(params.package.clone(), params.tag.version_string());

    fs::create_dir_all(params.output_dir)?;
    let manifest_path = params.output_dir.join(BUNDLE_MANIFEST_FILENAME);
    fs::write(&manifest_path, manifest.to_json()?)?;

    let mut entries = vec![(manifest_path, BUNDLE_MANIFEST_FILENAME.to_owned())];
    for (path, file) in params.artifacts.iter().zip(&manifest.files) {
        entries.push((path.clone(), file.name.clone()));
    }

    let archive_path = params.output_dir.join(name.filename());
    create_archive(&archive_path, &entries)?;

    let archive_sha256 = compute_sha256(&archive_path)?;
    let sidecar_path = params.output_dir.join(name.sidecar_filename());
    write_sidecar(&sidecar_path, &archive_sha256, &name.filename())?;

    log::trace!("packaged {} ({} files)", archive_path, manifest.files.len());
    Ok(BundleOutput {
        archive_path,
        sidecar_path,
        archive_sha256,
        manifest,
    })
}

/// Compute the SHA-256 digest of a file, reading in 8 KiB chunks.
///
/// # Errors
///
/// Returns [`PackagingError::Io`] when the file cannot be read.
pub fn compute_sha256(path: &Utf8Path) -> Result<Sha256Digest, PackagingError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(Sha256Digest::from_bytes(&hasher.finalize()))
}

/// Create a `.tar.zst` archive at `output_path`.
///
/// Each entry is a `(source_path, archive_name)` pair; the archive name
/// determines the filename inside the tar archive.
fn create_archive(
    output_path: &Utf8Path,
    entries: &[(Utf8PathBuf, String)],
) -> Result<(), PackagingError> {
    let output_file = fs::File::create(output_path)?;
    let zstd_encoder = zstd::Encoder::new(output_file, ZSTD_LEVEL)?.auto_finish();
    let mut archive = tar::Builder::new(zstd_encoder);

    for (source_path, archive_name) in entries {
        archive.append_path_with_name(source_path, archive_name)?;
    }

    archive.finish()?;
    Ok(())
}

/// Write `<digest>  <filename>` in `sha256sum` check format.
fn write_sidecar(
    path: &Utf8Path,
    digest: &Sha256Digest,
    filename: &str,
) -> Result<(), PackagingError> {
    let mut file = fs::File::create(path)?;
    writeln!(file, "{digest}  {filename}")?;
    Ok(())
}
