//! Fetching pinned archives from prebuilt package caches.
//!
//! An archive is reused when a copy with the pinned digest is already in the
//! package directory. Otherwise it is downloaded next to its final location
//! as `<archive>.part`, hashed, and only renamed into place and unpacked
//! when the digest matches. A mismatching download is deleted and never
//! reaches the target tree.

use crate::archive::digest::compute_sha256_64;
use crate::archive::download::ArchiveDownloader;
use crate::archive::extraction::ArchiveExtractor;
use crate::error::{InstallerError, Result};
use crate::manifest::{CachedPackage, PackageCache};
use crate::output::write_stderr_line;
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;

/// Where a cache fetch keeps archives and unpacks them.
#[derive(Debug, Clone, Copy)]
pub struct CacheFetchConfig<'a> {
    /// Directory the archive contents are merged into.
    pub target_dir: &'a Utf8Path,
    /// Directory holding downloaded archives.
    pub package_dir: &'a Utf8Path,
    /// When true, suppress progress output.
    pub quiet: bool,
}

/// How the archive for a fetch was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A valid archive was already present; nothing was downloaded.
    Reused {
        /// The verified archive.
        archive: Utf8PathBuf,
    },
    /// The archive was downloaded and verified.
    Downloaded {
        /// The verified archive.
        archive: Utf8PathBuf,
    },
}

impl FetchOutcome {
    /// Path of the verified archive.
    #[must_use]
    pub fn archive(&self) -> &Utf8Path {
        match self {
            Self::Reused { archive } | Self::Downloaded { archive } => archive,
        }
    }
}

/// Fetch `package` from `cache`, verify it, and unpack it into the target.
///
/// # Errors
///
/// Returns [`InstallerError::Integrity`] if the downloaded archive does not
/// match its pinned digest, and download, extraction, or I/O errors
/// otherwise.
pub fn fetch_cached_package(
    cache: &PackageCache,
    package: &CachedPackage,
    config: &CacheFetchConfig<'_>,
    downloader: &dyn ArchiveDownloader,
    extractor: &dyn ArchiveExtractor,
    stderr: &mut dyn Write,
) -> Result<FetchOutcome> {
    let archive = config.package_dir.join(package.archive_name());
    if !config.quiet {
        write_stderr_line(
            stderr,
            format!("Downloading package {} {}", package.name, package.version),
        );
    }

    let outcome = if has_pinned_digest(&archive, package) {
        tracing::debug!("reusing verified archive {archive}");
        if !config.quiet {
            write_stderr_line(stderr, format!("  Package already downloaded: {archive}"));
        }
        FetchOutcome::Reused { archive }
    } else {
        let url = cache.archive_url(package);
        if !config.quiet {
            write_stderr_line(stderr, format!("  Downloading from: {url}"));
        }
        download_verified(&url, &archive, package, config.package_dir, downloader)?;
        FetchOutcome::Downloaded { archive }
    };

    if !config.quiet {
        write_stderr_line(stderr, format!("  Unpacking to: {}", config.target_dir));
    }
    std::fs::create_dir_all(config.target_dir)?;
    let files = extractor.extract(outcome.archive(), config.target_dir)?;
    tracing::debug!("unpacked {} files from {}", files.len(), outcome.archive());
    Ok(outcome)
}

fn has_pinned_digest(archive: &Utf8Path, package: &CachedPackage) -> bool {
    archive.is_file()
        && compute_sha256_64(archive).is_ok_and(|digest| digest == package.digest)
}

fn download_verified(
    url: &str,
    archive: &Utf8Path,
    package: &CachedPackage,
    package_dir: &Utf8Path,
    downloader: &dyn ArchiveDownloader,
) -> Result<()> {
    std::fs::create_dir_all(package_dir)?;
    let partial = Utf8PathBuf::from(format!("{archive}.part"));
    if let Err(err) = downloader.download(url, &partial) {
        remove_partial(&partial);
        return Err(err.into());
    }

    let actual = compute_sha256_64(&partial)?;
    if actual != package.digest {
        remove_partial(&partial);
        return Err(InstallerError::Integrity {
            package: package.name.clone(),
            path: archive.to_owned(),
            expected: package.digest.to_string(),
            actual: actual.to_string(),
        });
    }
    std::fs::rename(&partial, archive)?;
    Ok(())
}

fn remove_partial(partial: &Utf8Path) {
    if partial.exists() && std::fs::remove_file(partial).is_err() {
        tracing::warn!("could not remove partial download {partial}");
    }
}
