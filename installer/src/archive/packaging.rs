//! Archive creation for publishing built dependencies to a package cache.
//!
//! Archives are reproducible: entries are written in sorted path order with
//! a fixed timestamp, so rebuilding identical files yields an identical
//! digest.

use super::digest::{TruncatedDigest, compute_sha256_64};
use super::packaging_error::PackagingError;
use crate::stager::{slash_path, walk_files};
use camino::Utf8Path;
use std::fs;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Output produced by [`package_directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArchive {
    /// Number of files written to the archive.
    pub file_count: usize,
    /// Truncated SHA-256 digest of the archive.
    pub digest: TruncatedDigest,
}

/// Zip every file below `source_dir` into `archive_path` and hash the result.
///
/// An existing archive at `archive_path` is replaced. An empty directory
/// gives an archive with no entries.
///
/// # Errors
///
/// Returns [`PackagingError::Io`] / [`PackagingError::Zip`] on read or
/// write failures.
pub fn package_directory(
    source_dir: &Utf8Path,
    archive_path: &Utf8Path,
) -> Result<PackagedArchive, PackagingError> {
    let file_count = zip_directory(source_dir, archive_path)?;
    let digest = compute_sha256_64(archive_path)?;
    Ok(PackagedArchive { file_count, digest })
}

/// Write a deterministic zip of `source_dir` to `archive_path`.
///
/// Returns the number of files written.
///
/// # Errors
///
/// Returns an error if any file cannot be read or written.
pub fn zip_directory(source_dir: &Utf8Path, archive_path: &Utf8Path) -> Result<usize, PackagingError> {
    let files = walk_files(source_dir)?;
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = ZipWriter::new(fs::File::create(archive_path)?);
    for relative in &files {
        let source = source_dir.join(relative);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(entry_mode(&source)?);
        writer.start_file(slash_path(relative), options)?;
        writer.write_all(&fs::read(&source)?)?;
    }
    writer.finish()?;
    tracing::debug!("packed {} files into {archive_path}", files.len());
    Ok(files.len())
}

#[cfg(unix)]
fn entry_mode(path: &Utf8Path) -> std::io::Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)?.permissions().mode();
    Ok(if mode & 0o111 == 0 { 0o644 } else { 0o755 })
}

#[cfg(not(unix))]
fn entry_mode(_path: &Utf8Path) -> std::io::Result<u32> {
    Ok(0o644)
}
