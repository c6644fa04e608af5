//! Target directory preparation and file staging.
//!
//! Dependencies are merged into a shared target tree (`include/`, `lib/`,
//! `bin/`). This module owns the directory lifecycle: cleaning, writability
//! checks, the per-run lock, and the copy helpers used by every fulfillment
//! strategy.

use crate::error::{InstallerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use std::fs;

/// Name of the advisory lock file kept at the top of a target directory.
pub const LOCK_FILE_NAME: &str = ".install-deps.lock";

/// Handles preparation of a dependency target directory.
#[derive(Debug, Clone)]
pub struct Stager {
    target_dir: Utf8PathBuf,
}

impl Stager {
    /// Create a stager for `target_dir`.
    #[must_use]
    pub const fn new(target_dir: Utf8PathBuf) -> Self {
        Self { target_dir }
    }

    /// Return the target directory root.
    #[must_use]
    pub fn target_dir(&self) -> &Utf8Path {
        &self.target_dir
    }

    /// Ensure the target directory exists and is writable.
    ///
    /// With `clean`, every subdirectory is removed first. Files at the top
    /// level, such as previously downloaded archives, are kept so they can
    /// be re-verified instead of downloaded again.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, cleaned, or
    /// written to.
    pub fn prepare(&self, clean: bool) -> Result<()> {
        fs::create_dir_all(&self.target_dir)?;
        if clean {
            remove_subdirectories(&self.target_dir)?;
        }

        let marker = self.target_dir.join(".install-deps-write-check");
        match fs::write(&marker, b"marker") {
            Ok(()) => {
                let _ = fs::remove_file(&marker);
                Ok(())
            }
            Err(e) => Err(InstallerError::TargetNotWritable {
                path: self.target_dir.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Take the exclusive advisory lock for this target directory, creating
    /// the directory if needed.
    ///
    /// Take the lock before [`Stager::prepare`] so a refused run never
    /// cleans a tree another run is installing into. The lock is released
    /// when the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::TargetLocked`] if another run holds the lock.
    pub fn lock(&self) -> Result<TargetLock> {
        fs::create_dir_all(&self.target_dir)?;
        let path = self.target_dir.join(LOCK_FILE_NAME);
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.try_lock_exclusive()
            .map_err(|_| InstallerError::TargetLocked {
                path: self.target_dir.clone(),
            })?;
        tracing::debug!("locked {path}");
        Ok(TargetLock { file, path })
    }
}

/// Guard holding the target directory lock.
#[derive(Debug)]
pub struct TargetLock {
    file: fs::File,
    path: Utf8PathBuf,
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        if FileExt::unlock(&self.file).is_ok() {
            tracing::debug!("unlocked {}", self.path);
        }
    }
}

fn remove_subdirectories(dir: &Utf8Path) -> Result<()> {
    for listed in dir.read_dir_utf8()? {
        let entry = listed?;
        if entry.file_type()?.is_dir() {
            tracing::debug!("removing {}", entry.path());
            fs::remove_dir_all(entry.path())?;
        }
    }
    Ok(())
}

/// Create `dir`, removing any previous contents first when `clean` is set.
///
/// # Errors
///
/// Returns an error if the directory cannot be removed or created.
pub fn prepare_dir(dir: &Utf8Path, clean: bool) -> Result<()> {
    if clean && dir.exists() {
        tracing::debug!("cleaning {dir}");
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Copy a single file, creating the destination's parent directories.
///
/// # Errors
///
/// Returns [`InstallerError::StagingFailed`] if the copy fails.
pub fn copy_file(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, dest).map_err(|e| InstallerError::StagingFailed {
        reason: format!("failed to copy {source} to {dest}: {e}"),
    })?;
    Ok(())
}

/// Merge the tree rooted at `source` into `dest`, overwriting files.
///
/// Returns the number of files copied. A missing `source` copies nothing.
///
/// # Errors
///
/// Returns an error if walking or copying fails.
pub fn copy_tree(source: &Utf8Path, dest: &Utf8Path) -> Result<usize> {
    fs::create_dir_all(dest)?;
    if !source.is_dir() {
        return Ok(0);
    }
    let files = walk_files(source)?;
    for relative in &files {
        copy_file(&source.join(relative), &dest.join(relative))?;
    }
    Ok(files.len())
}

/// List every regular file below `root`, relative to it and sorted.
///
/// # Errors
///
/// Returns an I/O error if a directory cannot be read.
pub fn walk_files(root: &Utf8Path) -> std::io::Result<Vec<Utf8PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![Utf8PathBuf::new()];
    while let Some(relative) = pending.pop() {
        for listed in root.join(&relative).read_dir_utf8()? {
            let entry = listed?;
            let child = relative.join(entry.file_name());
            if entry.file_type()?.is_dir() {
                pending.push(child);
            } else {
                files.push(child);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Render a relative path with `/` separators on every platform.
#[must_use]
pub fn slash_path(relative: &Utf8Path) -> String {
    relative
        .components()
        .map(|component| component.as_str())
        .collect::<Vec<_>>()
        .join("/")
}
