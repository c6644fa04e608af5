//! Archive extraction for cached dependency packages.
//!
//! Unpacks `.zip` archives into a target directory, merging with what is
//! already there, with path traversal protection to prevent zip-slip
//! attacks.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::fs;

/// Trait for extracting package archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use deps_installer::archive::extraction::ZipExtractor;
///
/// let extractor = ZipExtractor;
/// // Use extractor.extract(archive_path, dest_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the relative paths of the extracted files.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry
    /// attempts to escape the destination directory.
    /// Returns [`ExtractionError::Io`] or [`ExtractionError::Zip`] on
    /// read or write failures.
    fn extract(
        &self,
        archive_path: &Utf8Path,
        dest_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive is not a readable zip file.
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },
}

/// Default extractor using the `zip` crate.
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(
        &self,
        archive_path: &Utf8Path,
        dest_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, ExtractionError> {
        let file = fs::File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut extracted = Vec::new();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let relative = validate_entry_name(entry.name())?;
            let dest_path = dest_dir.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&dest_path)?;
                continue;
            }
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&dest_path)?;
            std::io::copy(&mut entry, &mut out)?;
            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode))?;
            }
            extracted.push(relative);
        }

        tracing::debug!("extracted {} files into {dest_dir}", extracted.len());
        Ok(extracted)
    }
}

/// Validate that an archive entry name stays inside the destination and
/// return it as a relative path.
fn validate_entry_name(name: &str) -> Result<Utf8PathBuf, ExtractionError> {
    let normalized = name.replace('\\', "/");
    let traversal = || ExtractionError::PathTraversal {
        path: name.to_owned(),
    };
    if normalized.starts_with('/') || normalized.contains(':') {
        return Err(traversal());
    }
    let path = Utf8PathBuf::from(normalized);
    let mut relative = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Normal(part) => relative.push(part),
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir | Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                return Err(traversal());
            }
        }
    }
    Ok(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Utf8Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).expect("create archive");
        let mut writer = zip::ZipWriter::new(file);
        for (name, contents) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start entry");
            writer.write_all(contents).expect("write entry");
        }
        writer.finish().expect("finish archive");
    }

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 path");
        (dir, root)
    }

    #[test]
    fn extract_merges_into_existing_tree() {
        let (_guard, root) = temp_root();
        let archive = root.join("zlib_1.3.zip");
        write_zip(
            &archive,
            &[("include/zlib.h", b"header"), ("lib/libz.a", b"lib")],
        );
        let dest = root.join("target");
        fs::create_dir_all(dest.join("include")).expect("create include");
        fs::write(dest.join("include/png.h"), "png").expect("write existing");

        let files = ZipExtractor.extract(&archive, &dest).expect("extract");

        assert_eq!(
            files,
            vec![
                Utf8PathBuf::from("include/zlib.h"),
                Utf8PathBuf::from("lib/libz.a")
            ]
        );
        assert!(dest.join("include/png.h").exists());
        assert_eq!(
            fs::read_to_string(dest.join("include/zlib.h")).expect("read"),
            "header"
        );
    }

    #[test]
    fn extract_empty_archive_yields_no_files() {
        let (_guard, root) = temp_root();
        let archive = root.join("empty.zip");
        write_zip(&archive, &[]);

        let extracted = ZipExtractor.extract(&archive, &root.join("out")).expect("extract");
        assert!(extracted.is_empty());
    }

    #[test]
    fn extract_rejects_non_zip_data() {
        let (_guard, root) = temp_root();
        let archive = root.join("broken.zip");
        fs::write(&archive, b"not a zip").expect("write");

        let result = ZipExtractor.extract(&archive, &root.join("out"));
        assert!(matches!(result, Err(ExtractionError::Zip(_))));
    }

    #[rstest]
    #[case::parent_dir("../escape.txt")]
    #[case::nested_parent("include/../../escape.txt")]
    #[case::absolute("/etc/passwd")]
    #[case::drive("C:/Windows/evil.dll")]
    #[case::backslash_parent("..\\escape.txt")]
    fn rejects_path_traversal(#[case] name: &str) {
        assert!(
            matches!(
                validate_entry_name(name),
                Err(ExtractionError::PathTraversal { .. })
            ),
            "expected PathTraversal for {name}"
        );
    }

    #[rstest]
    #[case("lib/libz.a", "lib/libz.a")]
    #[case("./include/zlib.h", "include/zlib.h")]
    #[case("bin\\zlib.dll", "bin/zlib.dll")]
    fn accepts_normal_paths(#[case] name: &str, #[case] expected: &str) {
        let relative = validate_entry_name(name).expect("valid entry");
        assert_eq!(relative, Utf8PathBuf::from(expected));
    }
}
