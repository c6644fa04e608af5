//! Copying selected files from a variant's install tree into the target.

use crate::error::Result;
use crate::manifest::InstallSelector;
use crate::stager::{copy_file, slash_path, walk_files};
use camino::Utf8Path;

/// Copy the files of `install_dir` picked by `selectors` into `target_dir`.
///
/// Pattern selectors keep the file's relative path; rename pairs copy one
/// file to a new relative path. Files matched by nothing are dropped. An
/// empty selector list copies everything. Returns the number of copies made.
///
/// # Errors
///
/// Returns an error if the install tree cannot be walked or a copy fails.
pub fn collect_install_files(
    install_dir: &Utf8Path,
    target_dir: &Utf8Path,
    selectors: &[InstallSelector],
) -> Result<usize> {
    std::fs::create_dir_all(target_dir)?;
    if !install_dir.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;
    for relative in walk_files(install_dir)? {
        let path = slash_path(&relative);
        let source = install_dir.join(&relative);

        let pattern_match = selectors.is_empty()
            || selectors.iter().any(|selector| match selector {
                InstallSelector::Pattern { regex, .. } => regex.is_match(&path),
                InstallSelector::Rename { .. } => false,
            });
        if pattern_match {
            copy_file(&source, &target_dir.join(&relative))?;
            copied += 1;
        }

        let renames = selectors.iter().filter_map(|selector| match selector {
            InstallSelector::Rename { from, to } if *from == path => Some(to),
            _ => None,
        });
        for to in renames {
            tracing::trace!("renaming {path} to {to}");
            copy_file(&source, &target_dir.join(to))?;
            copied += 1;
        }
    }
    Ok(copied)
}
