//! Output formatting for the installer CLI.
//!
//! Progress lines go to stderr and are best-effort. Results meant for other
//! tools, such as the package action's cache descriptors and the list
//! action's JSON, go to stdout.

use crate::error::{InstallerError, Result};
use crate::manifest::{CachedPackage, PackageName, Version};
use camino::Utf8Path;
use std::fmt::Display;
use std::io::Write;

/// Heading printed above the cache descriptors of freshly packaged archives.
pub const PACKAGED_HEADING: &str = "Built packages (name:version:hash):";

/// Write one progress line, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Write one result line.
///
/// # Errors
///
/// Returns [`InstallerError::WriteFailed`] if the line cannot be written.
pub fn write_stdout_line(stdout: &mut dyn Write, message: impl Display) -> Result<()> {
    writeln!(stdout, "{message}").map_err(|source| InstallerError::WriteFailed { source })
}

/// Summary printed after a successful download or build.
///
/// # Example
///
/// ```
/// use camino::Utf8Path;
/// use deps_installer::manifest::{PackageName, Version};
/// use deps_installer::output::success_message;
///
/// let installed = vec![(
///     PackageName::try_from("zlib").expect("valid name"),
///     Version::try_from("1.3").expect("valid version"),
/// )];
/// assert_eq!(
///     success_message(&installed, Utf8Path::new("deps")),
///     "Installed 1 dependency into deps: zlib 1.3"
/// );
/// ```
#[must_use]
pub fn success_message(installed: &[(PackageName, Version)], target: &Utf8Path) -> String {
    if installed.is_empty() {
        return format!("Nothing to install into {target}");
    }
    let noun = if installed.len() == 1 {
        "dependency"
    } else {
        "dependencies"
    };
    let list = installed
        .iter()
        .map(|(name, version)| format!("{name} {version}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Installed {} {noun} into {target}: {list}", installed.len())
}

/// Print the cache descriptors of packaged archives under
/// [`PACKAGED_HEADING`].
///
/// # Errors
///
/// Returns [`InstallerError::WriteFailed`] if stdout cannot be written.
pub fn write_descriptors(stdout: &mut dyn Write, packaged: &[CachedPackage]) -> Result<()> {
    if packaged.is_empty() {
        return Ok(());
    }
    write_stdout_line(stdout, PACKAGED_HEADING)?;
    for descriptor in packaged {
        write_stdout_line(stdout, descriptor)?;
    }
    Ok(())
}
