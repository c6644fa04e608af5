//! Source checkouts for build recipes.
//!
//! A recipe pins a GitHub repository at a branch and a commit. The checkout
//! is created with `git clone` on the first run and refreshed with
//! `fetch`/`checkout`/`pull` afterwards; either way it finishes on the
//! pinned commit. Every git call has a 5 minute timeout so a stalled network
//! cannot hang the run.

use crate::build::{BuildStage, run_stage};
use crate::error::Result;
use crate::manifest::BuildRecipe;
use crate::process::{CommandExecutor, CommandSpec, stdout_text};
use camino::Utf8Path;
use std::time::Duration;

/// Timeout applied to every git invocation.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Bring the checkout at `src_dir` to the commit pinned by `recipe`.
///
/// With `skip_download` the network steps are skipped and only the commit
/// check runs against the existing checkout.
///
/// # Errors
///
/// Returns [`crate::error::InstallerError::SourceBuild`] with the
/// `ensure-source` stage if any git command fails.
pub fn ensure_source(
    executor: &dyn CommandExecutor,
    recipe: &BuildRecipe,
    src_dir: &Utf8Path,
    skip_download: bool,
) -> Result<()> {
    let package = recipe.name();
    let branch = recipe.branch().as_str();
    let run = |spec: CommandSpec| {
        run_stage(executor, package, BuildStage::EnsureSource, &spec.timeout(GIT_TIMEOUT))
    };

    if skip_download {
        tracing::debug!("skipping source download for {package}");
    } else if src_dir.join(".git").is_dir() {
        tracing::info!("updating {} at {branch}", recipe.repository());
        run(git(src_dir).arg("fetch"))?;
        run(git(src_dir).args(["checkout", "-f", branch]))?;
        run(git(src_dir).args(["pull", "origin", branch]))?;
    } else {
        tracing::info!("cloning {} at {branch}", recipe.repository());
        if let Some(parent) = src_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let clone_url = recipe.repository().clone_url();
        run(CommandSpec::new("git").args([
            "clone",
            "--branch",
            branch,
            clone_url.as_str(),
            src_dir.as_str(),
        ]))?;
    }

    let head = run(git(src_dir).args(["rev-parse", "HEAD"]))?;
    let current = stdout_text(&head);
    let pinned = recipe.commit().as_str();
    if current != pinned {
        tracing::info!("checking out pinned commit {pinned}");
        run(git(src_dir).args(["checkout", pinned]))?;
    }
    Ok(())
}

fn git(checkout: &Utf8Path) -> CommandSpec {
    CommandSpec::new("git").current_dir(checkout)
}
