//! From-source builds of build recipes.
//!
//! [`SourceBuilder`] runs the stages of a recipe in order: bring the
//! checkout to the pinned commit, apply patches, run post-checkout
//! commands, then configure, build, and collect install files for every
//! variant that applies to the platform. The first failing stage aborts the
//! build with [`InstallerError::SourceBuild`]; nothing is retried.
//!
//! # Sub-modules
//!
//! - [`cmake`] - CMake command lines.
//! - [`install_files`] - Copying selected files from an install tree.

pub mod cmake;
pub mod install_files;

#[cfg(test)]
mod tests;

use crate::error::{InstallerError, Result};
use crate::git;
use crate::manifest::{BuildRecipe, BuildVariant, PackageName, Version};
use crate::platform::Platform;
use crate::process::{CommandExecutor, CommandSpec, command_succeeds, failure_message};
use crate::stager::prepare_dir;
use crate::toolchain::{Generator, PlatformInfo, build_environment, generator_options};
use camino::Utf8Path;
use std::fmt;
use std::process::Output;

/// Tools that must be on `PATH` before a source build starts.
pub const REQUIRED_TOOLS: [&str; 2] = ["git", "cmake"];

/// A step of a from-source build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    /// Clone or update the checkout and pin the commit.
    EnsureSource,
    /// Apply the recipe's patches with `git apply`.
    ApplyPatches,
    /// Run the recipe's after-checkout shell commands.
    RunPostCheckout,
    /// Run the CMake configure step.
    Configure,
    /// Build and install with CMake.
    BuildAndInstall,
    /// Copy the selected install files into the target.
    CollectInstallFiles,
}

impl BuildStage {
    /// Kebab-case name used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnsureSource => "ensure-source",
            Self::ApplyPatches => "apply-patches",
            Self::RunPostCheckout => "run-post-checkout",
            Self::Configure => "configure",
            Self::BuildAndInstall => "build-and-install",
            Self::CollectInstallFiles => "collect-install-files",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run one command of a build stage, turning failures into
/// [`InstallerError::SourceBuild`].
///
/// Timeouts are passed through unchanged.
///
/// # Errors
///
/// Returns an error if the command cannot be spawned or exits unsuccessfully.
pub fn run_stage(
    executor: &dyn CommandExecutor,
    package: &PackageName,
    stage: BuildStage,
    spec: &CommandSpec,
) -> Result<Output> {
    tracing::debug!("[{package}] {stage}: {spec}");
    let output = executor.run(spec).map_err(|err| match err {
        InstallerError::Io(source) => stage_error(package, stage, None, source.to_string()),
        other => other,
    })?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(stage_error(
            package,
            stage,
            output.status.code(),
            failure_message(&output),
        ))
    }
}

fn stage_error(
    package: &PackageName,
    stage: BuildStage,
    status: Option<i32>,
    message: String,
) -> InstallerError {
    InstallerError::SourceBuild {
        package: package.clone(),
        stage,
        status,
        message,
    }
}

/// Settings shared by every source build of one run.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Platform whose variants are built.
    pub platform: Platform,
    /// CMake generator.
    pub generator: Generator,
    /// Resolved toolchain snapshot for `generator`.
    pub platform_info: PlatformInfo,
    /// Parallel build jobs; `None` uses the available parallelism.
    pub jobs: Option<usize>,
    /// Remove variant build directories before configuring.
    pub clean_build: bool,
    /// Reuse the existing checkout without touching the network.
    pub skip_download_source: bool,
}

impl BuildOptions {
    /// The `-j` value handed to CMake.
    #[must_use]
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        })
    }
}

/// Builds recipes from source with git and CMake.
pub struct SourceBuilder<'a> {
    executor: &'a dyn CommandExecutor,
    options: &'a BuildOptions,
}

impl<'a> SourceBuilder<'a> {
    /// Create a builder running commands through `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn CommandExecutor, options: &'a BuildOptions) -> Self {
        Self { executor, options }
    }

    /// Verify that git and CMake can be run.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ToolchainNotFound`] naming the first tool
    /// that does not answer `--version`.
    pub fn check_tools(&self) -> Result<()> {
        for tool in REQUIRED_TOOLS {
            if !command_succeeds(self.executor, &CommandSpec::new(tool).arg("--version")) {
                return Err(InstallerError::ToolchainNotFound {
                    reason: format!("{tool} is required to build from source but was not found"),
                });
            }
        }
        Ok(())
    }

    /// Build `recipe` in `build_dir` and copy its install files into
    /// `target_dir`. Returns the version that was built.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ToolchainNotFound`] if a required tool is
    /// missing and [`InstallerError::SourceBuild`] naming the failing stage
    /// otherwise.
    pub fn build(
        &self,
        recipe: &BuildRecipe,
        target_dir: &Utf8Path,
        build_dir: &Utf8Path,
    ) -> Result<Version> {
        let package = recipe.name();
        self.check_tools()?;
        tracing::info!("building {package} {} from source", recipe.version());

        let src_dir = build_dir.join("src");
        git::ensure_source(
            self.executor,
            recipe,
            &src_dir,
            self.options.skip_download_source,
        )?;
        self.apply_patches(recipe, &src_dir)?;
        self.run_post_checkout(recipe, &src_dir)?;

        let generator_args = generator_options(self.options.generator, &self.options.platform_info)?;
        for variant in recipe.variants_for(self.options.platform) {
            self.build_variant(package, variant, &src_dir, build_dir, target_dir, &generator_args)?;
        }
        Ok(recipe.version().clone())
    }

    fn apply_patches(&self, recipe: &BuildRecipe, src_dir: &Utf8Path) -> Result<()> {
        for patch in recipe.patches() {
            if !patch.is_file() {
                return Err(stage_error(
                    recipe.name(),
                    BuildStage::ApplyPatches,
                    None,
                    format!("patch file {patch} does not exist"),
                ));
            }
            let spec = CommandSpec::new("git")
                .args(["apply", patch.as_str()])
                .current_dir(src_dir);
            run_stage(self.executor, recipe.name(), BuildStage::ApplyPatches, &spec)?;
        }
        Ok(())
    }

    fn run_post_checkout(&self, recipe: &BuildRecipe, src_dir: &Utf8Path) -> Result<()> {
        for command in recipe.after_checkout_commands() {
            let spec = CommandSpec::shell(command).current_dir(src_dir);
            run_stage(self.executor, recipe.name(), BuildStage::RunPostCheckout, &spec)?;
        }
        Ok(())
    }

    fn build_variant(
        &self,
        package: &PackageName,
        variant: &BuildVariant,
        src_dir: &Utf8Path,
        build_dir: &Utf8Path,
        target_dir: &Utf8Path,
        generator_args: &[String],
    ) -> Result<()> {
        let variant_build = build_dir.join(variant.build_dir_name());
        let variant_install = build_dir.join(variant.install_dir_name());
        prepare_dir(&variant_build, self.options.clean_build)?;
        prepare_dir(&variant_install, true)?;

        let env = build_environment(self.options.generator, &self.options.platform_info);
        tracing::info!("[{package}] configuring variant {}", variant.name());
        let configure = cmake::configure_command(src_dir, &variant_install, variant, generator_args)
            .current_dir(&variant_build)
            .envs(&env);
        run_stage(self.executor, package, BuildStage::Configure, &configure)?;

        tracing::info!("[{package}] building variant {}", variant.name());
        let build = cmake::build_command(variant.name().build_type, self.options.effective_jobs())
            .current_dir(&variant_build)
            .envs(&env);
        run_stage(self.executor, package, BuildStage::BuildAndInstall, &build)?;

        let copied = install_files::collect_install_files(
            &variant_install,
            target_dir,
            variant.install_selectors(),
        )
        .map_err(|err| {
            stage_error(package, BuildStage::CollectInstallFiles, None, err.to_string())
        })?;
        tracing::debug!("[{package}] copied {copied} install files into {target_dir}");
        Ok(())
    }
}
