//! CLI argument definitions for the dependency installer.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::configure::{CmakeDefine, ProjectBuildType};
use crate::error::{Action, InstallerError, Result};
use crate::platform::Platform;
use crate::toolchain::Generator;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};

/// Manifest file name looked up in the working directory.
pub const DEFAULT_DEPS_FILE: &str = "dependencies.json";

/// Fetch, build, and package native library dependencies.
#[derive(Parser, Debug, Default)]
#[command(name = "install-deps")]
#[command(version, about)]
#[command(long_about = concat!(
    "Fetch, build, and package native library dependencies.\n\n",
    "Dependencies are declared in a manifest (dependencies.json by default) ",
    "together with the recipes that can fulfil them: prebuilt package caches, ",
    "registry packages, and from-source CMake builds. The selected action ",
    "installs include/, lib/, and bin/ into the project's dependencies ",
    "directory.\n\n",
    "Without an action, every manifest dependency is downloaded.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Download every dependency from the package caches:\n",
    "    $ install-deps\n\n",
    "  Build two dependencies from source or the registry:\n",
    "    $ install-deps build zlib libpng\n\n",
    "  Build and archive dependencies for publishing to a cache:\n",
    "    $ install-deps package --clean-build\n\n",
    "  Show what is available on Windows:\n",
    "    $ install-deps list --platform windows\n\n",
    "  Configure the current project for a release build:\n",
    "    $ install-deps configure -T Release -D BUILD_TESTS=OFF",
))]
pub struct Cli {
    /// Action to run (download when omitted).
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Increase diagnostic output (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available actions.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download prebuilt archives from the package caches.
    Download(DownloadArgs),

    /// Build dependencies from registry packages or from source.
    Build(BuildArgs),

    /// Build dependencies and archive them for a package cache.
    Package(BuildArgs),

    /// List dependencies that can be downloaded or built.
    List(ListArgs),

    /// Configure the current project with CMake.
    Configure(ConfigureArgs),

    /// Print the path of vcvars64.bat.
    FindVcvars(FindVcvarsArgs),
}

/// Where the manifest and the project directories are.
#[derive(Args, Debug, Clone, Default)]
pub struct ManifestArgs {
    /// Dependency manifest [default: ./dependencies.json].
    #[arg(long, value_name = "FILE")]
    pub deps_file: Option<Utf8PathBuf>,

    /// Project root holding build/ and dependencies/ [default: the
    /// manifest's directory].
    #[arg(short = 'R', long, value_name = "DIR")]
    pub root_dir: Option<Utf8PathBuf>,

    /// Installation directory [default: <root>/dependencies].
    #[arg(long, value_name = "DIR")]
    pub target_dir: Option<Utf8PathBuf>,
}

/// Directories derived from [`ManifestArgs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    /// The manifest file.
    pub deps_file: Utf8PathBuf,
    /// Project root.
    pub root_dir: Utf8PathBuf,
    /// Installation directory.
    pub target_dir: Utf8PathBuf,
    /// Parent of the per-package build directories.
    pub build_root: Utf8PathBuf,
}

impl ManifestArgs {
    /// Resolve the project directories against `cwd`.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use deps_installer::cli::ManifestArgs;
    ///
    /// let paths = ManifestArgs::default().resolve(Utf8Path::new("/work/app"));
    /// assert_eq!(paths.deps_file, "/work/app/dependencies.json");
    /// assert_eq!(paths.target_dir, "/work/app/dependencies");
    /// assert_eq!(paths.build_root, "/work/app/build/dependencies");
    /// ```
    #[must_use]
    pub fn resolve(&self, cwd: &Utf8Path) -> ProjectPaths {
        let deps_file = self
            .deps_file
            .as_deref()
            .map_or_else(|| cwd.join(DEFAULT_DEPS_FILE), |file| cwd.join(file));
        let root_dir = match &self.root_dir {
            Some(root) => cwd.join(root),
            None => deps_file
                .parent()
                .map_or_else(|| cwd.to_owned(), Utf8Path::to_owned),
        };
        let target_dir = self
            .target_dir
            .as_deref()
            .map_or_else(|| root_dir.join("dependencies"), |dir| cwd.join(dir));
        let build_root = root_dir.join("build").join("dependencies");
        ProjectPaths {
            deps_file,
            root_dir,
            target_dir,
            build_root,
        }
    }
}

/// Arguments for the download action.
#[derive(Args, Debug, Clone, Default)]
pub struct DownloadArgs {
    /// Manifest location.
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Directory keeping downloaded archives [default: the target dir].
    #[arg(long, value_name = "DIR")]
    pub package_dir: Option<Utf8PathBuf>,

    /// Remove the target's subdirectories before installing.
    #[arg(long)]
    pub clean: bool,

    /// Dependencies to download [default: every manifest dependency].
    #[arg(value_name = "PACKAGE")]
    pub packages: Vec<String>,
}

/// Arguments for the build and package actions.
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Manifest location.
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Remove the target's subdirectories before installing.
    #[arg(long)]
    pub clean: bool,

    /// Remove build directories before configuring.
    #[arg(long)]
    pub clean_build: bool,

    /// Use checked-out sources as they are, without fetching.
    #[arg(long)]
    pub skip_download_source: bool,

    /// Toolchain options.
    #[command(flatten)]
    pub toolchain: ToolchainArgs,

    /// Number of parallel build jobs [default: available CPUs].
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Dependencies to build [default: every manifest dependency].
    #[arg(value_name = "PACKAGE")]
    pub packages: Vec<String>,
}

/// Generator and Visual Studio selection.
#[derive(Args, Debug, Clone, Default)]
pub struct ToolchainArgs {
    /// CMake generator and compiler set.
    #[arg(short = 'G', long, value_enum, default_value_t = Generator::Default)]
    pub generator: Generator,

    /// Visual Studio installation at a non-standard path.
    #[arg(long, value_name = "DIR")]
    pub vs_path: Option<Utf8PathBuf>,
}

/// Arguments for the list action.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Manifest location.
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Print only the downloadable dependencies.
    #[arg(long, conflicts_with = "buildable_only")]
    pub downloadable_only: bool,

    /// Print only the buildable dependencies.
    #[arg(long)]
    pub buildable_only: bool,

    /// Platform to list for [default: the current platform].
    #[arg(long, value_enum)]
    pub platform: Option<Platform>,
}

/// Arguments for the configure action.
#[derive(Args, Debug, Clone)]
pub struct ConfigureArgs {
    /// CMake binary directory.
    #[arg(long, value_name = "DIR", default_value = "build")]
    pub build_dir: Utf8PathBuf,

    /// Build type.
    #[arg(short = 'T', long, value_enum, default_value_t = ProjectBuildType::Debug)]
    pub build_type: ProjectBuildType,

    /// CMake definition (repeatable).
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    pub defines: Vec<CmakeDefine>,

    /// Toolchain options.
    #[command(flatten)]
    pub toolchain: ToolchainArgs,
}

impl Default for ConfigureArgs {
    fn default() -> Self {
        Self {
            build_dir: Utf8PathBuf::from("build"),
            build_type: ProjectBuildType::Debug,
            defines: Vec::new(),
            toolchain: ToolchainArgs::default(),
        }
    }
}

/// Arguments for the find-vcvars action.
#[derive(Args, Debug, Clone, Default)]
pub struct FindVcvarsArgs {
    /// Visual Studio installation at a non-standard path.
    #[arg(long, value_name = "DIR")]
    pub vs_path: Option<Utf8PathBuf>,
}

impl Cli {
    /// The action to run; a bare invocation downloads everything.
    #[must_use]
    pub fn action(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Download(DownloadArgs::default()))
    }
}

impl Command {
    /// The pipeline action this command runs, if any.
    #[must_use]
    pub const fn pipeline_action(&self) -> Option<Action> {
        match self {
            Self::Download(_) => Some(Action::Download),
            Self::Build(_) => Some(Action::Build),
            Self::Package(_) => Some(Action::Package),
            Self::List(_) | Self::Configure(_) | Self::FindVcvars(_) => None,
        }
    }
}

/// Check a generator against the platform it will run on.
///
/// # Errors
///
/// Returns [`InstallerError::ToolchainNotFound`] if `generator` is not
/// available on `platform`.
pub fn validate_generator(generator: Generator, platform: Platform) -> Result<()> {
    if generator.is_valid_for(platform) {
        return Ok(());
    }
    let valid = Generator::valid_for(platform)
        .iter()
        .map(|g| g.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Err(InstallerError::ToolchainNotFound {
        reason: format!("generator {generator} is not available on {platform} (valid: {valid})"),
    })
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
