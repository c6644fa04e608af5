//! Configure the current project with CMake.
//!
//! Runs `cmake --fresh` for the project source directory with the selected
//! generator, build type, and `-D` definitions, inside the resolved
//! toolchain environment.

use crate::error::{InstallerError, Result};
use crate::output::write_stderr_line;
use crate::process::{CommandExecutor, CommandSpec, failure_message};
use crate::toolchain::{Generator, PlatformInfo, build_environment, generator_options};
use camino::Utf8PathBuf;
use clap::ValueEnum;
use std::fmt;
use std::io::Write;

/// Build type passed to CMake when configuring the project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "PascalCase")]
pub enum ProjectBuildType {
    /// Unoptimised with debug information.
    #[default]
    Debug,
    /// Optimised with debug information and assertions.
    Develop,
    /// Fully optimised.
    Release,
}

impl ProjectBuildType {
    /// Value of `CMAKE_BUILD_TYPE`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Develop => "Develop",
            Self::Release => "Release",
        }
    }
}

impl fmt::Display for ProjectBuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `-D KEY=VALUE` definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmakeDefine {
    /// Cache variable name.
    pub key: String,
    /// Value assigned to it.
    pub value: String,
}

impl std::str::FromStr for CmakeDefine {
    type Err = String;

    fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
        match text.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok(Self {
                key: key.to_owned(),
                value: value.to_owned(),
            }),
            _ => Err(format!("expected KEY=VALUE, got `{text}`")),
        }
    }
}

/// Everything needed to configure a project.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    /// Directory holding the top-level `CMakeLists.txt`.
    pub source_dir: Utf8PathBuf,
    /// CMake binary directory.
    pub build_dir: Utf8PathBuf,
    /// Value of `CMAKE_BUILD_TYPE`.
    pub build_type: ProjectBuildType,
    /// Generator and compiler set.
    pub generator: Generator,
    /// Extra definitions, in the order given.
    pub defines: Vec<CmakeDefine>,
    /// Resolved toolchain details for `generator`.
    pub platform_info: PlatformInfo,
}

/// The `cmake --fresh` invocation for `config`.
///
/// # Errors
///
/// Returns [`InstallerError::ToolchainNotFound`] if the generator needs a
/// Visual Studio installation that was not resolved.
pub fn configure_command(config: &ProjectConfig) -> Result<CommandSpec> {
    let generator_args = generator_options(config.generator, &config.platform_info)?;
    let spec = CommandSpec::new("cmake")
        .arg("--fresh")
        .args(generator_args)
        .args([
            "-S".to_owned(),
            config.source_dir.to_string(),
            "-B".to_owned(),
            config.build_dir.to_string(),
            format!("-DCMAKE_BUILD_TYPE={}", config.build_type),
        ])
        .args(
            config
                .defines
                .iter()
                .map(|define| format!("-D{}={}", define.key, define.value)),
        )
        .envs(&build_environment(config.generator, &config.platform_info));
    Ok(spec)
}

/// Configure the project described by `config`.
///
/// # Errors
///
/// Returns [`InstallerError::Configure`] if CMake fails, or an error if it
/// cannot be started.
pub fn configure_project(
    executor: &dyn CommandExecutor,
    config: &ProjectConfig,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<()> {
    let spec = configure_command(config)?;
    if !quiet {
        write_stderr_line(
            stderr,
            format!(
                "Running CMake with command: {} {}",
                spec.program(),
                spec.arguments().join(" ")
            ),
        );
    }
    let output = executor.run(&spec)?;
    if output.status.success() {
        return Ok(());
    }
    Err(InstallerError::Configure {
        source_dir: config.source_dir.clone(),
        status: output.status.code(),
        message: failure_message(&output),
    })
}
