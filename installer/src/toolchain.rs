//! Native toolchain resolution.
//!
//! Maps a CMake generator choice onto the generator arguments and the
//! environment the build needs. On Windows the MSVC and clang-cl generators
//! require the Visual Studio developer environment, which is captured by
//! running `vcvars64.bat` in a throwaway `cmd` shell. Everywhere else the
//! resolver is the identity and inspects nothing.

use crate::error::{InstallerError, Result};
use crate::platform::Platform;
use crate::process::{CommandExecutor, CommandSpec, failure_message};
use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

/// Default Visual Studio installation root.
pub const VISUAL_STUDIO_ROOT: &str = "C:/Program Files/Microsoft Visual Studio";

/// Oldest supported Visual Studio release year.
pub const MIN_VISUAL_STUDIO_YEAR: u32 = 2022;

const EDITIONS: [&str; 3] = ["Enterprise", "Professional", "Community"];

/// CMake generator and compiler combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Generator {
    /// Whatever CMake picks by default.
    #[default]
    Default,
    /// Ninja with the default compiler.
    Ninja,
    /// Ninja with clang-cl from the Visual Studio environment.
    NinjaClangCl,
    /// Ninja with MSVC `cl`.
    NinjaMsvc,
    /// The Visual Studio generator with the clang-cl toolset.
    VsClangCl,
}

impl Generator {
    /// Command-line spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Ninja => "ninja",
            Self::NinjaClangCl => "ninja-clang-cl",
            Self::NinjaMsvc => "ninja-msvc",
            Self::VsClangCl => "vs-clang-cl",
        }
    }

    /// Generators usable on `platform`.
    #[must_use]
    pub const fn valid_for(platform: Platform) -> &'static [Self] {
        match platform {
            Platform::Windows => &[
                Self::Default,
                Self::NinjaClangCl,
                Self::NinjaMsvc,
                Self::VsClangCl,
            ],
            Platform::Linux => &[Self::Default, Self::Ninja],
        }
    }

    /// Whether this generator is usable on `platform`.
    #[must_use]
    pub fn is_valid_for(self, platform: Platform) -> bool {
        Self::valid_for(platform).contains(&self)
    }

    const fn needs_visual_studio(self) -> bool {
        matches!(self, Self::NinjaClangCl | Self::NinjaMsvc | Self::VsClangCl)
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the build environment for one generator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Visual Studio release year, e.g. 2022.
    pub vs_year: Option<u32>,
    /// Visual Studio major version, e.g. 17.
    pub vs_major: Option<u32>,
    /// The `vcvars64.bat` that produced the environment.
    pub vcvars: Option<Utf8PathBuf>,
    /// Variables that differ from the ambient environment.
    pub env_overrides: BTreeMap<String, String>,
}

/// CMake arguments selecting `generator` and its compilers.
///
/// # Errors
///
/// Returns [`InstallerError::ToolchainNotFound`] when the Visual Studio
/// generator is requested without a resolved Visual Studio version.
pub fn generator_options(generator: Generator, info: &PlatformInfo) -> Result<Vec<String>> {
    let compilers = |compiler: &str| {
        [
            format!("-DCMAKE_C_COMPILER={compiler}"),
            format!("-DCMAKE_CXX_COMPILER={compiler}"),
        ]
    };
    let mut options = Vec::new();
    match generator {
        Generator::Default => {}
        Generator::Ninja => options.extend(["-G".to_owned(), "Ninja".to_owned()]),
        Generator::NinjaClangCl => {
            options.extend(["-G".to_owned(), "Ninja".to_owned()]);
            options.extend(compilers("clang-cl"));
        }
        Generator::NinjaMsvc => {
            options.extend(["-G".to_owned(), "Ninja".to_owned()]);
            options.extend(compilers("cl"));
        }
        Generator::VsClangCl => {
            let (Some(major), Some(year)) = (info.vs_major, info.vs_year) else {
                return Err(InstallerError::ToolchainNotFound {
                    reason: "the vs-clang-cl generator needs a Visual Studio installation"
                        .to_owned(),
                });
            };
            options.extend(["-G".to_owned(), format!("Visual Studio {major} {year}")]);
            options.extend(compilers("clang-cl"));
        }
    }
    Ok(options)
}

/// Environment overrides the build commands for `generator` need.
#[must_use]
pub fn build_environment(generator: Generator, info: &PlatformInfo) -> BTreeMap<String, String> {
    if generator.needs_visual_studio() {
        info.env_overrides.clone()
    } else {
        BTreeMap::new()
    }
}

/// Resolves generators into [`PlatformInfo`] snapshots.
pub struct ToolchainResolver<'a> {
    executor: &'a dyn CommandExecutor,
    platform: Platform,
    vs_path: Option<Utf8PathBuf>,
    install_root: Utf8PathBuf,
}

impl<'a> ToolchainResolver<'a> {
    /// Resolver for the current platform.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self {
            executor,
            platform: Platform::current(),
            vs_path: None,
            install_root: Utf8PathBuf::from(VISUAL_STUDIO_ROOT),
        }
    }

    /// Resolve as if running on `platform`.
    #[must_use]
    pub const fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Use this Visual Studio installation instead of searching for one.
    #[must_use]
    pub fn with_vs_path(mut self, vs_path: Option<Utf8PathBuf>) -> Self {
        self.vs_path = vs_path;
        self
    }

    /// Search for Visual Studio under `root` instead of the default location.
    #[must_use]
    pub fn with_install_root(mut self, root: &Utf8Path) -> Self {
        root.clone_into(&mut self.install_root);
        self
    }

    /// Produce the environment snapshot for `generator`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ToolchainNotFound`] if the generator is not
    /// available on this platform, or if Visual Studio 2022 or later cannot
    /// be located and its environment captured.
    pub fn resolve(&self, generator: Generator) -> Result<PlatformInfo> {
        if !generator.is_valid_for(self.platform) {
            return Err(InstallerError::ToolchainNotFound {
                reason: format!("generator {generator} is not available on {}", self.platform),
            });
        }
        if self.platform != Platform::Windows || !generator.needs_visual_studio() {
            tracing::debug!("generator {generator} needs no toolchain setup");
            return Ok(PlatformInfo::default());
        }

        let (install, vcvars) = self
            .visual_studio_path()
            .and_then(|install| vcvars_in(&install).map(|vcvars| (install, vcvars)))
            .ok_or_else(|| {
                not_found("Visual Studio installation not found or vcvars64.bat is missing")
            })?;
        let captured = self.capture_environment(&vcvars)?;

        let year = year_from_path(&install);
        let major = captured
            .get("VisualStudioVersion")
            .and_then(|v| v.split('.').next())
            .and_then(|v| v.parse::<u32>().ok());
        let (Some(year), Some(major)) = (year, major) else {
            return Err(not_found("could not determine the Visual Studio version"));
        };
        if year < MIN_VISUAL_STUDIO_YEAR {
            return Err(not_found("Visual Studio 2022 or later is required"));
        }
        tracing::debug!("using Visual Studio {year} (major {major}) from {install}");

        Ok(PlatformInfo {
            vs_year: Some(year),
            vs_major: Some(major),
            vcvars: Some(vcvars),
            env_overrides: changed_variables(captured),
        })
    }

    /// Path to `vcvars64.bat` of the selected installation, if any.
    #[must_use]
    pub fn find_vcvars(&self) -> Option<Utf8PathBuf> {
        self.visual_studio_path().and_then(|install| vcvars_in(&install))
    }

    fn visual_studio_path(&self) -> Option<Utf8PathBuf> {
        if let Some(explicit) = &self.vs_path {
            return Some(explicit.clone());
        }
        let mut versions: Vec<String> = self
            .install_root
            .read_dir_utf8()
            .ok()?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.file_name().to_owned())
            .collect();
        versions.sort_unstable_by(|a, b| b.cmp(a));
        versions.iter().find_map(|version| {
            EDITIONS
                .iter()
                .map(|edition| self.install_root.join(version).join(edition))
                .find(|path| path.exists())
        })
    }

    fn capture_environment(&self, vcvars: &Utf8Path) -> Result<BTreeMap<String, String>> {
        let mut script = tempfile::Builder::new()
            .prefix("vcvars_env")
            .suffix(".bat")
            .tempfile()?;
        writeln!(script, "@call \"{vcvars}\"")?;
        writeln!(script, "@set")?;
        script.flush()?;
        let script_path = Utf8Path::from_path(script.path())
            .ok_or_else(|| not_found("temporary directory path is not valid UTF-8"))?;

        let spec = CommandSpec::new("cmd").args(["/q", "/c", script_path.as_str()]);
        let output = self.executor.run(&spec)?;
        if !output.status.success() {
            return Err(not_found(&format!(
                "running {vcvars} failed: {}",
                failure_message(&output)
            )));
        }
        Ok(parse_set_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn not_found(reason: &str) -> InstallerError {
    InstallerError::ToolchainNotFound {
        reason: reason.to_owned(),
    }
}

fn vcvars_in(install: &Utf8Path) -> Option<Utf8PathBuf> {
    let path = install.join("VC/Auxiliary/Build/vcvars64.bat");
    path.is_file().then_some(path)
}

/// Release year from the last path segment that looks like one.
fn year_from_path(path: &Utf8Path) -> Option<u32> {
    path.components().rev().find_map(|component| {
        let part = component.as_str();
        (part.len() == 4 && part.starts_with("20") && part.bytes().all(|b| b.is_ascii_digit()))
            .then(|| part.parse().ok())
            .flatten()
    })
}

/// Parse `NAME=VALUE` lines as printed by `set`.
fn parse_set_output(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(name, value)| {
            (
                name.trim().to_owned(),
                value.trim().replace('\r', ""),
            )
        })
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

fn changed_variables(captured: BTreeMap<String, String>) -> BTreeMap<String, String> {
    captured
        .into_iter()
        .filter(|(name, value)| std::env::var(name).ok().as_deref() != Some(value.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{failure_output, stdout_output};
    use rstest::rstest;
    use std::cell::RefCell;
    use std::process::Output;

    /// Answers `cmd /q /c <script>` and keeps the script text for inspection.
    struct VcvarsShell {
        output: Output,
        script: RefCell<Option<String>>,
    }

    impl CommandExecutor for VcvarsShell {
        fn run(&self, spec: &CommandSpec) -> Result<Output> {
            assert_eq!(spec.program(), "cmd");
            assert_eq!(&spec.arguments()[..2], ["/q", "/c"]);
            let text = std::fs::read_to_string(&spec.arguments()[2])?;
            *self.script.borrow_mut() = Some(text);
            Ok(self.output.clone())
        }
    }

    fn shell(output: Output) -> VcvarsShell {
        VcvarsShell {
            output,
            script: RefCell::new(None),
        }
    }

    fn fake_install(root: &Utf8Path, year: &str, edition: &str) -> Utf8PathBuf {
        let install = root.join(year).join(edition);
        let build = install.join("VC/Auxiliary/Build");
        std::fs::create_dir_all(&build).expect("create vs tree");
        std::fs::write(build.join("vcvars64.bat"), "@echo off\n").expect("write vcvars");
        install
    }

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 temp dir");
        (dir, root)
    }

    #[rstest]
    #[case(Platform::Linux, Generator::Ninja, true)]
    #[case(Platform::Linux, Generator::NinjaMsvc, false)]
    #[case(Platform::Windows, Generator::VsClangCl, true)]
    #[case(Platform::Windows, Generator::Ninja, false)]
    #[case(Platform::Windows, Generator::Default, true)]
    fn generator_validity_depends_on_platform(
        #[case] platform: Platform,
        #[case] generator: Generator,
        #[case] valid: bool,
    ) {
        assert_eq!(generator.is_valid_for(platform), valid);
    }

    #[test]
    fn linux_resolution_is_identity() {
        let executor = shell(failure_output("must not run"));
        let resolver = ToolchainResolver::new(&executor).with_platform(Platform::Linux);

        let info = resolver.resolve(Generator::Ninja).expect("resolve");

        assert_eq!(info, PlatformInfo::default());
        assert!(executor.script.borrow().is_none());
    }

    #[test]
    fn invalid_generator_for_platform_is_rejected() {
        let executor = shell(failure_output("must not run"));
        let resolver = ToolchainResolver::new(&executor).with_platform(Platform::Linux);

        assert!(matches!(
            resolver.resolve(Generator::VsClangCl),
            Err(InstallerError::ToolchainNotFound { .. })
        ));
    }

    #[test]
    fn windows_resolution_captures_changed_variables() {
        let (_dir, root) = temp_root();
        fake_install(&root, "2019", "Enterprise");
        let newest = fake_install(&root, "2022", "Community");
        let executor = shell(stdout_output(
            "VisualStudioVersion=17.0\r\nINCLUDE=C:\\VC\\include\r\nDEPS_INSTALLER_AMBIENT=same\r\n",
        ));

        temp_env::with_var("DEPS_INSTALLER_AMBIENT", Some("same"), || {
            let resolver = ToolchainResolver::new(&executor)
                .with_platform(Platform::Windows)
                .with_install_root(&root);
            let info = resolver.resolve(Generator::VsClangCl).expect("resolve");

            assert_eq!(info.vs_year, Some(2022));
            assert_eq!(info.vs_major, Some(17));
            assert_eq!(
                info.vcvars,
                Some(newest.join("VC/Auxiliary/Build/vcvars64.bat"))
            );
            assert_eq!(
                info.env_overrides.get("INCLUDE").map(String::as_str),
                Some("C:\\VC\\include")
            );
            assert!(!info.env_overrides.contains_key("DEPS_INSTALLER_AMBIENT"));
        });

        let script = executor.script.borrow().clone().expect("script captured");
        assert!(script.starts_with("@call \""));
        assert!(script.contains("vcvars64.bat\""));
        assert!(script.ends_with("@set\n"));
    }

    #[test]
    fn visual_studio_older_than_2022_is_rejected() {
        let (_dir, root) = temp_root();
        fake_install(&root, "2019", "Professional");
        let executor = shell(stdout_output("VisualStudioVersion=16.0\n"));
        let resolver = ToolchainResolver::new(&executor)
            .with_platform(Platform::Windows)
            .with_install_root(&root);

        assert!(matches!(
            resolver.resolve(Generator::NinjaMsvc),
            Err(InstallerError::ToolchainNotFound { .. })
        ));
    }

    #[test]
    fn missing_installation_is_reported() {
        let (_dir, root) = temp_root();
        let executor = shell(failure_output("must not run"));
        let resolver = ToolchainResolver::new(&executor)
            .with_platform(Platform::Windows)
            .with_install_root(&root);

        assert!(resolver.find_vcvars().is_none());
        assert!(matches!(
            resolver.resolve(Generator::NinjaClangCl),
            Err(InstallerError::ToolchainNotFound { .. })
        ));
    }

    #[test]
    fn explicit_vs_path_wins() {
        let (_dir, root) = temp_root();
        fake_install(&root, "2022", "Enterprise");
        let explicit = fake_install(&root, "custom/2026", "BuildTools");
        let executor = shell(failure_output("unused"));
        let resolver = ToolchainResolver::new(&executor)
            .with_install_root(&root)
            .with_vs_path(Some(explicit.clone()));

        assert_eq!(
            resolver.find_vcvars(),
            Some(explicit.join("VC/Auxiliary/Build/vcvars64.bat"))
        );
    }

    #[rstest]
    #[case(Generator::Default, &[])]
    #[case(Generator::Ninja, &["-G", "Ninja"])]
    #[case(
        Generator::NinjaMsvc,
        &["-G", "Ninja", "-DCMAKE_C_COMPILER=cl", "-DCMAKE_CXX_COMPILER=cl"]
    )]
    #[case(
        Generator::VsClangCl,
        &["-G", "Visual Studio 17 2022", "-DCMAKE_C_COMPILER=clang-cl", "-DCMAKE_CXX_COMPILER=clang-cl"]
    )]
    fn generator_options_per_generator(#[case] generator: Generator, #[case] expected: &[&str]) {
        let info = PlatformInfo {
            vs_year: Some(2022),
            vs_major: Some(17),
            ..PlatformInfo::default()
        };
        assert_eq!(
            generator_options(generator, &info).expect("options"),
            expected
        );
    }

    #[test]
    fn build_environment_only_for_visual_studio_generators() {
        let info = PlatformInfo {
            env_overrides: BTreeMap::from([("LIB".to_owned(), "C:\\lib".to_owned())]),
            ..PlatformInfo::default()
        };
        assert!(build_environment(Generator::Ninja, &info).is_empty());
        assert_eq!(build_environment(Generator::NinjaClangCl, &info).len(), 1);
    }

    #[test]
    fn year_is_taken_from_path_segment() {
        assert_eq!(
            year_from_path(Utf8Path::new("C:/Program Files/Microsoft Visual Studio/2022/Community")),
            Some(2022)
        );
        assert_eq!(year_from_path(Utf8Path::new("/opt/vs/preview")), None);
    }
}
