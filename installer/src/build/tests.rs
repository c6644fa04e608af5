//! Stage-by-stage tests for [`SourceBuilder`].

use super::*;
use crate::manifest::DependencyManifest;
use crate::test_utils::{ExpectedCall, StubExecutor, failure_output};
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use std::cell::RefCell;
use tempfile::TempDir;

const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

/// Delegates to a [`StubExecutor`] and, when CMake installs, writes the
/// given files below the configured install prefix.
struct InstallingExecutor {
    stub: StubExecutor,
    installed: Vec<&'static str>,
    prefix: RefCell<Option<Utf8PathBuf>>,
}

impl CommandExecutor for InstallingExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<Output> {
        let output = self.stub.run(spec)?;
        if let Some(prefix) = spec
            .arguments()
            .iter()
            .find_map(|arg| arg.strip_prefix("-DCMAKE_INSTALL_PREFIX="))
        {
            *self.prefix.borrow_mut() = Some(Utf8PathBuf::from(prefix));
        }
        if spec.arguments().first().map(String::as_str) == Some("--build") {
            let prefix = self.prefix.borrow().clone().expect("configured before build");
            for file in &self.installed {
                let path = prefix.join(file);
                std::fs::create_dir_all(path.parent().expect("parent"))?;
                std::fs::write(path, file.as_bytes())?;
            }
        }
        Ok(output)
    }
}

struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
    target: Utf8PathBuf,
    build: Utf8PathBuf,
}

impl Workspace {
    fn recipe(&self, body: &str) -> BuildRecipe {
        let path = self.root.join("dependencies.json");
        std::fs::write(&path, format!(r#"{{"build-recipes": [{body}]}}"#)).expect("write manifest");
        let manifest = DependencyManifest::parse(&path).expect("parse manifest");
        manifest
            .build_recipes()
            .first()
            .expect("one recipe")
            .clone()
    }

    fn src(&self) -> Utf8PathBuf {
        self.build.join("src")
    }
}

#[fixture]
fn workspace() -> Workspace {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 temp dir");
    let build = root.join("build/dependencies/zlib");
    std::fs::create_dir_all(build.join("src/.git")).expect("create checkout");
    Workspace {
        target: root.join("dependencies"),
        build,
        root,
        _dir: dir,
    }
}

fn options() -> BuildOptions {
    BuildOptions {
        platform: Platform::Linux,
        jobs: Some(4),
        skip_download_source: true,
        ..BuildOptions::default()
    }
}

fn tool_checks() -> Vec<ExpectedCall> {
    vec![
        ExpectedCall::ok("git", ["--version"]),
        ExpectedCall::ok("cmake", ["--version"]),
    ]
}

fn pinned_head() -> ExpectedCall {
    ExpectedCall::stdout("git", ["rev-parse", "HEAD"], COMMIT)
}

fn recipe_body(extra: &str) -> String {
    format!(
        r#"{{"package": "zlib:1.3", "repository": "madler/zlib", "branch": "v1.3",
            "commit": "{COMMIT}", "options": {{"ZLIB_BUILD_EXAMPLES": "OFF"}}{extra}}}"#
    )
}

#[rstest]
fn default_variant_builds_and_collects_everything(workspace: Workspace) {
    let recipe = workspace.recipe(&recipe_body(""));
    let src = workspace.src();
    let install = workspace.build.join("install_release");
    let mut calls = tool_checks();
    calls.push(pinned_head());
    calls.push(ExpectedCall::ok(
        "cmake",
        [
            "-S".to_owned(),
            src.to_string(),
            format!("-DCMAKE_INSTALL_PREFIX={install}"),
            "-DZLIB_BUILD_EXAMPLES=OFF".to_owned(),
            "-DCMAKE_BUILD_TYPE=Release".to_owned(),
        ],
    ));
    calls.push(ExpectedCall::ok(
        "cmake",
        ["--build", ".", "--config", "Release", "--target", "install", "-j4"],
    ));
    let executor = InstallingExecutor {
        stub: StubExecutor::new(calls),
        installed: vec!["include/zlib.h", "lib/libz.a"],
        prefix: RefCell::new(None),
    };
    let build_options = options();

    let version = SourceBuilder::new(&executor, &build_options)
        .build(&recipe, &workspace.target, &workspace.build)
        .expect("build succeeds");

    executor.stub.assert_finished();
    assert_eq!(version.as_str(), "1.3");
    assert!(workspace.target.join("include/zlib.h").is_file());
    assert!(workspace.target.join("lib/libz.a").is_file());
    let configure = executor.stub.received().get(3).cloned().expect("configure call");
    assert_eq!(
        configure.cwd(),
        Some(workspace.build.join("build_release").as_path())
    );
}

#[rstest]
fn named_variants_use_their_own_directories_and_options(workspace: Workspace) {
    let recipe = workspace.recipe(&recipe_body(
        r#", "variants": {
            "linux:debug:": {"options": {"ZLIB_BUILD_EXAMPLES": "ON"}, "install-files": ["lib/.*"]},
            "windows:release:": {"install-files": ["bin/.*"]}
        }"#,
    ));
    let src = workspace.src();
    let install = workspace.build.join("install_debug");
    let mut calls = tool_checks();
    calls.push(pinned_head());
    calls.push(ExpectedCall::ok(
        "cmake",
        [
            "-S".to_owned(),
            src.to_string(),
            format!("-DCMAKE_INSTALL_PREFIX={install}"),
            "-DZLIB_BUILD_EXAMPLES=ON".to_owned(),
            "-DCMAKE_BUILD_TYPE=Debug".to_owned(),
        ],
    ));
    calls.push(ExpectedCall::ok(
        "cmake",
        ["--build", ".", "--config", "Debug", "--target", "install", "-j4"],
    ));
    let executor = InstallingExecutor {
        stub: StubExecutor::new(calls),
        installed: vec!["include/zlib.h", "lib/libzd.a"],
        prefix: RefCell::new(None),
    };
    let build_options = options();

    SourceBuilder::new(&executor, &build_options)
        .build(&recipe, &workspace.target, &workspace.build)
        .expect("build succeeds");

    executor.stub.assert_finished();
    assert!(workspace.target.join("lib/libzd.a").is_file());
    assert!(!workspace.target.join("include").exists());
}

#[rstest]
fn install_dir_is_cleaned_but_build_dir_kept(workspace: Workspace) {
    let recipe = workspace.recipe(&recipe_body(""));
    let stale_install = workspace.build.join("install_release/lib/stale.a");
    let cached_build = workspace.build.join("build_release/CMakeCache.txt");
    for file in [&stale_install, &cached_build] {
        std::fs::create_dir_all(file.parent().expect("parent")).expect("create dir");
        std::fs::write(file, "old").expect("write file");
    }
    let mut calls = tool_checks();
    calls.push(pinned_head());
    calls.push(ExpectedCall::new(
        "cmake",
        [
            "-S".to_owned(),
            workspace.src().to_string(),
            format!(
                "-DCMAKE_INSTALL_PREFIX={}",
                workspace.build.join("install_release")
            ),
            "-DZLIB_BUILD_EXAMPLES=OFF".to_owned(),
            "-DCMAKE_BUILD_TYPE=Release".to_owned(),
        ],
        Ok(failure_output("CMake Error: stop here")),
    ));
    let executor = StubExecutor::new(calls);
    let build_options = options();

    let err = SourceBuilder::new(&executor, &build_options)
        .build(&recipe, &workspace.target, &workspace.build)
        .expect_err("configure fails");

    assert!(matches!(
        err,
        InstallerError::SourceBuild { stage: BuildStage::Configure, status: Some(1), .. }
    ));
    assert!(!stale_install.exists());
    assert!(cached_build.exists());
}

#[rstest]
fn patches_and_post_checkout_commands_run_in_checkout(workspace: Workspace) {
    std::fs::write(workspace.root.join("fix.patch"), "diff").expect("write patch");
    let recipe = workspace.recipe(&recipe_body(
        r#", "patches": ["fix.patch"], "after-checkout-commands": ["./autogen.sh"]"#,
    ));
    let patch = workspace.root.join("fix.patch");
    let mut calls = tool_checks();
    calls.push(pinned_head());
    calls.push(ExpectedCall::ok("git", ["apply", patch.as_str()]));
    let shell = CommandSpec::shell("./autogen.sh");
    calls.push(ExpectedCall::new(
        shell.program(),
        shell.arguments().to_vec(),
        Ok(failure_output("autogen: command failed")),
    ));
    let executor = StubExecutor::new(calls);
    let build_options = options();

    let err = SourceBuilder::new(&executor, &build_options)
        .build(&recipe, &workspace.target, &workspace.build)
        .expect_err("post-checkout fails");

    executor.assert_finished();
    let received = executor.received();
    assert!(
        received
            .iter()
            .skip(3)
            .all(|spec| spec.cwd() == Some(workspace.src().as_path()))
    );
    assert!(matches!(
        err,
        InstallerError::SourceBuild { stage: BuildStage::RunPostCheckout, .. }
    ));
}

#[rstest]
fn missing_patch_fails_apply_stage(workspace: Workspace) {
    let recipe = workspace.recipe(&recipe_body(r#", "patches": ["absent.patch"]"#));
    let mut calls = tool_checks();
    calls.push(pinned_head());
    let executor = StubExecutor::new(calls);
    let build_options = options();

    let err = SourceBuilder::new(&executor, &build_options)
        .build(&recipe, &workspace.target, &workspace.build)
        .expect_err("missing patch");

    assert!(matches!(
        err,
        InstallerError::SourceBuild { stage: BuildStage::ApplyPatches, status: None, .. }
    ));
}

#[rstest]
fn missing_cmake_is_a_toolchain_error(workspace: Workspace) {
    let recipe = workspace.recipe(&recipe_body(""));
    let executor = StubExecutor::new(vec![
        ExpectedCall::ok("git", ["--version"]),
        ExpectedCall::new("cmake", ["--version"], Ok(failure_output("not found"))),
    ]);
    let build_options = options();

    let err = SourceBuilder::new(&executor, &build_options)
        .build(&recipe, &workspace.target, &workspace.build)
        .expect_err("cmake missing");

    assert!(matches!(err, InstallerError::ToolchainNotFound { .. }));
}

#[test]
fn stage_names_are_kebab_case() {
    assert_eq!(BuildStage::EnsureSource.to_string(), "ensure-source");
    assert_eq!(BuildStage::CollectInstallFiles.to_string(), "collect-install-files");
}

#[test]
fn explicit_jobs_win_over_parallelism() {
    let build_options = BuildOptions {
        jobs: Some(3),
        ..BuildOptions::default()
    };
    assert_eq!(build_options.effective_jobs(), 3);
}
