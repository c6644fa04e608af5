//! Behaviour-driven tests for the download action.
//!
//! These scenarios run the full download pipeline against an in-memory
//! package cache and the real zip extractor. Tests use the rstest-bdd
//! mutable world pattern.

use camino::{Utf8Path, Utf8PathBuf};
use deps_installer::archive::digest::digest_bytes;
use deps_installer::archive::download::{ArchiveDownloader, DownloadError};
use deps_installer::archive::extraction::ZipExtractor;
use deps_installer::archive::packaging::zip_directory;
use deps_installer::build::BuildOptions;
use deps_installer::error::{Action, InstallerError};
use deps_installer::manifest::{DependencyManifest, PackageName};
use deps_installer::pipeline::{Collaborators, PipelineContext, PipelineReport, run_pipeline};
use deps_installer::test_utils::StubExecutor;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// In-memory package cache
// ---------------------------------------------------------------------------

/// Serves the same bytes for every URL and records what was requested.
#[derive(Default)]
struct FakeCache {
    served: Vec<u8>,
    requests: RefCell<Vec<String>>,
}

impl ArchiveDownloader for FakeCache {
    fn download(&self, url: &str, dest: &Utf8Path) -> Result<(), DownloadError> {
        self.requests.borrow_mut().push(url.to_owned());
        std::fs::write(dest, &self.served)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

struct DownloadWorld {
    _dir: TempDir,
    root: Utf8PathBuf,
    archive: Vec<u8>,
    cache: FakeCache,
    executor: StubExecutor,
    result: Option<Result<PipelineReport, InstallerError>>,
}

impl DownloadWorld {
    fn target(&self) -> Utf8PathBuf {
        self.root.join("dependencies")
    }

    fn download(&mut self, packages: &[String]) {
        let path = self.root.join("dependencies.json");
        let manifest = DependencyManifest::parse(&path).expect("parse manifest");
        let target = self.target();
        let build_root = self.root.join("build/dependencies");
        let build = BuildOptions::default();
        let context = PipelineContext {
            action: Action::Download,
            packages,
            target_dir: &target,
            package_dir: &target,
            build_root: &build_root,
            clean: false,
            quiet: true,
            build: &build,
        };
        let collaborators = Collaborators {
            executor: &self.executor,
            downloader: &self.cache,
            extractor: &ZipExtractor,
            registry: None,
        };
        self.result = Some(run_pipeline(
            &manifest,
            &context,
            &collaborators,
            &mut Vec::new(),
        ));
    }

    fn error(&self) -> &InstallerError {
        match &self.result {
            Some(Err(err)) => err,
            Some(Ok(report)) => panic!("download succeeded: {report:?}"),
            None => panic!("nothing was downloaded"),
        }
    }
}

#[fixture]
fn world() -> DownloadWorld {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 temp dir");
    let staged = root.join("staged");
    std::fs::create_dir_all(staged.join("include")).expect("create staged dir");
    std::fs::write(staged.join("include/zlib.h"), b"#define ZLIB_VERSION \"1.3\"\n")
        .expect("write header");
    let archive_path = root.join("zlib.zip");
    zip_directory(&staged, &archive_path).expect("zip staged files");
    let archive = std::fs::read(&archive_path).expect("read archive");
    DownloadWorld {
        _dir: dir,
        root,
        cache: FakeCache {
            served: archive.clone(),
            requests: RefCell::new(Vec::new()),
        },
        archive,
        executor: StubExecutor::new(Vec::new()),
        result: None,
    }
}

fn split_names(names: &str) -> Vec<String> {
    names.split(", ").map(str::to_owned).collect()
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a package cache at \"{url}\" pinning zlib 1.3")]
fn given_cache(world: &mut DownloadWorld, url: String) {
    let digest = digest_bytes(&world.archive);
    std::fs::write(
        world.root.join("dependencies.json"),
        format!(
            r#"{{"dependencies": ["zlib"],
                "package-caches": [{{"type": "custom", "platform": "{}",
                  "url": "{url}", "packages": ["zlib:1.3:{digest}"]}}]}}"#,
            deps_installer::platform::Platform::current()
        ),
    )
    .expect("write manifest");
}

#[given("the pinned archive is already in the dependencies directory")]
fn given_local_archive(world: &mut DownloadWorld) {
    let target = world.target();
    std::fs::create_dir_all(&target).expect("create target");
    std::fs::write(target.join("zlib_1.3.zip"), &world.archive).expect("seed archive");
}

#[given("the cache serves a tampered archive")]
fn given_tampered(world: &mut DownloadWorld) {
    world.cache.served = b"not the pinned archive".to_vec();
}

#[when("the \"{name}\" dependency is downloaded")]
fn when_downloaded(world: &mut DownloadWorld, name: String) {
    world.download(&[name]);
}

#[when("the \"{names}\" dependencies are downloaded")]
fn when_many_downloaded(world: &mut DownloadWorld, names: String) {
    world.download(&split_names(&names));
}

#[then("the download succeeds")]
fn then_succeeds(world: &mut DownloadWorld) {
    match &world.result {
        Some(Ok(report)) => assert_eq!(report.installed.len(), 1),
        Some(Err(err)) => panic!("download failed: {err}"),
        None => panic!("nothing was downloaded"),
    }
}

#[then("\"{file}\" is kept in the dependencies directory")]
fn then_archive_kept(world: &mut DownloadWorld, file: String) {
    let kept = world.target().join(file);
    assert_eq!(std::fs::read(kept).expect("read archive"), world.archive);
}

#[then("the dependencies directory contains \"{file}\"")]
fn then_contains(world: &mut DownloadWorld, file: String) {
    assert!(world.target().join(file).is_file());
}

#[then("\"{url}\" was requested once")]
fn then_requested_once(world: &mut DownloadWorld, url: String) {
    assert_eq!(*world.cache.requests.borrow(), vec![url]);
}

#[then("nothing was requested from the cache")]
fn then_nothing_requested(world: &mut DownloadWorld) {
    assert!(world.cache.requests.borrow().is_empty());
}

#[then("no external command was run")]
fn then_no_commands(world: &mut DownloadWorld) {
    assert!(world.executor.received().is_empty());
}

#[then("the download fails the integrity check")]
fn then_integrity_failure(world: &mut DownloadWorld) {
    assert!(matches!(world.error(), InstallerError::Integrity { .. }));
}

#[then("the dependencies directory has no \"{dir}\" directory")]
fn then_no_dir(world: &mut DownloadWorld, dir: String) {
    assert!(!world.target().join(dir).exists());
}

#[then("the download fails listing \"{names}\"")]
fn then_unavailable(world: &mut DownloadWorld, names: String) {
    let expected: Vec<PackageName> = split_names(&names)
        .into_iter()
        .map(|name| PackageName::try_from(name).expect("valid name"))
        .collect();
    match world.error() {
        InstallerError::PackageUnavailable { names: missing, .. } => {
            assert_eq!(missing, &expected);
        }
        other => panic!("expected unavailable packages, got {other}"),
    }
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/cache_download.feature",
    name = "A pinned archive is downloaded, verified, and unpacked"
)]
fn scenario_download_pinned(world: DownloadWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/cache_download.feature",
    name = "A verified local archive is reused"
)]
fn scenario_reuse_local(world: DownloadWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/cache_download.feature",
    name = "A tampered archive never reaches the dependencies directory"
)]
fn scenario_tampered(world: DownloadWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/cache_download.feature",
    name = "Every unavailable dependency is reported at once"
)]
fn scenario_unavailable(world: DownloadWorld) {
    let _ = world;
}
