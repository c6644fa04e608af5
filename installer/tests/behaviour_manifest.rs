//! Behaviour-driven tests for manifest parsing and validation.
//!
//! These scenarios cover include merging, the include depth limit, variant
//! option inheritance, and rendering. Tests use the rstest-bdd mutable world
//! pattern.

use camino::Utf8PathBuf;
use deps_installer::manifest::{ConfigError, DependencyManifest, DocumentFormat, PackageName};
use deps_installer::platform::Platform;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::collections::BTreeMap;
use tempfile::TempDir;

const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

struct ManifestWorld {
    _dir: TempDir,
    root: Utf8PathBuf,
    includes: Vec<String>,
    dependencies: Vec<String>,
    recipes: Vec<String>,
    parsed: Option<Result<DependencyManifest, ConfigError>>,
    rendered: Option<DependencyManifest>,
}

impl ManifestWorld {
    fn write(&self, relative: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(relative);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        std::fs::write(&path, contents).expect("write manifest");
        path
    }

    fn manifest(&self) -> &DependencyManifest {
        match &self.parsed {
            Some(Ok(manifest)) => manifest,
            Some(Err(err)) => panic!("manifest failed to parse: {err}"),
            None => panic!("manifest not parsed"),
        }
    }

    fn error(&self) -> &ConfigError {
        match &self.parsed {
            Some(Err(err)) => err,
            Some(Ok(_)) => panic!("manifest parsed successfully"),
            None => panic!("manifest not parsed"),
        }
    }
}

#[fixture]
fn world() -> ManifestWorld {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 temp dir");
    ManifestWorld {
        _dir: dir,
        root,
        includes: Vec::new(),
        dependencies: Vec::new(),
        recipes: Vec::new(),
        parsed: None,
        rendered: None,
    }
}

fn quoted(values: &[String]) -> String {
    values
        .iter()
        .map(|value| format!("\"{value}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn options_json(pairs: &str) -> String {
    let entries = pairs
        .split(", ")
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| format!("\"{key}\": \"{value}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{entries}}}")
}

fn recipe(extra: &str) -> String {
    format!(
        r#"{{"package": "zlib:1.3", "repository": "madler/zlib", "branch": "v1.3",
            "commit": "{COMMIT}"{extra}}}"#
    )
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a manifest that depends on \"{name}\"")]
fn given_manifest_dependency(world: &mut ManifestWorld, name: String) {
    world.dependencies.push(name);
}

#[given("it includes a document that depends on \"{name}\"")]
fn given_included_dependency(world: &mut ManifestWorld, name: String) {
    world.write(
        "third_party/extra.json",
        &format!(r#"{{"dependencies": ["{name}"]}}"#),
    );
    world.includes.push("third_party/extra.json".to_owned());
}

#[given("a chain of {levels} nested includes")]
fn given_include_chain(world: &mut ManifestWorld, levels: String) {
    let depth: usize = levels.parse().expect("numeric depth");
    world.write(&format!("level{depth}.json"), r#"{"dependencies": ["zlib"]}"#);
    for level in (1..depth).rev() {
        world.write(
            &format!("level{level}.json"),
            &format!(r#"{{"includes": ["level{}.json"]}}"#, level + 1),
        );
    }
    world.includes.push("level1.json".to_owned());
}

#[given(
    "a build recipe with options \"{defaults}\" and a \"{variant}\" variant with options \"{overrides}\""
)]
fn given_recipe_with_variant(
    world: &mut ManifestWorld,
    defaults: String,
    variant: String,
    overrides: String,
) {
    world.recipes.push(recipe(&format!(
        r#", "options": {}, "variants": {{"{variant}": {{"options": {},
            "install-files": ["include/.*"]}}}}"#,
        options_json(&defaults),
        options_json(&overrides)
    )));
}

#[given("a build recipe with default install files and a \"{variant}\" variant")]
fn given_ambiguous_recipe(world: &mut ManifestWorld, variant: String) {
    world.recipes.push(recipe(&format!(
        r#", "install-files": ["lib/.*"],
            "variants": {{"{variant}": {{"install-files": ["include/.*"]}}}}"#
    )));
}

#[when("the manifest is parsed")]
fn when_parsed(world: &mut ManifestWorld) {
    let document = format!(
        r#"{{"dependencies": [{}], "includes": [{}], "build-recipes": [{}]}}"#,
        quoted(&world.dependencies),
        quoted(&world.includes),
        world.recipes.join(", ")
    );
    let path = world.write("dependencies.json", &document);
    world.parsed = Some(DependencyManifest::parse(&path));
}

#[when("the manifest is rendered and parsed again")]
fn when_rendered(world: &mut ManifestWorld) {
    let rendered = world
        .manifest()
        .render(DocumentFormat::Toml)
        .expect("render manifest");
    let path = world.write("rendered.toml", &rendered);
    world.rendered = Some(DependencyManifest::parse(&path).expect("parse rendered manifest"));
}

#[then("the dependencies are \"{names}\"")]
fn then_dependencies(world: &mut ManifestWorld, names: String) {
    let actual: Vec<&str> = world
        .manifest()
        .dependencies()
        .iter()
        .map(PackageName::as_str)
        .collect();
    assert_eq!(actual.join(", "), names);
}

#[then("parsing fails because includes are nested too deeply")]
fn then_depth_exceeded(world: &mut ManifestWorld) {
    assert!(matches!(
        world.error(),
        ConfigError::IncludeDepthExceeded { .. }
    ));
}

#[then("the \"{variant}\" variant builds with options \"{expected}\"")]
fn then_variant_options(world: &mut ManifestWorld, variant: String, expected: String) {
    let recipe = world
        .manifest()
        .find_build_recipe("zlib", Platform::Linux)
        .expect("zlib recipe");
    let built = recipe
        .variants_for(Platform::Linux)
        .into_iter()
        .find(|v| v.name().to_string() == variant)
        .expect("variant present");
    let expected_options: BTreeMap<String, String> = expected
        .split(", ")
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect();
    assert_eq!(built.options(), &expected_options);
}

#[then("parsing fails because the default install files are ambiguous")]
fn then_ambiguous(world: &mut ManifestWorld) {
    assert!(matches!(
        world.error(),
        ConfigError::AmbiguousDefaultInstall { .. }
    ));
}

#[then("the rendered manifest has the same dependencies")]
fn then_same_dependencies(world: &mut ManifestWorld) {
    let rendered = world.rendered.as_ref().expect("rendered manifest");
    assert_eq!(rendered.dependencies(), world.manifest().dependencies());
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/manifest.feature", name = "Included documents are merged")]
fn scenario_includes_merged(world: ManifestWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/manifest.feature",
    name = "Includes nested too deeply are rejected"
)]
fn scenario_include_depth(world: ManifestWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/manifest.feature",
    name = "Variant options override the recipe defaults"
)]
fn scenario_variant_options(world: ManifestWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/manifest.feature",
    name = "Default install files conflict with named variants"
)]
fn scenario_ambiguous_install(world: ManifestWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/manifest.feature",
    name = "A rendered manifest parses to the same dependencies"
)]
fn scenario_render_round_trip(world: ManifestWorld) {
    let _ = world;
}
