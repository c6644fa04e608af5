//! Conan 2 command-line client.
//!
//! The command is located once per invocation: `conan` on `PATH`, or the
//! Python module through `python -m conan` when only the module is
//! installed. Only Conan 2 or later is accepted.

use super::{RegistryBinary, RegistryClient};
use crate::error::{InstallerError, Result};
use crate::manifest::RegistryQuery;
use crate::process::{CommandExecutor, CommandSpec, failure_message, stdout_text, which};
use camino::Utf8PathBuf;
use serde_json::Value;
use std::collections::BTreeMap;

/// Oldest supported Conan major version.
pub const MIN_CONAN_MAJOR: u32 = 2;

const PYTHON: &str = if cfg!(windows) { "python" } else { "python3" };

/// Registry client driving the `conan` command.
pub struct ConanClient<'a> {
    executor: &'a dyn CommandExecutor,
    command: Vec<String>,
}

impl<'a> ConanClient<'a> {
    /// Locate Conan and check its version.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ToolchainNotFound`] if Conan is not
    /// installed or is older than version 2.
    pub fn discover(executor: &'a dyn CommandExecutor) -> Result<Self> {
        Self::discover_with(executor, |program| which(program).is_some())
    }

    /// Like [`ConanClient::discover`], with a custom `PATH` lookup.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ToolchainNotFound`] if Conan is not
    /// installed or is older than version 2.
    pub fn discover_with(
        executor: &'a dyn CommandExecutor,
        on_path: impl Fn(&str) -> bool,
    ) -> Result<Self> {
        let command = if on_path("conan") {
            vec!["conan".to_owned()]
        } else if python_has_conan(executor) {
            vec![PYTHON.to_owned(), "-m".to_owned(), "conan".to_owned()]
        } else {
            return Err(InstallerError::ToolchainNotFound {
                reason: "Conan not found; install it directly or with pip".to_owned(),
            });
        };

        let client = Self { executor, command };
        let output = client.executor.run(&client.spec(["--version"]))?;
        let reported = stdout_text(&output);
        match parse_version(&reported) {
            Some(version) if version.first().is_some_and(|major| *major >= MIN_CONAN_MAJOR) => {
                tracing::debug!("using {reported} via `{}`", client.command.join(" "));
                Ok(client)
            }
            _ => Err(InstallerError::ToolchainNotFound {
                reason: format!(
                    "Conan {MIN_CONAN_MAJOR} or later is required, found `{reported}`"
                ),
            }),
        }
    }

    fn spec<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (program, prefix) = match self.command.split_first() {
            Some((program, prefix)) => (program.as_str(), prefix),
            None => ("conan", &[][..]),
        };
        CommandSpec::new(program)
            .args(prefix.iter().cloned())
            .args(args)
    }

    fn run_json(
        &self,
        query: &RegistryQuery,
        operation: &'static str,
        spec: &CommandSpec,
    ) -> Result<Vec<RegistryBinary>> {
        let output = self.executor.run(spec)?;
        if !output.status.success() {
            return Err(InstallerError::Registry {
                package: query.reference(),
                operation,
                message: failure_message(&output),
            });
        }
        parse_packages_json(query, &String::from_utf8_lossy(&output.stdout)).map_err(|reason| {
            InstallerError::Registry {
                package: query.reference(),
                operation,
                message: reason,
            }
        })
    }
}

fn python_has_conan(executor: &dyn CommandExecutor) -> bool {
    crate::process::command_succeeds(
        executor,
        &CommandSpec::new(PYTHON).args(["-c", "import conan"]),
    )
}

fn with_filter(spec: CommandSpec, query: &RegistryQuery) -> CommandSpec {
    match &query.filter {
        Some(filter) => spec.args(["-p", filter.as_str()]),
        None => spec,
    }
}

impl RegistryClient for ConanClient<'_> {
    fn list(&self, query: &RegistryQuery) -> Result<Vec<RegistryBinary>> {
        let pattern = format!("{}:*", query.reference());
        let spec = with_filter(self.spec(["list", "-c", "-f", "json", pattern.as_str()]), query);
        self.run_json(query, "list", &spec)
    }

    fn download(&self, query: &RegistryQuery) -> Result<Vec<RegistryBinary>> {
        let reference = query.reference();
        let spec = with_filter(
            self.spec([
                "download",
                "-r",
                query.remote.as_str(),
                reference.as_str(),
                "-f",
                "json",
            ]),
            query,
        );
        self.run_json(query, "download", &spec)
    }

    fn cache_path(&self, binary: &RegistryBinary) -> Result<Utf8PathBuf> {
        let reference = binary.reference();
        let output = self
            .executor
            .run(&self.spec(["cache", "path", reference.as_str()]))?;
        let failed = |message: String| InstallerError::Registry {
            package: reference.clone(),
            operation: "cache path",
            message,
        };
        if !output.status.success() {
            return Err(failed(failure_message(&output)));
        }
        stdout_text(&output)
            .split_whitespace()
            .next()
            .map(Utf8PathBuf::from)
            .ok_or_else(|| failed("no path reported".to_owned()))
    }
}

/// Parse `Conan version X.Y.Z` into its numeric components.
#[must_use]
pub fn parse_version(text: &str) -> Option<Vec<u32>> {
    let mut tokens = text.split_whitespace();
    if tokens.next() != Some("Conan") || tokens.next() != Some("version") {
        return None;
    }
    let version: Vec<u32> = tokens
        .next()?
        .split('.')
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    (version.len() >= 3).then_some(version)
}

/// Parse the JSON printed by `conan list` and `conan download`.
///
/// The binaries live under `"Local Cache"` → `<name>/<version>` →
/// `revisions` → `packages`; a cache entry reporting `error` has none.
///
/// # Errors
///
/// Returns a description of the problem if the text is not JSON of the
/// expected shape.
pub fn parse_packages_json(
    query: &RegistryQuery,
    text: &str,
) -> std::result::Result<Vec<RegistryBinary>, String> {
    let document: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let cache = document
        .get("Local Cache")
        .ok_or_else(|| "missing \"Local Cache\" section".to_owned())?;
    if cache.get("error").is_some() {
        return Ok(Vec::new());
    }
    let Some(revisions) = cache
        .get(query.reference())
        .and_then(|recipe| recipe.get("revisions"))
        .and_then(Value::as_object)
    else {
        return Ok(Vec::new());
    };

    let mut binaries = Vec::new();
    for (revision, body) in revisions {
        let Some(packages) = body.get("packages").and_then(Value::as_object) else {
            continue;
        };
        for (package_id, package) in packages {
            let info = package.get("info");
            binaries.push(RegistryBinary {
                name: query.name.to_string(),
                version: query.version.to_string(),
                revision: revision.clone(),
                package_id: package_id.clone(),
                settings: string_map(info.and_then(|i| i.get("settings"))),
                options: string_map(info.and_then(|i| i.get("options"))),
            });
        }
    }
    Ok(binaries)
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .map(|(key, value)| {
                    let text = value
                        .as_str()
                        .map_or_else(|| value.to_string(), str::to_owned);
                    (key.clone(), text)
                })
                .collect()
        })
        .unwrap_or_default()
}
