//! External process execution.
//!
//! Every external tool (git, cmake, the registry client, the Visual Studio
//! environment script) is invoked through [`CommandExecutor`], so the
//! orchestration logic can be tested with a stub executor.

use crate::error::{InstallerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Description of one external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    cwd: Option<Utf8PathBuf>,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl CommandSpec {
    /// Start describing an invocation of `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    /// Run `command` through the platform shell (`sh -c` or `cmd /C`).
    #[must_use]
    pub fn shell(command: &str) -> Self {
        if cfg!(windows) {
            Self::new("cmd").args(["/C", command])
        } else {
            Self::new("sh").args(["-c", command])
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: &Utf8Path) -> Self {
        self.cwd = Some(dir.to_owned());
        self
    }

    /// Add environment variables on top of the inherited environment.
    #[must_use]
    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Kill the process if it runs longer than `timeout`.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Program to run.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments, in order.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Working directory, if set.
    #[must_use]
    pub fn cwd(&self) -> Option<&Utf8Path> {
        self.cwd.as_deref()
    }

    /// Environment overrides.
    #[must_use]
    pub const fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Timeout, if set.
    #[must_use]
    pub const fn time_limit(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command and returns its captured output.
    ///
    /// A non-zero exit status is not an error at this level; callers decide
    /// how to report it.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be spawned or exceeds its
    /// timeout.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use deps_installer::process::{CommandExecutor, CommandSpec, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run(&CommandSpec::new("git").arg("--version"))?;
    /// assert!(output.status.success());
    /// # Ok::<(), deps_installer::error::InstallerError>(())
    /// ```
    fn run(&self, spec: &CommandSpec) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<Output> {
        tracing::debug!("running {spec}");
        let mut cmd = Command::new(spec.program());
        cmd.args(spec.arguments())
            .envs(spec.env_overrides())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = spec.cwd() {
            cmd.current_dir(dir.as_std_path());
        }

        let mut child = cmd.spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match spec.time_limit() {
            Some(limit) => {
                if let Some(status) = child.wait_timeout(limit)? {
                    status
                } else {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(InstallerError::CommandTimeout {
                        command: spec.to_string(),
                        seconds: limit.as_secs(),
                    });
                }
            }
            None => child.wait()?,
        };

        let output = Output {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        };
        tracing::trace!(
            "{} exited with {:?}: {}",
            spec.program(),
            output.status.code(),
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(output)
    }
}

type Drain = Option<thread::JoinHandle<Vec<u8>>>;

/// Read a pipe to the end on its own thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Drain {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = reader.read_to_end(&mut buffer);
            buffer
        })
    })
}

fn collect(handle: Drain) -> Vec<u8> {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Extracts a human-readable message from a failed command's output.
///
/// Prefers stderr; falls back to stdout, then to the exit status.
#[must_use]
pub fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim().to_owned();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        return stdout.trim().to_owned();
    }
    match output.status.code() {
        Some(code) => format!("exited with status {code}"),
        None => "terminated by signal".to_owned(),
    }
}

/// Captured stdout as a trimmed string.
#[must_use]
pub fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}

/// Returns true when `spec` runs and exits successfully.
#[must_use]
pub fn command_succeeds(executor: &dyn CommandExecutor, spec: &CommandSpec) -> bool {
    executor.run(spec).is_ok_and(|o| o.status.success())
}

/// Locate `program` on `PATH`.
///
/// On Windows the `.exe`, `.cmd` and `.bat` extensions are also tried.
#[must_use]
pub fn which(program: &str) -> Option<Utf8PathBuf> {
    let path = std::env::var_os("PATH")?;
    let extensions: &[&str] = if cfg!(windows) {
        &["", ".exe", ".cmd", ".bat"]
    } else {
        &[""]
    };
    std::env::split_paths(&path)
        .filter_map(|dir| Utf8PathBuf::try_from(dir).ok())
        .flat_map(|dir| {
            extensions
                .iter()
                .map(move |ext| dir.join(format!("{program}{ext}")))
        })
        .find(|candidate| candidate.is_file())
}
