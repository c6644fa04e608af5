//! Dependency installer CLI entrypoint.
//!
//! Reads the dependency manifest and downloads, builds, or packages the
//! selected dependencies into the project's dependencies directory. Also
//! lists what is available, configures the current project with CMake, and
//! locates `vcvars64.bat`.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use deps_installer::archive::download::HttpDownloader;
use deps_installer::archive::extraction::ZipExtractor;
use deps_installer::build::BuildOptions;
use deps_installer::cli::{
    BuildArgs, Cli, Command, ConfigureArgs, DownloadArgs, FindVcvarsArgs, ListArgs, ProjectPaths,
    ToolchainArgs, validate_generator,
};
use deps_installer::configure::{ProjectConfig, configure_project};
use deps_installer::error::{Action, InstallerError, Result};
use deps_installer::list::{ListFilter, run_list};
use deps_installer::logging;
use deps_installer::manifest::DependencyManifest;
use deps_installer::output::{
    success_message, write_descriptors, write_stderr_line, write_stdout_line,
};
use deps_installer::pipeline::{Collaborators, PipelineContext, run_pipeline};
use deps_installer::platform::Platform;
use deps_installer::process::{CommandExecutor, SystemCommandExecutor};
use deps_installer::toolchain::{PlatformInfo, ToolchainResolver};
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbosity, cli.quiet);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &SystemCommandExecutor, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(
    cli: &Cli,
    executor: &dyn CommandExecutor,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let cwd = current_dir()?;
    match cli.action() {
        Command::Download(args) => run_download(cli, &args, &cwd, executor, stdout, stderr),
        Command::Build(args) => {
            run_build(cli, Action::Build, &args, &cwd, executor, stdout, stderr)
        }
        Command::Package(args) => {
            run_build(cli, Action::Package, &args, &cwd, executor, stdout, stderr)
        }
        Command::List(args) => run_list_action(&args, &cwd, stdout),
        Command::Configure(args) => run_configure(cli, &args, &cwd, executor, stderr),
        Command::FindVcvars(args) => run_find_vcvars(&args, executor, stdout),
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|e| InstallerError::StagingFailed {
        reason: format!("current directory is not valid UTF-8: {e}"),
    })
}

fn load_manifest(paths: &ProjectPaths) -> Result<DependencyManifest> {
    tracing::debug!("reading manifest {}", paths.deps_file);
    Ok(DependencyManifest::parse(&paths.deps_file)?)
}

fn run_download(
    cli: &Cli,
    args: &DownloadArgs,
    cwd: &Utf8Path,
    executor: &dyn CommandExecutor,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let paths = args.manifest.resolve(cwd);
    let manifest = load_manifest(&paths)?;
    let package_dir = args
        .package_dir
        .as_ref()
        .map_or_else(|| paths.target_dir.clone(), |dir| cwd.join(dir));
    let build = BuildOptions::default();
    let context = PipelineContext {
        action: Action::Download,
        packages: &args.packages,
        target_dir: &paths.target_dir,
        package_dir: &package_dir,
        build_root: &paths.build_root,
        clean: args.clean,
        quiet: cli.quiet,
        build: &build,
    };
    execute(&manifest, &context, executor, stdout, stderr)
}

fn run_build(
    cli: &Cli,
    action: Action,
    args: &BuildArgs,
    cwd: &Utf8Path,
    executor: &dyn CommandExecutor,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let paths = args.manifest.resolve(cwd);
    let manifest = load_manifest(&paths)?;
    let platform = Platform::current();
    let platform_info = resolve_toolchain(&args.toolchain, platform, executor)?;
    let build = BuildOptions {
        platform,
        generator: args.toolchain.generator,
        platform_info,
        jobs: args.jobs,
        clean_build: args.clean_build,
        skip_download_source: args.skip_download_source,
    };
    let context = PipelineContext {
        action,
        packages: &args.packages,
        target_dir: &paths.target_dir,
        package_dir: &paths.target_dir,
        build_root: &paths.build_root,
        clean: args.clean,
        quiet: cli.quiet,
        build: &build,
    };
    execute(&manifest, &context, executor, stdout, stderr)
}

fn resolve_toolchain(
    toolchain: &ToolchainArgs,
    platform: Platform,
    executor: &dyn CommandExecutor,
) -> Result<PlatformInfo> {
    validate_generator(toolchain.generator, platform)?;
    ToolchainResolver::new(executor)
        .with_platform(platform)
        .with_vs_path(toolchain.vs_path.clone())
        .resolve(toolchain.generator)
}

fn execute(
    manifest: &DependencyManifest,
    context: &PipelineContext<'_>,
    executor: &dyn CommandExecutor,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let collaborators = Collaborators {
        executor,
        downloader: &HttpDownloader,
        extractor: &ZipExtractor,
        registry: None,
    };
    let report = run_pipeline(manifest, context, &collaborators, stderr)?;
    if context.action == Action::Package {
        if !context.quiet {
            write_stderr_line(stderr, "");
        }
        write_descriptors(stdout, &report.packaged)?;
    } else if !context.quiet {
        write_stderr_line(stderr, success_message(&report.installed, context.target_dir));
    }
    Ok(())
}

fn run_list_action(args: &ListArgs, cwd: &Utf8Path, stdout: &mut dyn Write) -> Result<()> {
    let paths = args.manifest.resolve(cwd);
    let manifest = load_manifest(&paths)?;
    let platform = args.platform.unwrap_or_else(Platform::current);
    let filter = ListFilter::from_flags(args.downloadable_only, args.buildable_only);
    run_list(&manifest, platform, filter, stdout)
}

fn run_configure(
    cli: &Cli,
    args: &ConfigureArgs,
    cwd: &Utf8Path,
    executor: &dyn CommandExecutor,
    stderr: &mut dyn Write,
) -> Result<()> {
    let platform_info = resolve_toolchain(&args.toolchain, Platform::current(), executor)?;
    let config = ProjectConfig {
        source_dir: cwd.to_owned(),
        build_dir: cwd.join(&args.build_dir),
        build_type: args.build_type,
        generator: args.toolchain.generator,
        defines: args.defines.clone(),
        platform_info,
    };
    configure_project(executor, &config, cli.quiet, stderr)
}

fn run_find_vcvars(
    args: &FindVcvarsArgs,
    executor: &dyn CommandExecutor,
    stdout: &mut dyn Write,
) -> Result<()> {
    let found = ToolchainResolver::new(executor)
        .with_platform(Platform::Windows)
        .with_vs_path(args.vs_path.clone())
        .find_vcvars();
    match found {
        Some(path) => write_stdout_line(stdout, path),
        None => write_stdout_line(stdout, "vcvars64.bat not found."),
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}
