//! CMake command lines for configuring and building a variant.

use crate::manifest::{BuildType, BuildVariant};
use crate::process::CommandSpec;
use camino::Utf8Path;

/// `cmake -S <src> -DCMAKE_INSTALL_PREFIX=<install> -D<K>=<V>...
/// -DCMAKE_BUILD_TYPE=<type> <generator args>`.
#[must_use]
pub fn configure_command(
    src_dir: &Utf8Path,
    install_dir: &Utf8Path,
    variant: &BuildVariant,
    generator_args: &[String],
) -> CommandSpec {
    CommandSpec::new("cmake")
        .args(["-S", src_dir.as_str()])
        .arg(format!("-DCMAKE_INSTALL_PREFIX={install_dir}"))
        .args(variant.options().iter().map(|(key, value)| format!("-D{key}={value}")))
        .arg(format!(
            "-DCMAKE_BUILD_TYPE={}",
            variant.name().build_type.cmake_name()
        ))
        .args(generator_args.iter().cloned())
}

/// `cmake --build . --config <type> --target install [-j<N>]`.
///
/// The jobs flag is left out when `jobs` is 1 or less.
#[must_use]
pub fn build_command(build_type: BuildType, jobs: usize) -> CommandSpec {
    let spec = CommandSpec::new("cmake").args([
        "--build",
        ".",
        "--config",
        build_type.cmake_name(),
        "--target",
        "install",
    ]);
    if jobs > 1 {
        spec.arg(format!("-j{jobs}"))
    } else {
        spec
    }
}
