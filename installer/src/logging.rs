//! Diagnostic logging through `tracing`.
//!
//! Diagnostics from library code (`debug!` command lines, `trace!` file
//! copies) are shown according to the `-v`/`-q` flags, or `RUST_LOG` when it
//! is set. User-facing progress does not go through here; see
//! [`crate::output`].

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Level selected by the verbosity flags.
///
/// `quiet` shows errors only. Otherwise each `-v` raises the level from
/// warnings through info and debug to trace.
#[must_use]
pub const fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Filter for the flags. Directives in a non-empty `RUST_LOG` take its place.
#[must_use]
pub fn filter_for(verbosity: u8, quiet: bool) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level_for(verbosity, quiet).into())
        .from_env_lossy()
}

/// Install a stderr subscriber filtered by [`filter_for`].
///
/// Installing twice keeps the first subscriber.
pub fn init(verbosity: u8, quiet: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .without_time()
        .with_env_filter(filter_for(verbosity, quiet));
    if subscriber.try_init().is_err() {
        tracing::debug!("subscriber already installed");
    }
}
