//! Common utilities for the command line interface.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub mod args;
pub mod config;
pub mod explain;
pub mod inspect;
pub mod output;
pub mod scan;
pub mod timeline;
pub mod ui;

/// Picks the log level from the `--quiet` and `--debug` flags.
///
/// # Example
///
/// ```
/// use tracing::level_filters::LevelFilter;
/// use undisposed::log_level;
/// assert_eq!(log_level(true, true), LevelFilter::OFF);
/// assert_eq!(log_level(false, true), LevelFilter::DEBUG);
/// ```
pub fn log_level(quiet: bool, debug: bool) -> LevelFilter {
    if quiet {
        LevelFilter::OFF
    } else if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Installs the stderr subscriber. `RUST_LOG` overrides the flags unless quiet.
pub fn init_tracing(quiet: bool, debug: bool) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false);
    let _ = match EnvFilter::try_from_default_env() {
        Ok(filter) if !quiet => builder.with_env_filter(filter).try_init(),
        _ => builder.with_max_level(log_level(quiet, debug)).try_init(),
    };
}
