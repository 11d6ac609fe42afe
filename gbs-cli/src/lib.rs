//! Library half of the `gbs` command: configuration, commands and errors.

pub mod commands;
pub mod config;
pub mod error;

pub use config::{Backend, RunConfig, RunFlags};
pub use error::CliError;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the stderr logger.
///
/// The filter comes from `RUST_LOG`, then `GBS_LOG`, then `warn`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("GBS_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
