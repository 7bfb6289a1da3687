//! Diagnostic logging setup.
//!
//! Library code logs through `tracing` macros. The binary installs a stderr
//! subscriber filtered by `RUST_LOG` (default `info`); stage summaries are
//! printed to stdout separately by [`crate::output`].

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Fails if one is already installed or the
/// filter in `RUST_LOG` doesn't parse.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()?;

    Ok(())
}
