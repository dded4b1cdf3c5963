//! Tracing subscriber setup.

use revshare_types::{LogFormat, Result, RevshareError};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global `fmt` subscriber.
///
/// Honours `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
///
/// # Errors
/// Returns [`RevshareError::Configuration`] if the filter does not parse or
/// a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .map_err(|e| RevshareError::Configuration(format!("invalid log filter: {e}")))?;

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };
    installed.map_err(|e| RevshareError::Configuration(format!("tracing init failed: {e}")))?;

    tracing::debug!(?format, "Tracing initialised");
    Ok(())
}
