use crate::error::{Error, Result};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over `level` when set.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Installs the global stderr subscriber. Stdout stays free for reports.
pub fn init(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| Error::Config(format!("failed to initialise logging: {}", e)))
}
