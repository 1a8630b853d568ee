//! Error types for launchdeck-probe.
//!
//! Any `ProbeError` means the live side of the view is unknowable right now;
//! callers degrade to a definitions-only view rather than crash.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The external command could not be executed at all (binary missing,
    /// exec failure).
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The service manager was reached but refused the query.
    #[error("service manager unavailable: {details}")]
    Unavailable { details: String },
}
