//! Error types for launchdeck-store.
//!
//! A single unparseable file is NOT an error here — it surfaces as a
//! `Malformed`-annotated entry in the listing. Only whole-domain problems
//! (unreadable directory, unexpected I/O) escape as `StoreError`.

use std::path::PathBuf;

use thiserror::Error;

use launchdeck_core::types::Domain;

/// Domain-level failures while listing definitions.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The domain directory exists but cannot be read (e.g. system domain
    /// without elevated privilege). The caller learns which domains are
    /// visible and degrades.
    #[error("access denied for {domain} domain directory {path}")]
    AccessDenied { domain: Domain, path: PathBuf },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
