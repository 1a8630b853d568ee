use launchdeck_core::types::{JobAction, JobKey};
use thiserror::Error;

/// Error surface for mutation execution. Note that a mutation the manager
/// rejects at runtime is not an error — that is [`MutationOutcome::Failed`] —
/// these are the cases where the request could not even be attempted.
///
/// [`MutationOutcome::Failed`]: launchdeck_core::types::MutationOutcome
#[derive(Debug, Error)]
pub enum ExecError {
    /// The action makes no sense from the job's current state. Nothing was
    /// issued to the manager.
    #[error("cannot {action} {key}: {reason}")]
    InvalidTransition {
        key: JobKey,
        action: JobAction,
        reason: String,
    },

    #[error("store error: {0}")]
    Store(#[from] launchdeck_store::StoreError),

    #[error("probe error: {0}")]
    Probe(#[from] launchdeck_probe::ProbeError),

    #[error("background task failed: {0}")]
    Join(String),
}

pub(crate) fn invalid(key: &JobKey, action: JobAction, reason: impl Into<String>) -> ExecError {
    ExecError::InvalidTransition {
        key: key.clone(),
        action,
        reason: reason.into(),
    }
}
