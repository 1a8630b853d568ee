//! launchdeck core library — domain types, user settings, errors.
//!
//! Public API surface:
//! - [`types`] — labels, domains, definitions, live state, reconciled view
//! - [`error`] — [`ConfigError`]
//! - [`settings`] — load / save of `~/.launchdeck/config.yaml`

pub mod error;
pub mod settings;
pub mod types;

pub use error::ConfigError;
pub use settings::Settings;
pub use types::{
    ConsistencyFlag, DeclaredProperties, Domain, DomainTarget, JobAction, JobDefinition, JobKey,
    JobProperties, KeepAlive, Label, LiveStatus, MutationOutcome, MutationRequest, ReconciledJob,
};
