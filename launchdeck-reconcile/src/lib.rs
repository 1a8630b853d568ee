//! Pure reconciliation of on-disk definitions against live manager state.
//!
//! No I/O happens here. Callers hand in whatever slice of definitions and
//! live statuses they gathered; this crate merges them key by key, assigns
//! each job a [`ConsistencyFlag`], and can diff two such snapshots.
//!
//! [`ConsistencyFlag`]: launchdeck_core::types::ConsistencyFlag

pub mod attribution;
pub mod diff;
pub mod reconcile;

pub use attribution::attribute;
pub use diff::{diff, FlagTransition};
pub use reconcile::{flag_for, reconcile};
