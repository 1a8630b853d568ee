//! Live service state via `launchctl`.
//!
//! Everything here is read-only: `print` for the per-target service table,
//! `print-disabled` for persisted overrides. Any [`ProbeError`] means the
//! service manager could not be consulted and callers should fall back to a
//! definitions-only view rather than abort.

pub mod error;
pub mod launchctl;
pub mod probe;

mod parse;

pub use error::ProbeError;
pub use launchctl::{CmdOutput, Launchctl, SystemLaunchctl};
pub use probe::Probe;
