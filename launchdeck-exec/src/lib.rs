//! Mutation execution: the only path through which anything here changes
//! the service manager's state.
//!
//! Reads go straight through `launchdeck-probe`; every write funnels through
//! [`Executor::apply`], which serializes work per label, refuses impossible
//! transitions, and reports one of three outcomes — success, a manager
//! rejection, or a verification timeout.

pub mod error;
pub mod executor;
pub mod policy;
pub mod transition;

pub use error::ExecError;
pub use executor::Executor;
pub use policy::VerifyPolicy;
pub use transition::expected_flag_after;
