//! Definition store — reads launchd job definitions from the per-domain
//! property-list directories.
//!
//! Public API surface:
//! - [`layout`] — [`DomainLayout`] (domain → directory)
//! - [`reader`] — [`DefinitionStore`] (list / find with mtime cache)
//! - [`error`] — [`StoreError`]

pub mod error;
pub mod layout;
mod parse;
pub mod reader;

pub use error::StoreError;
pub use layout::DomainLayout;
pub use reader::DefinitionStore;
