//! Incremental loading of scraped raw files into the canonical store.
//!
//! The pieces fit together as one pipeline: the [`gate::IngestGate`] decides
//! whether a file is new work, the [`cache::IdentityCache`] resolves every
//! name to a persisted id, the [`aliases`] module applies curated merges,
//! and the [`loader::Loader`] turns raw rows into duplicate-free
//! performances, one transaction per file.

pub mod aliases;
pub mod cache;
pub mod error;
pub mod gate;
pub mod loader;

pub use error::{Error, Result};
pub use loader::{LoadReport, Loader};

#[cfg(test)]
mod tests;
