//! SQLite backend for the Podium canonical store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The store is the sole owner of entity
//! lifetime; the per-run identity cache in `podium-ingest` holds non-owning
//! lookup views hydrated from here.

mod encode;
mod gold;
mod merge;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use gold::GoldReport;
pub use merge::MergeOutcome;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
