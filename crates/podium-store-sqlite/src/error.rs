//! Error type for `podium-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] podium_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// Attempted to merge into or from an identity that is not in the store.
  #[error("person not found: {0}")]
  PersonNotFound(uuid::Uuid),

  #[error("club not found: {0}")]
  ClubNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
