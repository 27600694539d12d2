//! Error type for `podium-ingest`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] podium_core::Error),

  #[error("store error: {0}")]
  Store(#[from] podium_store_sqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("raw file {path:?} is not valid: {reason}")]
  BadRawFile { path: PathBuf, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
