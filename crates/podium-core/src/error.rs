//! Error types for `podium-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("name is empty after normalization: {0:?}")]
  EmptyName(String),

  #[error("alias {0:?} normalizes to its own canonical name")]
  SelfAlias(String),

  #[error("alias {alias:?} is claimed by both {first:?} and {second:?}")]
  AmbiguousAlias {
    alias:  String,
    first:  String,
    second: String,
  },

  #[error("unknown gender: {0:?}")]
  UnknownGender(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
