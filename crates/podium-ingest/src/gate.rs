//! The file ingestion gate — idempotency keyed on `(path, content hash)`.
//!
//! A file is skipped only on an exact match of both, so a corrected file
//! under the same path reloads automatically. Marking happens strictly
//! after the file's insert batch commits, preserving the at-least-once
//! guarantee: a crash mid-file leaves the marker unwritten.

use std::path::Path;

use podium_store_sqlite::SqliteStore;
use sha2::{Digest, Sha256};

use crate::Result;

pub struct IngestGate {
  store: SqliteStore,
}

impl IngestGate {
  pub fn new(store: SqliteStore) -> Self { Self { store } }

  /// SHA-256 hex digest of the file's full contents.
  pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
  }

  pub async fn is_processed(&self, path: &Path, hash: &str) -> Result<bool> {
    Ok(
      self
        .store
        .file_processed(&path.to_string_lossy(), hash)
        .await?,
    )
  }

  /// Record the file as durably loaded. Called only after its batch commit.
  pub async fn mark_processed(&self, path: &Path, hash: &str) -> Result<()> {
    self
      .store
      .mark_file_processed(&path.to_string_lossy(), hash)
      .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_is_content_sensitive() {
    let a = IngestGate::content_hash(b"rows");
    let b = IngestGate::content_hash(b"rows!");
    assert_ne!(a, b);
    assert_eq!(a.len(), 64);
    assert_eq!(a, IngestGate::content_hash(b"rows"));
  }
}
