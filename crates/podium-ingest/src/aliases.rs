//! Applying curated alias maps against the store.
//!
//! Inputs are human-confirmed `{canonical: [aliases]}` documents. Applying
//! the same file twice is a no-op: the ledger lookup short-circuits every
//! alias that was already routed.

use std::path::Path;

use podium_core::{
  alias::{AliasKind, AliasMap},
  normalize::normalize_name,
};
use podium_store_sqlite::SqliteStore;
use tracing::{debug, info};

use crate::Result;

/// What one apply pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AliasApplyReport {
  /// Aliases whose identity was already materialized and had to be merged.
  pub merged:      usize,
  /// Aliases routed by a ledger entry alone — the duplicate never existed.
  pub ledger_only: usize,
  /// Aliases already present in the ledger from an earlier apply.
  pub skipped:     usize,
}

/// Read and validate a curated alias file.
pub async fn load_alias_file(path: &Path) -> Result<AliasMap> {
  let json = tokio::fs::read_to_string(path).await?;
  Ok(AliasMap::from_json(&json)?)
}

/// Apply one alias map to the store.
///
/// Per alias: a ledger hit means an earlier apply already routed it, skip.
/// Otherwise the canonical identity is resolved (created if this is its
/// first mention anywhere), and either the materialized duplicate is merged
/// away or, if the alias name was never sighted, a ledger entry alone is
/// written so the next sighting resolves straight through.
pub async fn apply_alias_map(
  store: &SqliteStore,
  kind: AliasKind,
  map: &AliasMap,
) -> Result<AliasApplyReport> {
  let mut report = AliasApplyReport::default();

  for (canonical_name, alias_name) in map.entries() {
    let alias_norm = normalize_name(alias_name);

    if store.alias_entry(kind, &alias_norm).await?.is_some() {
      report.skipped += 1;
      continue;
    }

    let canonical_id = match kind {
      AliasKind::Person => match store.resolve_person_name(canonical_name).await? {
        Some(id) => id,
        None => store.insert_person(canonical_name, None).await?.person_id,
      },
      AliasKind::Club => match store.resolve_club_name(canonical_name).await? {
        Some(id) => id,
        None => store.insert_club(canonical_name).await?.club_id,
      },
    };

    let materialized = match kind {
      AliasKind::Person => store
        .person_by_normalized(&alias_norm)
        .await?
        .map(|p| p.person_id),
      AliasKind::Club => store
        .club_by_normalized(&alias_norm)
        .await?
        .map(|c| c.club_id),
    };

    match materialized {
      Some(alias_id) if alias_id != canonical_id => {
        let outcome = match kind {
          AliasKind::Person => store.merge_person(canonical_id, alias_id).await?,
          AliasKind::Club => store.merge_club(canonical_id, alias_id).await?,
        };
        debug!(
          kind = kind.as_str(),
          alias = alias_name,
          canonical = canonical_name,
          moved = outcome.moved_athletes,
          merged = outcome.merged_athletes,
          repointed = outcome.repointed_performances,
          "merged duplicate identity"
        );
        report.merged += 1;
      }
      _ => {
        // Never sighted (or already the canonical row itself): ledger entry
        // alone routes all future sightings.
        store.append_alias(kind, &alias_norm, canonical_id).await?;
        report.ledger_only += 1;
      }
    }
  }

  info!(
    kind = kind.as_str(),
    merged = report.merged,
    ledger_only = report.ledger_only,
    skipped = report.skipped,
    "alias map applied"
  );
  Ok(report)
}
