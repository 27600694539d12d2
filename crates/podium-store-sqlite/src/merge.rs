//! The alias-merge engine and meet unification.
//!
//! Merges retire one identity into another without losing or duplicating
//! performances. Each merge is a single transaction: the athlete moves and
//! performance repointing either all land together with the ledger entry
//! and the retired row's deletion, or none do.

use chrono::Utc;
use podium_core::normalize::normalize_name;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  encode::{encode_dt, encode_uuid},
  Error, Result, SqliteStore,
};

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What one merge did; all zeros for a same-id no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
  /// Athlete rows repointed wholesale (no conflicting link on the canonical
  /// side).
  pub moved_athletes:          usize,
  /// Athlete rows deleted after their performances were repointed onto the
  /// canonical side's existing link.
  pub merged_athletes:         usize,
  pub repointed_performances:  usize,
}

enum MergeRun {
  Done(MergeOutcome),
  AliasMissing,
  CanonicalMissing,
}

// ─── Merges ──────────────────────────────────────────────────────────────────

impl SqliteStore {
  /// Merge the `alias` person into `canonical`.
  ///
  /// For every athlete owned by the alias person: if the canonical person
  /// already has an athlete at the same club, repoint that athlete's
  /// performances and delete the redundant row; otherwise repoint the
  /// athlete's `person_id` directly (cheap move, no performance rewrite).
  /// Finally the alias's normalized name is appended to the ledger and the
  /// retired person row deleted.
  pub async fn merge_person(
    &self,
    canonical_id: Uuid,
    alias_id: Uuid,
  ) -> Result<MergeOutcome> {
    if canonical_id == alias_id {
      return Ok(MergeOutcome::default());
    }

    let canonical_str = encode_uuid(canonical_id);
    let alias_str = encode_uuid(alias_id);
    let at_str = encode_dt(Utc::now());

    let run: MergeRun = self
      .connection()
      .call(move |conn| {
        let tx = conn.transaction()?;

        let alias_norm: Option<String> = tx
          .query_row(
            "SELECT normalized_name FROM persons WHERE person_id = ?1",
            rusqlite::params![alias_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(alias_norm) = alias_norm else {
          return Ok(MergeRun::AliasMissing);
        };

        let canonical_exists: bool = tx
          .query_row(
            "SELECT 1 FROM persons WHERE person_id = ?1",
            rusqlite::params![canonical_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !canonical_exists {
          return Ok(MergeRun::CanonicalMissing);
        }

        let alias_athletes: Vec<(String, Option<String>)> = {
          let mut stmt = tx.prepare(
            "SELECT athlete_id, club_id FROM athletes WHERE person_id = ?1",
          )?;
          let rows = stmt
            .query_map(rusqlite::params![alias_str], |row| {
              Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };

        let mut outcome = MergeOutcome::default();

        for (athlete_id, club_id) in alias_athletes {
          let existing: Option<String> = tx
            .query_row(
              "SELECT athlete_id FROM athletes
               WHERE person_id = ?1 AND club_id IS ?2",
              rusqlite::params![canonical_str, club_id],
              |row| row.get(0),
            )
            .optional()?;

          match existing {
            Some(canonical_athlete) => {
              let repointed = tx.execute(
                "UPDATE performances SET athlete_id = ?1 WHERE athlete_id = ?2",
                rusqlite::params![canonical_athlete, athlete_id],
              )?;
              tx.execute(
                "DELETE FROM athletes WHERE athlete_id = ?1",
                rusqlite::params![athlete_id],
              )?;
              outcome.merged_athletes += 1;
              outcome.repointed_performances += repointed;
            }
            None => {
              tx.execute(
                "UPDATE athletes SET person_id = ?1 WHERE athlete_id = ?2",
                rusqlite::params![canonical_str, athlete_id],
              )?;
              outcome.moved_athletes += 1;
            }
          }
        }

        tx.execute(
          "INSERT OR IGNORE INTO person_aliases
             (alias_normalized, canonical_id, recorded_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![alias_norm, canonical_str, at_str],
        )?;
        tx.execute(
          "DELETE FROM persons WHERE person_id = ?1",
          rusqlite::params![alias_str],
        )?;

        tx.commit()?;
        Ok(MergeRun::Done(outcome))
      })
      .await?;

    match run {
      MergeRun::Done(outcome) => Ok(outcome),
      MergeRun::AliasMissing => Err(Error::PersonNotFound(alias_id)),
      MergeRun::CanonicalMissing => Err(Error::PersonNotFound(canonical_id)),
    }
  }

  /// Merge the `alias` club into `canonical`. Structurally identical to
  /// [`Self::merge_person`] with person and club swapped.
  pub async fn merge_club(
    &self,
    canonical_id: Uuid,
    alias_id: Uuid,
  ) -> Result<MergeOutcome> {
    if canonical_id == alias_id {
      return Ok(MergeOutcome::default());
    }

    let canonical_str = encode_uuid(canonical_id);
    let alias_str = encode_uuid(alias_id);
    let at_str = encode_dt(Utc::now());

    let run: MergeRun = self
      .connection()
      .call(move |conn| {
        let tx = conn.transaction()?;

        let alias_norm: Option<String> = tx
          .query_row(
            "SELECT normalized_name FROM clubs WHERE club_id = ?1",
            rusqlite::params![alias_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(alias_norm) = alias_norm else {
          return Ok(MergeRun::AliasMissing);
        };

        let canonical_exists: bool = tx
          .query_row(
            "SELECT 1 FROM clubs WHERE club_id = ?1",
            rusqlite::params![canonical_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !canonical_exists {
          return Ok(MergeRun::CanonicalMissing);
        }

        let alias_athletes: Vec<(String, String)> = {
          let mut stmt = tx.prepare(
            "SELECT athlete_id, person_id FROM athletes WHERE club_id = ?1",
          )?;
          let rows = stmt
            .query_map(rusqlite::params![alias_str], |row| {
              Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };

        let mut outcome = MergeOutcome::default();

        for (athlete_id, person_id) in alias_athletes {
          let existing: Option<String> = tx
            .query_row(
              "SELECT athlete_id FROM athletes
               WHERE person_id = ?1 AND club_id IS ?2",
              rusqlite::params![person_id, canonical_str],
              |row| row.get(0),
            )
            .optional()?;

          match existing {
            Some(canonical_athlete) => {
              let repointed = tx.execute(
                "UPDATE performances SET athlete_id = ?1 WHERE athlete_id = ?2",
                rusqlite::params![canonical_athlete, athlete_id],
              )?;
              tx.execute(
                "DELETE FROM athletes WHERE athlete_id = ?1",
                rusqlite::params![athlete_id],
              )?;
              outcome.merged_athletes += 1;
              outcome.repointed_performances += repointed;
            }
            None => {
              tx.execute(
                "UPDATE athletes SET club_id = ?1 WHERE athlete_id = ?2",
                rusqlite::params![canonical_str, athlete_id],
              )?;
              outcome.moved_athletes += 1;
            }
          }
        }

        tx.execute(
          "INSERT OR IGNORE INTO club_aliases
             (alias_normalized, canonical_id, recorded_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![alias_norm, canonical_str, at_str],
        )?;
        tx.execute(
          "DELETE FROM clubs WHERE club_id = ?1",
          rusqlite::params![alias_str],
        )?;

        tx.commit()?;
        Ok(MergeRun::Done(outcome))
      })
      .await?;

    match run {
      MergeRun::Done(outcome) => Ok(outcome),
      MergeRun::AliasMissing => Err(Error::ClubNotFound(alias_id)),
      MergeRun::CanonicalMissing => Err(Error::ClubNotFound(canonical_id)),
    }
  }

  // ── Meet unification ──────────────────────────────────────────────────────

  /// Merge meets that share a normalized `(name, year)` discovered through
  /// different sources. The earliest-created row of each group survives;
  /// performances of the losers are repointed before the rows are deleted.
  /// Returns the number of meets folded away.
  pub async fn unify_meets(&self) -> Result<usize> {
    let merged: usize = self
      .connection()
      .call(|conn| {
        let tx = conn.transaction()?;

        let groups: Vec<(String, i64)> = {
          let mut stmt = tx.prepare(
            "SELECT normalized_name, year FROM meets
             WHERE year IS NOT NULL AND normalized_name != ''
             GROUP BY normalized_name, year
             HAVING COUNT(*) > 1",
          )?;
          let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };

        let mut merged = 0usize;

        for (normalized_name, year) in groups {
          let ids: Vec<String> = {
            let mut stmt = tx.prepare(
              "SELECT meet_id FROM meets
               WHERE normalized_name = ?1 AND year = ?2
               ORDER BY created_at, meet_id",
            )?;
            let rows = stmt
              .query_map(rusqlite::params![normalized_name, year], |row| {
                row.get(0)
              })?
              .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
          };

          let Some((survivor, losers)) = ids.split_first() else {
            continue;
          };

          for loser in losers {
            tx.execute(
              "UPDATE performances SET meet_id = ?1 WHERE meet_id = ?2",
              rusqlite::params![survivor, loser],
            )?;
            tx.execute(
              "DELETE FROM meets WHERE meet_id = ?1",
              rusqlite::params![loser],
            )?;
            merged += 1;
          }
        }

        tx.commit()?;
        Ok(merged)
      })
      .await?;

    Ok(merged)
  }

  /// Resolve a display name to the live canonical id, following the alias
  /// ledger first — the lookup every merge applier starts from.
  pub async fn resolve_person_name(&self, name: &str) -> Result<Option<Uuid>> {
    let normalized = normalize_name(name);
    if let Some(id) = self
      .alias_entry(podium_core::alias::AliasKind::Person, &normalized)
      .await?
    {
      return Ok(Some(id));
    }
    Ok(self.person_by_normalized(&normalized).await?.map(|p| p.person_id))
  }

  pub async fn resolve_club_name(&self, name: &str) -> Result<Option<Uuid>> {
    let normalized = normalize_name(name);
    if let Some(id) = self
      .alias_entry(podium_core::alias::AliasKind::Club, &normalized)
      .await?
    {
      return Ok(Some(id));
    }
    Ok(self.club_by_normalized(&normalized).await?.map(|c| c.club_id))
  }
}
