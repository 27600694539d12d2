//! The connector input contract: raw files and raw rows.
//!
//! Each source connector yields one [`RawFile`] per `(source, meet
//! [, sub-session])`, serialized as JSON into that source's output
//! directory. Rows are flat string maps; apparatus results follow the
//! `<apparatus>_score` / `<apparatus>_d` / `<apparatus>_rank` column
//! grammar. Nothing here interprets markup — that happened in the
//! connector.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ─── Column grammar ──────────────────────────────────────────────────────────

pub const COL_NAME: &str = "name";
pub const COL_CLUB: &str = "club";
pub const COL_SESSION: &str = "session";
pub const COL_LEVEL: &str = "level";
pub const COL_AGE: &str = "age";
pub const COL_GENDER: &str = "gender";

pub const SUFFIX_SCORE: &str = "_score";
pub const SUFFIX_D: &str = "_d";
pub const SUFFIX_RANK: &str = "_rank";

// ─── RawRow ──────────────────────────────────────────────────────────────────

/// One scraped result record — a flat column→cell map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRow(BTreeMap<String, String>);

impl RawRow {
  pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
    Self(pairs.into_iter().collect())
  }

  /// Raw cell lookup; empty cells count as present but yield `None` from the
  /// value accessors below.
  pub fn get(&self, column: &str) -> Option<&str> {
    self.0.get(column).map(String::as_str)
  }

  fn non_empty(&self, column: &str) -> Option<&str> {
    self
      .get(column)
      .map(str::trim)
      .filter(|s| !s.is_empty())
  }

  pub fn name(&self) -> Option<&str> { self.non_empty(COL_NAME) }

  pub fn club(&self) -> Option<&str> { self.non_empty(COL_CLUB) }

  pub fn session(&self) -> Option<&str> { self.non_empty(COL_SESSION) }

  pub fn level(&self) -> Option<&str> { self.non_empty(COL_LEVEL) }

  pub fn age(&self) -> Option<&str> { self.non_empty(COL_AGE) }

  pub fn gender(&self) -> Option<&str> { self.non_empty(COL_GENDER) }

  /// Whether any column of the `<apparatus>_*` group exists, regardless of
  /// cell contents. Classification keys on presence, not values.
  pub fn has_apparatus_column(&self, apparatus: &str) -> bool {
    [SUFFIX_SCORE, SUFFIX_D, SUFFIX_RANK]
      .iter()
      .any(|suffix| self.0.contains_key(&format!("{apparatus}{suffix}")))
  }

  pub fn score_cell(&self, apparatus: &str) -> Option<&str> {
    self.non_empty(&format!("{apparatus}{SUFFIX_SCORE}"))
  }

  pub fn d_score_cell(&self, apparatus: &str) -> Option<&str> {
    self.non_empty(&format!("{apparatus}{SUFFIX_D}"))
  }

  pub fn rank_cell(&self, apparatus: &str) -> Option<&str> {
    self.non_empty(&format!("{apparatus}{SUFFIX_RANK}"))
  }

  /// Columns that are neither well-known nor apparatus columns; preserved
  /// verbatim in the performance metadata.
  pub fn extra_columns(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().filter_map(|(k, v)| {
      let well_known = matches!(
        k.as_str(),
        COL_NAME | COL_CLUB | COL_SESSION | COL_LEVEL | COL_AGE | COL_GENDER
      );
      let apparatus_col = k.ends_with(SUFFIX_SCORE)
        || k.ends_with(SUFFIX_D)
        || k.ends_with(SUFFIX_RANK);
      (!well_known && !apparatus_col && !v.trim().is_empty())
        .then_some((k.as_str(), v.as_str()))
    })
  }
}

// ─── RawFile ─────────────────────────────────────────────────────────────────

/// One connector output file: the rows of one meet (or one sub-session of a
/// meet) from one source, plus the context needed to resolve the meet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFile {
  pub source:         String,
  pub source_meet_id: String,
  pub meet_name:      String,
  #[serde(default)]
  pub start_date:     Option<NaiveDate>,
  #[serde(default)]
  pub location:       Option<String>,
  /// File-level session tag; rows may override with their own `session`
  /// column.
  #[serde(default)]
  pub session:        Option<String>,
  pub rows:           Vec<RawRow>,
}

impl RawFile {
  /// The filename stem encoding the task key, so output files map back to
  /// scrape tasks: `{source}_{source_meet_id}[_{session}]`.
  pub fn file_stem(&self) -> String {
    match &self.session {
      Some(session) => {
        format!("{}_{}_{}", self.source, self.source_meet_id, session)
      }
      None => format!("{}_{}", self.source, self.source_meet_id),
    }
  }

  /// The stem prefix shared by every output file of one task key; used to
  /// find stale outputs before a retry.
  pub fn task_stem(source: &str, source_meet_id: &str) -> String {
    format!("{source}_{source_meet_id}")
  }
}
