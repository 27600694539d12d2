//! Performance — one scored apparatus result at one meet.
//!
//! Performances are created only by the loader. There is no uniqueness
//! constraint in the store because legitimate re-scores can share most key
//! fields; duplication is prevented logically on [`PerformanceKey`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Duplicate key ───────────────────────────────────────────────────────────

/// The logical duplicate-detection key. A `None` session is a distinct value
/// of its own, so session-less rows never collide with sessioned ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerformanceKey {
  pub meet_id:      Uuid,
  pub athlete_id:   Uuid,
  pub apparatus_id: String,
  pub session:      Option<String>,
}

// ─── Performance ─────────────────────────────────────────────────────────────

/// A stored performance row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Performance {
  pub performance_id: Uuid,
  pub athlete_id:     Uuid,
  pub apparatus_id:   String,
  pub meet_id:        Uuid,
  pub level:          Option<String>,
  pub age:            Option<String>,
  pub gender:         Option<String>,
  pub session:        Option<String>,
  /// Final score; `None` when the source cell was unparsable (the original
  /// text is then preserved in `metadata`).
  pub score_final:    Option<f64>,
  pub score_d:        Option<f64>,
  pub rank:           Option<i64>,
  pub metadata:       serde_json::Value,
  pub recorded_at:    DateTime<Utc>,
}

// ─── NewPerformance ──────────────────────────────────────────────────────────

/// Input to the loader's batch insert. `performance_id` and `recorded_at`
/// are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewPerformance {
  pub athlete_id:   Uuid,
  pub apparatus_id: String,
  pub meet_id:      Uuid,
  pub level:        Option<String>,
  pub age:          Option<String>,
  pub gender:       Option<String>,
  pub session:      Option<String>,
  pub score_final:  Option<f64>,
  pub score_d:      Option<f64>,
  pub rank:         Option<i64>,
  pub metadata:     serde_json::Value,
}

impl NewPerformance {
  pub fn key(&self) -> PerformanceKey {
    PerformanceKey {
      meet_id:      self.meet_id,
      athlete_id:   self.athlete_id,
      apparatus_id: self.apparatus_id.clone(),
      session:      self.session.clone(),
    }
  }
}
