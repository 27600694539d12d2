//! Canonical entity types — the thin id-owning records of the store.
//!
//! Entities hold identity and the handful of columns that identify them in
//! the wild. Scored results live in [`crate::performance`]; everything else
//! about an athlete is derived from their performances.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Discipline ──────────────────────────────────────────────────────────────

/// The competitive discipline a row of results belongs to.
///
/// Inferred per raw row from which apparatus columns are present; see
/// [`crate::classify::classify_row`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
  /// Men's artistic gymnastics.
  Mag,
  /// Women's artistic gymnastics.
  Wag,
  /// Neither set of discipline-specific apparatus was present.
  Other,
}

impl Discipline {
  /// The discriminant string stored in the `discipline` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Mag => "mag",
      Self::Wag => "wag",
      Self::Other => "other",
    }
  }

  /// The gender tag implied by the discipline, if any.
  pub fn implied_gender(self) -> Option<Gender> {
    match self {
      Self::Mag => Some(Gender::Male),
      Self::Wag => Some(Gender::Female),
      Self::Other => None,
    }
  }
}

// ─── Gender ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  #[serde(rename = "m")]
  Male,
  #[serde(rename = "f")]
  Female,
}

impl Gender {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Male => "m",
      Self::Female => "f",
    }
  }

  /// Lenient decoding of the gender spellings sources actually emit.
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_lowercase().as_str() {
      "m" | "male" | "men" | "herren" => Some(Self::Male),
      "f" | "w" | "female" | "women" | "damen" => Some(Self::Female),
      _ => None,
    }
  }
}

// ─── Person / Club ───────────────────────────────────────────────────────────

/// A canonical human identity.
///
/// `normalized_name` is unique among live persons; a person retired by an
/// alias merge is deleted after its ledger entry is written, so the name can
/// never re-materialize as a fresh identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
  pub person_id:       Uuid,
  pub full_name:       String,
  pub normalized_name: String,
  pub gender:          Option<Gender>,
  pub created_at:      DateTime<Utc>,
}

/// A canonical organization identity; same shape and lifecycle as [`Person`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Club {
  pub club_id:         Uuid,
  pub name:            String,
  pub normalized_name: String,
  pub created_at:      DateTime<Utc>,
}

// ─── Athlete ─────────────────────────────────────────────────────────────────

/// A `(person, club)` membership link, unique per pair.
///
/// `club_id` is `None` for athletes sighted without a club. Performances
/// attach to the athlete, not the person, so club history survives merges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Athlete {
  pub athlete_id: Uuid,
  pub person_id:  Uuid,
  pub club_id:    Option<Uuid>,
  pub created_at: DateTime<Utc>,
}

// ─── Meet ────────────────────────────────────────────────────────────────────

/// One competition, unique on `(source, source_meet_id)`.
///
/// The same physical competition discovered through different sources yields
/// distinct rows until the unification pass merges them on matching
/// `(normalized_name, year)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meet {
  pub meet_id:         Uuid,
  pub source:          String,
  pub source_meet_id:  String,
  pub name:            String,
  pub normalized_name: String,
  pub start_date:      Option<NaiveDate>,
  pub year:            Option<i32>,
  pub location:        Option<String>,
  pub created_at:      DateTime<Utc>,
}

/// Details carried along when a meet is first sighted; input to
/// resolve-or-create. The year is derived from `start_date`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetDetails {
  pub name:       String,
  pub start_date: Option<NaiveDate>,
  pub location:   Option<String>,
}

impl MeetDetails {
  pub fn year(&self) -> Option<i32> {
    use chrono::Datelike as _;
    self.start_date.map(|d| d.year())
  }
}

// ─── Apparatus ───────────────────────────────────────────────────────────────

/// The deterministic id of a seeded apparatus row: `{discipline}_{name}`.
///
/// Deterministic so the schema seed is idempotent and derived-table SQL can
/// name apparatus statically.
pub fn apparatus_id(discipline: Discipline, name: &str) -> String {
  format!("{}_{}", discipline.as_str(), name)
}
