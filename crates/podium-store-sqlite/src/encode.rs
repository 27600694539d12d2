//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, dates are ISO 8601, UUIDs are
//! hyphenated lowercase strings, and performance metadata is compact JSON.

use chrono::{DateTime, NaiveDate, Utc};
use podium_core::entity::{Athlete, Club, Gender, Meet, Person};
use podium_core::performance::Performance;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  s.parse().map_err(|_| Error::DateParse(s.to_owned()))
}

// ─── Gender ──────────────────────────────────────────────────────────────────

pub fn decode_gender(s: &str) -> Result<Gender> {
  match s {
    "m" => Ok(Gender::Male),
    "f" => Ok(Gender::Female),
    other => Err(Error::Core(podium_core::Error::UnknownGender(
      other.to_owned(),
    ))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `persons` row.
pub struct RawPerson {
  pub person_id:       String,
  pub full_name:       String,
  pub normalized_name: String,
  pub gender:          Option<String>,
  pub created_at:      String,
}

impl RawPerson {
  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      person_id:       decode_uuid(&self.person_id)?,
      full_name:       self.full_name,
      normalized_name: self.normalized_name,
      gender:          self.gender.as_deref().map(decode_gender).transpose()?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `clubs` row.
pub struct RawClub {
  pub club_id:         String,
  pub name:            String,
  pub normalized_name: String,
  pub created_at:      String,
}

impl RawClub {
  pub fn into_club(self) -> Result<Club> {
    Ok(Club {
      club_id:         decode_uuid(&self.club_id)?,
      name:            self.name,
      normalized_name: self.normalized_name,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `athletes` row.
pub struct RawAthlete {
  pub athlete_id: String,
  pub person_id:  String,
  pub club_id:    Option<String>,
  pub created_at: String,
}

impl RawAthlete {
  pub fn into_athlete(self) -> Result<Athlete> {
    Ok(Athlete {
      athlete_id: decode_uuid(&self.athlete_id)?,
      person_id:  decode_uuid(&self.person_id)?,
      club_id:    self.club_id.as_deref().map(decode_uuid).transpose()?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `meets` row.
pub struct RawMeet {
  pub meet_id:         String,
  pub source:          String,
  pub source_meet_id:  String,
  pub name:            String,
  pub normalized_name: String,
  pub start_date:      Option<String>,
  pub year:            Option<i32>,
  pub location:        Option<String>,
  pub created_at:      String,
}

impl RawMeet {
  pub fn into_meet(self) -> Result<Meet> {
    Ok(Meet {
      meet_id:         decode_uuid(&self.meet_id)?,
      source:          self.source,
      source_meet_id:  self.source_meet_id,
      name:            self.name,
      normalized_name: self.normalized_name,
      start_date:      self.start_date.as_deref().map(decode_date).transpose()?,
      year:            self.year,
      location:        self.location,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `performances` row.
pub struct RawPerformance {
  pub performance_id: String,
  pub athlete_id:     String,
  pub apparatus_id:   String,
  pub meet_id:        String,
  pub level:          Option<String>,
  pub age:            Option<String>,
  pub gender:         Option<String>,
  pub session:        Option<String>,
  pub score_final:    Option<f64>,
  pub score_d:        Option<f64>,
  pub rank:           Option<i64>,
  pub metadata:       String,
  pub recorded_at:    String,
}

impl RawPerformance {
  pub fn into_performance(self) -> Result<Performance> {
    Ok(Performance {
      performance_id: decode_uuid(&self.performance_id)?,
      athlete_id:     decode_uuid(&self.athlete_id)?,
      apparatus_id:   self.apparatus_id,
      meet_id:        decode_uuid(&self.meet_id)?,
      level:          self.level,
      age:            self.age,
      gender:         self.gender,
      session:        self.session,
      score_final:    self.score_final,
      score_d:        self.score_d,
      rank:           self.rank,
      metadata:       serde_json::from_str(&self.metadata)?,
      recorded_at:    decode_dt(&self.recorded_at)?,
    })
  }
}

