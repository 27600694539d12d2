//! [`SqliteStore`] — the canonical relational store.

use std::{path::Path, time::Duration};

use chrono::Utc;
use podium_core::{
  alias::AliasKind,
  entity::{Athlete, Club, Gender, Meet, MeetDetails, Person},
  normalize::normalize_name,
  performance::{NewPerformance, Performance, PerformanceKey},
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  encode::{
    encode_dt, encode_uuid, RawAthlete, RawClub, RawMeet, RawPerformance,
    RawPerson,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The Podium canonical store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. The store
/// is the only resource shared between the loader, the gold refresh, and
/// administrative scripts; contention is absorbed by the busy timeout set
/// at open rather than surfacing immediately.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

fn alias_table(kind: AliasKind) -> &'static str {
  match kind {
    AliasKind::Person => "person_aliases",
    AliasKind::Club => "club_aliases",
  }
}

impl SqliteStore {
  /// Open (or create) a store at `path`, set the busy timeout, and run
  /// schema initialisation.
  pub async fn open(
    path: impl AsRef<Path>,
    busy_timeout: Duration,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema(busy_timeout).await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema(Duration::from_millis(100)).await?;
    Ok(store)
  }

  async fn init_schema(&self, busy_timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection {
    &self.conn
  }

  // ── Persons ───────────────────────────────────────────────────────────────

  /// Insert a new person. The normalized name is derived here so there is a
  /// single source of truth for the uniqueness key.
  pub async fn insert_person(
    &self,
    full_name: &str,
    gender: Option<Gender>,
  ) -> Result<Person> {
    let normalized = normalize_name(full_name);
    if normalized.is_empty() {
      return Err(Error::Core(podium_core::Error::EmptyName(
        full_name.to_owned(),
      )));
    }

    let person = Person {
      person_id: Uuid::new_v4(),
      full_name: full_name.trim().to_owned(),
      normalized_name: normalized,
      gender,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(person.person_id);
    let full = person.full_name.clone();
    let norm = person.normalized_name.clone();
    let gender_str = person.gender.map(|g| g.as_str().to_owned());
    let at_str = encode_dt(person.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO persons (person_id, full_name, normalized_name, gender, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, full, norm, gender_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(person)
  }

  pub async fn person_by_normalized(
    &self,
    normalized: &str,
  ) -> Result<Option<Person>> {
    let norm = normalized.to_owned();
    let raw: Option<RawPerson> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT person_id, full_name, normalized_name, gender, created_at
               FROM persons WHERE normalized_name = ?1",
              rusqlite::params![norm],
              |row| {
                Ok(RawPerson {
                  person_id:       row.get(0)?,
                  full_name:       row.get(1)?,
                  normalized_name: row.get(2)?,
                  gender:          row.get(3)?,
                  created_at:      row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPerson::into_person).transpose()
  }

  pub async fn person(&self, id: Uuid) -> Result<Option<Person>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawPerson> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT person_id, full_name, normalized_name, gender, created_at
               FROM persons WHERE person_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawPerson {
                  person_id:       row.get(0)?,
                  full_name:       row.get(1)?,
                  normalized_name: row.get(2)?,
                  gender:          row.get(3)?,
                  created_at:      row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPerson::into_person).transpose()
  }

  /// All `(normalized_name, person_id)` pairs — hydrates the identity cache.
  pub async fn person_name_index(&self) -> Result<Vec<(String, Uuid)>> {
    self.name_index("persons", "person_id").await
  }

  /// All display names, for offline alias-candidate generation.
  pub async fn list_person_names(&self) -> Result<Vec<String>> {
    self.display_names("persons", "full_name").await
  }

  // ── Clubs ─────────────────────────────────────────────────────────────────

  pub async fn insert_club(&self, name: &str) -> Result<Club> {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
      return Err(Error::Core(podium_core::Error::EmptyName(name.to_owned())));
    }

    let club = Club {
      club_id: Uuid::new_v4(),
      name: name.trim().to_owned(),
      normalized_name: normalized,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(club.club_id);
    let name_owned = club.name.clone();
    let norm = club.normalized_name.clone();
    let at_str = encode_dt(club.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO clubs (club_id, name, normalized_name, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name_owned, norm, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(club)
  }

  pub async fn club_by_normalized(
    &self,
    normalized: &str,
  ) -> Result<Option<Club>> {
    let norm = normalized.to_owned();
    let raw: Option<RawClub> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT club_id, name, normalized_name, created_at
               FROM clubs WHERE normalized_name = ?1",
              rusqlite::params![norm],
              |row| {
                Ok(RawClub {
                  club_id:         row.get(0)?,
                  name:            row.get(1)?,
                  normalized_name: row.get(2)?,
                  created_at:      row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawClub::into_club).transpose()
  }

  /// All `(normalized_name, club_id)` pairs — hydrates the identity cache.
  pub async fn club_name_index(&self) -> Result<Vec<(String, Uuid)>> {
    self.name_index("clubs", "club_id").await
  }

  pub async fn list_club_names(&self) -> Result<Vec<String>> {
    self.display_names("clubs", "name").await
  }

  async fn display_names(
    &self,
    table: &'static str,
    column: &'static str,
  ) -> Result<Vec<String>> {
    let rows: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {column} FROM {table} ORDER BY {column}"))?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn name_index(
    &self,
    table: &'static str,
    id_column: &'static str,
  ) -> Result<Vec<(String, Uuid)>> {
    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT normalized_name, {id_column} FROM {table}"))?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(name, id)| Ok((name, Uuid::parse_str(&id)?)))
      .collect()
  }

  // ── Athletes ──────────────────────────────────────────────────────────────

  pub async fn insert_athlete(
    &self,
    person_id: Uuid,
    club_id: Option<Uuid>,
  ) -> Result<Athlete> {
    let athlete = Athlete {
      athlete_id: Uuid::new_v4(),
      person_id,
      club_id,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(athlete.athlete_id);
    let person_str = encode_uuid(person_id);
    let club_str = club_id.map(encode_uuid);
    let at_str = encode_dt(athlete.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO athletes (athlete_id, person_id, club_id, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, person_str, club_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(athlete)
  }

  /// Look up the athlete link for a `(person, club)` pair. `IS` comparison
  /// makes the clubless case behave as a value, not a wildcard.
  pub async fn athlete_by_link(
    &self,
    person_id: Uuid,
    club_id: Option<Uuid>,
  ) -> Result<Option<Athlete>> {
    let person_str = encode_uuid(person_id);
    let club_str = club_id.map(encode_uuid);

    let raw: Option<RawAthlete> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT athlete_id, person_id, club_id, created_at
               FROM athletes WHERE person_id = ?1 AND club_id IS ?2",
              rusqlite::params![person_str, club_str],
              |row| {
                Ok(RawAthlete {
                  athlete_id: row.get(0)?,
                  person_id:  row.get(1)?,
                  club_id:    row.get(2)?,
                  created_at: row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAthlete::into_athlete).transpose()
  }

  /// All `(person_id, club_id, athlete_id)` triples — hydrates the identity
  /// cache's link map.
  pub async fn athlete_link_index(
    &self,
  ) -> Result<Vec<(Uuid, Option<Uuid>, Uuid)>> {
    let rows: Vec<(String, Option<String>, String)> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT person_id, club_id, athlete_id FROM athletes")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(person, club, athlete)| {
        Ok((
          Uuid::parse_str(&person)?,
          club.as_deref().map(Uuid::parse_str).transpose()?,
          Uuid::parse_str(&athlete)?,
        ))
      })
      .collect()
  }

  // ── Meets ─────────────────────────────────────────────────────────────────

  pub async fn insert_meet(
    &self,
    source: &str,
    source_meet_id: &str,
    details: &MeetDetails,
  ) -> Result<Meet> {
    let meet = Meet {
      meet_id: Uuid::new_v4(),
      source: source.to_owned(),
      source_meet_id: source_meet_id.to_owned(),
      name: details.name.trim().to_owned(),
      normalized_name: normalize_name(&details.name),
      start_date: details.start_date,
      year: details.year(),
      location: details.location.clone(),
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(meet.meet_id);
    let source_owned = meet.source.clone();
    let smid = meet.source_meet_id.clone();
    let name = meet.name.clone();
    let norm = meet.normalized_name.clone();
    let date_str = meet.start_date.map(crate::encode::encode_date);
    let year = meet.year;
    let location = meet.location.clone();
    let at_str = encode_dt(meet.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO meets (
             meet_id, source, source_meet_id, name, normalized_name,
             start_date, year, location, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str, source_owned, smid, name, norm, date_str, year, location,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(meet)
  }

  pub async fn meet_by_source_key(
    &self,
    source: &str,
    source_meet_id: &str,
  ) -> Result<Option<Meet>> {
    let source = source.to_owned();
    let smid = source_meet_id.to_owned();

    let raw: Option<RawMeet> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT meet_id, source, source_meet_id, name, normalized_name,
                      start_date, year, location, created_at
               FROM meets WHERE source = ?1 AND source_meet_id = ?2",
              rusqlite::params![source, smid],
              Self::meet_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMeet::into_meet).transpose()
  }

  pub async fn list_meets(&self) -> Result<Vec<Meet>> {
    let raws: Vec<RawMeet> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT meet_id, source, source_meet_id, name, normalized_name,
                  start_date, year, location, created_at
           FROM meets ORDER BY created_at",
        )?;
        let rows = stmt
          .query_map([], Self::meet_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMeet::into_meet).collect()
  }

  fn meet_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMeet> {
    Ok(RawMeet {
      meet_id:         row.get(0)?,
      source:          row.get(1)?,
      source_meet_id:  row.get(2)?,
      name:            row.get(3)?,
      normalized_name: row.get(4)?,
      start_date:      row.get(5)?,
      year:            row.get(6)?,
      location:        row.get(7)?,
      created_at:      row.get(8)?,
    })
  }

  /// All `(source, source_meet_id, meet_id)` triples — hydrates the identity
  /// cache's meet map.
  pub async fn meet_key_index(&self) -> Result<Vec<(String, String, Uuid)>> {
    let rows: Vec<(String, String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare("SELECT source, source_meet_id, meet_id FROM meets")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(source, smid, id)| Ok((source, smid, Uuid::parse_str(&id)?)))
      .collect()
  }

  // ── Alias ledgers ─────────────────────────────────────────────────────────

  /// Look up one ledger entry by normalized alias.
  pub async fn alias_entry(
    &self,
    kind: AliasKind,
    alias_normalized: &str,
  ) -> Result<Option<Uuid>> {
    let table = alias_table(kind);
    let alias = alias_normalized.to_owned();

    let id: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT canonical_id FROM {table} WHERE alias_normalized = ?1"
              ),
              rusqlite::params![alias],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    id.as_deref().map(Uuid::parse_str).transpose().map_err(Error::Uuid)
  }

  /// Append one ledger entry. `INSERT OR IGNORE` keeps the ledger
  /// append-only: re-applying the same alias file is a no-op.
  pub async fn append_alias(
    &self,
    kind: AliasKind,
    alias_normalized: &str,
    canonical_id: Uuid,
  ) -> Result<()> {
    let table = alias_table(kind);
    let alias = alias_normalized.to_owned();
    let canonical_str = encode_uuid(canonical_id);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT OR IGNORE INTO {table} (alias_normalized, canonical_id, recorded_at)
             VALUES (?1, ?2, ?3)"
          ),
          rusqlite::params![alias, canonical_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The whole ledger — hydrates the identity cache's alias maps.
  pub async fn alias_index(
    &self,
    kind: AliasKind,
  ) -> Result<Vec<(String, Uuid)>> {
    let table = alias_table(kind);
    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT alias_normalized, canonical_id FROM {table}"))?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(alias, id)| Ok((alias, Uuid::parse_str(&id)?)))
      .collect()
  }

  // ── Processed-file ledger ─────────────────────────────────────────────────

  /// Exact `(path, hash)` match only — a changed file at the same path is
  /// not considered processed.
  pub async fn file_processed(
    &self,
    path: &str,
    content_hash: &str,
  ) -> Result<bool> {
    let path = path.to_owned();
    let hash = content_hash.to_owned();

    let found: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM processed_files WHERE path = ?1 AND content_hash = ?2",
              rusqlite::params![path, hash],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  pub async fn mark_file_processed(
    &self,
    path: &str,
    content_hash: &str,
  ) -> Result<()> {
    let path = path.to_owned();
    let hash = content_hash.to_owned();
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO processed_files (path, content_hash, loaded_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![path, hash, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every path with at least one processed entry; used by the heartbeat to
  /// count pending files without hashing them all.
  pub async fn processed_paths(&self) -> Result<Vec<String>> {
    let rows: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT DISTINCT path FROM processed_files")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  // ── Performances ──────────────────────────────────────────────────────────

  /// The logical duplicate check. `session IS ?` treats a missing session as
  /// its own value rather than a wildcard.
  pub async fn performance_exists(
    &self,
    key: &PerformanceKey,
  ) -> Result<bool> {
    let meet_str = encode_uuid(key.meet_id);
    let athlete_str = encode_uuid(key.athlete_id);
    let apparatus = key.apparatus_id.clone();
    let session = key.session.clone();

    let found: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM performances
               WHERE meet_id = ?1 AND athlete_id = ?2
                 AND apparatus_id = ?3 AND session IS ?4",
              rusqlite::params![meet_str, athlete_str, apparatus, session],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  /// Insert a file's accumulated performances as one transaction. A failure
  /// anywhere rolls back the whole batch, so a crash mid-file never leaves a
  /// partial load behind.
  pub async fn insert_performances(
    &self,
    batch: Vec<NewPerformance>,
  ) -> Result<usize> {
    if batch.is_empty() {
      return Ok(0);
    }

    let rows: Vec<_> = batch
      .into_iter()
      .map(|p| {
        let metadata = p.metadata.to_string();
        (
          encode_uuid(Uuid::new_v4()),
          encode_uuid(p.athlete_id),
          p.apparatus_id,
          encode_uuid(p.meet_id),
          p.level,
          p.age,
          p.gender,
          p.session,
          p.score_final,
          p.score_d,
          p.rank,
          metadata,
        )
      })
      .collect();
    let at_str = encode_dt(Utc::now());

    let inserted: usize = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut count = 0usize;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO performances (
               performance_id, athlete_id, apparatus_id, meet_id,
               level, age, gender, session,
               score_final, score_d, rank, metadata, recorded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7, row.8,
              row.9, row.10, row.11, at_str,
            ])?;
            count += 1;
          }
        }
        tx.commit()?;
        Ok(count)
      })
      .await?;

    Ok(inserted)
  }

  pub async fn performances_for_athlete(
    &self,
    athlete_id: Uuid,
  ) -> Result<Vec<Performance>> {
    let athlete_str = encode_uuid(athlete_id);

    let raws: Vec<RawPerformance> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT performance_id, athlete_id, apparatus_id, meet_id,
                  level, age, gender, session,
                  score_final, score_d, rank, metadata, recorded_at
           FROM performances WHERE athlete_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![athlete_str], Self::performance_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPerformance::into_performance).collect()
  }

  fn performance_row(
    row: &rusqlite::Row<'_>,
  ) -> rusqlite::Result<RawPerformance> {
    Ok(RawPerformance {
      performance_id: row.get(0)?,
      athlete_id:     row.get(1)?,
      apparatus_id:   row.get(2)?,
      meet_id:        row.get(3)?,
      level:          row.get(4)?,
      age:            row.get(5)?,
      gender:         row.get(6)?,
      session:        row.get(7)?,
      score_final:    row.get(8)?,
      score_d:        row.get(9)?,
      rank:           row.get(10)?,
      metadata:       row.get(11)?,
      recorded_at:    row.get(12)?,
    })
  }

  // ── Counts ────────────────────────────────────────────────────────────────

  pub async fn count_persons(&self) -> Result<i64> {
    self.count("persons").await
  }

  pub async fn count_clubs(&self) -> Result<i64> { self.count("clubs").await }

  pub async fn count_athletes(&self) -> Result<i64> {
    self.count("athletes").await
  }

  pub async fn count_meets(&self) -> Result<i64> { self.count("meets").await }

  pub async fn count_performances(&self) -> Result<i64> {
    self.count("performances").await
  }

  async fn count(&self, table: &'static str) -> Result<i64> {
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!("SELECT COUNT(*) FROM {table}"),
          [],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(n)
  }
}
