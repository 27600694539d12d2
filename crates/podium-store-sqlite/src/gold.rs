//! Gold refresh — recompute-and-replace of the derived reporting tables.
//!
//! One wide table per discipline, one row per athlete per meet, one
//! `_score`/`_d`/`_rank` column group per apparatus. Read-only against the
//! canonical tables and idempotent; safe to run alongside scraping,
//! serialized against the loader by the store's own write locking.

use podium_core::{
  classify::{MAG_APPARATUS, WAG_APPARATUS},
  entity::{apparatus_id, Discipline},
};

use crate::{Result, SqliteStore};

/// Row counts written per table by one refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoldReport {
  pub mag_rows: usize,
  pub wag_rows: usize,
}

fn gold_table(discipline: Discipline) -> &'static str {
  match discipline {
    Discipline::Mag => "gold_mag",
    Discipline::Wag => "gold_wag",
    Discipline::Other => unreachable!("no gold table for Other"),
  }
}

/// Build the `DROP`/`CREATE`/`INSERT ... SELECT` statements for one
/// discipline. The apparatus list is static, so columns are named up front
/// and the pivot is a plain `MAX(CASE ...)` per column.
fn gold_sql(discipline: Discipline, apparatus: &[&str]) -> [String; 3] {
  let table = gold_table(discipline);

  let mut columns = String::new();
  let mut selects = String::new();
  for name in apparatus {
    let id = apparatus_id(discipline, name);
    columns.push_str(&format!(
      ",\n    {name}_score REAL,\n    {name}_d REAL,\n    {name}_rank INTEGER"
    ));
    for (suffix, value) in [
      ("score", "score_final"),
      ("d", "score_d"),
      ("rank", "rank"),
    ] {
      selects.push_str(&format!(
        ",\n    MAX(CASE WHEN perf.apparatus_id = '{id}' THEN perf.{value} END) AS {name}_{suffix}"
      ));
    }
  }

  let drop = format!("DROP TABLE IF EXISTS {table}");
  let create = format!(
    "CREATE TABLE {table} (
    athlete_id TEXT NOT NULL,
    meet_id    TEXT NOT NULL,
    person     TEXT NOT NULL,
    club       TEXT,
    meet       TEXT NOT NULL,
    year       INTEGER,
    level      TEXT,
    session    TEXT{columns}
)"
  );
  let insert = format!(
    "INSERT INTO {table}
 SELECT
    perf.athlete_id,
    perf.meet_id,
    p.full_name,
    c.name,
    m.name,
    m.year,
    MAX(perf.level),
    MAX(perf.session){selects}
 FROM performances perf
 JOIN athletes a   ON a.athlete_id = perf.athlete_id
 JOIN persons  p   ON p.person_id  = a.person_id
 LEFT JOIN clubs c ON c.club_id    = a.club_id
 JOIN meets    m   ON m.meet_id    = perf.meet_id
 WHERE perf.apparatus_id LIKE '{prefix}_%'
 GROUP BY perf.athlete_id, perf.meet_id",
    prefix = discipline.as_str(),
  );

  [drop, create, insert]
}

impl SqliteStore {
  /// Rebuild both gold tables in one transaction. Duplicate performances
  /// collapse under the `MAX` pivot, so the output is deduplicated by
  /// construction.
  pub async fn refresh_gold(&self) -> Result<GoldReport> {
    let mag = gold_sql(Discipline::Mag, MAG_APPARATUS);
    let wag = gold_sql(Discipline::Wag, WAG_APPARATUS);

    let report: GoldReport = self
      .connection()
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut report = GoldReport::default();
        for stmt in &mag {
          tx.execute(stmt, [])?;
        }
        report.mag_rows = tx
          .query_row("SELECT COUNT(*) FROM gold_mag", [], |row| {
            row.get::<_, i64>(0)
          })? as usize;
        for stmt in &wag {
          tx.execute(stmt, [])?;
        }
        report.wag_rows = tx
          .query_row("SELECT COUNT(*) FROM gold_wag", [], |row| {
            row.get::<_, i64>(0)
          })? as usize;
        tx.commit()?;
        Ok(report)
      })
      .await?;

    Ok(report)
  }
}
