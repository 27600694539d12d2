//! The record loader — raw files in, canonical entities and performances
//! out.
//!
//! One transaction per source file: a crash mid-file rolls the batch back
//! and leaves the processed-marker unwritten, so the whole file is retried.
//! At-least-once per file, with duplicate detection bounding re-insertion
//! damage on retry.

use std::{
  collections::HashSet,
  path::{Path, PathBuf},
};

use podium_core::{
  classify::{apparatus_for, classify_row},
  entity::{apparatus_id, Gender, MeetDetails},
  performance::{NewPerformance, PerformanceKey},
  raw::RawFile,
  score::{parse_rank, parse_score},
};
use podium_store_sqlite::SqliteStore;
use tracing::{debug, info, warn};

use crate::{cache::IdentityCache, gate::IngestGate, Error, Result};

// ─── Report ──────────────────────────────────────────────────────────────────

/// Counters from one loader run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
  pub files_loaded:          usize,
  pub files_skipped:         usize,
  pub files_failed:          usize,
  pub rows_seen:             usize,
  pub performances_inserted: usize,
  pub duplicates_suppressed: usize,
}

// ─── Loader ──────────────────────────────────────────────────────────────────

pub struct Loader {
  store: SqliteStore,
}

impl Loader {
  pub fn new(store: SqliteStore) -> Self { Self { store } }

  /// Load every unprocessed raw file under `dirs`.
  ///
  /// A fresh identity cache is hydrated for the run. File-level failures
  /// (unreadable, unparsable, store contention exhausted) are logged and
  /// skipped — their markers stay unwritten, so the next run retries them
  /// wholesale.
  pub async fn run(&self, dirs: &[PathBuf]) -> Result<LoadReport> {
    let mut cache = IdentityCache::hydrate(self.store.clone()).await?;
    let gate = IngestGate::new(self.store.clone());
    let mut report = LoadReport::default();

    for path in scan_raw_files(dirs).await? {
      if let Err(error) =
        self.load_file(&mut cache, &gate, &path, &mut report).await
      {
        warn!(path = %path.display(), %error, "file load failed; will retry next run");
        report.files_failed += 1;
      }
    }

    info!(
      loaded = report.files_loaded,
      skipped = report.files_skipped,
      failed = report.files_failed,
      inserted = report.performances_inserted,
      duplicates = report.duplicates_suppressed,
      "loader run finished"
    );
    Ok(report)
  }

  async fn load_file(
    &self,
    cache: &mut IdentityCache,
    gate: &IngestGate,
    path: &Path,
    report: &mut LoadReport,
  ) -> Result<()> {
    let bytes = tokio::fs::read(path).await?;
    let hash = IngestGate::content_hash(&bytes);

    if gate.is_processed(path, &hash).await? {
      report.files_skipped += 1;
      return Ok(());
    }

    let file: RawFile =
      serde_json::from_slice(&bytes).map_err(|e| Error::BadRawFile {
        path:   path.to_owned(),
        reason: e.to_string(),
      })?;

    let meet_details = MeetDetails {
      name:       file.meet_name.clone(),
      start_date: file.start_date,
      location:   file.location.clone(),
    };
    let meet_id = cache
      .resolve_or_create_meet(&file.source, &file.source_meet_id, &meet_details)
      .await?;

    let mut queued: HashSet<PerformanceKey> = HashSet::new();
    let mut batch: Vec<NewPerformance> = Vec::new();
    let mut duplicates = 0usize;

    for row in &file.rows {
      report.rows_seen += 1;
      let Some(name) = row.name() else {
        continue;
      };

      let discipline = classify_row(row);
      let gender = discipline
        .implied_gender()
        .or_else(|| row.gender().and_then(Gender::parse));

      let person_id = cache.resolve_or_create_person(name, gender).await?;
      let club_id = match row.club() {
        Some(club) => Some(cache.resolve_or_create_club(club).await?),
        None => None,
      };
      let athlete_id =
        cache.resolve_or_create_athlete(person_id, club_id).await?;

      let session = row
        .session()
        .or(file.session.as_deref())
        .map(str::to_owned);

      for apparatus in apparatus_for(discipline) {
        let score_cell = row.score_cell(apparatus);
        let rank_cell = row.rank_cell(apparatus);
        if score_cell.is_none() && rank_cell.is_none() {
          continue;
        }
        let d_cell = row.d_score_cell(apparatus);

        let score_final = score_cell.and_then(parse_score);
        let score_d = d_cell.and_then(parse_score);
        let rank = rank_cell.and_then(parse_rank);

        // Row extras ride along; unparsable cells are preserved as text
        // under their raw column name with the numeric column left null.
        let mut metadata = serde_json::Map::new();
        for (column, cell) in row.extra_columns() {
          metadata.insert(column.to_owned(), cell.into());
        }
        if score_final.is_none()
          && let Some(cell) = score_cell
        {
          metadata.insert(format!("{apparatus}_score"), cell.into());
        }
        if score_d.is_none()
          && let Some(cell) = d_cell
        {
          metadata.insert(format!("{apparatus}_d"), cell.into());
        }
        if rank.is_none()
          && let Some(cell) = rank_cell
        {
          metadata.insert(format!("{apparatus}_rank"), cell.into());
        }

        let performance = NewPerformance {
          athlete_id,
          apparatus_id: apparatus_id(discipline, apparatus),
          meet_id,
          level: row.level().map(str::to_owned),
          age: row.age().map(str::to_owned),
          gender: gender.map(|g| g.as_str().to_owned()),
          session: session.clone(),
          score_final,
          score_d,
          rank,
          metadata: serde_json::Value::Object(metadata),
        };

        let key = performance.key();
        if queued.contains(&key) || self.store.performance_exists(&key).await?
        {
          duplicates += 1;
          continue;
        }
        queued.insert(key);
        batch.push(performance);
      }
    }

    let inserted = self.store.insert_performances(batch).await?;
    gate.mark_processed(path, &hash).await?;

    report.files_loaded += 1;
    report.performances_inserted += inserted;
    report.duplicates_suppressed += duplicates;
    debug!(path = %path.display(), inserted, duplicates, "file loaded");
    Ok(())
  }
}

// ─── Directory scanning ──────────────────────────────────────────────────────

/// All `*.json` files under the given directories, sorted for deterministic
/// load order. Missing directories are not an error — a source may simply
/// not have produced output yet.
pub async fn scan_raw_files(dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  for dir in dirs {
    let mut entries = match tokio::fs::read_dir(dir).await {
      Ok(entries) => entries,
      Err(_) => {
        debug!(dir = %dir.display(), "output directory missing, skipping");
        continue;
      }
    };
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().is_some_and(|ext| ext == "json") {
        files.push(path);
      }
    }
  }
  files.sort();
  Ok(files)
}

/// How many files on disk have no processed entry at all — the heartbeat's
/// pending-unloaded count. Path-only, so it stays cheap; a changed file
/// awaiting reload is counted by the loader itself, not here.
pub async fn pending_file_count(
  store: &SqliteStore,
  dirs: &[PathBuf],
) -> Result<usize> {
  let processed: HashSet<String> =
    store.processed_paths().await?.into_iter().collect();
  let files = scan_raw_files(dirs).await?;
  Ok(
    files
      .iter()
      .filter(|p| !processed.contains(p.to_string_lossy().as_ref()))
      .count(),
  )
}
