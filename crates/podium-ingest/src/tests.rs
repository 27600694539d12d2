//! Integration tests for the ingest pipeline against an in-memory store
//! and a throwaway raw-file directory.

use std::path::PathBuf;

use podium_core::{
  alias::{AliasKind, AliasMap},
  performance::PerformanceKey,
  raw::{RawFile, RawRow},
};
use podium_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{
  aliases::{apply_alias_map, load_alias_file},
  cache::IdentityCache,
  loader::{pending_file_count, Loader},
};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory().await.expect("in-memory store")
}

fn scratch_dir() -> PathBuf {
  let dir =
    std::env::temp_dir().join(format!("podium-ingest-{}", Uuid::new_v4()));
  std::fs::create_dir_all(&dir).expect("scratch dir");
  dir
}

fn row(pairs: &[(&str, &str)]) -> RawRow {
  RawRow::from_pairs(
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())),
  )
}

fn raw_file(
  source: &str,
  source_meet_id: &str,
  meet_name: &str,
  rows: Vec<RawRow>,
) -> RawFile {
  RawFile {
    source: source.to_owned(),
    source_meet_id: source_meet_id.to_owned(),
    meet_name: meet_name.to_owned(),
    start_date: Some("2025-04-12".parse().unwrap()),
    location: None,
    session: None,
    rows,
  }
}

async fn write_raw(dir: &PathBuf, file: &RawFile) -> PathBuf {
  let path = dir.join(format!("{}.json", file.file_stem()));
  tokio::fs::write(&path, serde_json::to_vec(file).unwrap())
    .await
    .unwrap();
  path
}

// ─── Idempotence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn loading_the_same_file_twice_inserts_nothing_new() {
  let s = store().await;
  let dir = scratch_dir();
  let file = raw_file(
    "ngl",
    "1",
    "Spring Cup",
    vec![row(&[
      ("name", "Smith Jon"),
      ("club", "Acme GC"),
      ("vault_score", "9.500"),
    ])],
  );
  write_raw(&dir, &file).await;

  let loader = Loader::new(s.clone());
  let first = loader.run(&[dir.clone()]).await.unwrap();
  assert_eq!(first.files_loaded, 1);
  assert_eq!(first.performances_inserted, 1);

  let second = loader.run(&[dir]).await.unwrap();
  assert_eq!(second.files_skipped, 1);
  assert_eq!(second.performances_inserted, 0);
  assert_eq!(s.count_performances().await.unwrap(), 1);
}

#[tokio::test]
async fn changed_file_at_same_path_reloads() {
  let s = store().await;
  let dir = scratch_dir();
  let mut file = raw_file(
    "ngl",
    "1",
    "Spring Cup",
    vec![row(&[("name", "Smith Jon"), ("vault_score", "9.500")])],
  );
  let path = write_raw(&dir, &file).await;

  let loader = Loader::new(s.clone());
  loader.run(&[dir.clone()]).await.unwrap();

  // The source corrected the file in place: one more row appears.
  file.rows.push(row(&[("name", "Doe Jane"), ("vault_score", "9.100")]));
  tokio::fs::write(&path, serde_json::to_vec(&file).unwrap())
    .await
    .unwrap();

  let report = loader.run(&[dir]).await.unwrap();
  assert_eq!(report.files_loaded, 1);
  // The old row is caught by duplicate detection; only the new one lands.
  assert_eq!(report.performances_inserted, 1);
  assert_eq!(report.duplicates_suppressed, 1);
  assert_eq!(s.count_performances().await.unwrap(), 2);
}

// ─── Graceful degradation ────────────────────────────────────────────────────

#[tokio::test]
async fn unparsable_score_is_preserved_as_text() {
  let s = store().await;
  let dir = scratch_dir();
  write_raw(
    &dir,
    &raw_file(
      "ngl",
      "1",
      "Spring Cup",
      vec![row(&[
        ("name", "Smith Jon"),
        ("beam_score", "DNS"),
        ("beam_rank", "4"),
      ])],
    ),
  )
  .await;

  let report = Loader::new(s.clone()).run(&[dir]).await.unwrap();
  assert_eq!(report.performances_inserted, 1);
  assert_eq!(report.files_failed, 0);

  let athlete = s
    .athlete_by_link(
      s.person_by_normalized("smith jon")
        .await
        .unwrap()
        .unwrap()
        .person_id,
      None,
    )
    .await
    .unwrap()
    .unwrap();
  let performances =
    s.performances_for_athlete(athlete.athlete_id).await.unwrap();
  assert_eq!(performances.len(), 1);

  let p = &performances[0];
  assert_eq!(p.apparatus_id, "wag_beam");
  assert_eq!(p.score_final, None);
  assert_eq!(p.rank, Some(4));
  assert_eq!(p.metadata["beam_score"], "DNS");
}

#[tokio::test]
async fn rows_without_a_name_are_skipped_not_fatal() {
  let s = store().await;
  let dir = scratch_dir();
  write_raw(
    &dir,
    &raw_file(
      "ngl",
      "1",
      "Spring Cup",
      vec![
        row(&[("club", "Acme GC"), ("vault_score", "9.0")]),
        row(&[("name", "Smith Jon"), ("vault_score", "9.5")]),
      ],
    ),
  )
  .await;

  let report = Loader::new(s.clone()).run(&[dir]).await.unwrap();
  assert_eq!(report.rows_seen, 2);
  assert_eq!(report.performances_inserted, 1);
}

// ─── Resolve determinism ─────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_is_deterministic_across_cache_rebuilds() {
  let s = store().await;

  let mut cache = IdentityCache::hydrate(s.clone()).await.unwrap();
  let first = cache
    .resolve_or_create_person(" Smith   Jon ", None)
    .await
    .unwrap();
  let again = cache.resolve_or_create_person("smith jon", None).await.unwrap();
  assert_eq!(first, again);

  // A fresh cache simulates a process restart: identity is persisted, not
  // derived from transient state.
  let mut rebuilt = IdentityCache::hydrate(s.clone()).await.unwrap();
  let after_restart = rebuilt
    .resolve_or_create_person("Smith Jon", None)
    .await
    .unwrap();
  assert_eq!(first, after_restart);
  assert_eq!(s.count_persons().await.unwrap(), 1);
}

#[tokio::test]
async fn ledger_routes_resolution_before_any_sighting() {
  let s = store().await;

  // Curate the alias before the alias spelling is ever scraped.
  let map =
    AliasMap::from_json(r#"{"Smith Jon": ["Jon Smith"]}"#).unwrap();
  let report = apply_alias_map(&s, AliasKind::Person, &map).await.unwrap();
  assert_eq!(report.ledger_only, 1);
  assert_eq!(report.merged, 0);

  let canonical = s.person_by_normalized("smith jon").await.unwrap().unwrap();

  // First sighting of the alias spelling resolves straight through; the
  // duplicate identity is never materialized.
  let mut cache = IdentityCache::hydrate(s.clone()).await.unwrap();
  let resolved =
    cache.resolve_or_create_person("Jon Smith", None).await.unwrap();
  assert_eq!(resolved, canonical.person_id);
  assert_eq!(s.count_persons().await.unwrap(), 1);
}

#[tokio::test]
async fn reapplying_an_alias_file_is_a_noop() {
  let s = store().await;
  let map =
    AliasMap::from_json(r#"{"Smith Jon": ["Jon Smith"]}"#).unwrap();

  apply_alias_map(&s, AliasKind::Person, &map).await.unwrap();
  let second = apply_alias_map(&s, AliasKind::Person, &map).await.unwrap();
  assert_eq!(second.skipped, 1);
  assert_eq!(second.merged, 0);
  assert_eq!(second.ledger_only, 0);
}

#[tokio::test]
async fn alias_file_round_trips_from_disk() {
  let dir = scratch_dir();
  let path = dir.join("persons.json");
  tokio::fs::write(&path, r#"{"Smith Jon": ["Jon Smith"]}"#)
    .await
    .unwrap();

  let map = load_alias_file(&path).await.unwrap();
  assert_eq!(map.alias_count(), 1);
}

// ─── Crash recovery ──────────────────────────────────────────────────────────

#[tokio::test]
async fn partially_loaded_file_is_reprocessed_without_duplicates() {
  let s = store().await;
  let dir = scratch_dir();
  let file = raw_file(
    "ngl",
    "1",
    "Spring Cup",
    vec![
      row(&[("name", "Smith Jon"), ("vault_score", "9.5")]),
      row(&[("name", "Doe Jane"), ("vault_score", "9.1")]),
    ],
  );
  write_raw(&dir, &file).await;

  // Simulate a crash that inserted the first row's performance but died
  // before the file's processed-marker was written.
  {
    let mut cache = IdentityCache::hydrate(s.clone()).await.unwrap();
    let meet_id = cache
      .resolve_or_create_meet(
        "ngl",
        "1",
        &podium_core::entity::MeetDetails {
          name:       "Spring Cup".to_owned(),
          start_date: Some("2025-04-12".parse().unwrap()),
          location:   None,
        },
      )
      .await
      .unwrap();
    let person_id =
      cache.resolve_or_create_person("Smith Jon", None).await.unwrap();
    let athlete_id =
      cache.resolve_or_create_athlete(person_id, None).await.unwrap();
    s.insert_performances(vec![podium_core::performance::NewPerformance {
      athlete_id,
      apparatus_id: "other_vault".to_owned(),
      meet_id,
      level: None,
      age: None,
      gender: None,
      session: None,
      score_final: Some(9.5),
      score_d: None,
      rank: None,
      metadata: serde_json::json!({}),
    }])
    .await
    .unwrap();
  }
  assert_eq!(s.count_performances().await.unwrap(), 1);

  // Restarted run: the file is unmarked, so it reprocesses wholesale; the
  // half-inserted row is suppressed, the missing one lands.
  let report = Loader::new(s.clone()).run(&[dir]).await.unwrap();
  assert_eq!(report.files_loaded, 1);
  assert_eq!(report.duplicates_suppressed, 1);
  assert_eq!(report.performances_inserted, 1);
  assert_eq!(s.count_performances().await.unwrap(), 2);

  // One performance per natural key, never more.
  let meet = s.meet_by_source_key("ngl", "1").await.unwrap().unwrap();
  let person =
    s.person_by_normalized("smith jon").await.unwrap().unwrap();
  let athlete =
    s.athlete_by_link(person.person_id, None).await.unwrap().unwrap();
  assert!(s
    .performance_exists(&PerformanceKey {
      meet_id:      meet.meet_id,
      athlete_id:   athlete.athlete_id,
      apparatus_id: "other_vault".to_owned(),
      session:      None,
    })
    .await
    .unwrap());
  assert_eq!(
    s.performances_for_athlete(athlete.athlete_id).await.unwrap().len(),
    1
  );
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_sources_one_competition_end_to_end() {
  let s = store().await;
  let dir = scratch_dir();

  // The same physical competition, scraped by two sources that disagree on
  // every spelling.
  write_raw(
    &dir,
    &raw_file(
      "xgl",
      "m1",
      "Spring Cup",
      vec![row(&[
        ("name", "Smith Jon"),
        ("club", "Acme GC"),
        ("vault_score", "9.500"),
      ])],
    ),
  )
  .await;
  write_raw(
    &dir,
    &raw_file(
      "ygl",
      "77",
      "spring cup",
      vec![row(&[
        ("name", "Jon Smith"),
        ("club", "Acme Gymnastics Club"),
        ("vault_score", "9.500"),
      ])],
    ),
  )
  .await;

  Loader::new(s.clone()).run(&[dir]).await.unwrap();
  assert_eq!(s.count_persons().await.unwrap(), 2);
  assert_eq!(s.count_clubs().await.unwrap(), 2);
  assert_eq!(s.count_meets().await.unwrap(), 2);

  // Human-confirmed alias maps arrive.
  let persons =
    AliasMap::from_json(r#"{"Smith Jon": ["Jon Smith"]}"#).unwrap();
  let clubs =
    AliasMap::from_json(r#"{"Acme GC": ["Acme Gymnastics Club"]}"#).unwrap();
  apply_alias_map(&s, AliasKind::Person, &persons).await.unwrap();
  apply_alias_map(&s, AliasKind::Club, &clubs).await.unwrap();

  let folded = s.unify_meets().await.unwrap();
  assert_eq!(folded, 1);

  // Exactly one person, one club, one unified meet — and both results
  // pointing at the same athlete.
  assert_eq!(s.count_persons().await.unwrap(), 1);
  assert_eq!(s.count_clubs().await.unwrap(), 1);
  assert_eq!(s.count_meets().await.unwrap(), 1);
  assert_eq!(s.count_athletes().await.unwrap(), 1);
  assert_eq!(s.count_performances().await.unwrap(), 2);

  let person = s.person_by_normalized("smith jon").await.unwrap().unwrap();
  let club = s.club_by_normalized("acme gc").await.unwrap().unwrap();
  let athlete = s
    .athlete_by_link(person.person_id, Some(club.club_id))
    .await
    .unwrap()
    .unwrap();
  let performances =
    s.performances_for_athlete(athlete.athlete_id).await.unwrap();
  assert_eq!(performances.len(), 2);

  let meet = s.list_meets().await.unwrap().pop().unwrap();
  assert!(performances.iter().all(|p| p.meet_id == meet.meet_id));
}

// ─── Heartbeat helper ────────────────────────────────────────────────────────

#[tokio::test]
async fn pending_file_count_tracks_unloaded_paths() {
  let s = store().await;
  let dir = scratch_dir();
  write_raw(
    &dir,
    &raw_file(
      "ngl",
      "1",
      "Spring Cup",
      vec![row(&[("name", "Smith Jon"), ("vault_score", "9.5")])],
    ),
  )
  .await;
  write_raw(
    &dir,
    &raw_file(
      "ngl",
      "2",
      "Autumn Cup",
      vec![row(&[("name", "Doe Jane"), ("vault_score", "9.0")])],
    ),
  )
  .await;

  assert_eq!(pending_file_count(&s, &[dir.clone()]).await.unwrap(), 2);
  Loader::new(s.clone()).run(&[dir.clone()]).await.unwrap();
  assert_eq!(pending_file_count(&s, &[dir]).await.unwrap(), 0);
}
