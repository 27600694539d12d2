//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use podium_core::{
  alias::AliasKind,
  entity::{Athlete, Gender, MeetDetails},
  performance::{NewPerformance, PerformanceKey},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory().await.expect("in-memory store")
}

fn details(name: &str, date: Option<&str>) -> MeetDetails {
  MeetDetails {
    name:       name.to_owned(),
    start_date: date.map(|d| d.parse::<NaiveDate>().unwrap()),
    location:   None,
  }
}

fn vault_performance(
  meet_id: Uuid,
  athlete_id: Uuid,
  session: Option<&str>,
) -> NewPerformance {
  NewPerformance {
    athlete_id,
    apparatus_id: "wag_vault".to_owned(),
    meet_id,
    level: None,
    age: None,
    gender: Some("f".to_owned()),
    session: session.map(str::to_owned),
    score_final: Some(13.1),
    score_d: None,
    rank: Some(2),
    metadata: serde_json::json!({}),
  }
}

async fn linked_athlete(
  s: &SqliteStore,
  person_name: &str,
  club_name: Option<&str>,
) -> Athlete {
  let person = s.insert_person(person_name, None).await.unwrap();
  let club_id = match club_name {
    Some(name) => Some(s.insert_club(name).await.unwrap().club_id),
    None => None,
  };
  s.insert_athlete(person.person_id, club_id).await.unwrap()
}

// ─── Persons and clubs ───────────────────────────────────────────────────────

#[tokio::test]
async fn person_lookup_is_stable() {
  let s = store().await;

  let person = s
    .insert_person("Smith Jon", Some(Gender::Male))
    .await
    .unwrap();
  assert_eq!(person.normalized_name, "smith jon");

  // Repeated normalized lookups always return the same persisted id.
  for _ in 0..3 {
    let found = s.person_by_normalized("smith jon").await.unwrap().unwrap();
    assert_eq!(found.person_id, person.person_id);
    assert_eq!(found.gender, Some(Gender::Male));
  }
}

#[tokio::test]
async fn empty_person_name_is_rejected() {
  let s = store().await;
  assert!(s.insert_person("   ", None).await.is_err());
}

#[tokio::test]
async fn name_index_hydrates_all_rows() {
  let s = store().await;
  s.insert_person("A One", None).await.unwrap();
  s.insert_person("B Two", None).await.unwrap();
  s.insert_club("Acme GC").await.unwrap();

  assert_eq!(s.person_name_index().await.unwrap().len(), 2);
  assert_eq!(s.club_name_index().await.unwrap().len(), 1);
}

// ─── Athletes ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn athlete_link_lookup_distinguishes_null_club() {
  let s = store().await;
  let person = s.insert_person("Smith Jon", None).await.unwrap();
  let club = s.insert_club("Acme GC").await.unwrap();

  let clubless = s.insert_athlete(person.person_id, None).await.unwrap();
  let with_club = s
    .insert_athlete(person.person_id, Some(club.club_id))
    .await
    .unwrap();

  let found_clubless = s
    .athlete_by_link(person.person_id, None)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found_clubless.athlete_id, clubless.athlete_id);

  let found_with = s
    .athlete_by_link(person.person_id, Some(club.club_id))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found_with.athlete_id, with_club.athlete_id);
}

// ─── Meets ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn meet_source_key_lookup() {
  let s = store().await;
  let meet = s
    .insert_meet("ngl", "1042", &details("Spring Cup", Some("2025-04-12")))
    .await
    .unwrap();
  assert_eq!(meet.year, Some(2025));

  let found = s.meet_by_source_key("ngl", "1042").await.unwrap().unwrap();
  assert_eq!(found.meet_id, meet.meet_id);
  assert!(s.meet_by_source_key("ngl", "9999").await.unwrap().is_none());
}

// ─── Duplicate guard ─────────────────────────────────────────────────────────

#[tokio::test]
async fn performance_exists_respects_session() {
  let s = store().await;
  let athlete = linked_athlete(&s, "Smith Jon", Some("Acme GC")).await;
  let meet = s
    .insert_meet("ngl", "1", &details("Spring Cup", None))
    .await
    .unwrap();

  s.insert_performances(vec![vault_performance(
    meet.meet_id,
    athlete.athlete_id,
    Some("jun-a"),
  )])
  .await
  .unwrap();

  let key = |session: Option<&str>| PerformanceKey {
    meet_id:      meet.meet_id,
    athlete_id:   athlete.athlete_id,
    apparatus_id: "wag_vault".to_owned(),
    session:      session.map(str::to_owned),
  };

  assert!(s.performance_exists(&key(Some("jun-a"))).await.unwrap());
  // A different session, or no session at all, is a different key.
  assert!(!s.performance_exists(&key(Some("jun-b"))).await.unwrap());
  assert!(!s.performance_exists(&key(None)).await.unwrap());
}

#[tokio::test]
async fn batch_insert_reports_row_count() {
  let s = store().await;
  let athlete = linked_athlete(&s, "Smith Jon", None).await;
  let meet = s
    .insert_meet("ngl", "1", &details("Spring Cup", None))
    .await
    .unwrap();

  let batch = vec![
    vault_performance(meet.meet_id, athlete.athlete_id, Some("a")),
    vault_performance(meet.meet_id, athlete.athlete_id, Some("b")),
  ];
  assert_eq!(s.insert_performances(batch).await.unwrap(), 2);
  assert_eq!(s.count_performances().await.unwrap(), 2);
}

// ─── Person merge ────────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_person_with_conflicting_club_link() {
  let s = store().await;
  let club = s.insert_club("Acme GC").await.unwrap();
  let meet = s
    .insert_meet("ngl", "1", &details("Spring Cup", None))
    .await
    .unwrap();

  let canonical = s.insert_person("Smith Jon", None).await.unwrap();
  let canonical_athlete = s
    .insert_athlete(canonical.person_id, Some(club.club_id))
    .await
    .unwrap();
  let alias = s.insert_person("Jon Smith", None).await.unwrap();
  let alias_athlete = s
    .insert_athlete(alias.person_id, Some(club.club_id))
    .await
    .unwrap();

  s.insert_performances(vec![
    vault_performance(meet.meet_id, canonical_athlete.athlete_id, Some("a")),
    vault_performance(meet.meet_id, alias_athlete.athlete_id, Some("b")),
  ])
  .await
  .unwrap();

  let outcome = s
    .merge_person(canonical.person_id, alias.person_id)
    .await
    .unwrap();
  assert_eq!(outcome.merged_athletes, 1);
  assert_eq!(outcome.moved_athletes, 0);
  assert_eq!(outcome.repointed_performances, 1);

  // All performances now hang off the canonical athlete; nothing lost.
  let performances = s
    .performances_for_athlete(canonical_athlete.athlete_id)
    .await
    .unwrap();
  assert_eq!(performances.len(), 2);
  assert_eq!(s.count_performances().await.unwrap(), 2);

  // The alias person and its athlete are gone.
  assert!(s.person(alias.person_id).await.unwrap().is_none());
  assert!(s
    .athlete_by_link(alias.person_id, Some(club.club_id))
    .await
    .unwrap()
    .is_none());

  // The ledger now routes the retired name to the canonical id.
  let resolved = s
    .alias_entry(AliasKind::Person, "jon smith")
    .await
    .unwrap();
  assert_eq!(resolved, Some(canonical.person_id));
}

#[tokio::test]
async fn merge_person_without_conflict_moves_the_link() {
  let s = store().await;
  let club = s.insert_club("Other GC").await.unwrap();
  let meet = s
    .insert_meet("ngl", "1", &details("Spring Cup", None))
    .await
    .unwrap();

  let canonical = s.insert_person("Smith Jon", None).await.unwrap();
  let alias = s.insert_person("Jon Smith", None).await.unwrap();
  let alias_athlete = s
    .insert_athlete(alias.person_id, Some(club.club_id))
    .await
    .unwrap();

  s.insert_performances(vec![vault_performance(
    meet.meet_id,
    alias_athlete.athlete_id,
    None,
  )])
  .await
  .unwrap();

  let outcome = s
    .merge_person(canonical.person_id, alias.person_id)
    .await
    .unwrap();
  assert_eq!(outcome.moved_athletes, 1);
  assert_eq!(outcome.merged_athletes, 0);
  assert_eq!(outcome.repointed_performances, 0);

  // Same athlete row, now owned by the canonical person; results untouched.
  let moved = s
    .athlete_by_link(canonical.person_id, Some(club.club_id))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(moved.athlete_id, alias_athlete.athlete_id);
  assert_eq!(
    s.performances_for_athlete(moved.athlete_id).await.unwrap().len(),
    1
  );
  assert!(s.person(alias.person_id).await.unwrap().is_none());
}

#[tokio::test]
async fn merge_person_same_id_is_a_noop() {
  let s = store().await;
  let person = s.insert_person("Smith Jon", None).await.unwrap();
  let outcome = s
    .merge_person(person.person_id, person.person_id)
    .await
    .unwrap();
  assert_eq!(outcome, crate::MergeOutcome::default());
  assert!(s.person(person.person_id).await.unwrap().is_some());
}

#[tokio::test]
async fn merge_person_missing_alias_errors() {
  let s = store().await;
  let canonical = s.insert_person("Smith Jon", None).await.unwrap();
  let err = s
    .merge_person(canonical.person_id, Uuid::new_v4())
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::PersonNotFound(_)));
}

// ─── Club merge ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_club_with_conflict_repoints_performances() {
  let s = store().await;
  let person = s.insert_person("Smith Jon", None).await.unwrap();
  let canonical = s.insert_club("Acme GC").await.unwrap();
  let alias = s.insert_club("Acme Gymnastics Club").await.unwrap();
  let meet = s
    .insert_meet("ngl", "1", &details("Spring Cup", None))
    .await
    .unwrap();

  let canonical_athlete = s
    .insert_athlete(person.person_id, Some(canonical.club_id))
    .await
    .unwrap();
  let alias_athlete = s
    .insert_athlete(person.person_id, Some(alias.club_id))
    .await
    .unwrap();

  s.insert_performances(vec![vault_performance(
    meet.meet_id,
    alias_athlete.athlete_id,
    None,
  )])
  .await
  .unwrap();

  let outcome = s
    .merge_club(canonical.club_id, alias.club_id)
    .await
    .unwrap();
  assert_eq!(outcome.merged_athletes, 1);
  assert_eq!(outcome.repointed_performances, 1);

  assert_eq!(
    s.performances_for_athlete(canonical_athlete.athlete_id)
      .await
      .unwrap()
      .len(),
    1
  );
  assert_eq!(
    s.alias_entry(AliasKind::Club, "acme gymnastics club")
      .await
      .unwrap(),
    Some(canonical.club_id)
  );
  assert_eq!(s.count_clubs().await.unwrap(), 1);
}

// ─── Alias ledger ────────────────────────────────────────────────────────────

#[tokio::test]
async fn alias_ledger_is_append_only() {
  let s = store().await;
  let first = Uuid::new_v4();
  let second = Uuid::new_v4();

  s.append_alias(AliasKind::Person, "jon smith", first)
    .await
    .unwrap();
  // A second append for the same alias is ignored, not overwritten.
  s.append_alias(AliasKind::Person, "jon smith", second)
    .await
    .unwrap();

  assert_eq!(
    s.alias_entry(AliasKind::Person, "jon smith").await.unwrap(),
    Some(first)
  );
  assert_eq!(s.alias_index(AliasKind::Person).await.unwrap().len(), 1);
}

// ─── Meet unification ────────────────────────────────────────────────────────

#[tokio::test]
async fn unify_meets_folds_matching_name_and_year() {
  let s = store().await;
  let athlete = linked_athlete(&s, "Smith Jon", None).await;

  let first = s
    .insert_meet("ngl", "1", &details("Spring Cup", Some("2025-04-12")))
    .await
    .unwrap();
  let second = s
    .insert_meet("ogl", "77", &details(" spring  CUP ", Some("2025-04-13")))
    .await
    .unwrap();
  // Same name, different year — must survive unification.
  s.insert_meet("ngl", "2", &details("Spring Cup", Some("2024-04-12")))
    .await
    .unwrap();

  s.insert_performances(vec![
    vault_performance(first.meet_id, athlete.athlete_id, Some("x")),
    vault_performance(second.meet_id, athlete.athlete_id, Some("y")),
  ])
  .await
  .unwrap();

  let merged = s.unify_meets().await.unwrap();
  assert_eq!(merged, 1);
  assert_eq!(s.count_meets().await.unwrap(), 2);

  // Both performances now point at the surviving meet.
  let performances = s
    .performances_for_athlete(athlete.athlete_id)
    .await
    .unwrap();
  assert!(performances.iter().all(|p| p.meet_id == first.meet_id));
  assert_eq!(performances.len(), 2);

  // Re-running finds nothing left to fold.
  assert_eq!(s.unify_meets().await.unwrap(), 0);
}

// ─── Processed-file ledger ───────────────────────────────────────────────────

#[tokio::test]
async fn processed_file_requires_exact_path_and_hash() {
  let s = store().await;
  s.mark_file_processed("out/ngl_1.json", "abc").await.unwrap();

  assert!(s.file_processed("out/ngl_1.json", "abc").await.unwrap());
  // Same path, new content hash: the corrected file reloads.
  assert!(!s.file_processed("out/ngl_1.json", "def").await.unwrap());
  assert!(!s.file_processed("out/ngl_2.json", "abc").await.unwrap());

  // Marking is idempotent.
  s.mark_file_processed("out/ngl_1.json", "abc").await.unwrap();
  assert_eq!(s.processed_paths().await.unwrap(), vec!["out/ngl_1.json"]);
}

// ─── Gold refresh ────────────────────────────────────────────────────────────

#[tokio::test]
async fn gold_refresh_pivots_one_row_per_athlete_per_meet() {
  let s = store().await;
  let athlete = linked_athlete(&s, "Doe Jane", Some("Acme GC")).await;
  let meet = s
    .insert_meet("ngl", "1", &details("Spring Cup", Some("2025-04-12")))
    .await
    .unwrap();

  let beam = NewPerformance {
    apparatus_id: "wag_beam".to_owned(),
    score_final: Some(12.4),
    rank: Some(1),
    ..vault_performance(meet.meet_id, athlete.athlete_id, None)
  };
  s.insert_performances(vec![
    vault_performance(meet.meet_id, athlete.athlete_id, None),
    beam,
  ])
  .await
  .unwrap();

  let report = s.refresh_gold().await.unwrap();
  assert_eq!(report.wag_rows, 1);
  assert_eq!(report.mag_rows, 0);

  let (person, vault, beam_score): (String, Option<f64>, Option<f64>) = s
    .connection()
    .call(|conn| {
      Ok(conn.query_row(
        "SELECT person, vault_score, beam_score FROM gold_wag",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )?)
    })
    .await
    .unwrap();
  assert_eq!(person, "Doe Jane");
  assert_eq!(vault, Some(13.1));
  assert_eq!(beam_score, Some(12.4));

  // Refresh is replace, not append.
  let report = s.refresh_gold().await.unwrap();
  assert_eq!(report.wag_rows, 1);
}
