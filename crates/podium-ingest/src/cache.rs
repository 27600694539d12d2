//! The per-run identity cache.
//!
//! A cache is instantiated for one loader run, hydrated from the store, and
//! passed explicitly through calls — never a module-level singleton. It is
//! purely additive within the run: consistency comes from the store being
//! the sole source of truth, and the same normalized input always resolves
//! to the same persisted id, including across process restarts.

use std::collections::HashMap;

use podium_core::{
  alias::AliasKind,
  entity::{Gender, MeetDetails},
  normalize::normalize_name,
};
use podium_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::Result;

pub struct IdentityCache {
  store:          SqliteStore,
  persons:        HashMap<String, Uuid>,
  person_aliases: HashMap<String, Uuid>,
  clubs:          HashMap<String, Uuid>,
  club_aliases:   HashMap<String, Uuid>,
  athletes:       HashMap<(Uuid, Option<Uuid>), Uuid>,
  meets:          HashMap<(String, String), Uuid>,
}

impl IdentityCache {
  /// Hydrate all lookup maps from the store in one pass.
  pub async fn hydrate(store: SqliteStore) -> Result<Self> {
    let persons = store.person_name_index().await?.into_iter().collect();
    let person_aliases = store
      .alias_index(AliasKind::Person)
      .await?
      .into_iter()
      .collect();
    let clubs = store.club_name_index().await?.into_iter().collect();
    let club_aliases = store
      .alias_index(AliasKind::Club)
      .await?
      .into_iter()
      .collect();
    let athletes = store
      .athlete_link_index()
      .await?
      .into_iter()
      .map(|(person, club, athlete)| ((person, club), athlete))
      .collect();
    let meets = store
      .meet_key_index()
      .await?
      .into_iter()
      .map(|(source, smid, id)| ((source, smid), id))
      .collect();

    Ok(Self {
      store,
      persons,
      person_aliases,
      clubs,
      club_aliases,
      athletes,
      meets,
    })
  }

  /// Resolve a person name to its canonical id, creating the person on a
  /// genuine miss. The alias ledger is consulted before the live-name map,
  /// so a retired name can never re-materialize.
  pub async fn resolve_or_create_person(
    &mut self,
    name: &str,
    gender_hint: Option<Gender>,
  ) -> Result<Uuid> {
    let normalized = normalize_name(name);

    if let Some(&id) = self.person_aliases.get(&normalized) {
      return Ok(id);
    }
    if let Some(&id) = self.persons.get(&normalized) {
      return Ok(id);
    }

    let person = self.store.insert_person(name, gender_hint).await?;
    self.persons.insert(person.normalized_name, person.person_id);
    Ok(person.person_id)
  }

  /// As for persons, but against the noisier club alias map.
  pub async fn resolve_or_create_club(&mut self, name: &str) -> Result<Uuid> {
    let normalized = normalize_name(name);

    if let Some(&id) = self.club_aliases.get(&normalized) {
      return Ok(id);
    }
    if let Some(&id) = self.clubs.get(&normalized) {
      return Ok(id);
    }

    let club = self.store.insert_club(name).await?;
    self.clubs.insert(club.normalized_name, club.club_id);
    Ok(club.club_id)
  }

  pub async fn resolve_or_create_athlete(
    &mut self,
    person_id: Uuid,
    club_id: Option<Uuid>,
  ) -> Result<Uuid> {
    if let Some(&id) = self.athletes.get(&(person_id, club_id)) {
      return Ok(id);
    }

    // The cache snapshot may predate a concurrent administrative merge;
    // fall through to the store before inserting.
    if let Some(athlete) = self.store.athlete_by_link(person_id, club_id).await?
    {
      self.athletes.insert((person_id, club_id), athlete.athlete_id);
      return Ok(athlete.athlete_id);
    }

    let athlete = self.store.insert_athlete(person_id, club_id).await?;
    self.athletes.insert((person_id, club_id), athlete.athlete_id);
    Ok(athlete.athlete_id)
  }

  pub async fn resolve_or_create_meet(
    &mut self,
    source: &str,
    source_meet_id: &str,
    details: &MeetDetails,
  ) -> Result<Uuid> {
    let key = (source.to_owned(), source_meet_id.to_owned());
    if let Some(&id) = self.meets.get(&key) {
      return Ok(id);
    }

    if let Some(meet) =
      self.store.meet_by_source_key(source, source_meet_id).await?
    {
      self.meets.insert(key, meet.meet_id);
      return Ok(meet.meet_id);
    }

    let meet = self.store.insert_meet(source, source_meet_id, details).await?;
    self.meets.insert(key, meet.meet_id);
    Ok(meet.meet_id)
  }
}
