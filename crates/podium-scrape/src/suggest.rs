//! Offline alias candidate generation.
//!
//! Emits a `{canonical: [aliases]}` skeleton from the live name tables for
//! a human to prune and confirm. Nothing here is ever applied
//! automatically: the output is advisory, the curated file is the input to
//! the merge engine.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use fuzzy_matcher::{skim::SkimMatcherV2, FuzzyMatcher};
use podium_core::{alias::AliasMap, normalize::normalize_name};

pub struct SuggestOptions {
  /// Minimum SkimMatcher score for the string-similarity heuristic.
  pub min_score:        i64,
  /// Minimum shared normalized tokens for the word-overlap heuristic
  /// (useful for club names, which share long common suffixes).
  pub min_shared_words: usize,
}

impl Default for SuggestOptions {
  fn default() -> Self {
    Self {
      min_score:        120,
      min_shared_words: 2,
    }
  }
}

fn tokens(normalized: &str) -> BTreeSet<&str> {
  normalized.split(' ').filter(|t| !t.is_empty()).collect()
}

fn token_multiset(normalized: &str) -> Vec<&str> {
  let mut t: Vec<&str> =
    normalized.split(' ').filter(|t| !t.is_empty()).collect();
  t.sort_unstable();
  t
}

/// Pairwise candidate generation over display names.
///
/// The lexicographically earlier name of each pair becomes the candidate
/// canonical — an arbitrary but stable choice the curator is expected to
/// flip where wrong. Each name is claimed as an alias at most once, so the
/// output always validates as an [`AliasMap`].
pub fn suggest_aliases(
  names: &[String],
  options: &SuggestOptions,
) -> AliasMap {
  let mut sorted: Vec<&String> = names.iter().collect();
  sorted.sort();
  sorted.dedup();

  let normalized: Vec<String> =
    sorted.iter().map(|n| normalize_name(n)).collect();
  let matcher = SkimMatcherV2::default();

  let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
  let mut claimed: HashSet<usize> = HashSet::new();

  for i in 0..sorted.len() {
    // A name already claimed as an alias never becomes a canonical; chains
    // like A→B→C would only confuse the curator.
    if claimed.contains(&i) {
      continue;
    }
    for j in (i + 1)..sorted.len() {
      if claimed.contains(&j) || normalized[i] == normalized[j] {
        continue;
      }

      let reversal =
        token_multiset(&normalized[i]) == token_multiset(&normalized[j]);
      let similar = || {
        let forward = matcher
          .fuzzy_match(&normalized[i], &normalized[j])
          .unwrap_or(0);
        let backward = matcher
          .fuzzy_match(&normalized[j], &normalized[i])
          .unwrap_or(0);
        forward.max(backward) >= options.min_score
      };
      let overlapping = || {
        tokens(&normalized[i])
          .intersection(&tokens(&normalized[j]))
          .count()
          >= options.min_shared_words
      };

      if reversal || similar() || overlapping() {
        map
          .entry(sorted[i].clone())
          .or_default()
          .push(sorted[j].clone());
        claimed.insert(j);
      }
    }
  }

  AliasMap(map)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn token_reversal_is_a_candidate() {
    let strict = SuggestOptions {
      min_score:        i64::MAX,
      min_shared_words: usize::MAX,
    };
    let map = suggest_aliases(
      &names(&["Smith Jon", "Jon Smith", "Doe Jane"]),
      &strict,
    );
    assert_eq!(map.alias_count(), 1);
    assert_eq!(map.0["Jon Smith"], vec!["Smith Jon".to_owned()]);
  }

  #[test]
  fn shared_word_overlap_catches_club_variants() {
    let options = SuggestOptions {
      min_score:        i64::MAX,
      min_shared_words: 2,
    };
    let map = suggest_aliases(
      &names(&["Acme Gymnastics Club", "Acme Club", "Riverside TV"]),
      &options,
    );
    assert_eq!(map.alias_count(), 1);
    assert_eq!(map.0["Acme Club"], vec!["Acme Gymnastics Club".to_owned()]);
  }

  #[test]
  fn unrelated_names_stay_unpaired() {
    let map = suggest_aliases(
      &names(&["Smith Jon", "Riverside TV"]),
      &SuggestOptions::default(),
    );
    assert!(map.is_empty());
  }

  #[test]
  fn output_always_validates() {
    let map = suggest_aliases(
      &names(&["Jon Smith", "Smith Jon", "Smith Jon Jr"]),
      &SuggestOptions::default(),
    );
    map.validate().expect("suggestions must form a valid alias map");
  }
}
