//! Curated alias maps — the human-confirmed input to the merge engine.
//!
//! A map reads `{canonical display name: [observed aliases]}`. Candidate
//! generation is offline and advisory; nothing in this crate applies an
//! alias that a human has not written into one of these files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{normalize::normalize_name, Error, Result};

/// Which entity kind an alias map targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasKind {
  Person,
  Club,
}

impl AliasKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Person => "person",
      Self::Club => "club",
    }
  }
}

/// A curated `{canonical: [aliases]}` document, stored as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasMap(pub BTreeMap<String, Vec<String>>);

impl AliasMap {
  pub fn from_json(json: &str) -> Result<Self> {
    let map: Self = serde_json::from_str(json)?;
    map.validate()?;
    Ok(map)
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(&self.0)?)
  }

  /// Reject maps a human would not have confirmed: an alias that normalizes
  /// to its own canonical, or one alias claimed by two canonicals.
  pub fn validate(&self) -> Result<()> {
    let mut claimed: BTreeMap<String, &str> = BTreeMap::new();

    for (canonical, aliases) in &self.0 {
      let canonical_norm = normalize_name(canonical);
      if canonical_norm.is_empty() {
        return Err(Error::EmptyName(canonical.clone()));
      }

      for alias in aliases {
        let alias_norm = normalize_name(alias);
        if alias_norm.is_empty() {
          return Err(Error::EmptyName(alias.clone()));
        }
        if alias_norm == canonical_norm {
          return Err(Error::SelfAlias(alias.clone()));
        }
        if let Some(first) = claimed.insert(alias_norm, canonical) {
          if first != canonical.as_str() {
            return Err(Error::AmbiguousAlias {
              alias:  alias.clone(),
              first:  first.to_owned(),
              second: canonical.clone(),
            });
          }
        }
      }
    }
    Ok(())
  }

  /// Iterate `(canonical, alias)` pairs in stable order.
  pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().flat_map(|(canonical, aliases)| {
      aliases.iter().map(move |a| (canonical.as_str(), a.as_str()))
    })
  }

  pub fn alias_count(&self) -> usize {
    self.0.values().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn valid_map_round_trips() {
    let json = r#"{"Smith Jon": ["Jon Smith", "J. Smith"]}"#;
    let map = AliasMap::from_json(json).unwrap();
    assert_eq!(map.alias_count(), 2);
    let entries: Vec<_> = map.entries().collect();
    assert_eq!(entries[0], ("Smith Jon", "Jon Smith"));
  }

  #[test]
  fn self_alias_rejected() {
    let json = r#"{"Smith Jon": ["smith  jon"]}"#;
    assert!(matches!(
      AliasMap::from_json(json).unwrap_err(),
      Error::SelfAlias(_)
    ));
  }

  #[test]
  fn ambiguous_alias_rejected() {
    let json = r#"{"Smith Jon": ["J. Smith"], "Smith Jan": ["J. Smith"]}"#;
    assert!(matches!(
      AliasMap::from_json(json).unwrap_err(),
      Error::AmbiguousAlias { .. }
    ));
  }

  #[test]
  fn same_alias_twice_under_one_canonical_is_fine() {
    let json = r#"{"Smith Jon": ["J. Smith", "J.  Smith"]}"#;
    assert!(AliasMap::from_json(json).is_ok());
  }
}
