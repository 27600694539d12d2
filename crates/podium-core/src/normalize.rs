//! Name normalization used for identity resolution and meet unification.
//!
//! The rules are intentionally conservative: trim, collapse inner
//! whitespace, case-fold. Anything fuzzier (token reversal, similarity)
//! only ever produces alias *candidates* for a human to confirm.

/// Normalize a person, club, or meet name for lookup.
pub fn normalize_name(name: &str) -> String {
  name
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn collapses_whitespace_and_folds_case() {
    assert_eq!(normalize_name("  Jon   SMITH "), "jon smith");
    assert_eq!(normalize_name("Acme\tGymnastics  Club"), "acme gymnastics club");
  }

  #[test]
  fn empty_input_stays_empty() {
    assert_eq!(normalize_name("   "), "");
  }
}
