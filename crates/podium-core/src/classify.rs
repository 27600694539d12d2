//! Discipline classification from raw-row column presence.
//!
//! Sources never label their tables with a discipline; they just emit the
//! apparatus columns they have. Any male-only apparatus column present makes
//! the row MAG, any female-only column makes it WAG, neither makes it Other.

use crate::{entity::Discipline, raw::RawRow};

// ─── Apparatus tables ────────────────────────────────────────────────────────

/// Apparatus names per discipline, in competition order.
pub const MAG_APPARATUS: &[&str] = &[
  "floor",
  "pommel_horse",
  "rings",
  "vault",
  "parallel_bars",
  "horizontal_bar",
];

pub const WAG_APPARATUS: &[&str] = &["vault", "uneven_bars", "beam", "floor"];

/// Apparatus shared by both disciplines; rows carrying only these stay Other.
pub const SHARED_APPARATUS: &[&str] = &["vault", "floor"];

const MAG_ONLY: &[&str] =
  &["pommel_horse", "rings", "parallel_bars", "horizontal_bar"];
const WAG_ONLY: &[&str] = &["uneven_bars", "beam"];

/// The apparatus names a row of the given discipline can score on.
pub fn apparatus_for(discipline: Discipline) -> &'static [&'static str] {
  match discipline {
    Discipline::Mag => MAG_APPARATUS,
    Discipline::Wag => WAG_APPARATUS,
    Discipline::Other => SHARED_APPARATUS,
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Classify one raw row by which apparatus columns it carries.
///
/// Column presence alone decides; cell contents are irrelevant here. A row
/// listing both male-only and female-only columns is malformed source data
/// and classifies as MAG (first match wins, deterministically).
pub fn classify_row(row: &RawRow) -> Discipline {
  if MAG_ONLY.iter().any(|a| row.has_apparatus_column(a)) {
    return Discipline::Mag;
  }
  if WAG_ONLY.iter().any(|a| row.has_apparatus_column(a)) {
    return Discipline::Wag;
  }
  Discipline::Other
}
