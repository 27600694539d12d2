//! Best-effort parsing of numeric result cells.
//!
//! Sources disagree on decimal separators and decorate ranks with ties and
//! punctuation. Parsing never fails a row: an unparsable cell yields `None`
//! and the original text is preserved in the performance metadata.

/// Parse a score cell. Accepts `,` as a decimal separator.
pub fn parse_score(raw: &str) -> Option<f64> {
  let cleaned = raw.trim().replace(',', ".");
  if cleaned.is_empty() {
    return None;
  }
  cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a rank cell. Tolerates a trailing `.` and tie markers like `3T`.
pub fn parse_rank(raw: &str) -> Option<i64> {
  let trimmed = raw.trim().trim_end_matches('.');
  if trimmed.is_empty() {
    return None;
  }
  let digits = trimmed.trim_end_matches(|c: char| c.is_alphabetic() || c == '*');
  digits.trim().parse::<i64>().ok().filter(|v| *v > 0)
}
