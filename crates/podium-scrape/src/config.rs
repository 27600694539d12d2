//! Service configuration.
//!
//! Loaded from a TOML file plus `PODIUM_`-prefixed environment variables.
//! Retry caps, thresholds, and intervals are deliberately configuration
//! rather than constants; the defaults below are starting points, not
//! behavior.

use std::path::{Path, PathBuf};

use serde::Deserialize;

// ─── Per-source ──────────────────────────────────────────────────────────────

/// One scrape source: where its raw files land, how wide its worker pool
/// runs, and which targets jump the queue.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
  pub name:       String,
  pub output_dir: PathBuf,
  /// Concurrent fetches for this source. Different sources tolerate very
  /// different loads, so this is sized per source, not globally.
  #[serde(default = "default_pool_size")]
  pub pool_size:  usize,
  /// Case-insensitive substrings; matching meet names run before the
  /// shuffled remainder of each attempt.
  #[serde(default)]
  pub priority_names:     Vec<String>,
  #[serde(default)]
  pub priority_locations: Vec<String>,
}

// ─── Global ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PodiumConfig {
  #[serde(default = "default_db_path")]
  pub db_path:       PathBuf,
  #[serde(default = "default_manifest_path")]
  pub manifest_path: PathBuf,

  pub person_alias_file: Option<PathBuf>,
  pub club_alias_file:   Option<PathBuf>,

  /// A task failing this many times becomes `failed` and is not retried
  /// until manually reset.
  #[serde(default = "default_max_failures")]
  pub max_failures:       u32,
  /// Retry attempts within one round before sleeping the poll interval.
  #[serde(default = "default_attempts_per_round")]
  pub attempts_per_round: u32,
  #[serde(default = "default_poll_interval")]
  pub poll_interval_secs: u64,

  /// Fresh raw files that trigger a loader run before the interval fires.
  #[serde(default = "default_batch_threshold")]
  pub batch_threshold:     usize,
  #[serde(default = "default_batch_interval")]
  pub batch_interval_secs: u64,
  #[serde(default = "default_gold_interval")]
  pub gold_interval_secs:  u64,
  #[serde(default = "default_heartbeat_interval")]
  pub heartbeat_interval_secs: u64,

  /// How long a writer waits out a busy store before giving up on a file.
  #[serde(default = "default_busy_timeout")]
  pub busy_timeout_ms: u64,

  #[serde(default)]
  pub sources: Vec<SourceConfig>,
}

impl PodiumConfig {
  /// Build from the TOML file at `path` (optional) layered under
  /// `PODIUM_`-prefixed environment variables.
  pub fn load(path: &Path) -> Result<Self, ::config::ConfigError> {
    ::config::Config::builder()
      .add_source(::config::File::from(path.to_path_buf()).required(false))
      .add_source(::config::Environment::with_prefix("PODIUM"))
      .build()?
      .try_deserialize()
  }

  pub fn source(&self, name: &str) -> Option<&SourceConfig> {
    self.sources.iter().find(|s| s.name == name)
  }

  /// Every configured output directory, in declaration order.
  pub fn output_dirs(&self) -> Vec<PathBuf> {
    self.sources.iter().map(|s| s.output_dir.clone()).collect()
  }

  pub fn busy_timeout(&self) -> std::time::Duration {
    std::time::Duration::from_millis(self.busy_timeout_ms)
  }
}

// ─── Defaults ────────────────────────────────────────────────────────────────

fn default_pool_size() -> usize { 4 }
fn default_db_path() -> PathBuf { PathBuf::from("podium.db") }
fn default_manifest_path() -> PathBuf { PathBuf::from("scrape_status.json") }
fn default_max_failures() -> u32 { 3 }
fn default_attempts_per_round() -> u32 { 3 }
fn default_poll_interval() -> u64 { 600 }
fn default_batch_threshold() -> usize { 25 }
fn default_batch_interval() -> u64 { 300 }
fn default_gold_interval() -> u64 { 3600 }
fn default_heartbeat_interval() -> u64 { 60 }
fn default_busy_timeout() -> u64 { 5_000 }
