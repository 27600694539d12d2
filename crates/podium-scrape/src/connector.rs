//! The connector seam.
//!
//! Per-source page and markup extraction lives behind [`SourceConnector`];
//! this crate never sees a URL or a DOM. Connectors yield normalized
//! [`RawFile`]s, which the orchestrator writes into the source's output
//! directory for the loader to pick up.

use async_trait::async_trait;
use podium_core::raw::RawFile;
use serde::{Deserialize, Serialize};

/// A scrape target discovered by a connector — the natural key of a meet
/// plus whatever display details the source exposes up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetTarget {
  pub source:         String,
  pub source_meet_id: String,
  pub name:           String,
  #[serde(default)]
  pub location:       Option<String>,
}

impl MeetTarget {
  /// The manifest key: `{source}_{source_meet_id}`.
  pub fn key(&self) -> String {
    format!("{}_{}", self.source, self.source_meet_id)
  }
}

/// One source's scraping connector — a black box from this crate's point of
/// view. Implementations typically drive a browser or HTTP client and parse
/// source-specific markup.
#[async_trait]
pub trait SourceConnector: Send + Sync {
  /// The source name; must match a `[[sources]]` entry in the config.
  fn source(&self) -> &str;

  /// Enumerate the currently known scrape targets for this source. Called
  /// at the start of every round, so newly published meets are picked up
  /// without a restart.
  async fn discover(&self) -> anyhow::Result<Vec<MeetTarget>>;

  /// Fetch all result rows for one target, possibly split over several
  /// files (one per sub-session). An `Ok` result with no rows at all is
  /// treated as a failure by the orchestrator — flaky targets routinely
  /// answer with an empty page.
  async fn fetch(&self, target: &MeetTarget) -> anyhow::Result<Vec<RawFile>>;
}
