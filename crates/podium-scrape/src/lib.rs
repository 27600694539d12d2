//! The scrape-task orchestrator and its background jobs.
//!
//! A long-lived service, not a one-shot batch job: rounds of bounded
//! per-source worker pools drive connector fetches, a persisted status
//! manifest survives restarts, and freshly produced raw files trigger the
//! loader and the periodic gold refresh as mutually exclusive background
//! jobs.

pub mod config;
pub mod connector;
pub mod error;
pub mod jobs;
pub mod manifest;
pub mod orchestrator;
pub mod suggest;

pub use config::{PodiumConfig, SourceConfig};
pub use connector::{MeetTarget, SourceConnector};
pub use error::{Error, Result};
pub use manifest::{StatusManifest, TaskRecord, TaskState};
pub use orchestrator::Orchestrator;
