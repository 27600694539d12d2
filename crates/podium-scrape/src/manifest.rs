//! The persisted scrape-status manifest.
//!
//! A JSON map keyed `"{source}_{source_meet_id}"`, rewritten wholesale on
//! each update but always through a write-to-temporary-then-rename, so a
//! crash mid-write never corrupts it. Older manifests stored bare
//! done-markers as values; loading stays lenient about that.

use std::{collections::HashMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
  Pending,
  Running,
  Done,
  Failed,
  Retrying,
}

impl TaskState {
  /// Terminal states are never resubmitted by the orchestrator.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Done | Self::Failed)
  }

  /// States eligible for dispatch in the next attempt.
  pub fn is_runnable(self) -> bool {
    matches!(self, Self::Pending | Self::Retrying)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
  pub status:     TaskState,
  #[serde(default)]
  pub name:       String,
  #[serde(default)]
  pub fail_count: u32,
}

impl TaskRecord {
  pub fn pending(name: &str) -> Self {
    Self {
      status:     TaskState::Pending,
      name:       name.to_owned(),
      fail_count: 0,
    }
  }
}

/// Manifest values as found on disk: either a full record or a legacy bare
/// done-marker string.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecord {
  Record(TaskRecord),
  Marker(String),
}

// ─── Manifest ────────────────────────────────────────────────────────────────

pub struct StatusManifest {
  path:    PathBuf,
  records: HashMap<String, TaskRecord>,
}

impl StatusManifest {
  /// Load the manifest at `path`; a missing file is an empty manifest.
  pub async fn load(path: PathBuf) -> Result<Self> {
    let records = match tokio::fs::read(&path).await {
      Ok(bytes) => {
        let stored: HashMap<String, StoredRecord> =
          serde_json::from_slice(&bytes)?;
        stored
          .into_iter()
          .map(|(key, value)| {
            let record = match value {
              StoredRecord::Record(record) => record,
              StoredRecord::Marker(_) => TaskRecord {
                status:     TaskState::Done,
                name:       String::new(),
                fail_count: 0,
              },
            };
            (key, record)
          })
          .collect()
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
      Err(e) => return Err(e.into()),
    };

    Ok(Self { path, records })
  }

  /// Persist the whole map atomically: write a sibling temporary file, then
  /// rename over the target. Rename is atomic within one filesystem.
  pub async fn save(&self) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(&self.records)?;
    let tmp = self.path.with_extension("json.tmp");
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, &self.path).await?;
    Ok(())
  }

  pub fn record(&self, key: &str) -> Option<&TaskRecord> {
    self.records.get(key)
  }

  pub fn insert(&mut self, key: String, record: TaskRecord) {
    self.records.insert(key, record);
  }

  pub fn contains(&self, key: &str) -> bool {
    self.records.contains_key(key)
  }

  pub fn set_state(&mut self, key: &str, state: TaskState) {
    if let Some(record) = self.records.get_mut(key) {
      record.status = state;
    }
  }

  /// Record one failure: below the cap the task returns to the retry pool,
  /// at the cap it becomes terminally failed. Returns the new state.
  pub fn record_failure(&mut self, key: &str, max_failures: u32) -> TaskState {
    let Some(record) = self.records.get_mut(key) else {
      return TaskState::Failed;
    };
    record.fail_count += 1;
    record.status = if record.fail_count >= max_failures {
      TaskState::Failed
    } else {
      TaskState::Retrying
    };
    record.status
  }

  pub fn runnable_keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self
      .records
      .iter()
      .filter(|(_, r)| r.status.is_runnable())
      .map(|(k, _)| k.clone())
      .collect();
    keys.sort();
    keys
  }

  pub fn count_in(&self, state: TaskState) -> usize {
    self.records.values().filter(|r| r.status == state).count()
  }

  /// A process that died mid-task leaves `running` entries behind; on
  /// startup they go back to the retry pool with at most one task's
  /// progress lost.
  pub fn recover_running(&mut self) -> usize {
    let mut recovered = 0;
    for record in self.records.values_mut() {
      if record.status == TaskState::Running {
        record.status = TaskState::Pending;
        recovered += 1;
      }
    }
    recovered
  }

  /// Manual reset of terminally failed tasks back into the retry pool.
  pub fn reset_failed(&mut self) -> usize {
    let mut reset = 0;
    for record in self.records.values_mut() {
      if record.status == TaskState::Failed {
        record.status = TaskState::Pending;
        record.fail_count = 0;
        reset += 1;
      }
    }
    reset
  }

  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }
}
