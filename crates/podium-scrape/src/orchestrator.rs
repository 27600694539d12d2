//! The scrape task orchestrator — a long-lived service loop.
//!
//! Tasks are keyed `(source, source_meet_id)` and grouped by source into
//! independently sized pools. Within an attempt each pool works in chunks
//! of its pool size, drained in completion order so one slow task cannot
//! stall faster ones in its chunk. Status is persisted after every single
//! task completion; a restart resumes from last-known state with at most
//! one task's progress lost.

use std::{
  collections::HashMap,
  path::Path,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
  time::Duration,
};

use podium_core::raw::RawFile;
use rand::seq::SliceRandom as _;
use tokio::{
  sync::{watch, Mutex, Notify},
  task::JoinSet,
};
use tracing::{debug, info, warn};

use crate::{
  config::{PodiumConfig, SourceConfig},
  connector::{MeetTarget, SourceConnector},
  manifest::{StatusManifest, TaskRecord, TaskState},
  Result,
};

// ─── Round report ────────────────────────────────────────────────────────────

/// Counters from one round of attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
  pub discovered: usize,
  pub completed:  usize,
  pub failed:     usize,
  /// Runnable tasks left after the round's attempts were exhausted.
  pub remaining:  usize,
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

pub struct Orchestrator {
  config:       Arc<PodiumConfig>,
  connectors:   HashMap<String, Arc<dyn SourceConnector>>,
  manifest:     Arc<Mutex<StatusManifest>>,
  stop:         watch::Receiver<bool>,
  fresh_files:  Arc<AtomicUsize>,
  batch_notify: Arc<Notify>,
}

impl Orchestrator {
  /// Load the manifest and requeue anything a previous process left
  /// mid-flight.
  pub async fn new(
    config: Arc<PodiumConfig>,
    connectors: Vec<Arc<dyn SourceConnector>>,
    stop: watch::Receiver<bool>,
    fresh_files: Arc<AtomicUsize>,
    batch_notify: Arc<Notify>,
  ) -> Result<Self> {
    let mut manifest = StatusManifest::load(config.manifest_path.clone()).await?;
    let recovered = manifest.recover_running();
    if recovered > 0 {
      info!(recovered, "requeued tasks left running by a previous process");
    }

    let connectors: HashMap<String, Arc<dyn SourceConnector>> = connectors
      .into_iter()
      .map(|c| (c.source().to_owned(), c))
      .collect();
    for source in connectors.keys() {
      if config.source(source).is_none() {
        return Err(crate::Error::UnknownSource(source.clone()));
      }
    }

    Ok(Self {
      config,
      connectors,
      manifest: Arc::new(Mutex::new(manifest)),
      stop,
      fresh_files,
      batch_notify,
    })
  }

  pub fn manifest(&self) -> Arc<Mutex<StatusManifest>> {
    self.manifest.clone()
  }

  fn stopped(&self) -> bool { *self.stop.borrow() }

  /// The service loop: round, poll sleep, round, … until the stop signal.
  /// Target and status sources are reloaded every round, so newly published
  /// meets are picked up without a restart.
  pub async fn run(&mut self) -> Result<()> {
    loop {
      if self.stopped() {
        break;
      }

      let report = self.run_round().await?;
      if self.stopped() {
        break;
      }
      if report.remaining > 0 {
        info!(
          remaining = report.remaining,
          "tasks remain after round; sleeping until next poll"
        );
      }

      let poll = Duration::from_secs(self.config.poll_interval_secs);
      tokio::select! {
        _ = tokio::time::sleep(poll) => {}
        _ = self.stop.changed() => {}
      }
    }

    // Flush status before exit; in-flight work has already drained.
    self.manifest.lock().await.save().await?;
    info!("orchestrator stopped");
    Ok(())
  }

  /// One round: rediscover targets, then up to `attempts_per_round` passes
  /// over whatever is still runnable.
  pub async fn run_round(&self) -> Result<RoundReport> {
    let targets = self.discover_targets().await?;
    let mut report = RoundReport {
      discovered: targets.len(),
      ..RoundReport::default()
    };

    for attempt in 0..self.config.attempts_per_round {
      if self.stopped() {
        break;
      }

      let runnable: Vec<String> = {
        let manifest = self.manifest.lock().await;
        manifest
          .runnable_keys()
          .into_iter()
          .filter(|key| targets.contains_key(key))
          .collect()
      };
      if runnable.is_empty() {
        break;
      }
      debug!(attempt, tasks = runnable.len(), "starting attempt");

      let (completed, failed) = self.run_attempt(&targets, runnable).await;
      report.completed += completed;
      report.failed += failed;
    }

    {
      let manifest = self.manifest.lock().await;
      report.remaining = manifest.runnable_keys().len();
      manifest.save().await?;
    }
    Ok(report)
  }

  /// Ask every connector for its current targets; unknown keys enter the
  /// manifest as pending.
  async fn discover_targets(&self) -> Result<HashMap<String, MeetTarget>> {
    let mut targets = HashMap::new();

    for (source, connector) in &self.connectors {
      match connector.discover().await {
        Ok(found) => {
          let mut manifest = self.manifest.lock().await;
          for target in found {
            let key = target.key();
            if !manifest.contains(&key) {
              manifest.insert(key.clone(), TaskRecord::pending(&target.name));
            }
            targets.insert(key, target);
          }
        }
        Err(error) => warn!(source = %source, %error, "target discovery failed"),
      }
    }

    self.manifest.lock().await.save().await?;
    Ok(targets)
  }

  /// One pass: group runnable tasks by source and run every source's pool
  /// concurrently. Tasks for sources without configuration or connector
  /// stay runnable and are reported by the heartbeat.
  async fn run_attempt(
    &self,
    targets: &HashMap<String, MeetTarget>,
    runnable: Vec<String>,
  ) -> (usize, usize) {
    let mut by_source: HashMap<String, Vec<MeetTarget>> = HashMap::new();
    for key in runnable {
      if let Some(target) = targets.get(&key) {
        by_source
          .entry(target.source.clone())
          .or_default()
          .push(target.clone());
      }
    }

    let mut pools = JoinSet::new();
    for (source, tasks) in by_source {
      let Some(source_cfg) = self.config.source(&source) else {
        warn!(source = %source, "no configuration for source; tasks held");
        continue;
      };
      let Some(connector) = self.connectors.get(&source) else {
        continue;
      };

      let ordered = order_tasks(tasks, source_cfg);
      pools.spawn(run_source_pool(
        connector.clone(),
        source_cfg.clone(),
        ordered,
        self.manifest.clone(),
        self.config.clone(),
        self.stop.clone(),
        self.fresh_files.clone(),
        self.batch_notify.clone(),
      ));
    }

    let mut completed = 0;
    let mut failed = 0;
    while let Some(joined) = pools.join_next().await {
      match joined {
        Ok((c, f)) => {
          completed += c;
          failed += f;
        }
        Err(error) => warn!(%error, "source pool panicked"),
      }
    }
    (completed, failed)
  }
}

// ─── Task ordering ───────────────────────────────────────────────────────────

fn is_priority(target: &MeetTarget, cfg: &SourceConfig) -> bool {
  let name = target.name.to_lowercase();
  let location = target
    .location
    .as_deref()
    .map(str::to_lowercase)
    .unwrap_or_default();

  cfg
    .priority_names
    .iter()
    .any(|p| name.contains(&p.to_lowercase()))
    || cfg
      .priority_locations
      .iter()
      .any(|p| !location.is_empty() && location.contains(&p.to_lowercase()))
}

/// Curated-priority tasks first, in stable key order; everything else
/// shuffled so no single stretch of a source's id space monopolises every
/// attempt.
pub(crate) fn order_tasks(
  mut tasks: Vec<MeetTarget>,
  cfg: &SourceConfig,
) -> Vec<MeetTarget> {
  tasks.sort_by(|a, b| a.source_meet_id.cmp(&b.source_meet_id));

  let (mut priority, mut remainder): (Vec<_>, Vec<_>) =
    tasks.into_iter().partition(|t| is_priority(t, cfg));

  remainder.shuffle(&mut rand::rng());
  priority.extend(remainder);
  priority
}

// ─── Pool driver ─────────────────────────────────────────────────────────────

/// Run one source's tasks in chunks of its pool size. A stop request lets
/// the in-flight chunk drain and submits nothing further.
#[allow(clippy::too_many_arguments)]
async fn run_source_pool(
  connector: Arc<dyn SourceConnector>,
  cfg: SourceConfig,
  tasks: Vec<MeetTarget>,
  manifest: Arc<Mutex<StatusManifest>>,
  config: Arc<PodiumConfig>,
  stop: watch::Receiver<bool>,
  fresh_files: Arc<AtomicUsize>,
  batch_notify: Arc<Notify>,
) -> (usize, usize) {
  let mut completed = 0;
  let mut failed = 0;

  for chunk in tasks.chunks(cfg.pool_size.max(1)) {
    if *stop.borrow() {
      debug!(
        source = %cfg.name,
        "stop requested; not submitting further chunks"
      );
      break;
    }

    let mut inflight = JoinSet::new();
    for target in chunk {
      {
        let mut m = manifest.lock().await;
        m.set_state(&target.key(), TaskState::Running);
        if let Err(error) = m.save().await {
          warn!(%error, "manifest save failed");
        }
      }

      // A retry must start clean, never append to truncated output.
      if let Err(error) = clean_stale_outputs(&cfg.output_dir, target).await {
        warn!(key = %target.key(), %error, "stale output cleanup failed");
      }

      let connector = connector.clone();
      let target = target.clone();
      inflight
        .spawn(async move { (target.clone(), connector.fetch(&target).await) });
    }

    // Completion order, not submission order.
    while let Some(joined) = inflight.join_next().await {
      let (target, result) = match joined {
        Ok(outcome) => outcome,
        Err(error) => {
          warn!(source = %cfg.name, %error, "scrape task panicked");
          continue;
        }
      };

      let success = handle_completion(
        &target,
        result,
        &cfg,
        &manifest,
        &config,
        &fresh_files,
        &batch_notify,
      )
      .await;

      if success {
        completed += 1;
      } else {
        failed += 1;
      }
    }
  }

  (completed, failed)
}

/// Record one task's outcome: write raw files and mark done, or bump the
/// failure count. The manifest is persisted either way.
async fn handle_completion(
  target: &MeetTarget,
  result: anyhow::Result<Vec<RawFile>>,
  cfg: &SourceConfig,
  manifest: &Arc<Mutex<StatusManifest>>,
  config: &Arc<PodiumConfig>,
  fresh_files: &Arc<AtomicUsize>,
  batch_notify: &Arc<Notify>,
) -> bool {
  let key = target.key();

  let outcome = match result {
    Ok(files) if files.iter().map(|f| f.rows.len()).sum::<usize>() == 0 => {
      Err("empty result".to_owned())
    }
    Ok(files) => match write_raw_files(&cfg.output_dir, &files).await {
      Ok(written) => Ok(written),
      Err(error) => Err(format!("writing output failed: {error}")),
    },
    Err(error) => Err(error.to_string()),
  };

  match outcome {
    Ok(written) => {
      let total = fresh_files.fetch_add(written, Ordering::Relaxed) + written;
      if total >= config.batch_threshold {
        batch_notify.notify_one();
      }

      let mut m = manifest.lock().await;
      m.set_state(&key, TaskState::Done);
      if let Err(error) = m.save().await {
        warn!(%error, "manifest save failed");
      }
      info!(key = %key, files = written, "scrape task done");
      true
    }
    Err(reason) => {
      let mut m = manifest.lock().await;
      let state = m.record_failure(&key, config.max_failures);
      if let Err(error) = m.save().await {
        warn!(%error, "manifest save failed");
      }
      warn!(key = %key, reason = %reason, state = ?state, "scrape task failed");
      false
    }
  }
}

// ─── Output files ────────────────────────────────────────────────────────────

/// Delete any prior output files for this task key.
async fn clean_stale_outputs(
  dir: &Path,
  target: &MeetTarget,
) -> std::io::Result<()> {
  let stem = RawFile::task_stem(&target.source, &target.source_meet_id);
  let exact = format!("{stem}.json");
  let prefix = format!("{stem}_");

  let mut entries = match tokio::fs::read_dir(dir).await {
    Ok(entries) => entries,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
    Err(e) => return Err(e),
  };

  while let Some(entry) = entries.next_entry().await? {
    let name = entry.file_name();
    let Some(name) = name.to_str() else { continue };
    if name == exact || (name.starts_with(&prefix) && name.ends_with(".json"))
    {
      tokio::fs::remove_file(entry.path()).await?;
      debug!(file = name, "removed stale output");
    }
  }
  Ok(())
}

async fn write_raw_files(
  dir: &Path,
  files: &[RawFile],
) -> std::io::Result<usize> {
  tokio::fs::create_dir_all(dir).await?;
  for file in files {
    let path = dir.join(format!("{}.json", file.file_stem()));
    let bytes = serde_json::to_vec_pretty(file)
      .map_err(|e| std::io::Error::other(e.to_string()))?;
    tokio::fs::write(path, bytes).await?;
  }
  Ok(files.len())
}
