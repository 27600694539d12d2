//! Background jobs: batch-triggered loading, periodic gold refresh, and the
//! observability heartbeat.
//!
//! The loader and the gold refresh each run as a detached job guarded by a
//! try-lock gate — a trigger that finds the previous run still going is
//! skipped, never queued, so the store only ever sees one writer per job.

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;

use podium_ingest::{loader::pending_file_count, Loader};
use podium_store_sqlite::SqliteStore;
use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, info, warn};

use crate::{config::PodiumConfig, manifest::StatusManifest, TaskState};

// ─── Shared context ──────────────────────────────────────────────────────────

pub struct JobContext {
  pub store:        SqliteStore,
  pub config:       Arc<PodiumConfig>,
  /// Count of raw files produced since the last loader launch.
  pub fresh_files:  Arc<AtomicUsize>,
  /// Poked by the orchestrator when `fresh_files` crosses the threshold.
  pub batch_notify: Arc<Notify>,
  loader_gate:      Arc<Mutex<()>>,
  gold_gate:        Arc<Mutex<()>>,
}

impl JobContext {
  pub fn new(store: SqliteStore, config: Arc<PodiumConfig>) -> Self {
    Self {
      store,
      config,
      fresh_files: Arc::new(AtomicUsize::new(0)),
      batch_notify: Arc::new(Notify::new()),
      loader_gate: Arc::new(Mutex::new(())),
      gold_gate: Arc::new(Mutex::new(())),
    }
  }
}

// ─── Loader trigger ──────────────────────────────────────────────────────────

/// Launch the loader as a detached job, unless one is already running.
pub fn spawn_loader(ctx: &Arc<JobContext>) {
  let Ok(guard) = Arc::clone(&ctx.loader_gate).try_lock_owned() else {
    debug!("loader already running; trigger skipped");
    return;
  };

  ctx.fresh_files.store(0, Ordering::Relaxed);
  let store = ctx.store.clone();
  let dirs = ctx.config.output_dirs();

  tokio::spawn(async move {
    let _running = guard;
    match Loader::new(store).run(&dirs).await {
      Ok(report) => info!(
        loaded = report.files_loaded,
        inserted = report.performances_inserted,
        duplicates = report.duplicates_suppressed,
        failed = report.files_failed,
        "background load finished"
      ),
      Err(error) => warn!(%error, "background load failed"),
    }
  });
}

/// Watch the fresh-file counter and the wall clock; either crossing the
/// threshold or the interval elapsing launches a loader run.
pub async fn run_batch_trigger(
  ctx: Arc<JobContext>,
  mut stop: watch::Receiver<bool>,
) {
  let mut tick = tokio::time::interval(Duration::from_secs(
    ctx.config.batch_interval_secs,
  ));
  tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  // The first tick completes immediately; it doubles as the startup
  // catch-up pass over files left behind by a previous run.
  loop {
    tokio::select! {
      _ = tick.tick() => {}
      _ = ctx.batch_notify.notified() => {
        if ctx.fresh_files.load(Ordering::Relaxed) < ctx.config.batch_threshold {
          continue;
        }
      }
      _ = stop.changed() => break,
    }
    spawn_loader(&ctx);
  }
  debug!("batch trigger stopped");
}

// ─── Gold refresh ────────────────────────────────────────────────────────────

/// Periodically rebuild the derived reporting tables. Skipped while a
/// previous refresh still runs; contention with the loader is absorbed by
/// the store's own write locking.
pub async fn run_gold_refresh(
  ctx: Arc<JobContext>,
  mut stop: watch::Receiver<bool>,
) {
  let mut tick = tokio::time::interval(Duration::from_secs(
    ctx.config.gold_interval_secs,
  ));
  tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  loop {
    tokio::select! {
      _ = tick.tick() => {}
      _ = stop.changed() => break,
    }

    let Ok(guard) = Arc::clone(&ctx.gold_gate).try_lock_owned() else {
      debug!("gold refresh already running; trigger skipped");
      continue;
    };
    let store = ctx.store.clone();
    tokio::spawn(async move {
      let _running = guard;
      match store.refresh_gold().await {
        Ok(report) => info!(
          mag_rows = report.mag_rows,
          wag_rows = report.wag_rows,
          "gold refresh finished"
        ),
        Err(error) => warn!(%error, "gold refresh failed"),
      }
    });
  }
  debug!("gold refresh timer stopped");
}

// ─── Heartbeat ───────────────────────────────────────────────────────────────

/// Periodic backlog report: remaining tasks, unloaded files, and which
/// background jobs are currently running — observable without inspecting
/// the store.
pub async fn run_heartbeat(
  ctx: Arc<JobContext>,
  manifest: Arc<Mutex<StatusManifest>>,
  mut stop: watch::Receiver<bool>,
) {
  let mut tick = tokio::time::interval(Duration::from_secs(
    ctx.config.heartbeat_interval_secs,
  ));
  tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  loop {
    tokio::select! {
      _ = tick.tick() => {}
      _ = stop.changed() => break,
    }

    let (remaining, done, failed) = {
      let m = manifest.lock().await;
      (
        m.runnable_keys().len(),
        m.count_in(TaskState::Done),
        m.count_in(TaskState::Failed),
      )
    };
    let pending_files =
      match pending_file_count(&ctx.store, &ctx.config.output_dirs()).await {
        Ok(count) => count,
        Err(error) => {
          warn!(%error, "pending file count failed");
          0
        }
      };
    let loader_running = ctx.loader_gate.try_lock().is_err();
    let gold_running = ctx.gold_gate.try_lock().is_err();

    info!(
      remaining_tasks = remaining,
      done_tasks = done,
      failed_tasks = failed,
      pending_files,
      loader_running,
      gold_running,
      "heartbeat"
    );
  }
  debug!("heartbeat stopped");
}
