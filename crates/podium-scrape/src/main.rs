//! The `podium` service binary.
//!
//! Reads `podium.toml` (or the path given with `--config`), opens the
//! SQLite store, and runs either the long-lived scrape service or one of
//! the administrative one-shots.
//!
//! Source connectors are linked in by integrators through
//! [`podium_scrape::SourceConnector`]; with none registered, `serve` still
//! runs the loader, gold refresh, and heartbeat over raw files produced by
//! external scraper processes.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use podium_core::alias::AliasKind;
use podium_ingest::{
  aliases::{apply_alias_map, load_alias_file},
  Loader,
};
use podium_scrape::{
  jobs, suggest::suggest_aliases, suggest::SuggestOptions, Orchestrator,
  PodiumConfig, SourceConnector, StatusManifest, TaskState,
};
use podium_store_sqlite::SqliteStore;
use tokio::sync::watch;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Podium results ingestion service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "podium.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run the long-lived service: orchestrator, batch trigger, gold
  /// refresh, and heartbeat, until interrupted.
  Serve,
  /// One-shot load of every unprocessed raw file, then exit.
  Load,
  /// Apply or suggest curated alias maps.
  Aliases {
    #[command(subcommand)]
    action: AliasAction,
  },
  /// Rebuild the derived gold tables now.
  Gold,
  /// Print task counts from the status manifest.
  Status,
  /// Requeue terminally failed tasks.
  ResetFailed,
}

#[derive(Subcommand)]
enum AliasAction {
  /// Apply the configured person and club alias files.
  Apply,
  /// Print alias candidates for the given entity kind as JSON, for human
  /// curation. Never applied automatically.
  Suggest {
    #[arg(value_enum)]
    kind: AliasKindArg,
    /// Minimum fuzzy-match score for the similarity heuristic.
    #[arg(long, default_value_t = 120)]
    min_score: i64,
    /// Minimum shared words for the overlap heuristic.
    #[arg(long, default_value_t = 2)]
    min_shared_words: usize,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum AliasKindArg {
  Person,
  Club,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = Arc::new(
    PodiumConfig::load(&cli.config).context("failed to read config file")?,
  );

  let store = SqliteStore::open(&config.db_path, config.busy_timeout())
    .await
    .with_context(|| format!("failed to open store at {:?}", config.db_path))?;

  match cli.command {
    Command::Serve => serve(store, config).await,
    Command::Load => {
      let report = Loader::new(store).run(&config.output_dirs()).await?;
      info!(
        loaded = report.files_loaded,
        skipped = report.files_skipped,
        failed = report.files_failed,
        inserted = report.performances_inserted,
        "load finished"
      );
      Ok(())
    }
    Command::Aliases { action } => aliases(store, config, action).await,
    Command::Gold => {
      let report = store.refresh_gold().await?;
      info!(
        mag_rows = report.mag_rows,
        wag_rows = report.wag_rows,
        "gold refresh finished"
      );
      Ok(())
    }
    Command::Status => {
      let manifest = StatusManifest::load(config.manifest_path.clone()).await?;
      println!(
        "tasks: {} total, {} pending, {} retrying, {} done, {} failed",
        manifest.len(),
        manifest.count_in(TaskState::Pending),
        manifest.count_in(TaskState::Retrying),
        manifest.count_in(TaskState::Done),
        manifest.count_in(TaskState::Failed),
      );
      Ok(())
    }
    Command::ResetFailed => {
      let mut manifest =
        StatusManifest::load(config.manifest_path.clone()).await?;
      let reset = manifest.reset_failed();
      manifest.save().await?;
      info!(reset, "failed tasks requeued");
      Ok(())
    }
  }
}

async fn serve(store: SqliteStore, config: Arc<PodiumConfig>) -> anyhow::Result<()> {
  // Connectors are provided by integrators; the service is still useful
  // without them when external scraper processes fill the output dirs.
  let connectors: Vec<Arc<dyn SourceConnector>> = Vec::new();
  if connectors.is_empty() {
    warn!("no source connectors registered; scraping is idle");
  }

  let (stop_tx, stop_rx) = watch::channel(false);

  let ctx = Arc::new(jobs::JobContext::new(store, config.clone()));
  let mut orchestrator = Orchestrator::new(
    config.clone(),
    connectors,
    stop_rx.clone(),
    ctx.fresh_files.clone(),
    ctx.batch_notify.clone(),
  )
  .await?;

  let batch = tokio::spawn(jobs::run_batch_trigger(ctx.clone(), stop_rx.clone()));
  let gold = tokio::spawn(jobs::run_gold_refresh(ctx.clone(), stop_rx.clone()));
  let heartbeat = tokio::spawn(jobs::run_heartbeat(
    ctx.clone(),
    orchestrator.manifest(),
    stop_rx.clone(),
  ));

  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      info!("shutdown requested; draining in-flight work");
      let _ = stop_tx.send(true);
    }
  });

  orchestrator.run().await?;
  let _ = tokio::join!(batch, gold, heartbeat);
  info!("service stopped");
  Ok(())
}

async fn aliases(
  store: SqliteStore,
  config: Arc<PodiumConfig>,
  action: AliasAction,
) -> anyhow::Result<()> {
  match action {
    AliasAction::Apply => {
      let files = [
        (AliasKind::Person, config.person_alias_file.as_ref()),
        (AliasKind::Club, config.club_alias_file.as_ref()),
      ];
      for (kind, path) in files {
        let Some(path) = path else {
          info!(kind = kind.as_str(), "no alias file configured, skipping");
          continue;
        };
        let map = load_alias_file(path)
          .await
          .with_context(|| format!("failed to load alias file {path:?}"))?;
        let report = apply_alias_map(&store, kind, &map).await?;
        info!(
          kind = kind.as_str(),
          merged = report.merged,
          ledger_only = report.ledger_only,
          skipped = report.skipped,
          "alias file applied"
        );
      }
      // Aliases routinely reveal meets that now share a (name, year) key.
      let folded = store.unify_meets().await?;
      info!(folded, "meet unification finished");
      Ok(())
    }
    AliasAction::Suggest {
      kind,
      min_score,
      min_shared_words,
    } => {
      let names = match kind {
        AliasKindArg::Person => store.list_person_names().await?,
        AliasKindArg::Club => store.list_club_names().await?,
      };
      let map = suggest_aliases(
        &names,
        &SuggestOptions {
          min_score,
          min_shared_words,
        },
      );
      println!("{}", map.to_json()?);
      Ok(())
    }
  }
}
