use std::path::PathBuf;

use clap::Parser;

use snapgc::{FileLockLeader, FsStorage, JournalCatalog, SnapshotGc, config, telemetry};

/// Run one garbage-collection pass over a snapshot store.
#[derive(Debug, Parser)]
#[command(name = "snapgc", version, about)]
struct Cli {
    /// Data directory (journal, payloads, leader lock). Defaults to the
    /// configured or XDG location.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Record decisions without mutating anything.
    #[arg(long)]
    dry_run: bool,

    /// Override retention.keep_last_n.
    #[arg(long)]
    keep_last: Option<usize>,

    /// Override retention.max_age_ms, in days.
    #[arg(long)]
    max_age_days: Option<u64>,

    /// Skip the tombstone stage.
    #[arg(long)]
    no_tombstone: bool,

    /// Skip the hard-delete stage.
    #[arg(long)]
    no_hard_delete: bool,

    /// Run without the leader lock (single-process deployments only).
    #[arg(long)]
    no_leader_lock: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    if let Err(e) = run(cli) {
        tracing::error!("gc pass failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> snapgc::Result<()> {
    let mut cfg = config::load_or_init();
    if cli.data_dir.is_some() {
        cfg.data_dir = cli.data_dir;
    }
    if cli.dry_run {
        cfg.gc.dry_run = true;
    }
    if let Some(n) = cli.keep_last {
        cfg.retention.keep_last_n = n;
    }
    if let Some(days) = cli.max_age_days {
        cfg.retention.max_age_ms = days.saturating_mul(24 * 60 * 60 * 1_000);
    }
    if cli.no_tombstone {
        cfg.gc.enable_tombstone_stage = false;
    }
    if cli.no_hard_delete {
        cfg.gc.enable_hard_delete_stage = false;
    }

    let catalog = JournalCatalog::open(cfg.journal_path())?;
    let storage = FsStorage::new(cfg.payload_root());
    let mut leader = FileLockLeader::new(cfg.leader_lock_path());

    let mut gc = SnapshotGc::new(&catalog, &storage, cfg.retention.clone(), cfg.gc.clone());
    if !cli.no_leader_lock {
        gc = gc.with_leader(&mut leader);
    }

    let metrics = gc.run_once().map_err(snapgc::Error::from)?;
    tracing::info!(
        scanned = metrics.scanned,
        tombstoned = metrics.tombstoned,
        deleted = metrics.deleted,
        quarantined = metrics.quarantined,
        delete_failed = metrics.delete_failed,
        inactive_signals = metrics.inactive_loaded_signals,
        "done"
    );
    Ok(())
}
