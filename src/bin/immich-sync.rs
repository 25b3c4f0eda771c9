//! CLI entry point for the album synchronization engine.
//!
//! Thin collaborator: parses flags, loads and validates configuration,
//! drives `sync_assets_with`, and renders progress. All policy lives in
//! the library; this binary only wires it to a terminal.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use immich_sync::config::SyncConfig;
use immich_sync::progress::get_progress;
use immich_sync::sync::{sync_assets_with, SyncOptions};

/// Synchronizes album membership across independently operated Immich-compatible instances.
#[derive(Parser, Debug)]
#[command(name = "immich-sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the sync group's JSON configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Compute and report what would change without transferring bytes.
    #[arg(long)]
    dry_run: bool,

    /// Render a live multi-bar progress display.
    #[arg(long)]
    verbose: bool,

    /// Maximum in-flight transfers across all targets combined.
    #[arg(long, default_value_t = 4)]
    workers: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match SyncConfig::load(&args.config).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    let cancellation = Arc::new(AtomicBool::new(false));
    let cancel_for_signal = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_for_signal.store(true, Ordering::SeqCst);
        }
    });

    let group_id = config.group_id();
    let progress_bars = args.verbose.then(|| spawn_progress_renderer(group_id.clone()));

    let options = SyncOptions {
        publish_progress: true,
        cancellation: Some(cancellation.clone()),
        ..Default::default()
    };

    let summary = sync_assets_with(&config, args.dry_run, true, args.workers, options, None).await;

    if let Some(handle) = progress_bars {
        handle.abort();
    }

    let summary = match summary {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("sync failed: {e}");
            std::process::exit(2);
        }
    };

    print_summary(&summary);

    if cancellation.load(Ordering::SeqCst) {
        std::process::exit(130);
    }
    if !summary.errors.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

/// Polls `get_progress` and renders one `indicatif` bar per instance plus
/// an overall bar in a `MultiProgress`.
fn spawn_progress_renderer(group_id: String) -> tokio::task::JoinHandle<()> {
    use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
    use std::collections::HashMap;

    tokio::spawn(async move {
        let multi = MultiProgress::new();
        let style = ProgressStyle::with_template(
            "{prefix:12} [{bar:30}] {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());

        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(style.clone());
        overall.set_prefix("overall");

        let mut instance_bars: HashMap<String, ProgressBar> = HashMap::new();

        loop {
            let snapshot = get_progress(&group_id);
            overall.set_length(snapshot.total as u64);
            overall.set_position(snapshot.done as u64);

            for (name, progress) in &snapshot.per_instance {
                let bar = instance_bars.entry(name.clone()).or_insert_with(|| {
                    let bar = multi.add(ProgressBar::new(0));
                    bar.set_style(style.clone());
                    bar.set_prefix(name.clone());
                    bar
                });
                bar.set_length(progress.missing as u64);
                bar.set_position(progress.done as u64);
            }

            if snapshot.status == immich_sync::progress::RunStatus::Idle && snapshot.total > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        overall.finish();
        for bar in instance_bars.values() {
            bar.finish();
        }
    })
}

fn print_summary(summary: &immich_sync::models::SyncSummary) {
    println!(
        "checksums: {}  copied: {}  linked: {}  errors: {}",
        summary.total_checksums,
        summary.copied,
        summary.linked,
        summary.errors.len()
    );
    for (server, stats) in &summary.per_server {
        println!(
            "  {server}: missing_before={} copied={} linked={} oversized={} remaining={}",
            stats.missing_before, stats.copied, stats.linked, stats.oversized, stats.remaining
        );
    }
    for (server, entries) in &summary.oversized {
        for entry in entries {
            println!(
                "  oversized [{server}] {} ({} bytes, checksum {})",
                entry.filename, entry.size, entry.checksum
            );
        }
    }
    for error in &summary.errors {
        eprintln!("  error: {error}");
    }
}
