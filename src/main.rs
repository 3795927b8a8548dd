//! CLI entry point for the imgshrink tool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use bytesize::ByteSize;
use clap::Parser;
use imgshrink_core::{
    CompressClient, ContentCache, Fingerprint, ScanFilter, Scheduler, Task, TaskError, scan, task,
};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

/// Default cache file name, created under the scan root.
const CACHE_FILE_NAME: &str = ".imgshrink-cache.json";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    if !args.path.exists() {
        bail!("{} does not exist", args.path.display());
    }

    let cache_path = args
        .cache_file
        .clone()
        .unwrap_or_else(|| args.path.join(CACHE_FILE_NAME));
    let cache = Arc::new(Mutex::new(ContentCache::load(&cache_path)));

    let client = match &args.endpoint {
        Some(endpoint) => CompressClient::with_endpoint(endpoint),
        None => CompressClient::new(),
    };

    let scan_filter = ScanFilter::with_max_size(args.max_size);
    let mut scheduler = Scheduler::new(usize::from(args.concurrency))?;

    // Fingerprint every candidate up front; only unknown content is queued.
    let mut skipped = 0usize;
    for path in scan(&args.path, &scan_filter) {
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        let fingerprint = Fingerprint::of_bytes(&bytes);
        if lock(&cache).contains(&fingerprint) {
            info!(path = %path.display(), "already compressed, skipping");
            skipped += 1;
            continue;
        }
        scheduler.submit(compress_task(client.clone(), Arc::clone(&cache), path));
    }

    let queued = scheduler.pending();
    if queued == 0 {
        info!(skipped, "nothing to compress");
        return Ok(());
    }
    info!(queued, skipped, "starting compression");

    let checkpoint_cache = Arc::clone(&cache);
    let report = scheduler
        .run(move || lock(&checkpoint_cache).persist())
        .await?;

    info!(
        success = report.success,
        failure = report.failure,
        recorded = lock(&cache).len(),
        "compression complete"
    );

    Ok(())
}

/// Locks the cache, shrugging off poisoning: the fingerprint set stays
/// consistent even if a task panicked mid-run.
fn lock(cache: &Arc<Mutex<ContentCache>>) -> MutexGuard<'_, ContentCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds the scheduler task for one file: compress in place, then record
/// the fingerprint of the overwritten file so the next run's scan hash
/// matches what is on disk.
fn compress_task(client: CompressClient, cache: Arc<Mutex<ContentCache>>, path: PathBuf) -> Task {
    task(move || {
        let client = client.clone();
        let cache = Arc::clone(&cache);
        let path = path.clone();
        async move {
            let label = path.display().to_string();

            let outcome = client
                .compress(&path)
                .await
                .map_err(|e| TaskError::new(label.clone(), e.to_string()))?;

            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| TaskError::new(label.clone(), e.to_string()))?;
            lock(&cache).record(Fingerprint::of_bytes(&bytes));

            info!(
                path = %label,
                original = %ByteSize(outcome.input_size),
                compressed = %ByteSize(outcome.output_size),
                saved = %format!("{:.0}%", outcome.saved_percent()),
                "compressed"
            );
            Ok(())
        }
    })
}
