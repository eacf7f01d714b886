//! Ingestion Queue Background Task
//!
//! Turns JSON payload files dropped into `queue/` into stored reports, one at
//! a time. Each item moves through the lifecycle directories described in
//! [`super::queue_dirs`]:
//!
//! 1. The worker claims an item by renaming it into `processing/`.
//! 2. The payload is parsed and handed to a [`ReportCreator`].
//! 3. The item is renamed into `completed/` or `failed/`.
//!
//! Work is discovered three ways: a scan of `queue/` at startup, file-change
//! notifications, and a periodic reconciliation sweep. All three feed one
//! pending list drained by a single worker, so at most one item is ever in
//! `processing/` while the queue runs.
//!
//! # Configuration
//!
//! ```rust
//! use intake_api::jobs::IngestionQueueConfig;
//! use std::time::Duration;
//!
//! let config = IngestionQueueConfig {
//!     queue_root: "intake-queue".into(),
//!     sweep_interval: Duration::from_secs(5), // Reconcile every 5 seconds
//!     watch_enabled: true,                    // Use file notifications
//!     recover_on_start: true,                 // Requeue orphans in processing/
//! };
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use intake_core::{record_id, IntakeResult, QueueError, QueueResult, Record, ReportCreator};
use notify::RecommendedWatcher;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::queue_dirs::{QueueDirs, QueueState};
use super::queue_watcher::{watch_queue_dir, PendingQueue};
use crate::constants::{
    DEFAULT_QUEUE_DIR, DEFAULT_QUEUE_SWEEP_INTERVAL_SECS, ENV_QUEUE_DIR,
    ENV_QUEUE_RECOVER_ON_START, ENV_QUEUE_SWEEP_INTERVAL_SECS, ENV_QUEUE_WATCH_ENABLED,
};

/// Floor for the sweep period; `tokio::time::interval` rejects zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the ingestion queue.
#[derive(Debug, Clone)]
pub struct IngestionQueueConfig {
    /// Directory holding `queue/`, `processing/`, `completed/` and `failed/`
    pub queue_root: PathBuf,

    /// How often `queue/` is rescanned for files the watcher missed
    /// (default: 5 seconds)
    pub sweep_interval: Duration,

    /// Whether to subscribe to file-change notifications (default: true)
    pub watch_enabled: bool,

    /// Whether items left in `processing/` by a previous run are moved back
    /// to `queue/` on startup (default: true)
    pub recover_on_start: bool,
}

impl Default for IngestionQueueConfig {
    fn default() -> Self {
        Self {
            queue_root: PathBuf::from(DEFAULT_QUEUE_DIR),
            sweep_interval: Duration::from_secs(DEFAULT_QUEUE_SWEEP_INTERVAL_SECS),
            watch_enabled: true,
            recover_on_start: true,
        }
    }
}

impl IngestionQueueConfig {
    /// Configuration rooted at `queue_root` with default timings.
    pub fn new(queue_root: impl Into<PathBuf>) -> Self {
        Self {
            queue_root: queue_root.into(),
            ..Self::default()
        }
    }

    /// Create IngestionQueueConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `INTAKE_QUEUE_DIR`: Queue root directory (default: intake-queue)
    /// - `INTAKE_QUEUE_SWEEP_INTERVAL_SECS`: Sweep period (default: 5)
    /// - `INTAKE_QUEUE_WATCH_ENABLED`: Use file notifications (default: true)
    /// - `INTAKE_QUEUE_RECOVER_ON_START`: Requeue orphans at startup (default: true)
    pub fn from_env() -> Self {
        let queue_root = std::env::var(ENV_QUEUE_DIR)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_QUEUE_DIR));

        let sweep_interval = Duration::from_secs(
            std::env::var(ENV_QUEUE_SWEEP_INTERVAL_SECS)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_QUEUE_SWEEP_INTERVAL_SECS),
        );

        let watch_enabled = std::env::var(ENV_QUEUE_WATCH_ENABLED)
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let recover_on_start = std::env::var(ENV_QUEUE_RECOVER_ON_START)
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            queue_root,
            sweep_interval,
            watch_enabled,
            recover_on_start,
        }
    }

    /// Create a configuration for development/testing with a fast sweep.
    pub fn development(queue_root: impl Into<PathBuf>) -> Self {
        Self {
            queue_root: queue_root.into(),
            sweep_interval: Duration::from_millis(200),
            watch_enabled: true,
            recover_on_start: true,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for queue activity since construction.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Items persisted and moved to `completed/`
    pub completed: AtomicU64,

    /// Items moved to `failed/`
    pub failed: AtomicU64,

    /// Pending names that could not be claimed (already moved or deleted)
    pub skipped: AtomicU64,

    /// Items moved from `processing/` back to `queue/` at startup
    pub recovered: AtomicU64,

    /// Items moved from `failed/` back to `queue/` by `retry_failed`
    pub retried: AtomicU64,

    /// Scans of `queue/`, including the startup scan
    pub sweeps: AtomicU64,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
        }
    }

    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Snapshot of queue metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueMetricsSnapshot {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub recovered: u64,
    pub retried: u64,
    pub sweeps: u64,
}

/// Point-in-time view of the queue for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    /// True while the worker holds an item in `processing/`
    pub is_processing: bool,
    /// Names discovered but not yet taken by the worker
    pub pending: usize,
}

// ============================================================================
// QUEUE
// ============================================================================

/// Handles owned while the queue is running.
struct QueueRuntime {
    pending: PendingQueue,
    shutdown_tx: watch::Sender<bool>,
    watcher: Option<RecommendedWatcher>,
    worker: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

/// Directory-backed ingestion queue with a single worker.
pub struct IngestionQueue {
    dirs: QueueDirs,
    config: IngestionQueueConfig,
    creator: Arc<dyn ReportCreator>,
    waiting: Arc<Mutex<HashSet<String>>>,
    is_processing: Arc<AtomicBool>,
    metrics: Arc<QueueMetrics>,
    runtime: tokio::sync::Mutex<Option<QueueRuntime>>,
}

impl IngestionQueue {
    pub fn new(config: IngestionQueueConfig, creator: Arc<dyn ReportCreator>) -> Self {
        Self {
            dirs: QueueDirs::new(config.queue_root.clone()),
            config,
            creator,
            waiting: Arc::new(Mutex::new(HashSet::new())),
            is_processing: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(QueueMetrics::new()),
            runtime: tokio::sync::Mutex::new(None),
        }
    }

    pub fn dirs(&self) -> &QueueDirs {
        &self.dirs
    }

    pub fn config(&self) -> &IngestionQueueConfig {
        &self.config
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    pub async fn is_running(&self) -> bool {
        self.runtime.lock().await.is_some()
    }

    /// Create the lifecycle directories, recover orphans, and start the
    /// worker, watcher and sweep. Files already in `queue/` are processed in
    /// name order.
    ///
    /// Fails with [`QueueError::AlreadyRunning`] if called again before
    /// [`Self::stop`].
    pub async fn initialize(&self) -> QueueResult<()> {
        let mut runtime = self.runtime.lock().await;
        if runtime.is_some() {
            return Err(QueueError::AlreadyRunning);
        }

        self.dirs.create_all().await?;

        if self.config.recover_on_start {
            let recovered = self
                .dirs
                .transition_all(QueueState::Processing, QueueState::Queued)
                .await?;
            if !recovered.is_empty() {
                tracing::warn!(
                    count = recovered.len(),
                    files = ?recovered,
                    "Recovered items left in processing by a previous run"
                );
                QueueMetrics::add(&self.metrics.recovered, recovered.len());
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let pending = PendingQueue::new(tx, Arc::clone(&self.waiting));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let watcher = if self.config.watch_enabled {
            match watch_queue_dir(&self.dirs.dir(QueueState::Queued), pending.clone()) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "Queue watcher unavailable, relying on sweep");
                    None
                }
            }
        } else {
            None
        };

        // Scan after the watcher is live so a file landing in between is
        // reported by at least one of them.
        let initial = sweep_once(&self.dirs, &pending, &self.metrics).await?;

        let worker = tokio::spawn(run_worker(
            Worker {
                dirs: self.dirs.clone(),
                creator: Arc::clone(&self.creator),
                waiting: Arc::clone(&self.waiting),
                is_processing: Arc::clone(&self.is_processing),
                metrics: Arc::clone(&self.metrics),
            },
            rx,
            shutdown_rx.clone(),
        ));

        let sweeper = tokio::spawn(run_sweeper(
            self.dirs.clone(),
            pending.clone(),
            self.config.sweep_interval.max(MIN_SWEEP_INTERVAL),
            Arc::clone(&self.metrics),
            shutdown_rx,
        ));

        tracing::info!(
            queue_root = %self.dirs.root().display(),
            sweep_interval_ms = self.config.sweep_interval.as_millis() as u64,
            watching = watcher.is_some(),
            initial_items = initial,
            "Ingestion queue started"
        );

        *runtime = Some(QueueRuntime {
            pending,
            shutdown_tx,
            watcher,
            worker,
            sweeper,
        });
        Ok(())
    }

    /// Current item counts per directory plus worker state.
    pub async fn stats(&self) -> QueueResult<QueueStats> {
        let pending = self.waiting.lock().unwrap_or_else(|p| p.into_inner()).len();
        Ok(QueueStats {
            queued: self.dirs.count(QueueState::Queued).await?,
            processing: self.dirs.count(QueueState::Processing).await?,
            completed: self.dirs.count(QueueState::Completed).await?,
            failed: self.dirs.count(QueueState::Failed).await?,
            is_processing: self.is_processing.load(Ordering::SeqCst),
            pending,
        })
    }

    /// Move every item in `failed/` back to `queue/` and return how many
    /// moved. While running, moved items are handed to the worker directly.
    pub async fn retry_failed(&self) -> QueueResult<usize> {
        let moved = self
            .dirs
            .transition_all(QueueState::Failed, QueueState::Queued)
            .await?;

        let runtime = self.runtime.lock().await;
        if let Some(runtime) = runtime.as_ref() {
            for name in &moved {
                runtime.pending.push(name.clone());
            }
        }

        QueueMetrics::add(&self.metrics.retried, moved.len());
        tracing::info!(count = moved.len(), "Re-queued failed items");
        Ok(moved.len())
    }

    /// Stop discovery and wait for the worker to finish the item it holds.
    ///
    /// Items still waiting stay in `queue/` and are picked up by the next
    /// [`Self::initialize`]. Calling `stop` on a stopped queue is a no-op.
    pub async fn stop(&self) {
        let Some(runtime) = self.runtime.lock().await.take() else {
            return;
        };

        let _ = runtime.shutdown_tx.send(true);
        drop(runtime.watcher);
        drop(runtime.pending);

        if let Err(e) = runtime.worker.await {
            tracing::error!(error = %e, "Ingestion worker terminated abnormally");
        }
        if let Err(e) = runtime.sweeper.await {
            tracing::error!(error = %e, "Queue sweep task terminated abnormally");
        }

        self.waiting
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            completed = snapshot.completed,
            failed = snapshot.failed,
            skipped = snapshot.skipped,
            recovered = snapshot.recovered,
            retried = snapshot.retried,
            sweeps = snapshot.sweeps,
            "Ingestion queue stopped"
        );
    }
}

impl Drop for IngestionQueue {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            let _ = runtime.shutdown_tx.send(true);
        }
    }
}

// ============================================================================
// BACKGROUND TASKS
// ============================================================================

/// State the worker task needs, detached from the queue handle.
struct Worker {
    dirs: QueueDirs,
    creator: Arc<dyn ReportCreator>,
    waiting: Arc<Mutex<HashSet<String>>>,
    is_processing: Arc<AtomicBool>,
    metrics: Arc<QueueMetrics>,
}

impl Worker {
    /// Claim, process and settle one item.
    async fn process(&self, name: &str) {
        if let Err(e) = self
            .dirs
            .transition(name, QueueState::Queued, QueueState::Processing)
            .await
        {
            tracing::debug!(file = name, error = %e, "Skipping item that could not be claimed");
            QueueMetrics::add(&self.metrics.skipped, 1);
            return;
        }

        self.is_processing.store(true, Ordering::SeqCst);
        tracing::info!(file = name, "Processing submission");

        let target = match self.persist(name).await {
            Ok(report) => {
                tracing::info!(
                    file = name,
                    report_id = record_id(&report).as_deref().unwrap_or("<none>"),
                    "Submission persisted"
                );
                QueueMetrics::add(&self.metrics.completed, 1);
                QueueState::Completed
            }
            Err(e) => {
                tracing::error!(file = name, error = %e, "Submission failed");
                QueueMetrics::add(&self.metrics.failed, 1);
                QueueState::Failed
            }
        };

        if let Err(e) = self
            .dirs
            .transition(name, QueueState::Processing, target)
            .await
        {
            tracing::error!(
                file = name,
                to = %target,
                error = %e,
                "Failed to move item out of processing"
            );
        }

        self.is_processing.store(false, Ordering::SeqCst);
    }

    async fn persist(&self, name: &str) -> IntakeResult<Record> {
        let path = self.dirs.path(QueueState::Processing, name);
        let body = fs::read(&path)
            .await
            .map_err(|source| QueueError::Io { path, source })?;
        let payload: Value = serde_json::from_slice(&body).map_err(|source| QueueError::Payload {
            file: name.to_string(),
            source,
        })?;

        // A panicking creator must not take the worker down with it.
        let creator = Arc::clone(&self.creator);
        let origin = name.to_string();
        match tokio::spawn(async move { creator.create_report(payload, &origin).await }).await {
            Ok(result) => result,
            Err(e) => Err(QueueError::CreatorPanicked {
                file: name.to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }
}

async fn run_worker(
    worker: Worker,
    mut rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            next = rx.recv() => {
                let Some(name) = next else { break };
                worker
                    .waiting
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .remove(&name);
                worker.process(&name).await;
            }
        }
    }
    tracing::debug!("Ingestion worker exited");
}

async fn run_sweeper(
    dirs: QueueDirs,
    pending: PendingQueue,
    period: Duration,
    metrics: Arc<QueueMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; startup already scanned.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            _ = ticker.tick() => {
                match sweep_once(&dirs, &pending, &metrics).await {
                    Ok(0) => {}
                    Ok(added) => tracing::debug!(added, "Sweep found unreported items"),
                    Err(e) => tracing::warn!(error = %e, "Queue sweep failed"),
                }
            }
        }
    }
    tracing::debug!("Queue sweep task exited");
}

/// Push every file in `queue/` not already waiting. Returns how many were new.
async fn sweep_once(
    dirs: &QueueDirs,
    pending: &PendingQueue,
    metrics: &QueueMetrics,
) -> QueueResult<usize> {
    QueueMetrics::add(&metrics.sweeps, 1);
    let mut added = 0;
    for name in dirs.list(QueueState::Queued).await? {
        if pending.push(name) {
            added += 1;
        }
    }
    Ok(added)
}
