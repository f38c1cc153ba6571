//! Folder monitoring: the ingestion pipeline.
//!
//! [`MonitorController`] owns the lifecycle. `start` records the files already
//! in the folder as baseline, then starts a [`FolderObserver`] that feeds the
//! [`WorkQueue`] and a [`ProcessingWorker`] that drains it. The queue belongs
//! to the controller, so items left in it survive a stop and are processed
//! after the next start.

pub mod hasher;
pub mod observer;
pub mod queue;
pub mod settle;
pub mod worker;

pub use observer::FolderObserver;
pub use queue::WorkQueue;
pub use settle::FileSettler;
pub use worker::{ItemOutcome, ProcessingWorker};

use crate::activity;
use crate::config::MonitorConfig;
use crate::processor::Processor;
use parking_lot::Mutex;
use printwatch_common::paths::is_eligible_image;
use printwatch_db::pool::DbPool;
use printwatch_db::queries::images;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

/// Errors from starting the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Cannot use watch folder {path:?}: {source}")]
    Folder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to watch folder: {0}")]
    Watch(#[from] notify::Error),

    #[error("Failed to record existing files: {0}")]
    Baseline(#[from] printwatch_common::Error),

    #[error("Failed to start worker thread: {0}")]
    Worker(#[source] std::io::Error),
}

/// Worker timing.
#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub settle_max_attempts: u32,
    pub stop_timeout: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for MonitorOptions {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            settle_max_attempts: config.settle_max_attempts,
            stop_timeout: Duration::from_secs(config.stop_timeout_secs),
        }
    }
}

/// Point-in-time view of the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub watch_folder: Option<String>,
    pub queue_size: usize,
    pub current_file: Option<String>,
}

struct ActiveMonitor {
    folder: PathBuf,
    observer: FolderObserver,
    running: Arc<AtomicBool>,
}

/// Starts, stops and reports on folder monitoring.
pub struct MonitorController {
    pool: DbPool,
    processor: Arc<dyn Processor>,
    options: MonitorOptions,
    queue: WorkQueue,
    current_file: Arc<Mutex<Option<PathBuf>>>,
    /// Held by a worker thread for its whole life.
    worker_gate: Arc<Mutex<()>>,
    active: Mutex<Option<ActiveMonitor>>,
}

impl MonitorController {
    pub fn new(pool: DbPool, processor: Arc<dyn Processor>, options: MonitorOptions) -> Self {
        Self {
            pool,
            processor,
            options,
            queue: WorkQueue::new(),
            current_file: Arc::new(Mutex::new(None)),
            worker_gate: Arc::new(Mutex::new(())),
            active: Mutex::new(None),
        }
    }

    /// Start monitoring `folder`. Does nothing if already running.
    pub fn start(&self, folder: &Path) -> Result<(), MonitorError> {
        if self.is_running() {
            return Ok(());
        }

        std::fs::create_dir_all(folder).map_err(|source| MonitorError::Folder {
            path: folder.to_path_buf(),
            source,
        })?;
        let folder = folder
            .canonicalize()
            .map_err(|source| MonitorError::Folder {
                path: folder.to_path_buf(),
                source,
            })?;

        let baseline = self.record_baseline(&folder)?;
        tracing::debug!("{} existing files recorded as baseline", baseline);

        // Another start may have finished while the folder was scanned.
        let mut active = self.active.lock();
        if active.is_some() {
            return Ok(());
        }

        let mut observer =
            FolderObserver::new(&folder, self.queue.clone(), self.options.stop_timeout);
        observer.start()?;

        let running = Arc::new(AtomicBool::new(true));
        let worker = ProcessingWorker::new(
            self.pool.clone(),
            self.queue.clone(),
            Arc::clone(&self.processor),
            FileSettler::new(self.options.settle_delay, self.options.settle_max_attempts),
            self.options.poll_interval,
            Arc::clone(&self.current_file),
        );
        if let Err(e) = worker.spawn(Arc::clone(&running), Arc::clone(&self.worker_gate)) {
            observer.stop();
            return Err(MonitorError::Worker(e));
        }

        activity::info(
            &self.pool,
            &format!("Monitoring started for {}", folder.display()),
            None,
        );

        *active = Some(ActiveMonitor {
            folder,
            observer,
            running,
        });
        Ok(())
    }

    /// Stop monitoring. Idempotent.
    ///
    /// The worker finishes any in-flight item and exits after its next poll;
    /// queued items stay queued.
    pub fn stop(&self) {
        let Some(mut monitor) = self.active.lock().take() else {
            return;
        };

        monitor.running.store(false, Ordering::SeqCst);
        monitor.observer.stop();
        activity::info(
            &self.pool,
            &format!("Monitoring stopped for {}", monitor.folder.display()),
            None,
        );
    }

    /// Queue an image for processing.
    ///
    /// Returns `false` if the path does not exist or is not png/jpg/jpeg.
    /// Accepted paths wait in the queue while the monitor is stopped.
    pub fn enqueue_path(&self, path: &Path) -> bool {
        if !is_eligible_image(path) || !path.exists() {
            return false;
        }
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        tracing::info!("Queued image: {:?}", path);
        self.queue.push(path);
        true
    }

    pub fn status(&self) -> MonitorStatus {
        let (running, watch_folder) = match self.active.lock().as_ref() {
            Some(m) => (true, Some(m.folder.display().to_string())),
            None => (false, None),
        };

        MonitorStatus {
            running,
            watch_folder,
            queue_size: self.queue.len(),
            current_file: self
                .current_file
                .lock()
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Wait until no worker thread is alive.
    ///
    /// Returns `false` on timeout, which is always the case while running.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.worker_gate.try_lock_for(timeout).is_some()
    }

    /// Record every eligible file already in `folder` as baseline.
    fn record_baseline(&self, folder: &Path) -> Result<usize, MonitorError> {
        let conn = self.pool.get().map_err(|e| {
            MonitorError::Baseline(printwatch_common::Error::database(e.to_string()))
        })?;

        let mut recorded = 0;
        for entry in WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_eligible_image(path) {
                continue;
            }

            let hash = match hasher::hash_file(path) {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!("Skipping unreadable file {:?}: {}", path, e);
                    continue;
                }
            };

            if images::insert_baseline(&conn, &path.to_string_lossy(), &hash)? {
                recorded += 1;
            }
        }

        Ok(recorded)
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        self.stop();
    }
}
