//! The ingestion worker.
//!
//! One worker thread consumes the [`WorkQueue`]: each path is settled,
//! hashed and deduplicated against the image records before the
//! [`Processor`] runs. Outcomes are written back to the `images` and `runs`
//! tables.

use super::hasher::hash_file;
use super::queue::WorkQueue;
use super::settle::{FileSettler, SettleOutcome};
use crate::activity;
use crate::processor::{ProcessOutput, Processor};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use printwatch_common::RunId;
use printwatch_db::models::{ImageStatus, LogLevel};
use printwatch_db::pool::DbPool;
use printwatch_db::queries::{images, runs};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What happened to one dequeued path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The file disappeared before it could be hashed.
    Vanished,
    /// Content already recorded, under this or another path.
    Duplicate { existing_path: String },
    /// The path is recorded with different content.
    PathConflict { content_hash: String },
    /// A run was created and finalised.
    Processed { run_id: RunId, success: bool },
}

/// Single-flight consumer of the work queue.
pub struct ProcessingWorker {
    pool: DbPool,
    queue: WorkQueue,
    processor: Arc<dyn Processor>,
    settler: FileSettler,
    poll_interval: Duration,
    current_file: Arc<Mutex<Option<PathBuf>>>,
}

impl ProcessingWorker {
    pub fn new(
        pool: DbPool,
        queue: WorkQueue,
        processor: Arc<dyn Processor>,
        settler: FileSettler,
        poll_interval: Duration,
        current_file: Arc<Mutex<Option<PathBuf>>>,
    ) -> Self {
        Self {
            pool,
            queue,
            processor,
            settler,
            poll_interval,
            current_file,
        }
    }

    /// Run the worker on its own thread.
    ///
    /// The thread holds `gate` for its whole life, so a worker spawned while
    /// a previous one is still finishing an item waits for it.
    pub fn spawn(self, running: Arc<AtomicBool>, gate: Arc<Mutex<()>>) -> io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("printwatch-worker".into())
            .spawn(move || {
                let _gate = gate.lock();
                self.run(&running);
            })
    }

    /// Process queued paths until `running` is cleared.
    pub fn run(&self, running: &AtomicBool) {
        info!("Processing worker started");

        while running.load(Ordering::SeqCst) {
            let Some(path) = self.queue.pop(self.poll_interval) else {
                continue;
            };
            if !running.load(Ordering::SeqCst) {
                // Stopped while waiting; leave the item for the next worker.
                self.queue.requeue(path);
                break;
            }

            let _current = CurrentFileGuard::set(&self.current_file, &path);
            let display = path.display().to_string();

            let result = panic::catch_unwind(AssertUnwindSafe(|| self.process_item(&path)));
            match result {
                Ok(Ok(outcome)) => debug!("Finished {:?}: {:?}", path, outcome),
                Ok(Err(e)) => activity::error(
                    &self.pool,
                    &format!("Unhandled processing failure: {:#}", e),
                    Some(&display),
                ),
                Err(payload) => activity::error(
                    &self.pool,
                    &format!("Unhandled processing failure: {}", panic_message(&*payload)),
                    Some(&display),
                ),
            }
        }

        info!("Processing worker stopped");
    }

    /// Settle, hash, deduplicate and process one path.
    pub fn process_item(&self, path: &Path) -> Result<ItemOutcome> {
        if !path.exists() {
            debug!("Queued file no longer exists: {:?}", path);
            return Ok(ItemOutcome::Vanished);
        }

        match self.settler.wait(path) {
            Ok(SettleOutcome::Stable { .. }) => {}
            Ok(SettleOutcome::StillChanging { size }) => {
                warn!("File still changing after settle period ({} bytes): {:?}", size, path);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("File vanished while settling: {:?}", path);
                return Ok(ItemOutcome::Vanished);
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to stat {:?}", path)),
        }

        let content_hash = match hash_file(path) {
            Ok(h) => h,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("File vanished before hashing: {:?}", path);
                return Ok(ItemOutcome::Vanished);
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to hash {:?}", path)),
        };

        let path_str = path.to_string_lossy().into_owned();
        let conn = self.pool.get().context("Failed to get database connection")?;

        if let Some(existing) = images::find_by_hash(&conn, &content_hash)? {
            debug!(
                "Skipping duplicate {:?} (same content as {})",
                path, existing.path
            );
            return Ok(ItemOutcome::Duplicate {
                existing_path: existing.path,
            });
        }

        if images::get_by_path(&conn, &path_str)?.is_some() {
            activity::warn(
                &self.pool,
                "Skipping file whose content changed after it was recorded",
                Some(&path_str),
            );
            return Ok(ItemOutcome::PathConflict { content_hash });
        }

        let run = {
            let tx = conn
                .unchecked_transaction()
                .context("Failed to begin transaction")?;
            images::create_image(&tx, &path_str, &content_hash, ImageStatus::Processing)?;
            let run = runs::create_run(&tx, &path_str, &content_hash)?;
            tx.commit().context("Failed to commit new run")?;
            run
        };
        drop(conn);

        info!("Processing {:?} (run {})", path, run.id);

        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.processor.process(path))) {
            Ok(result) => result,
            Err(payload) => Err(anyhow::anyhow!(
                "Processor panicked: {}",
                panic_message(&*payload)
            )),
        };

        let success = result.is_ok();
        self.finalize(run.id, &path_str, result)?;

        Ok(ItemOutcome::Processed {
            run_id: run.id,
            success,
        })
    }

    fn finalize(&self, run_id: RunId, path: &str, result: Result<ProcessOutput>) -> Result<()> {
        let conn = self.pool.get().context("Failed to get database connection")?;
        let tx = conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        match result {
            Ok(output) => {
                let message = format!(
                    "Draft product created: {}",
                    output.external_product_id.as_deref().unwrap_or("unknown")
                );
                let updated = runs::complete_run(
                    &tx,
                    run_id,
                    &runs::RunOutcome {
                        analysis_payload: output.analysis_payload.as_deref(),
                        listing_payload: output.listing_payload.as_deref(),
                        external_upload_id: output.external_upload_id.as_deref(),
                        external_product_id: output.external_product_id.as_deref(),
                    },
                )?;
                if !updated {
                    warn!("Run {} was already closed; recording image as done anyway", run_id);
                }
                images::update_status(&tx, path, ImageStatus::Done, Some(&message))?;
                tx.commit().context("Failed to commit run result")?;
                drop(conn);

                activity::record(
                    &self.pool,
                    LogLevel::Info,
                    "Product draft created successfully",
                    Some(path),
                    None,
                );
            }
            Err(e) => {
                let message = format!("{:#}", e);
                if !runs::fail_run(&tx, run_id, &message)? {
                    warn!("Run {} was already closed; recording image as failed anyway", run_id);
                }
                images::update_status(&tx, path, ImageStatus::Error, Some(&message))?;
                tx.commit().context("Failed to commit run failure")?;
                drop(conn);

                error!("Run {} failed: {}", run_id, message);
                activity::record(
                    &self.pool,
                    LogLevel::Error,
                    &format!("Processing failed: {}", message),
                    Some(path),
                    None,
                );
            }
        }

        Ok(())
    }
}

/// Publishes the in-flight path and clears it on every exit, including unwinds.
struct CurrentFileGuard<'a> {
    slot: &'a Mutex<Option<PathBuf>>,
}

impl<'a> CurrentFileGuard<'a> {
    fn set(slot: &'a Mutex<Option<PathBuf>>, path: &Path) -> Self {
        *slot.lock() = Some(path.to_path_buf());
        Self { slot }
    }
}

impl Drop for CurrentFileGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printwatch_db::models::RunStatus;
    use printwatch_db::pool::init_memory_pool;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn worker_with(pool: DbPool, processor: Arc<dyn Processor>) -> ProcessingWorker {
        ProcessingWorker::new(
            pool,
            WorkQueue::new(),
            processor,
            FileSettler::new(Duration::from_millis(5), 3),
            Duration::from_millis(20),
            Arc::new(Mutex::new(None)),
        )
    }

    fn ok_processor(calls: Arc<AtomicUsize>) -> Arc<dyn Processor> {
        Arc::new(move |_: &Path| -> Result<ProcessOutput> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProcessOutput {
                analysis_payload: Some(r#"{"theme":"cats"}"#.into()),
                listing_payload: Some(r#"{"title":"Cat Shirt"}"#.into()),
                external_upload_id: Some("up-1".into()),
                external_product_id: Some("prod-1".into()),
            })
        })
    }

    #[test]
    fn successful_item_is_recorded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cat.png");
        std::fs::write(&path, b"cat art").unwrap();

        let pool = init_memory_pool().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let worker = worker_with(pool.clone(), ok_processor(calls.clone()));

        let outcome = worker.process_item(&path).unwrap();
        let ItemOutcome::Processed { run_id, success } = outcome.clone() else {
            panic!("expected a run, got {:?}", outcome);
        };
        assert!(success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let conn = pool.get().unwrap();
        let run = runs::get_run(&conn, run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(run.external_product_id.as_deref(), Some("prod-1"));

        let image = images::get_by_path(&conn, &path.to_string_lossy())
            .unwrap()
            .unwrap();
        assert_eq!(image.status, ImageStatus::Done);
        assert_eq!(image.message.as_deref(), Some("Draft product created: prod-1"));
    }

    #[test]
    fn duplicate_content_is_skipped() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let pool = init_memory_pool().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let worker = worker_with(pool.clone(), ok_processor(calls.clone()));

        assert!(matches!(
            worker.process_item(&a).unwrap(),
            ItemOutcome::Processed { success: true, .. }
        ));
        assert_eq!(
            worker.process_item(&b).unwrap(),
            ItemOutcome::Duplicate {
                existing_path: a.to_string_lossy().into_owned()
            }
        );
        // Re-queuing the same path is also a duplicate.
        assert!(matches!(
            worker.process_item(&a).unwrap(),
            ItemOutcome::Duplicate { .. }
        ));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let conn = pool.get().unwrap();
        assert_eq!(runs::count_runs(&conn).unwrap(), 1);
    }

    #[test]
    fn failing_processor_marks_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.jpg");
        std::fs::write(&path, b"bad art").unwrap();

        let pool = init_memory_pool().unwrap();
        let processor: Arc<dyn Processor> =
            Arc::new(|_: &Path| -> Result<ProcessOutput> { anyhow::bail!("upload rejected") });
        let worker = worker_with(pool.clone(), processor);

        let ItemOutcome::Processed { run_id, success } = worker.process_item(&path).unwrap() else {
            panic!("expected a run");
        };
        assert!(!success);

        let conn = pool.get().unwrap();
        let run = runs::get_run(&conn, run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.error_message.as_deref(), Some("upload rejected"));
        let image = images::get_by_path(&conn, &path.to_string_lossy())
            .unwrap()
            .unwrap();
        assert_eq!(image.status, ImageStatus::Error);
    }

    #[test]
    fn panicking_processor_is_contained() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panic.png");
        std::fs::write(&path, b"panic art").unwrap();

        let pool = init_memory_pool().unwrap();
        let processor: Arc<dyn Processor> =
            Arc::new(|_: &Path| -> Result<ProcessOutput> { panic!("decoder blew up") });
        let worker = worker_with(pool.clone(), processor);

        let ItemOutcome::Processed { run_id, success } = worker.process_item(&path).unwrap() else {
            panic!("expected a run");
        };
        assert!(!success);

        let conn = pool.get().unwrap();
        let run = runs::get_run(&conn, run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Error);
        assert!(run
            .error_message
            .unwrap()
            .contains("decoder blew up"));
    }

    #[test]
    fn vanished_file_is_dropped() {
        let dir = TempDir::new().unwrap();
        let pool = init_memory_pool().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let worker = worker_with(pool.clone(), ok_processor(calls.clone()));

        let outcome = worker.process_item(&dir.path().join("gone.png")).unwrap();
        assert_eq!(outcome, ItemOutcome::Vanished);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn changed_content_at_known_path_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("edited.png");
        std::fs::write(&path, b"version two").unwrap();

        let pool = init_memory_pool().unwrap();
        {
            let conn = pool.get().unwrap();
            images::insert_baseline(&conn, &path.to_string_lossy(), "old-hash").unwrap();
        }
        let calls = Arc::new(AtomicUsize::new(0));
        let worker = worker_with(pool.clone(), ok_processor(calls.clone()));

        assert!(matches!(
            worker.process_item(&path).unwrap(),
            ItemOutcome::PathConflict { .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let conn = pool.get().unwrap();
        let image = images::get_by_path(&conn, &path.to_string_lossy())
            .unwrap()
            .unwrap();
        assert_eq!(image.status, ImageStatus::Baseline);
    }

    #[test]
    fn run_closed_elsewhere_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.png");
        std::fs::write(&path, b"late art").unwrap();

        let pool = init_memory_pool().unwrap();
        let recovery_pool = pool.clone();
        let processor: Arc<dyn Processor> = Arc::new(move |_: &Path| -> Result<ProcessOutput> {
            let conn = recovery_pool.get()?;
            printwatch_db::queries::recovery::fail_orphaned(&conn)?;
            Ok(ProcessOutput {
                external_product_id: Some("prod-late".into()),
                ..Default::default()
            })
        });
        let worker = worker_with(pool.clone(), processor);

        let ItemOutcome::Processed { run_id, success } = worker.process_item(&path).unwrap() else {
            panic!("expected a run");
        };
        assert!(success);

        let conn = pool.get().unwrap();
        let run = runs::get_run(&conn, run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.external_product_id, None);
        let image = images::get_by_path(&conn, &path.to_string_lossy())
            .unwrap()
            .unwrap();
        assert_eq!(image.status, ImageStatus::Done);
    }

    #[test]
    fn current_file_guard_clears_on_unwind() {
        let slot = Mutex::new(None);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = CurrentFileGuard::set(&slot, Path::new("/art/a.png"));
            assert_eq!(slot.lock().as_deref(), Some(Path::new("/art/a.png")));
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(slot.lock().is_none());
    }
}
