use super::queue::WorkQueue;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use printwatch_common::paths::is_eligible_image;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

/// Watches one folder (non-recursively) and queues artwork created in it or
/// moved into it
pub struct FolderObserver {
    folder: PathBuf,
    queue: WorkQueue,
    stop_timeout: Duration,
    watcher: Option<RecommendedWatcher>,
}

impl FolderObserver {
    pub fn new(folder: impl Into<PathBuf>, queue: WorkQueue, stop_timeout: Duration) -> Self {
        Self {
            folder: folder.into(),
            queue,
            stop_timeout,
            watcher: None,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Start delivering creation events to the queue
    pub fn start(&mut self) -> notify::Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }

        let queue = self.queue.clone();
        let folder = self.folder.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    handle_event(&event, &folder, &queue);
                }
                Err(e) => tracing::warn!("File watcher error: {}", e),
            },
            Config::default(),
        )?;

        watcher.watch(&self.folder, RecursiveMode::NonRecursive)?;
        tracing::info!("Watching directory: {:?}", self.folder);

        self.watcher = Some(watcher);
        Ok(())
    }

    /// Stop watching.
    ///
    /// The platform watcher is torn down on a helper thread; if that takes
    /// longer than the stop timeout it is left to finish in the background.
    pub fn stop(&mut self) {
        let Some(watcher) = self.watcher.take() else {
            return;
        };

        let (done_tx, done_rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("printwatch-observer-stop".into())
            .spawn(move || {
                drop(watcher);
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(_) => {
                if done_rx.recv_timeout(self.stop_timeout).is_err() {
                    tracing::warn!(
                        "File watcher did not stop within {:?}; continuing shutdown",
                        self.stop_timeout
                    );
                    return;
                }
            }
            Err(e) => tracing::warn!("Failed to spawn watcher shutdown thread: {}", e),
        }

        tracing::info!("File watcher stopped");
    }
}

impl Drop for FolderObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Queue every eligible file that appeared in `folder`.
///
/// Creations and rename destinations count. A paired rename counts only when
/// its source lies outside `folder`. Returns how many paths were queued.
pub fn handle_event(event: &Event, folder: &Path, queue: &WorkQueue) -> usize {
    let arrived: &[PathBuf] = match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.as_slice()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] if from.parent() != Some(folder) => std::slice::from_ref(to),
            _ => &[],
        },
        _ => &[],
    };

    let mut queued = 0;
    for path in arrived {
        if is_eligible_image(path) && path.is_file() {
            tracing::debug!("New image detected: {:?}", path);
            queue.push(path.clone());
            queued += 1;
        }
    }
    queued
}
