use std::io;
use std::path::Path;
use std::time::Duration;

/// Result of waiting for a file to stop changing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Size was unchanged across two reads one delay apart
    Stable { size: u64 },
    /// Size was still changing when the attempts ran out
    StillChanging { size: u64 },
}

/// Waits for a freshly created file to finish being written
#[derive(Debug, Clone, Copy)]
pub struct FileSettler {
    /// Time between size checks
    delay: Duration,
    /// How many delays to wait before giving up
    max_attempts: u32,
}

impl FileSettler {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Block until the file size stops changing.
    ///
    /// At least one full delay always elapses. A file that disappears while
    /// waiting surfaces as `io::ErrorKind::NotFound`.
    pub fn wait(&self, path: &Path) -> io::Result<SettleOutcome> {
        let mut last = std::fs::metadata(path)?.len();

        for attempt in 1..=self.max_attempts {
            std::thread::sleep(self.delay);
            let size = std::fs::metadata(path)?.len();
            if size == last {
                return Ok(SettleOutcome::Stable { size });
            }
            tracing::trace!(
                "File still growing ({} -> {} bytes, attempt {}): {:?}",
                last,
                size,
                attempt,
                path
            );
            last = size;
        }

        Ok(SettleOutcome::StillChanging { size: last })
    }
}
