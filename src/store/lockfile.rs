//! Advisory locking and atomic write primitives for the dataset file.
//!
//! Locking uses fs2 exclusive locks on a dedicated lock file, so mutual
//! exclusion works across threads and across processes. Acquisition polls
//! with a bounded deadline instead of blocking forever.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::{StoreError, StoreResult};

/// How often to re-try a contended lock while waiting.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Exclusive advisory lock on the session dataset.
///
/// Acquired for the duration of a mutation and released on drop, on every
/// exit path including errors.
pub struct LockGuard {
    file: File,
}

impl LockGuard {
    /// Acquire the lock, waiting at most `timeout`.
    ///
    /// Creates the lock file if it does not exist. Signals
    /// [`StoreError::LockTimeout`] once the deadline passes.
    pub fn acquire(lock_path: &Path, timeout: Duration) -> StoreResult<Self> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file }),
                Err(e) if is_contended(&e) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(StoreError::LockTimeout {
                            path: lock_path.to_path_buf(),
                            waited_ms: timeout.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL.min(deadline - now));
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Ignore errors during drop; the OS releases the lock on close anyway
        let _ = FileExt::unlock(&self.file);
    }
}

/// Whether a lock error means "held by someone else" rather than a real failure.
///
/// fs2 may surface a raw OS error instead of `WouldBlock`: EAGAIN is 11 on
/// Linux and 35 on macOS.
fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock || matches!(e.raw_os_error(), Some(11) | Some(35))
}

/// Write bytes to `path` through a temp file and atomic rename.
///
/// The target is either fully updated or unchanged; a crash mid-write never
/// leaves a truncated file. Rename is atomic within one filesystem, which
/// holds because the temp file lives in the target's directory.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;

    {
        let mut writer = BufWriter::new(&mut file);
        writer.write_all(contents)?;
        writer.flush()?;
    }

    // Sync to disk before rename
    file.sync_all()?;

    fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Sibling temp path for `path` (`session.json` -> `session.json.tmp`).
pub fn temp_path(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    os.into()
}
