use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use log::error;

use crate::error::Result;
use crate::util;
use crate::{DigestAlgorithm, RocflError};

/// Default wait time for both lock managers when the caller doesn't specify one.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// A process-local keyed reader/writer lock. Readers may overlap; writers are exclusive.
/// Used when the repository is only ever accessed from within this process.
pub struct MemLockManager {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl MemLockManager {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, object_id: &str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(object_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Runs `f` while holding a shared (read) lock on `object_id`.
    pub fn with_read_lock<F, R>(&self, object_id: &str, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        let lock = self.entry(object_id);
        let _guard = lock
            .read()
            .map_err(|_| RocflError::IllegalState(format!("lock poisoned for {}", object_id)))?;
        f()
    }

    /// Runs `f` while holding the exclusive (write) lock on `object_id`.
    pub fn with_write_lock<F, R>(&self, object_id: &str, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        let lock = self.entry(object_id);
        let _guard = lock
            .write()
            .map_err(|_| RocflError::IllegalState(format!("lock poisoned for {}", object_id)))?;
        f()
    }
}

impl Default for MemLockManager {
    fn default() -> Self {
        Self::new()
    }
}

/// An object lock manager that works by attempting to atomically create files using a hash
/// of the object's id. The lock files are removed when the lock goes out of scope. Suitable
/// for coordinating multiple processes over a shared filesystem.
pub struct FileLockManager {
    locks_dir: PathBuf,
    digest_algorithm: DigestAlgorithm,
    timeout: Duration,
}

pub struct ObjectLock {
    lock_path: PathBuf,
}

impl FileLockManager {
    /// Creates a new lock manager with the default 10 second timeout. `locks_dir` must
    /// already exist.
    pub fn new(locks_dir: impl AsRef<Path>) -> Self {
        Self::with_timeout(locks_dir, DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates a new lock manager with a caller-specified wait time.
    pub fn with_timeout(locks_dir: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            locks_dir: locks_dir.as_ref().to_path_buf(),
            digest_algorithm: DigestAlgorithm::Sha256,
            timeout,
        }
    }

    /// Acquires a lock on the given object, retrying until it succeeds or `timeout` elapses.
    /// The lock is _not_ reentrant.
    pub fn acquire(&self, object_id: &str) -> Result<ObjectLock> {
        let hash = self.digest_algorithm.hash_hex(&mut object_id.as_bytes())?;
        let lock_path = self.locks_dir.join(format!("{}.lock", hash.as_ref()));

        let start = Instant::now();

        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(_) => return Ok(ObjectLock { lock_path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if start.elapsed() >= self.timeout {
                        return Err(RocflError::lock_timeout(object_id));
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for ObjectLock {
    fn drop(&mut self) {
        if let Err(e) = util::remove_file_ignore_not_found(&self.lock_path) {
            error!(
                "Failed to remove lock file {}: {}",
                self.lock_path.to_string_lossy(),
                e
            );
        }
    }
}

/// Unifies the two lock manager implementations so the repository façade can hold a single
/// lock manager regardless of which backend a `RepoConfig` selects.
///
/// `MemLockManager` distinguishes readers from writers; `FileLockManager` only ever hands out
/// an exclusive lock, so both of its methods acquire the same file lock.
pub enum LockManager {
    Mem(MemLockManager),
    File(FileLockManager),
}

impl LockManager {
    pub fn in_memory() -> Self {
        LockManager::Mem(MemLockManager::new())
    }

    pub fn file_backed(locks_dir: impl AsRef<Path>, timeout: Duration) -> Self {
        LockManager::File(FileLockManager::with_timeout(locks_dir, timeout))
    }

    /// Runs `f` while holding a shared lock on `object_id`.
    pub fn with_read_lock<F, R>(&self, object_id: &str, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        match self {
            LockManager::Mem(mem) => mem.with_read_lock(object_id, f),
            LockManager::File(file) => {
                let _lock = file.acquire(object_id)?;
                f()
            }
        }
    }

    /// Runs `f` while holding the exclusive lock on `object_id`.
    pub fn with_write_lock<F, R>(&self, object_id: &str, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        match self {
            LockManager::Mem(mem) => mem.with_write_lock(object_id, f),
            LockManager::File(file) => {
                let _lock = file.acquire(object_id)?;
                f()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_fs::TempDir;

    use crate::lock::{FileLockManager, MemLockManager};
    use crate::RocflError;

    #[test]
    fn acquire_lock_when_available() {
        let temp = TempDir::new().unwrap();
        let manager = FileLockManager::with_timeout(temp.path(), Duration::from_millis(50));

        let object_id = "testing";

        let _lock = manager.acquire(object_id).unwrap();

        assert_cannot_acquire_lock(object_id, &manager);
    }

    #[test]
    fn acquire_multiple_locks() {
        let temp = TempDir::new().unwrap();
        let manager = FileLockManager::with_timeout(temp.path(), Duration::from_millis(50));

        let object_1_id = "one";
        let object_2_id = "two";

        let _lock1 = manager.acquire(object_1_id).unwrap();
        let _lock2 = manager.acquire(object_2_id).unwrap();

        assert_cannot_acquire_lock(object_1_id, &manager);
        assert_cannot_acquire_lock(object_2_id, &manager);
    }

    #[test]
    fn release_lock_when_out_of_scope() {
        let temp = TempDir::new().unwrap();
        let manager = FileLockManager::with_timeout(temp.path(), Duration::from_millis(50));

        let object_1_id = "one";
        let object_2_id = "two";

        {
            let _lock1 = manager.acquire(object_1_id).unwrap();
            assert_cannot_acquire_lock(object_1_id, &manager);

            {
                let _lock2 = manager.acquire(object_2_id).unwrap();
                assert_cannot_acquire_lock(object_2_id, &manager);
                assert_cannot_acquire_lock(object_1_id, &manager);
            }

            let _lock2 = manager.acquire(object_2_id).unwrap();
        }

        let _lock1 = manager.acquire(object_1_id).unwrap();
    }

    fn assert_cannot_acquire_lock(object_id: &str, manager: &FileLockManager) {
        match manager.acquire(object_id) {
            Err(RocflError::Lock(..)) => (),
            _ => {
                panic!("Expected the lock to be unavailable")
            }
        }
    }

    #[test]
    fn mem_lock_allows_overlapping_readers() {
        let manager = MemLockManager::new();

        manager
            .with_read_lock("obj-1", || {
                manager.with_read_lock("obj-1", || Ok(())).unwrap();
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn mem_lock_serializes_writers_per_key() {
        let manager = MemLockManager::new();

        manager
            .with_write_lock("obj-1", || {
                // A different key is independent of obj-1's lock.
                manager.with_write_lock("obj-2", || Ok(())).unwrap();
                Ok(())
            })
            .unwrap();
    }
}
