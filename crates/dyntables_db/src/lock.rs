//! Cross-process write lock.
//!
//! SQLite serializes single statements, not the read-check-DDL-catalog
//! sequence of a schema change. Writers hold an exclusive lock on a file
//! beside the database for that whole sequence. The lock is taken per open
//! file, so two handles in one process exclude each other as well.
//!
//! Uses `fs2` for cross-platform file locking (MSRV 1.75 compatible).

use crate::error::{DbError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Holds the exclusive write lock until dropped.
pub struct DbLockGuard {
    _file: File,
    lock_path: PathBuf,
}

impl DbLockGuard {
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for DbLockGuard {
    fn drop(&mut self) {
        // Closing the file releases the lock.
        debug!(path = %self.lock_path.display(), "Releasing database write lock");
    }
}

impl std::fmt::Debug for DbLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbLockGuard")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

/// Lock file for a database: `tables.sqlite` -> `tables.sqlite.lock`.
pub fn lock_path_for(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Take the lock if it is free; `None` when another holder has it.
pub fn try_lock_exclusive(db_path: &Path) -> Result<Option<DbLockGuard>> {
    let lock_path = lock_path_for(db_path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;

    // Fully qualified: newer std has an inherent File::try_lock_exclusive
    // with a different error type.
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => Ok(Some(DbLockGuard {
            _file: file,
            lock_path,
        })),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
        Err(e) => Err(DbError::Io(e)),
    }
}

/// Wait up to `timeout` for the lock.
pub async fn lock_exclusive(db_path: &Path, timeout: Duration) -> Result<DbLockGuard> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(guard) = try_lock_exclusive(db_path)? {
            debug!(path = %guard.lock_path().display(), "Acquired database write lock");
            return Ok(guard);
        }
        if Instant::now() >= deadline {
            return Err(DbError::Locked(db_path.to_path_buf()));
        }
        tokio::time::sleep(LOCK_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_for() {
        assert_eq!(
            lock_path_for(Path::new("/data/tables.sqlite")),
            PathBuf::from("/data/tables.sqlite.lock")
        );
        assert_eq!(
            lock_path_for(Path::new("/data/tables")),
            PathBuf::from("/data/tables.lock")
        );
    }

    #[test]
    fn test_lock_contention_and_release() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("tables.sqlite");

        let guard = try_lock_exclusive(&db_path).unwrap().unwrap();
        assert!(guard.lock_path().exists());
        assert!(try_lock_exclusive(&db_path).unwrap().is_none());

        drop(guard);
        assert!(try_lock_exclusive(&db_path).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lock_exclusive_times_out() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("tables.sqlite");

        let _held = try_lock_exclusive(&db_path).unwrap().unwrap();
        let err = lock_exclusive(&db_path, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Locked(_)));
    }

    #[tokio::test]
    async fn test_lock_exclusive_waits_for_release() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("tables.sqlite");

        let held = try_lock_exclusive(&db_path).unwrap().unwrap();
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(held);
        });

        let guard = lock_exclusive(&db_path, Duration::from_secs(5)).await.unwrap();
        assert_eq!(guard.lock_path(), lock_path_for(&db_path));
        release.await.unwrap();
    }
}
