//! Store directory management.
//!
//! On-disk layout of a durable store:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK            # advisory lock, held while the store is open
//! ├─ wal.log         # write-ahead log (the only data file)
//! └─ wal.log.tmp     # compaction scratch, renamed over wal.log
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const WAL_FILE: &str = "wal.log";

/// An opened store directory holding the exclusive `LOCK`.
///
/// The lock is released when the `StoreDir` is dropped. A second `open` of
/// the same directory, from this process or another, fails with
/// [`CoreError::StoreLocked`] until then.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    lock_file: File,
}

impl StoreDir {
    /// Opens (and optionally creates) a store directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidPath`] if the path is empty, is not a directory,
    ///   or is missing while `create_if_missing` is false
    /// - [`CoreError::StoreLocked`] if the lock is held elsewhere
    /// - I/O errors
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if path.as_os_str().is_empty() {
            return Err(CoreError::invalid_path("path is empty"));
        }

        if !path.exists() {
            if !create_if_missing {
                return Err(CoreError::invalid_path(format!(
                    "{} does not exist",
                    path.display()
                )));
            }
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_path(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the WAL file.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        self.path.join(WAL_FILE)
    }

    /// Returns the WAL path for a store directory without locking it.
    ///
    /// Used by read-only tooling.
    #[must_use]
    pub fn wal_path_for(path: &Path) -> PathBuf {
        path.join(WAL_FILE)
    }
}

impl Drop for StoreDir {
    fn drop(&mut self) {
        // Closing the handle releases the lock too; unlocking first keeps
        // the release immediate on platforms that defer it.
        let _ = FileExt::unlock(&self.lock_file);
    }
}
