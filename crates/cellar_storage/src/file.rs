//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Persistent storage on a single OS file.
///
/// # Durability
///
/// - `append` writes straight through to the OS (no user-space buffering),
///   so appended data survives a process exit even without `sync`
/// - `sync` calls `File::sync_all()` and survives power loss
/// - `replace` writes a sibling `*.tmp` file, syncs it, renames it over the
///   original and syncs the parent directory
///
/// # Example
///
/// ```no_run
/// use cellar_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("wal.log")).unwrap();
/// backend.append(b"entry").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    state: Mutex<FileState>,
}

#[derive(Debug)]
struct FileState {
    file: File,
    len: u64,
}

impl FileBackend {
    /// Opens or creates the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = open_rw(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(FileState { file, len }),
        })
    }

    /// Opens or creates the file, creating missing parent directories first.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::open(path)
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scratch_path(&self) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

fn open_rw(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut state = self.state.lock();
        let size = state.len;
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; len];
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut state = self.state.lock();
        let offset = state.len;
        if data.is_empty() {
            return Ok(offset);
        }

        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(data)?;
        state.len += data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.state.lock().file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let mut state = self.state.lock();
        state.file.flush()?;
        state.file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.state.lock().len)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut state = self.state.lock();
        if new_size > state.len {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size: state.len,
            });
        }
        state.file.set_len(new_size)?;
        state.file.sync_all()?;
        state.len = new_size;
        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let scratch = self.scratch_path();
        {
            let mut tmp = File::create(&scratch)?;
            tmp.write_all(data)?;
            tmp.sync_all()?;
        }

        let mut state = self.state.lock();
        fs::rename(&scratch, &self.path)?;
        sync_parent_dir(&self.path)?;
        state.file = open_rw(&self.path)?;
        state.len = data.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
        assert_eq!(backend.path(), path);
    }

    #[test]
    fn append_returns_offsets() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("wal.log")).unwrap();

        assert_eq!(backend.append(b"abc").unwrap(), 0);
        assert_eq!(backend.append(b"defg").unwrap(), 3);
        assert_eq!(backend.append(b"").unwrap(), 7);
        assert_eq!(backend.read_at(3, 4).unwrap(), b"defg");
        assert_eq!(backend.read_all().unwrap(), b"abcdefg");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("wal.log")).unwrap();
        backend.append(b"hello").unwrap();

        assert!(matches!(
            backend.read_at(3, 5),
            Err(StorageError::ReadPastEnd { size: 5, .. })
        ));
    }

    #[test]
    fn content_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"durable").unwrap();
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.read_all().unwrap(), b"durable");
    }

    #[test]
    fn truncate_cuts_tail() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("wal.log")).unwrap();
        backend.append(b"keep-torn").unwrap();

        backend.truncate(4).unwrap();
        assert_eq!(backend.read_all().unwrap(), b"keep");
        assert_eq!(backend.append(b"!").unwrap(), 4);

        assert!(matches!(
            backend.truncate(100),
            Err(StorageError::TruncateBeyondEnd { .. })
        ));
    }

    #[test]
    fn replace_swaps_content_and_keeps_appending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"old old old").unwrap();

        backend.replace(b"new").unwrap();
        assert_eq!(backend.size().unwrap(), 3);
        backend.append(b"+tail").unwrap();
        assert_eq!(backend.read_all().unwrap(), b"new+tail");
        assert!(!dir.path().join("wal.log.tmp").exists());

        drop(backend);
        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.read_all().unwrap(), b"new+tail");
    }

    #[test]
    fn open_with_create_dirs_builds_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("wal.log");

        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
    }
}
