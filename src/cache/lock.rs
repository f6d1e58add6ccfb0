//! Scoped, non-blocking advisory locks.
//!
//! The lock is taken on a sidecar file (`<cache>.lock`) rather than on the
//! cache itself: saves replace the cache file by rename, and a lock held on
//! the old inode would no longer exclude anyone. The sidecar is never
//! replaced or removed, so every process contends on the same inode.
//!
//! Acquisition never waits. If another process holds a conflicting lock,
//! [`CacheLock::acquire`] fails with [`LockError::Unavailable`] immediately.
//!
//! Shared locks need no write access. An existing sidecar is opened
//! read-only, and when no sidecar can be created at all (read-only media)
//! the shared lock is taken on the cache file itself. Nobody can save into
//! such a directory, so there is no writer to exclude.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use fs4::FileExt;

/// Lock flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Any number of holders.
    Shared,
    /// Single holder, excludes shared holders too.
    Exclusive,
}

/// Errors from lock acquisition.
#[derive(thiserror::Error, Debug)]
pub enum LockError {
    /// Another process holds a conflicting lock.
    #[error("Failed to lock {0}: held by another process")]
    Unavailable(PathBuf),

    /// The lock file could not be opened or locked for another reason.
    #[error("Failed to lock {path}: {source}")]
    Io {
        /// Lock file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// A held advisory lock, released on drop.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl CacheLock {
    /// Sidecar lock path for a cache file.
    #[must_use]
    pub fn path_for(cache_path: &Path) -> PathBuf {
        let mut name = cache_path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Try to take the lock for `cache_path` without waiting.
    ///
    /// # Errors
    ///
    /// [`LockError::Unavailable`] if the lock is held elsewhere,
    /// [`LockError::Io`] if the sidecar cannot be opened.
    pub fn acquire(cache_path: &Path, mode: LockMode) -> Result<Self, LockError> {
        let sidecar = Self::path_for(cache_path);
        let (file, path) = match mode {
            LockMode::Exclusive => (open_sidecar(&sidecar)?, sidecar),
            LockMode::Shared => match File::open(&sidecar) {
                Ok(file) => (file, sidecar),
                Err(_) => match open_sidecar(&sidecar) {
                    Ok(file) => (file, sidecar),
                    Err(err) => {
                        log::debug!("{}; locking {} instead", err, cache_path.display());
                        let file = File::open(cache_path).map_err(|_| err)?;
                        (file, cache_path.to_path_buf())
                    }
                },
            },
        };

        let result = match mode {
            LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
            LockMode::Shared => FileExt::try_lock_shared(&file),
        };
        match result {
            Ok(()) => {
                log::debug!("Acquired {:?} lock on {}", mode, path.display());
                Ok(Self { file, path, mode })
            }
            Err(err) if is_contended(&err) => Err(LockError::Unavailable(path)),
            Err(source) => Err(LockError::Io { path, source }),
        }
    }

    /// Mode this lock was taken in.
    #[must_use]
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Path of the sidecar lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        log::trace!("Released lock on {}", self.path.display());
    }
}

fn open_sidecar(path: &Path) -> Result<File, LockError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|source| LockError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn is_contended(err: &io::Error) -> bool {
    // ERROR_LOCK_VIOLATION
    err.kind() == ErrorKind::WouldBlock || (cfg!(windows) && err.raw_os_error() == Some(33))
}
