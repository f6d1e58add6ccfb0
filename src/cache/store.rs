//! File-backed checksum cache.
//!
//! The backing file holds one [`Entry`] line per file, sorted by path.
//! A [`Cache`] holds an advisory lock for as long as it is alive: shared
//! when opened read-only, exclusive otherwise.
//!
//! Saves never modify the backing file in place. The full contents are
//! written to a temporary file in the same directory, synced, and renamed
//! over the old file, so readers see either the previous snapshot or the
//! new one.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::entry::Entry;
use super::lock::{CacheLock, LockError, LockMode};
use super::{CacheError, CacheResult};

/// Persisted, lock-protected collection of entries keyed by path.
#[derive(Debug)]
pub struct Cache {
    path: PathBuf,
    readonly: bool,
    entries: BTreeMap<PathBuf, Entry>,
    lock: CacheLock,
}

impl Cache {
    /// Open (creating if absent) and load the cache at `path`.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Create`] if the backing file cannot be created
    /// - [`CacheError::LockUnavailable`] if another process holds the cache
    /// - [`CacheError::Parse`] if any line is malformed
    pub fn open(path: impl Into<PathBuf>, readonly: bool) -> CacheResult<Self> {
        let path = path.into();
        create_if_missing(&path)?;

        let mode = if readonly {
            LockMode::Shared
        } else {
            LockMode::Exclusive
        };
        let lock = CacheLock::acquire(&path, mode).map_err(|e| match e {
            LockError::Unavailable(_) => CacheError::LockUnavailable(path.clone()),
            other => CacheError::Lock(other),
        })?;

        let mut cache = Self {
            path,
            readonly,
            entries: BTreeMap::new(),
            lock,
        };
        cache.load()?;
        Ok(cache)
    }

    /// Re-read the backing file, adding every line to the in-memory map.
    ///
    /// # Errors
    ///
    /// [`CacheError::Parse`] on the first malformed line; [`CacheError::Io`]
    /// if the file cannot be read.
    pub fn load(&mut self) -> CacheResult<usize> {
        let file = File::open(&self.path).map_err(|source| CacheError::Open {
            path: self.path.clone(),
            source,
        })?;

        for (index, line) in BufReader::new(file).split(b'\n').enumerate() {
            let line = line.map_err(|source| CacheError::Io {
                path: self.path.clone(),
                source,
            })?;
            let entry = Entry::parse_bytes(&line).map_err(|source| CacheError::Parse {
                path: self.path.clone(),
                line: index + 1,
                source,
            })?;
            self.add(entry);
        }

        log::info!("Loaded {} entries from cache", self.entries.len());
        Ok(self.entries.len())
    }

    /// Write every entry to the backing file, sorted by path.
    ///
    /// # Errors
    ///
    /// [`CacheError::ReadOnly`] for a read-only cache, [`CacheError::Io`]
    /// if writing or renaming fails. The previous contents stay intact on
    /// failure.
    pub fn save(&self) -> CacheResult<()> {
        if self.readonly {
            return Err(CacheError::ReadOnly(self.path.clone()));
        }
        log::info!("Saving cache to {}", self.path.display());

        let io_err = |source: io::Error| CacheError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            for entry in self.entries.values() {
                entry.write_line(&mut writer).map_err(io_err)?;
            }
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        copy_permissions(&self.path, tmp.path());
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        log::info!("Saved {} cache entries", self.entries.len());
        Ok(())
    }

    /// Insert or replace an entry, keyed by its path.
    ///
    /// Returns the replaced entry, if any.
    pub fn add(&mut self, entry: Entry) -> Option<Entry> {
        let key = entry.path().to_path_buf();
        let previous = self.entries.insert(key, entry);
        if let Some(old) = &previous {
            log::warn!("{} already found in cache", old.path().display());
        }
        previous
    }

    /// Look up an entry by path.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&Entry> {
        self.entries.get(path)
    }

    /// Look up an entry by path for refreshing.
    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Entry> {
        self.entries.get_mut(path)
    }

    /// Whether `path` has an entry.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Paths whose recorded mtime or size no longer matches the file, in
    /// path order. Vanished files are included.
    #[must_use]
    pub fn stale_paths(&self) -> Vec<PathBuf> {
        self.entries
            .values()
            .filter(|entry| entry.needs_refresh())
            .map(|entry| entry.path().to_path_buf())
            .collect()
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the cache was opened read-only (shared lock).
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// The lock held for this cache.
    #[must_use]
    pub fn lock(&self) -> &CacheLock {
        &self.lock
    }
}

fn create_if_missing(path: &Path) -> CacheResult<()> {
    // An existing cache may sit on read-only media
    if path.is_file() {
        return Ok(());
    }
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => {
            log::warn!("Creating new cache file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(CacheError::Create {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Carry the old file's permissions over to its replacement.
fn copy_permissions(from: &Path, to: &Path) {
    if let Ok(meta) = fs::metadata(from) {
        if let Err(e) = fs::set_permissions(to, meta.permissions()) {
            log::debug!("Could not copy permissions to {}: {}", to.display(), e);
        }
    }
}
