//! Checksum cache module.
//!
//! This module provides persistent storage for file digests so that
//! subsequent runs can skip rehashing unchanged files.
//!
//! # Architecture
//!
//! * [`entry`]: One file's digest/mtime/size snapshot and its verification logic.
//! * [`store`]: The locked, file-backed [`Cache`] of entries.
//! * [`lock`]: Non-blocking shared/exclusive advisory locks.
//! * [`listing`]: md5sum-style `<digest> <path>` listings.
//!
//! # Cache Invalidation
//!
//! Entries are validated using:
//! * File path (key)
//! * File size
//! * Modification time (millisecond precision)
//!
//! If either stat value changes, the entry is considered stale and the
//! file is rehashed on the next update.

pub mod entry;
pub mod listing;
pub mod lock;
pub mod store;

use std::io;
use std::path::PathBuf;

pub use entry::{Checks, Entry, Mtime, NoChecksRequested, ParseError, Verdict, VerifyError};
pub use listing::{ListedDigest, Record};
pub use lock::{CacheLock, LockError, LockMode};
pub use store::Cache;

/// Errors that abort work on a cache as a whole.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The backing file did not exist and could not be created.
    #[error("Failed to create cache file {path}: {source}")]
    Create {
        /// Cache file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The backing file could not be opened.
    #[error("Failed to open cache file {path}: {source}")]
    Open {
        /// Cache file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Another process holds the cache.
    #[error("Failed to lock {0}: cache is in use by another process")]
    LockUnavailable(PathBuf),

    /// The lock could not be taken for another reason.
    #[error(transparent)]
    Lock(LockError),

    /// A line of the backing file is malformed.
    #[error("{path}:{line}: {source}")]
    Parse {
        /// Cache file path
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        #[source]
        source: ParseError,
    },

    /// Reading or writing the backing file failed.
    #[error("I/O error for cache {path}: {source}")]
    Io {
        /// Cache file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Save was called on a cache opened read-only.
    #[error("Cache {0} was opened read-only")]
    ReadOnly(PathBuf),
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
