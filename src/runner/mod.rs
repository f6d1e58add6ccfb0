//! Update and check runs.
//!
//! # Overview
//!
//! The two halves of the tool:
//! 1. [`update`]: the incremental build. Hash new files, refresh stale
//!    entries, leave fresh ones alone, and save the cache once if anything
//!    changed.
//! 2. [`check`]: the verification run. Verify recorded entries against
//!    the filesystem and count each outcome in exactly one bucket.
//!
//! Both isolate failures per file: an unreadable file is counted and
//! reported, and the run moves on. Only structural problems (a corrupt
//! cache, a lock held elsewhere, an unwritable output) end a run early.
//!
//! # Example
//!
//! ```no_run
//! use hashstat::cache::Cache;
//! use hashstat::runner::{UpdateOptions, UpdateRunner};
//! use std::path::PathBuf;
//!
//! let cache = Cache::open("sums.cache", false)?;
//! let mut runner = UpdateRunner::new(Some(cache), UpdateOptions::default(), std::io::stdout());
//! let summary = runner.run(&[PathBuf::from("a.txt"), PathBuf::from("b.txt")])?;
//! println!("{} hashed, {} unchanged", summary.hashed, summary.unchanged);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod check;
pub mod update;

use std::io;
use std::path::PathBuf;

use crate::cache::{CacheError, ParseError};

pub use check::{CheckOptions, CheckRunner, CheckSummary};
pub use update::{BuildSummary, UpdateOptions, UpdateRunner};

/// Errors that end a run early.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    /// The cache could not be opened, loaded or saved.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A checksum input file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Input file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A line of a checksum input file is malformed.
    #[error("{path}:{line}: {source}")]
    Parse {
        /// Input file path
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        #[source]
        source: ParseError,
    },

    /// A stat-only check reached a record without mtime/size.
    #[error("{0}: listing records no mtime or size; stat-only checks need cache-format input")]
    NoStatRecorded(PathBuf),

    /// Writing status lines or listings failed.
    #[error("Failed to write output: {0}")]
    Output(#[source] io::Error),
}

/// Pluralization suffix used in summaries.
pub(crate) fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
