//! Scanner module for input expansion and file hashing.
//!
//! Two jobs:
//! - Expanding command-line inputs into a list of files (optionally recursive)
//! - Streaming content hashing with md5, sha1, sha256 or sha512
//!
//! # Architecture
//!
//! - [`walker`]: Input expansion and directory traversal
//! - [`hasher`]: Streaming digest computation
//!
//! # Example
//!
//! ```no_run
//! use hashstat::scanner::{Algorithm, Hasher, Walker};
//! use std::path::PathBuf;
//!
//! let walker = Walker::new(vec![PathBuf::from("notes")]).recursive(true);
//! let hasher = Hasher::new(Algorithm::Sha256);
//! for path in walker.files() {
//!     match hasher.digest_file(&path) {
//!         Ok(digest) => println!("{digest}  {}", path.display()),
//!         Err(e) => log::warn!("{}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::io;
use std::path::{Path, PathBuf};

pub use hasher::{Algorithm, Hasher, DEFAULT_BUFFER_SIZE};
pub use walker::Walker;

/// An input that could not be expanded into files.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// A directory was given without `--recursive`.
    #[error("{0}: is a directory (use --recursive)")]
    IsADirectory(PathBuf),

    /// Following symlinks led back to an ancestor.
    #[error("{0}: symlink loop")]
    Loop(PathBuf),

    /// Reading a directory failed.
    #[error("{path}: cannot read directory: {source}")]
    Io {
        /// Directory or entry being read
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A file that could not be hashed.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file does not exist.
    #[error("{0}: no such file")]
    NotFound(PathBuf),

    /// The file exists but may not be read.
    #[error("{0}: permission denied")]
    PermissionDenied(PathBuf),

    /// Opening or reading failed for another reason.
    #[error("{path}: read failed: {source}")]
    Io {
        /// File being hashed
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised while opening or reading `path`.
    #[must_use]
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}
