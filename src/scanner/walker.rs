//! Input expansion for the update command.
//!
//! # Overview
//!
//! [`Walker`] turns the paths given on the command line into the list of
//! files to hash. Plain files pass through untouched and in order. A
//! directory is an error unless recursion is enabled, in which case
//! every regular file below it is yielded in sorted order via [`walkdir`].
//!
//! Missing paths are passed through as well: the update runner reports
//! them as unreadable files rather than aborting the run.
//!
//! Excluded paths (the cache being written and its lock file) are dropped
//! wherever they turn up, compared by canonical path.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::ScanError;

/// Expands input paths into a flat, ordered file list.
#[derive(Debug, Clone)]
pub struct Walker {
    /// Paths as given by the caller
    inputs: Vec<PathBuf>,
    /// Descend into directories
    recursive: bool,
    /// Follow symbolic links while descending
    follow_symlinks: bool,
    /// Canonical paths never yielded
    excluded: Vec<PathBuf>,
}

impl Walker {
    /// Create a walker over the given inputs (non-recursive).
    #[must_use]
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            recursive: false,
            follow_symlinks: false,
            excluded: Vec::new(),
        }
    }

    /// Enable or disable descending into directories.
    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Follow symbolic links while descending.
    #[must_use]
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Never yield these paths. Paths that do not exist yet are ignored.
    #[must_use]
    pub fn exclude<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.excluded
            .extend(paths.into_iter().filter_map(|p| fs::canonicalize(p).ok()));
        self
    }

    /// Iterate over the expanded inputs.
    ///
    /// Each item is either a file path or a [`ScanError`] for an input
    /// that could not be expanded. Callers decide whether to skip or abort.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        self.inputs.iter().flat_map(move |input| self.expand(input))
    }

    /// Collect the expanded files, logging and skipping inputs that fail.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        self.walk()
            .filter_map(|item| match item {
                Ok(path) => Some(path),
                Err(e) => {
                    log::warn!("{}", e);
                    None
                }
            })
            .collect()
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.excluded.is_empty() {
            return false;
        }
        match fs::canonicalize(path) {
            Ok(canonical) if self.excluded.contains(&canonical) => {
                log::debug!("Skipping {}", path.display());
                true
            }
            _ => false,
        }
    }

    fn expand(&self, input: &PathBuf) -> Vec<Result<PathBuf, ScanError>> {
        if !input.is_dir() {
            if self.is_excluded(input) {
                return Vec::new();
            }
            return vec![Ok(input.clone())];
        }
        if !self.recursive {
            return vec![Err(ScanError::IsADirectory(input.clone()))];
        }

        log::debug!("Walking directory {}", input.display());
        WalkDir::new(input)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if self.is_excluded(entry.path()) {
                        None
                    } else {
                        Some(Ok(entry.into_path()))
                    }
                }
                Ok(_) => None,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| input.clone(), |p| p.to_path_buf());
                    Some(Err(match e.into_io_error() {
                        Some(source) => ScanError::Io { path, source },
                        None => ScanError::Loop(path),
                    }))
                }
            })
            .collect()
    }
}
