//! Incremental cache build.
//!
//! For each input path:
//! - present in the cache and fresh: left untouched, nothing is hashed
//! - present but stale (mtime/size drift, or a different algorithm): refreshed
//! - absent: hashed and inserted
//!
//! The cache is saved once at the end, and only if something changed.
//! The save also runs when a structural error cuts the loop short, so
//! completed work survives.
//!
//! Without a cache, every input is hashed and written to the output as a
//! `<digest>  <path>` listing line.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytesize::ByteSize;
use serde::Serialize;

use super::RunError;
use crate::cache::{Cache, Entry, ListedDigest};
use crate::error::ExitCode;
use crate::progress::ProgressCallback;
use crate::scanner::{Algorithm, Hasher};

/// Options for an update run.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Algorithm for new entries and refreshes.
    pub algorithm: Algorithm,
}

/// Counters returned from an update run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    /// Files newly added to the cache
    pub added: usize,
    /// Stale entries rehashed
    pub refreshed: usize,
    /// Fresh entries skipped without hashing
    pub unchanged: usize,
    /// Files that could not be stat'd or read
    pub failed: usize,
    /// Digest computations performed
    pub hashed: usize,
    /// Bytes fed through the hasher
    pub bytes_hashed: u64,
    /// Whether the cache file was rewritten
    pub saved: bool,
}

impl BuildSummary {
    /// Exit status for this run.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.failed > 0 {
            ExitCode::Unreadable
        } else {
            ExitCode::Success
        }
    }
}

/// Runs the incremental build over a list of files.
pub struct UpdateRunner<W: Write> {
    cache: Option<Cache>,
    options: UpdateOptions,
    out: W,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl<W: Write> UpdateRunner<W> {
    /// Create a runner. With `cache = None` a listing is written to `out`.
    pub fn new(cache: Option<Cache>, options: UpdateOptions, out: W) -> Self {
        Self {
            cache,
            options,
            out,
            progress: None,
        }
    }

    /// Report per-file progress to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Process every file, then save the cache if it changed.
    ///
    /// # Errors
    ///
    /// [`RunError::Cache`] if the save fails, [`RunError::Output`] if the
    /// listing cannot be written. Per-file failures are counted in
    /// [`BuildSummary::failed`] instead.
    pub fn run(&mut self, files: &[PathBuf]) -> Result<BuildSummary, RunError> {
        let mut summary = BuildSummary::default();
        let mut dirty = false;

        if let Some(progress) = &self.progress {
            progress.on_phase_start("hashing", files.len());
        }
        let outcome = self.process_all(files, &mut summary, &mut dirty);
        if let Some(progress) = &self.progress {
            progress.on_phase_end("hashing");
        }

        if dirty {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.save() {
                    if let Err(cut_short) = &outcome {
                        log::error!("{}", cut_short);
                    }
                    return Err(e.into());
                }
                summary.saved = true;
            }
        } else if self.cache.is_some() {
            log::info!("Cache unchanged, not saving");
        }
        outcome?;

        log::info!(
            "{} added, {} refreshed, {} unchanged, {} failed; hashed {} file{} ({})",
            summary.added,
            summary.refreshed,
            summary.unchanged,
            summary.failed,
            summary.hashed,
            super::plural(summary.hashed),
            ByteSize::b(summary.bytes_hashed)
        );
        Ok(summary)
    }

    /// The cache, if any, for inspection after a run.
    #[must_use]
    pub fn cache(&self) -> Option<&Cache> {
        self.cache.as_ref()
    }

    /// Give back the cache, releasing the runner.
    pub fn into_cache(self) -> Option<Cache> {
        self.cache
    }

    fn process_all(
        &mut self,
        files: &[PathBuf],
        summary: &mut BuildSummary,
        dirty: &mut bool,
    ) -> Result<(), RunError> {
        for (index, path) in files.iter().enumerate() {
            if let Some(progress) = &self.progress {
                progress.on_progress(index + 1, &path.to_string_lossy());
            }
            let hashed_before = summary.bytes_hashed;

            match self.cache.as_mut() {
                Some(cache) => {
                    if update_cached(cache, path, self.options.algorithm, summary) {
                        *dirty = true;
                    }
                }
                None => self.emit_listing(path, summary)?,
            }

            if let Some(progress) = &self.progress {
                if summary.bytes_hashed > hashed_before {
                    progress.on_item_completed(summary.bytes_hashed - hashed_before);
                }
            }
        }
        Ok(())
    }

    fn emit_listing(&mut self, path: &Path, summary: &mut BuildSummary) -> Result<(), RunError> {
        let hasher = Hasher::new(self.options.algorithm);
        match hasher.digest_file(path) {
            Ok(digest) => {
                summary.hashed += 1;
                summary.bytes_hashed += std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                let listed = ListedDigest::new(path, digest, self.options.algorithm);
                listed.write_line(&mut self.out).map_err(RunError::Output)
            }
            Err(e) => {
                log::warn!("{}", e);
                summary.failed += 1;
                Ok(())
            }
        }
    }
}

/// Bring one path's cache entry up to date. Returns whether the cache changed.
fn update_cached(
    cache: &mut Cache,
    path: &Path,
    algorithm: Algorithm,
    summary: &mut BuildSummary,
) -> bool {
    if let Some(entry) = cache.get_mut(path) {
        if entry.algorithm() == algorithm && !entry.needs_refresh() {
            log::trace!("Unchanged: {}", path.display());
            summary.unchanged += 1;
            return false;
        }

        log::info!("Refreshing {}", path.display());
        return match entry.refresh_with(algorithm) {
            Ok(()) => {
                summary.refreshed += 1;
                summary.hashed += 1;
                summary.bytes_hashed += entry.size();
                true
            }
            Err(e) => {
                log::warn!("{}", e);
                summary.failed += 1;
                false
            }
        };
    }

    match Entry::from_file(path, algorithm) {
        Ok(entry) => {
            log::debug!("Adding {}", path.display());
            summary.added += 1;
            summary.hashed += 1;
            summary.bytes_hashed += entry.size();
            cache.add(entry);
            true
        }
        Err(e) => {
            log::warn!("{}", e);
            summary.failed += 1;
            false
        }
    }
}
