//! Progress reporting for update runs.
//!
//! This module provides the [`Progress`] struct which implements
//! [`ProgressCallback`] to display a progress bar on stderr while the
//! update command hashes files. Nothing is drawn unless `--progress` is
//! given, so scripted runs keep clean output.

use std::sync::Mutex;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receives per-file progress from an update run.
pub trait ProgressCallback: Send + Sync {
    /// A phase over `total` inputs begins (the update runner uses "hashing").
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Input number `current` (1-based) is about to be processed.
    fn on_progress(&self, current: usize, path: &str);

    /// An input was actually hashed, `bytes` long. Skipped inputs never
    /// report here.
    fn on_item_completed(&self, _bytes: u64) {}

    /// The phase is over.
    fn on_phase_end(&self, phase: &str);
}

/// Progress bar on stderr, drawn by indicatif.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    hashed_bytes: Mutex<u64>,
    hidden: bool,
}

impl Progress {
    /// Create a reporter. A `hidden` one tracks state but never draws.
    #[must_use]
    pub fn new(hidden: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            hashed_bytes: Mutex::new(0),
            hidden,
        }
    }

    /// Bytes hashed so far in the current phase.
    #[must_use]
    pub fn hashed_bytes(&self) -> u64 {
        self.hashed_bytes.lock().map(|b| *b).unwrap_or(0)
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        let pb = if self.hidden {
            ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new(total as u64)
        };
        pb.set_style(Self::style());
        pb.set_message(phase.to_string());
        if let Ok(mut bytes) = self.hashed_bytes.lock() {
            *bytes = 0;
        }
        if let Ok(mut bar) = self.bar.lock() {
            *bar = Some(pb);
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        let hashed = self.hashed_bytes();
        if let Ok(bar) = self.bar.lock() {
            if let Some(pb) = bar.as_ref() {
                pb.set_position(current as u64);
                pb.set_message(format!("{} ({})", truncate_path(path, 30), ByteSize(hashed)));
            }
        }
    }

    fn on_item_completed(&self, bytes: u64) {
        if let Ok(mut total) = self.hashed_bytes.lock() {
            *total += bytes;
        }
    }

    fn on_phase_end(&self, phase: &str) {
        let message = finish_message(phase, self.hashed_bytes());
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(pb) = bar.take() {
                pb.finish_with_message(message);
            }
        }
    }
}

fn finish_message(phase: &str, hashed_bytes: u64) -> String {
    format!("{phase} complete, {} read", ByteSize(hashed_bytes))
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
