//! Verification run.
//!
//! Records come from checksum input files (cache-format or listing lines,
//! mixed freely) and from caches opened read-only. Each record is verified
//! and lands in exactly one bucket of [`CheckSummary`], with one status
//! line per record written to the output:
//!
//! ```text
//! notes.txt: OK
//! gone.txt: FAILED open or read
//! touched.txt: FAILED mtime/size check
//! edited.txt: FAILED
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::Serialize;

use super::{plural, RunError};
use crate::cache::{Cache, Checks, Record, Verdict, VerifyError};
use crate::error::ExitCode;

/// Options for a check run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// Which checks to run per record.
    pub checks: Checks,
    /// Suppress `OK` lines.
    pub quiet: bool,
    /// Stat mismatches are reported but do not affect the exit status.
    pub lenient_stat: bool,
}

/// Per-bucket counters returned from a check run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    /// Records whose requested checks all passed
    pub ok: usize,
    /// Files that could not be opened or read
    pub failed_open: usize,
    /// Files whose mtime or size drifted
    pub failed_stat: usize,
    /// Files whose digest no longer matches
    pub failed_digest: usize,
}

impl CheckSummary {
    /// Count one outcome.
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Ok => self.ok += 1,
            Verdict::OpenFailure => self.failed_open += 1,
            Verdict::StatMismatch => self.failed_stat += 1,
            Verdict::DigestMismatch => self.failed_digest += 1,
        }
    }

    /// Total records checked.
    #[must_use]
    pub fn total(&self) -> usize {
        self.ok + self.failed_open + self.failed_stat + self.failed_digest
    }

    /// Exit status for this run.
    ///
    /// Unreadable files take precedence over mismatches. Stat mismatches
    /// count as failures unless `lenient_stat` is set.
    #[must_use]
    pub fn exit_code(&self, lenient_stat: bool) -> ExitCode {
        if self.failed_open > 0 {
            ExitCode::Unreadable
        } else if self.failed_digest > 0 || (!lenient_stat && self.failed_stat > 0) {
            ExitCode::VerificationFailed
        } else {
            ExitCode::Success
        }
    }
}

/// Verifies records and accumulates a [`CheckSummary`].
pub struct CheckRunner<W: Write> {
    options: CheckOptions,
    out: W,
    summary: CheckSummary,
}

impl<W: Write> CheckRunner<W> {
    /// Create a runner writing status lines to `out`.
    pub fn new(options: CheckOptions, out: W) -> Self {
        Self {
            options,
            out,
            summary: CheckSummary::default(),
        }
    }

    /// Verify every record in a checksum input file.
    ///
    /// Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// [`RunError::Read`] if the file cannot be read, [`RunError::Parse`]
    /// on the first malformed line, or any error from [`Self::check_record`].
    pub fn check_file(&mut self, path: &Path) -> Result<(), RunError> {
        let read_err = |source| RunError::Read {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(read_err)?;

        for (index, line) in BufReader::new(file).split(b'\n').enumerate() {
            let line = line.map_err(read_err)?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let record = Record::parse_bytes(&line).map_err(|source| RunError::Parse {
                path: path.to_path_buf(),
                line: index + 1,
                source,
            })?;
            self.check_record(&record)?;
        }
        Ok(())
    }

    /// Verify every entry of a loaded cache, in path order.
    ///
    /// # Errors
    ///
    /// [`RunError::Output`] if a status line cannot be written.
    pub fn check_cache(&mut self, cache: &Cache) -> Result<(), RunError> {
        for entry in cache.entries() {
            let result = entry.verify(self.options.checks);
            self.report(entry.path(), result)?;
        }
        Ok(())
    }

    /// Verify one record and print its status line.
    ///
    /// # Errors
    ///
    /// [`RunError::NoStatRecorded`] for a listing record in a stat-only
    /// run, [`RunError::Output`] if the status line cannot be written.
    pub fn check_record(&mut self, record: &Record) -> Result<Verdict, RunError> {
        if self.options.checks == Checks::Stat && !record.has_stat() {
            return Err(RunError::NoStatRecorded(record.path().to_path_buf()));
        }
        let result = record.verify(self.options.checks);
        self.report(record.path(), result)
    }

    /// Counters so far.
    #[must_use]
    pub fn summary(&self) -> CheckSummary {
        self.summary
    }

    /// Log the end-of-run summary and return the counters.
    pub fn finish(self) -> CheckSummary {
        let s = self.summary;
        if s.total() == 0 {
            log::warn!("No records were checked");
        }
        if s.failed_open > 0 {
            log::warn!(
                "{} listed file{} could not be read",
                s.failed_open,
                plural(s.failed_open)
            );
        }
        if s.failed_digest > 0 {
            log::warn!(
                "{} computed checksum{} did NOT match",
                s.failed_digest,
                plural(s.failed_digest)
            );
        }
        if s.failed_stat > 0 {
            log::warn!(
                "{} listed file{} had mismatched mtime or size",
                s.failed_stat,
                plural(s.failed_stat)
            );
        }
        log::debug!("Checked {} record{}", s.total(), plural(s.total()));
        s
    }

    fn report(&mut self, path: &Path, result: Result<(), VerifyError>) -> Result<Verdict, RunError> {
        if let Err(e) = &result {
            log::debug!("{}", e);
        }
        let verdict = Verdict::from(result);
        self.summary.record(verdict);

        let status = match verdict {
            Verdict::Ok if self.options.quiet => None,
            Verdict::Ok => Some("OK"),
            Verdict::OpenFailure => Some("FAILED open or read"),
            Verdict::StatMismatch => Some("FAILED mtime/size check"),
            Verdict::DigestMismatch => Some("FAILED"),
        };
        if let Some(status) = status {
            writeln!(self.out, "{}: {}", path.display(), status).map_err(RunError::Output)?;
        }
        Ok(verdict)
    }
}
