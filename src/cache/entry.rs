//! Cache entry definitions.
//!
//! An [`Entry`] is one file's recorded checksum state: digest, mtime and
//! size captured together. The three values only ever change together
//! through [`Entry::refresh`], so a stored entry is always a consistent
//! snapshot of the file at some point in time.
//!
//! # Line format
//!
//! ```text
//! <hex-digest> <mtime %.3f> <size> <path>
//! ```
//!
//! The path is everything after the third space and may itself contain
//! spaces. Paths containing newlines are not representable. On Unix the
//! path is stored as its raw bytes, so names that are not valid UTF-8
//! survive a save and reload unchanged.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::scanner::{Algorithm, HashError, Hasher};

/// Modification time in whole milliseconds since the Unix epoch.
///
/// Filesystem timestamps are truncated to millisecond precision, which is
/// also the precision of the persisted `%.3f` form, so a parsed value
/// compares exactly against a fresh stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mtime(i64);

impl Mtime {
    /// Build from a millisecond count.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the Unix epoch (negative before it).
    #[must_use]
    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Seconds since the Unix epoch as a float.
    #[must_use]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

impl From<SystemTime> for Mtime {
    fn from(time: SystemTime) -> Self {
        let millis = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
            Err(e) => -i64::try_from(e.duration().as_millis()).unwrap_or(i64::MAX),
        };
        Self(millis)
    }
}

impl fmt::Display for Mtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:03}", abs / 1000, abs % 1000)
    }
}

impl FromStr for Mtime {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs: f64 = s
            .parse()
            .map_err(|_| ParseError::InvalidMtime(s.to_string()))?;
        if !secs.is_finite() {
            return Err(ParseError::InvalidMtime(s.to_string()));
        }
        Ok(Self((secs * 1000.0).round() as i64))
    }
}

/// Errors raised when a persisted line cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line does not have the expected number of fields.
    #[error("Cannot parse line: {0:?}")]
    Malformed(String),

    /// The digest contains characters other than hex digits.
    #[error("Digest is not hexadecimal: {0:?}")]
    InvalidDigest(String),

    /// The digest length does not match any supported algorithm.
    #[error("Unrecognized digest length {len} (expected 32, 40, 64 or 128)")]
    UnknownDigestLength {
        /// Length of the rejected digest in characters
        len: usize,
    },

    /// The mtime field is not a number.
    #[error("Invalid mtime: {0:?}")]
    InvalidMtime(String),

    /// The size field is not a non-negative integer.
    #[error("Invalid size: {0:?}")]
    InvalidSize(String),
}

/// Errors raised when an entry is checked against the live file.
#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    /// The file could not be stat'd, opened or read.
    #[error("{path}: failed to open or read: {source}")]
    FailedOpen {
        /// The file in question
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The file's mtime differs from the recorded one.
    #[error("{path}: mtime has changed from {recorded} to {actual}")]
    MtimeMismatch {
        /// The file in question
        path: PathBuf,
        /// Value stored in the entry
        recorded: Mtime,
        /// Value found on disk
        actual: Mtime,
    },

    /// The file's size differs from the recorded one.
    #[error("{path}: size has changed from {recorded} to {actual}")]
    SizeMismatch {
        /// The file in question
        path: PathBuf,
        /// Value stored in the entry
        recorded: u64,
        /// Value found on disk
        actual: u64,
    },

    /// The file's contents hash to a different digest.
    #[error("{path}: digest has changed to {actual}")]
    DigestMismatch {
        /// The file in question
        path: PathBuf,
        /// Digest stored in the entry
        recorded: String,
        /// Digest computed now
        actual: String,
    },
}

impl VerifyError {
    /// The bucket this failure is reported under.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::FailedOpen { .. } => Verdict::OpenFailure,
            Self::MtimeMismatch { .. } | Self::SizeMismatch { .. } => Verdict::StatMismatch,
            Self::DigestMismatch { .. } => Verdict::DigestMismatch,
        }
    }

    fn failed_open(path: &Path, source: io::Error) -> Self {
        Self::FailedOpen {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<HashError> for VerifyError {
    fn from(err: HashError) -> Self {
        match err {
            HashError::NotFound(path) => Self::FailedOpen {
                path,
                source: io::Error::from(io::ErrorKind::NotFound),
            },
            HashError::PermissionDenied(path) => Self::FailedOpen {
                path,
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
            HashError::Io { path, source } => Self::FailedOpen { path, source },
        }
    }
}

/// Classification of one verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Every requested check passed.
    Ok,
    /// The file could not be opened or read.
    OpenFailure,
    /// Mtime or size drifted.
    StatMismatch,
    /// The contents changed.
    DigestMismatch,
}

impl<E: std::borrow::Borrow<VerifyError>> From<Result<(), E>> for Verdict {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(e) => e.borrow().verdict(),
        }
    }
}

/// Which checks [`Entry::verify`] runs.
///
/// There is deliberately no "nothing" variant; use [`Checks::from_flags`]
/// to build one from a pair of booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Checks {
    /// Mtime and size only.
    Stat,
    /// Digest only.
    Digest,
    /// Stat first, then digest.
    #[default]
    Both,
}

/// Returned by [`Checks::from_flags`] when neither check is requested.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Must check either digest or stat")]
pub struct NoChecksRequested;

impl Checks {
    /// Build from the two CLI-level switches.
    ///
    /// # Errors
    ///
    /// Returns [`NoChecksRequested`] if both are false.
    pub fn from_flags(stat: bool, digest: bool) -> Result<Self, NoChecksRequested> {
        match (stat, digest) {
            (true, true) => Ok(Self::Both),
            (true, false) => Ok(Self::Stat),
            (false, true) => Ok(Self::Digest),
            (false, false) => Err(NoChecksRequested),
        }
    }

    /// Whether the stat check is included.
    #[must_use]
    pub fn stat(self) -> bool {
        matches!(self, Self::Stat | Self::Both)
    }

    /// Whether the digest check is included.
    #[must_use]
    pub fn digest(self) -> bool {
        matches!(self, Self::Digest | Self::Both)
    }
}

/// One file's recorded checksum state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    path: PathBuf,
    digest: String,
    algorithm: Algorithm,
    mtime: Mtime,
    size: u64,
}

impl Entry {
    /// Hash and stat a live file.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::FailedOpen`] if the file cannot be stat'd or read.
    pub fn from_file(path: impl Into<PathBuf>, algorithm: Algorithm) -> Result<Self, VerifyError> {
        let path = path.into();
        let (mtime, size) = stat(&path)?;
        let digest = Hasher::new(algorithm).digest_file(&path)?;
        Ok(Self {
            path,
            digest,
            algorithm,
            mtime,
            size,
        })
    }

    /// Parse a persisted `digest mtime size path` line.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if a field is missing or malformed, or if the
    /// digest length matches no supported algorithm.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        Self::parse_bytes(line.as_bytes())
    }

    /// Parse a persisted line read as raw bytes.
    ///
    /// The digest, mtime and size fields must be ASCII; the path is taken
    /// verbatim.
    ///
    /// # Errors
    ///
    /// Same as [`Entry::parse`].
    pub fn parse_bytes(line: &[u8]) -> Result<Self, ParseError> {
        let line = trim_line_end(line);
        let mut parts = line.splitn(4, |&b| b == b' ');
        let (Some(digest), Some(mtime), Some(size), Some(path)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseError::Malformed(lossy(line)));
        };
        if path.is_empty() {
            return Err(ParseError::Malformed(lossy(line)));
        }

        let (digest, algorithm) = parse_digest(ascii_field(digest, ParseError::InvalidDigest)?)?;
        let mtime: Mtime = ascii_field(mtime, ParseError::InvalidMtime)?.parse()?;
        let size = ascii_field(size, ParseError::InvalidSize)?;
        let size: u64 = size
            .parse()
            .map_err(|_| ParseError::InvalidSize(size.to_string()))?;

        Ok(Self {
            path: path_from_bytes(path),
            digest,
            algorithm,
            mtime,
            size,
        })
    }

    /// Serialize to the single-line persisted form (no trailing newline).
    ///
    /// Non-UTF-8 paths are rendered lossily here; [`Entry::write_line`] is
    /// what the cache uses on disk.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {}",
            self.digest,
            self.mtime,
            self.size,
            self.path.display()
        )
    }

    /// Write the persisted form plus a newline, keeping the path's bytes.
    ///
    /// # Errors
    ///
    /// Propagates write errors from `out`.
    pub fn write_line<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{} {} {} ", self.digest, self.mtime, self.size)?;
        out.write_all(&path_to_bytes(&self.path))?;
        out.write_all(b"\n")
    }

    /// Path of the file this entry describes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded lowercase hex digest.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Algorithm of the recorded digest.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Recorded modification time.
    #[must_use]
    pub fn mtime(&self) -> Mtime {
        self.mtime
    }

    /// Recorded size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Recompute stat and digest from the live file.
    ///
    /// On error the entry is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::FailedOpen`] if the file cannot be stat'd or read.
    pub fn refresh(&mut self) -> Result<(), VerifyError> {
        self.refresh_with(self.algorithm)
    }

    /// Like [`Entry::refresh`], but rehashes under `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::FailedOpen`] if the file cannot be stat'd or read.
    pub fn refresh_with(&mut self, algorithm: Algorithm) -> Result<(), VerifyError> {
        let fresh = Self::from_file(self.path.clone(), algorithm)?;
        *self = fresh;
        Ok(())
    }

    /// Compare the live mtime and size against the recorded ones.
    ///
    /// Mtime is checked first.
    ///
    /// # Errors
    ///
    /// [`VerifyError::FailedOpen`], [`VerifyError::MtimeMismatch`] or
    /// [`VerifyError::SizeMismatch`].
    pub fn verify_stat(&self) -> Result<(), VerifyError> {
        let (mtime, size) = stat(&self.path)?;
        if mtime != self.mtime {
            return Err(VerifyError::MtimeMismatch {
                path: self.path.clone(),
                recorded: self.mtime,
                actual: mtime,
            });
        }
        if size != self.size {
            return Err(VerifyError::SizeMismatch {
                path: self.path.clone(),
                recorded: self.size,
                actual: size,
            });
        }
        Ok(())
    }

    /// Rehash the live file and compare against the recorded digest.
    ///
    /// # Errors
    ///
    /// [`VerifyError::FailedOpen`] or [`VerifyError::DigestMismatch`].
    pub fn verify_digest(&self) -> Result<(), VerifyError> {
        verify_digest(&self.path, &self.digest, self.algorithm)
    }

    /// Run the requested checks, stat before digest, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// The first [`VerifyError`] encountered.
    pub fn verify(&self, checks: Checks) -> Result<(), VerifyError> {
        if checks.stat() {
            self.verify_stat()?;
        }
        if checks.digest() {
            self.verify_digest()?;
        }
        Ok(())
    }

    /// Whether the recorded stat no longer matches the file.
    ///
    /// A file that cannot be stat'd at all also needs a refresh; the
    /// refresh itself will then report the failure.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        match self.verify_stat() {
            Ok(()) => false,
            Err(e) => {
                log::debug!("{}", e);
                true
            }
        }
    }
}

impl FromStr for Entry {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Strip a trailing `\n`, `\r\n` or stray `\r`.
pub(crate) fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\r' | b'\n') {
        end -= 1;
    }
    &line[..end]
}

pub(crate) fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn ascii_field(field: &[u8], err: fn(String) -> ParseError) -> Result<&str, ParseError> {
    std::str::from_utf8(field).map_err(|_| err(lossy(field)))
}

#[cfg(unix)]
pub(crate) fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
pub(crate) fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(lossy(bytes))
}

#[cfg(unix)]
pub(crate) fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
pub(crate) fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

/// Validate a hex digest, lowercase it and infer its algorithm.
pub(crate) fn parse_digest(digest: &str) -> Result<(String, Algorithm), ParseError> {
    if !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseError::InvalidDigest(digest.to_string()));
    }
    let algorithm = Algorithm::from_hex_len(digest.len())
        .ok_or(ParseError::UnknownDigestLength { len: digest.len() })?;
    Ok((digest.to_ascii_lowercase(), algorithm))
}

/// Rehash `path` and compare against `recorded`.
pub(crate) fn verify_digest(
    path: &Path,
    recorded: &str,
    algorithm: Algorithm,
) -> Result<(), VerifyError> {
    let actual = Hasher::new(algorithm).digest_file(path)?;
    if actual == recorded {
        Ok(())
    } else {
        Err(VerifyError::DigestMismatch {
            path: path.to_path_buf(),
            recorded: recorded.to_string(),
            actual,
        })
    }
}

fn stat(path: &Path) -> Result<(Mtime, u64), VerifyError> {
    let meta = fs::metadata(path).map_err(|e| VerifyError::failed_open(path, e))?;
    let modified = meta
        .modified()
        .map_err(|e| VerifyError::failed_open(path, e))?;
    Ok((Mtime::from(modified), meta.len()))
}
