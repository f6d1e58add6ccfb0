//! Standalone checksum listings.
//!
//! A listing line records only a digest and a path, in the shape produced
//! by md5sum-style tools:
//!
//! ```text
//! 9dd4e461268c8034f5c8564e155c67a6  notes.txt
//! 9dd4e461268c8034f5c8564e155c67a6 *notes.txt
//! 9dd4e461268c8034f5c8564e155c67a6 notes.txt
//! ```
//!
//! The character after the separating space is treated as a mode marker
//! when it is a space or `*`. Digests are case-insensitive.
//!
//! [`Record`] unifies listing lines and cache lines so that check input
//! files may contain either.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::entry::{self, Checks, Entry, ParseError, VerifyError};
use crate::scanner::Algorithm;

/// One `<digest> <path>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedDigest {
    path: PathBuf,
    digest: String,
    algorithm: Algorithm,
}

impl ListedDigest {
    /// Build from a freshly computed digest.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, digest: impl Into<String>, algorithm: Algorithm) -> Self {
        Self {
            path: path.into(),
            digest: digest.into(),
            algorithm,
        }
    }

    /// Parse a listing line.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the line has no path or a bad digest.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        Self::parse_bytes(line.as_bytes())
    }

    /// Parse a listing line read as raw bytes.
    ///
    /// # Errors
    ///
    /// Same as [`ListedDigest::parse`].
    pub fn parse_bytes(line: &[u8]) -> Result<Self, ParseError> {
        let line = entry::trim_line_end(line);
        let Some(split) = line.iter().position(|&b| b == b' ') else {
            return Err(ParseError::Malformed(entry::lossy(line)));
        };
        let (digest, rest) = (&line[..split], &line[split + 1..]);
        let path = match rest.first() {
            Some(b' ' | b'*') => &rest[1..],
            _ => rest,
        };
        if path.is_empty() {
            return Err(ParseError::Malformed(entry::lossy(line)));
        }

        let digest = std::str::from_utf8(digest)
            .map_err(|_| ParseError::InvalidDigest(entry::lossy(digest)))?;
        let (digest, algorithm) = entry::parse_digest(digest)?;
        Ok(Self {
            path: entry::path_from_bytes(path),
            digest,
            algorithm,
        })
    }

    /// Format as `<digest>  <path>` (two spaces, text-mode marker).
    ///
    /// Non-UTF-8 paths are rendered lossily; see [`ListedDigest::write_line`].
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{}  {}", self.digest, self.path.display())
    }

    /// Write `<digest>  <path>` plus a newline, keeping the path's bytes.
    ///
    /// # Errors
    ///
    /// Propagates write errors from `out`.
    pub fn write_line<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{}  ", self.digest)?;
        out.write_all(&entry::path_to_bytes(&self.path))?;
        out.write_all(b"\n")
    }

    /// Path of the listed file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Listed lowercase hex digest.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Algorithm inferred from the digest length.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Rehash the file and compare against the listed digest.
    ///
    /// # Errors
    ///
    /// [`VerifyError::FailedOpen`] or [`VerifyError::DigestMismatch`].
    pub fn verify_digest(&self) -> Result<(), VerifyError> {
        entry::verify_digest(&self.path, &self.digest, self.algorithm)
    }
}

impl From<&Entry> for ListedDigest {
    fn from(entry: &Entry) -> Self {
        Self::new(entry.path(), entry.digest(), entry.algorithm())
    }
}

impl fmt::Display for ListedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// A line of check input: either a full cache entry or a listing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// `digest mtime size path`
    Cached(Entry),
    /// `digest path`
    Listed(ListedDigest),
}

impl Record {
    /// Parse a line, preferring the cache grammar.
    ///
    /// # Errors
    ///
    /// Returns the listing parser's [`ParseError`] when neither grammar fits.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        Self::parse_bytes(line.as_bytes())
    }

    /// Parse a line read as raw bytes, preferring the cache grammar.
    ///
    /// A line shaped like a cache entry (four fields with a numeric mtime
    /// or size) is never reinterpreted as a listing; its cache parse error
    /// is returned instead.
    ///
    /// # Errors
    ///
    /// The cache parser's [`ParseError`] for cache-shaped lines, otherwise
    /// the listing parser's.
    pub fn parse_bytes(line: &[u8]) -> Result<Self, ParseError> {
        match Entry::parse_bytes(line) {
            Ok(entry) => Ok(Self::Cached(entry)),
            Err(err) if looks_cached(line) => Err(err),
            Err(_) => ListedDigest::parse_bytes(line).map(Self::Listed),
        }
    }

    /// Path of the recorded file.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Cached(entry) => entry.path(),
            Self::Listed(listed) => listed.path(),
        }
    }

    /// Whether the record carries mtime and size.
    #[must_use]
    pub fn has_stat(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    /// Run the requested checks.
    ///
    /// Listing records have no stat to compare, so only their digest is
    /// checked; callers reject stat-only runs over them up front.
    ///
    /// # Errors
    ///
    /// The first [`VerifyError`] encountered.
    pub fn verify(&self, checks: Checks) -> Result<(), VerifyError> {
        match self {
            Self::Cached(entry) => entry.verify(checks),
            Self::Listed(listed) if checks.digest() => listed.verify_digest(),
            Self::Listed(_) => Ok(()),
        }
    }
}

/// Whether a line has the `digest mtime size path` shape.
///
/// Listing lines put a space or `*` right after the digest, so an empty
/// or starred second field means a listing.
fn looks_cached(line: &[u8]) -> bool {
    let line = entry::trim_line_end(line);
    let mut fields = line.splitn(4, |&b| b == b' ').skip(1);
    let (Some(mtime), Some(size), Some(_path)) = (fields.next(), fields.next(), fields.next())
    else {
        return false;
    };
    if mtime.is_empty() || mtime[0] == b'*' {
        return false;
    }
    let numeric = |field: &[u8]| {
        std::str::from_utf8(field).is_ok_and(|s| s.parse::<f64>().is_ok())
    };
    numeric(mtime) || numeric(size)
}
