//! Streaming file hasher.
//!
//! # Overview
//! This module provides the [`Hasher`] struct for computing hex digests of
//! file contents without loading whole files into memory, and the
//! [`Algorithm`] enum naming the supported digests.
//!
//! Files are always read as raw bytes; there is no text mode.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use clap::ValueEnum;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use super::HashError;

/// Default read buffer size (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Supported digest algorithms.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// MD5 (32 hex characters)
    #[default]
    Md5,
    /// SHA-1 (40 hex characters)
    Sha1,
    /// SHA-256 (64 hex characters)
    Sha256,
    /// SHA-512 (128 hex characters)
    Sha512,
}

impl Algorithm {
    /// All algorithms, shortest digest first.
    pub const ALL: [Algorithm; 4] = [Self::Md5, Self::Sha1, Self::Sha256, Self::Sha512];

    /// Length of this algorithm's digest in hex characters.
    #[must_use]
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Infer the algorithm from a hex digest length.
    #[must_use]
    pub fn from_hex_len(len: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.hex_len() == len)
    }

    /// Lowercase algorithm name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Streaming hasher for a single algorithm.
#[derive(Debug, Clone, Copy)]
pub struct Hasher {
    algorithm: Algorithm,
    buffer_size: usize,
}

impl Hasher {
    /// Create a hasher with the default buffer size.
    #[must_use]
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Set the read buffer size (minimum 1 byte).
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// The algorithm this hasher computes.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Compute the lowercase hex digest of a file's contents.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn digest_file(&self, path: &Path) -> Result<String, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        self.digest_reader(file)
            .map_err(|e| HashError::from_io(path, e))
    }

    /// Compute the lowercase hex digest of everything `reader` yields.
    ///
    /// # Errors
    ///
    /// Propagates read errors from `reader`.
    pub fn digest_reader<R: Read>(&self, reader: R) -> io::Result<String> {
        match self.algorithm {
            Algorithm::Md5 => stream::<Md5, _>(reader, self.buffer_size),
            Algorithm::Sha1 => stream::<Sha1, _>(reader, self.buffer_size),
            Algorithm::Sha256 => stream::<Sha256, _>(reader, self.buffer_size),
            Algorithm::Sha512 => stream::<Sha512, _>(reader, self.buffer_size),
        }
    }
}

fn stream<D: Digest, R: Read>(mut reader: R, buffer_size: usize) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; buffer_size];
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}
