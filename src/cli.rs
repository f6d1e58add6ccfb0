//! Command-line interface definitions for hashstat.
//!
//! This module defines all CLI arguments and subcommands using the clap
//! derive API. Global options (verbosity, config file, error format) apply
//! to both subcommands; everything else belongs to exactly one of them.
//!
//! # Example
//!
//! ```bash
//! # Build or refresh a cache for a tree
//! hashstat update -f sums.cache -r ~/photos
//!
//! # Verify the cache, digests only
//! hashstat check --cache sums.cache --digest-only
//!
//! # Verify an md5sum-style listing
//! hashstat check sums.md5
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::scanner::Algorithm;

/// Checksum cache with fast stat-based revalidation.
///
/// hashstat records a digest, modification time and size for each file, so
/// later runs can skip unchanged files and verify stored digests.
#[derive(Debug, Parser)]
#[command(name = "hashstat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors and omit per-file OK lines
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Read settings from this TOML file instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Report fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Hash files into a cache, refreshing only stale entries
    ///
    /// Without a cache file, an md5sum-style listing is written to stdout.
    Update(UpdateArgs),
    /// Verify files against a cache and/or checksum listings
    Check(CheckArgs),
}

/// Arguments for the update subcommand.
#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Files to hash (directories need --recursive)
    ///
    /// With a cache and no files, every stale entry in the cache is rehashed.
    #[arg(value_name = "FILE", required_unless_present = "cache")]
    pub files: Vec<PathBuf>,

    /// Cache file to create or update
    #[arg(short = 'f', long = "file", value_name = "CACHE")]
    pub cache: Option<PathBuf>,

    /// Digest algorithm for new and refreshed entries
    #[arg(short, long, value_enum)]
    pub algorithm: Option<Algorithm>,

    /// Descend into directories
    #[arg(short, long)]
    pub recursive: bool,

    /// Show a progress bar on stderr
    #[arg(long)]
    pub progress: bool,
}

/// Arguments for the check subcommand.
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Checksum files to verify (cache-format or md5sum-style lines)
    #[arg(value_name = "LISTING")]
    pub listings: Vec<PathBuf>,

    /// Cache file to verify
    #[arg(long, value_name = "CACHE", required_unless_present = "listings")]
    pub cache: Option<PathBuf>,

    /// Only compare recorded mtime and size
    #[arg(short, long, conflicts_with = "digest_only")]
    pub stat_only: bool,

    /// Only recompute and compare digests
    #[arg(short, long)]
    pub digest_only: bool,

    /// Report stat mismatches without failing the run
    #[arg(long)]
    pub lenient_stat: bool,
}
