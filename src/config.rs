//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. A TOML file: the `--config` path, or `config.toml` in the platform
//!    config directory if it exists
//! 3. Environment variables prefixed with `HASHSTAT_` (e.g.
//!    `HASHSTAT_ALGORITHM=sha256`)
//! 4. Command-line flags
//!
//! ```toml
//! algorithm = "sha1"
//! check_stat = true
//! check_digest = true
//! lenient_stat = false
//! cache_file = "/var/lib/hashstat/sums.cache"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cache::{Checks, NoChecksRequested};
use crate::cli::{CheckArgs, Cli, UpdateArgs};
use crate::runner::{CheckOptions, UpdateOptions};
use crate::scanner::Algorithm;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "HASHSTAT_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Algorithm for new and refreshed entries.
    pub algorithm: Algorithm,
    /// Compare recorded mtime and size during checks.
    pub check_stat: bool,
    /// Recompute digests during checks.
    pub check_digest: bool,
    /// Stat mismatches do not affect the exit status.
    pub lenient_stat: bool,
    /// Omit per-file OK lines.
    pub quiet: bool,
    /// Show a progress bar during updates.
    pub progress: bool,
    /// Cache used by `update` when `--file` is not given.
    pub cache_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Md5,
            check_stat: true,
            check_digest: true,
            lenient_stat: false,
            quiet: false,
            progress: false,
            cache_file: None,
        }
    }
}

impl Config {
    /// Load defaults, the config file and the environment.
    ///
    /// An explicit `path` must exist; the default location is optional.
    ///
    /// # Errors
    ///
    /// Returns an error if the explicit file is missing, or if any layer
    /// fails to parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                anyhow::ensure!(path.is_file(), "Config file {} not found", path.display());
                Some(path.to_path_buf())
            }
            None => Self::default_path().filter(|p| p.is_file()),
        };

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = &file {
            log::debug!("Loading config from {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        figment.extract().context("Invalid configuration")
    }

    /// Load only defaults plus one TOML file, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file fails to parse.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .extract()
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Platform config file location, e.g. `~/.config/hashstat/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "hashstat").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply global flags.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if cli.quiet {
            self.quiet = true;
        }
    }

    /// Apply `check` flags.
    pub fn merge_check_args(&mut self, args: &CheckArgs) {
        if args.stat_only {
            self.check_stat = true;
            self.check_digest = false;
        }
        if args.digest_only {
            self.check_stat = false;
            self.check_digest = true;
        }
        if args.lenient_stat {
            self.lenient_stat = true;
        }
    }

    /// Apply `update` flags.
    pub fn merge_update_args(&mut self, args: &UpdateArgs) {
        if let Some(algorithm) = args.algorithm {
            self.algorithm = algorithm;
        }
        if let Some(cache) = &args.cache {
            self.cache_file = Some(cache.clone());
        }
        if args.progress {
            self.progress = true;
        }
    }

    /// Options for a check run.
    ///
    /// # Errors
    ///
    /// Returns [`NoChecksRequested`] if both checks are switched off.
    pub fn check_options(&self) -> Result<CheckOptions, NoChecksRequested> {
        Ok(CheckOptions {
            checks: Checks::from_flags(self.check_stat, self.check_digest)?,
            quiet: self.quiet,
            lenient_stat: self.lenient_stat,
        })
    }

    /// Options for an update run.
    #[must_use]
    pub fn update_options(&self) -> UpdateOptions {
        UpdateOptions {
            algorithm: self.algorithm,
        }
    }
}
