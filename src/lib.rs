//! hashstat - checksum cache with stat-based revalidation
//!
//! Records a digest, modification time and size per file so that repeated
//! runs only rehash files whose stat changed, and verifies files against
//! stored digests or md5sum-style listings.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod progress;
pub mod runner;
pub mod scanner;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::Cache;
use crate::cli::{CheckArgs, Cli, Commands, UpdateArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::progress::Progress;
use crate::runner::{CheckRunner, UpdateRunner};
use crate::scanner::Walker;

/// Run one CLI invocation.
///
/// Per-file problems are reflected in the returned [`ExitCode`]; structural
/// failures are returned as errors for the caller to report.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the cache cannot be
/// opened, locked or saved, or a checksum input file is unreadable or
/// malformed.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    config.merge_cli(&cli);

    match &cli.command {
        Commands::Update(args) => handle_update(config, args),
        Commands::Check(args) => handle_check(config, args),
    }
}

fn handle_update(mut config: Config, args: &UpdateArgs) -> Result<ExitCode> {
    config.merge_update_args(args);

    let cache = match &config.cache_file {
        Some(path) => Some(
            Cache::open(path, false)
                .with_context(|| format!("Failed to open cache {}", path.display()))?,
        ),
        None => None,
    };

    // Hashing the cache itself would change it on every save
    let own_files = cache
        .as_ref()
        .map(|c| vec![c.path().to_path_buf(), c.lock().path().to_path_buf()])
        .unwrap_or_default();
    let walker = Walker::new(args.files.clone())
        .recursive(args.recursive)
        .exclude(own_files);
    let mut files = Vec::new();
    let mut skipped = 0;
    for item in walker.walk() {
        match item {
            Ok(path) => files.push(path),
            Err(e) => {
                log::warn!("{}", e);
                skipped += 1;
            }
        }
    }

    if args.files.is_empty() {
        if let Some(cache) = &cache {
            files = cache.stale_paths();
            log::info!(
                "{} stale entr{} in {}",
                files.len(),
                if files.len() == 1 { "y" } else { "ies" },
                cache.path().display()
            );
        }
    }

    let stdout = io::stdout();
    let mut runner = UpdateRunner::new(cache, config.update_options(), stdout.lock());
    if config.progress {
        runner = runner.with_progress(Arc::new(Progress::new(false)));
    }
    let mut summary = runner.run(&files)?;
    summary.failed += skipped;

    Ok(summary.exit_code())
}

fn handle_check(mut config: Config, args: &CheckArgs) -> Result<ExitCode> {
    config.merge_check_args(args);
    let options = config.check_options()?;

    let stdout = io::stdout();
    let mut runner = CheckRunner::new(options, stdout.lock());

    if let Some(path) = &args.cache {
        let cache = Cache::open(path, true)
            .with_context(|| format!("Failed to open cache {}", path.display()))?;
        runner.check_cache(&cache)?;
    }
    for listing in &args.listings {
        runner.check_file(listing)?;
    }

    let summary = runner.finish();
    Ok(summary.exit_code(options.lenient_stat))
}
