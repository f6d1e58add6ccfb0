//! Logging setup.
//!
//! Everything goes through the `log` facade to an `env_logger` backend on
//! stderr, keeping stdout free for status lines and listings.
//!
//! `RUST_LOG`, when set, is used as-is. Otherwise the CLI flags pick the
//! level for hashstat's own modules (`-q` error, default info, `-v` debug,
//! `-vv` trace) and dependencies stay at warn.
//!
//! ```rust,no_run
//! hashstat::logging::init_logging(1, false);
//! log::debug!("Acquired lock");
//! ```

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Install the global logger.
///
/// Safe to call more than once; only the first call takes effect.
///
/// # Arguments
///
/// * `verbose` - `-v` count (0 info, 1 debug, 2+ trace)
/// * `quiet` - errors only; wins over `verbose`
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();
    let level = level_for(verbose, quiet);

    match env::var("RUST_LOG") {
        Ok(spec) => {
            builder.parse_filters(&spec);
        }
        Err(_) => {
            builder
                .filter_level(LevelFilter::Warn)
                .filter_module(env!("CARGO_CRATE_NAME"), level);
        }
    }
    install_format(&mut builder, verbose > 0);

    if builder.try_init().is_ok() {
        log::trace!("Logger installed, own level {:?}", level);
    }
}

fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

/// Debug builds stamp each line with the time; `-v` adds the module path.
fn install_format(builder: &mut Builder, with_module: bool) {
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);

        if cfg!(debug_assertions) {
            let timestamp = buf.timestamp_seconds();
            write!(buf, "{timestamp} ")?;
        }
        write!(buf, "{style}{level:<5}{style:#} ")?;
        if with_module {
            write!(buf, "[{}] ", record.module_path().unwrap_or("?"))?;
        }
        writeln!(buf, "{}", record.args())
    });
}
