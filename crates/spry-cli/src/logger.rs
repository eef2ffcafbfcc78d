//! Logging setup for the spry CLI.
//!
//! Events from every spry crate go through `tracing`. The CLI installs a
//! compact `fmt` layer filtered by verbosity flags or `RUST_LOG`.
//!
//! # Example
//!
//! ```rust,no_run
//! use spry_cli::logger::init_logger;
//!
//! init_logger(false, false, false);
//! tracing::info!("server starting");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str =
    "spry=debug,spry_cli=debug,spry_core=debug,spry_config=debug,spry_plugin_styles=debug";
const QUIET_FILTER: &str = "error";
const DEFAULT_FILTER: &str =
    "spry=info,spry_cli=info,spry_core=info,spry_config=info,spry_plugin_styles=info";

/// Filter for the given flags.
///
/// Priority: `--verbose`, then `--quiet`, then `RUST_LOG`, then info for
/// spry crates.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(filter_for(verbose, quiet), no_color);
}

pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
