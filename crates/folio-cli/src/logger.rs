//! Logging infrastructure for folio-build.
//!
//! Internal diagnostics go through `tracing` and land on stderr. Build
//! output meant for the user (status lines, warnings) does not use this;
//! it flows through the [`StreamSet`](crate::streams::StreamSet).
//!
//! # Example
//!
//! ```rust,no_run
//! use folio_cli::logger::init_logger;
//! use tracing::debug;
//!
//! init_logger(2, false, true);
//! debug!("resolved build request");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directives for a verbosity level.
///
/// The level is determined in this order:
/// 1. `-vvv` or more: trace for folio crates
/// 2. `-vv`: debug for folio crates
/// 3. `-q` / `-Q`: errors only
/// 4. `RUST_LOG`, if set
/// 5. warnings for folio crates
pub fn filter_for(verbosity: u8, quiet: bool) -> EnvFilter {
    if verbosity >= 3 {
        EnvFilter::new("folio=trace")
    } else if verbosity == 2 {
        EnvFilter::new("folio=debug")
    } else if quiet {
        EnvFilter::new("folio=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio=warn"))
    }
}

/// Initialize the tracing subscriber.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logger(verbosity: u8, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    // A second build in the same process (make-mode, tests) keeps the
    // first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbosity, quiet))
        .with(fmt_layer)
        .try_init();
}
