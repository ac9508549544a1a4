//! Tracing subscriber setup for the CLI
//!
//! Logs go to stderr so data URIs printed on stdout stay pipeable.
//! `RUST_LOG` takes precedence over the verbosity flags.

use tracing_subscriber::{fmt, EnvFilter};

/// Filter directive for a verbosity level
pub fn level_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("logo_matte={}", level_for(verbose, quiet))));

    let format = fmt::format().with_target(verbose > 1).compact();

    let _ = fmt()
        .event_format(format)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
