//! Tracing setup for the launcher binary.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber. `SNAPGC_LOG` overrides the verbosity
/// flags (same syntax as `RUST_LOG`).
pub fn init(verbose: u8) {
    let default_directive = match verbose {
        0 => "snapgc=info",
        1 => "snapgc=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("SNAPGC_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
