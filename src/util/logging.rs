//! Tracing setup shared by the probe binaries.
//!
//! Log lines go to stderr so the reports the binaries print on stdout can be
//! redirected to a file without interleaved log output. `RUST_LOG` overrides
//! the per-binary default, e.g. `RUST_LOG=s4_probe=debug` to see every request URL.

use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Install the global fmt subscriber. `default_filter` applies when `RUST_LOG`
/// is unset or unparsable. Fails if a subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing subscriber already installed: {}", e))
}
