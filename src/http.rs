use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

/// Per-request timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Build the shared reqwest client for a probe binary.
///
/// `accept_invalid_certs` exists for internal S/4HANA hosts that present
/// self-signed certificates; it should stay off everywhere else.
pub fn build_client(user_agent: &str, timeout_secs: u64, accept_invalid_certs: bool) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .context("failed to build HTTP client")
}

/// Short human hint for a transport-level failure (no HTTP status received).
pub fn describe_transport_error(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "request timed out; server might be unreachable or very slow"
    } else if err.is_connect() {
        "connection failed; check the host is reachable from this network (TLS errors land here too)"
    } else if err.is_builder() {
        "request could not be built; check the configured URL"
    } else {
        "unexpected transport error"
    }
}
