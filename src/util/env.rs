//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `bootstrap_cli()` once early in each binary (or rely on lazy Once).
//!
//! Credentials are never compiled in; every secret the probes need is read here.
use std::str::FromStr;
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
///
/// Looks in the current working directory first, then falls back to the
/// Cargo project root so `cargo run --bin ...` works from any subdirectory.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_ok() {
            return;
        }
        let root = env!("CARGO_MANIFEST_DIR");
        let candidate = format!("{}/.env", root);
        let _ = dotenv::from_filename(candidate);
    });
}

/// Common bootstrap for probe binaries:
///   * initialize dotenv/env once
///   * install the shared tracing subscriber
///   * log whether TLS verification has been relaxed for this run
pub fn bootstrap_cli(bin_name: &str, default_filter: &str) -> anyhow::Result<()> {
    init_env();
    crate::util::logging::init_tracing(default_filter)?;

    if env_flag("S4_ACCEPT_INVALID_CERTS", false) {
        info!(
            target = "bootstrap",
            bin = bin_name,
            "TLS certificate verification disabled via S4_ACCEPT_INVALID_CERTS"
        );
    } else {
        info!(target = "bootstrap", bin = bin_name, "starting");
    }
    Ok(())
}

/// Get required env var; error if missing.
pub fn env_req(key: &str) -> anyhow::Result<String> {
    init_env();
    std::env::var(key).map_err(|_| anyhow::anyhow!("missing env var {key}"))
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// First non-empty value among `keys`, in order.
pub fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| env_opt(k))
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Clone,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => {
            let v = raw.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "on" | "yes")
        }
        Err(_) => default,
    }
}

pub(crate) fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("PASSWORD")
        || k.contains("SECRET")
        || k.contains("TOKEN")
        || k.contains("COOKIE")
    {
        return "***".to_string();
    }

    let val_trim = val.trim();

    // URLs may carry user:password@ even when the key looks harmless.
    if let Ok(mut u) = url::Url::parse(val_trim) {
        if !u.username().is_empty() || u.password().is_some() {
            let _ = u.set_username("***");
            let _ = u.set_password(Some("***"));
            return u.to_string();
        }
    }

    val_trim.to_string()
}

/// Validate required keys and log a consolidated, redacted snapshot of configuration.
/// Returns error if any required key is missing.
pub fn preflight_check(title: &str, required: &[&str], also_log: &[&str]) -> anyhow::Result<()> {
    init_env();
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|k| env_opt(k).is_none())
        .collect();
    let snapshot: Vec<(String, String)> = also_log
        .iter()
        .map(|&k| {
            let v = env_opt(k).unwrap_or_default();
            (k.to_string(), redact_value(k, &v))
        })
        .collect();
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");
    if !missing.is_empty() {
        return Err(anyhow::anyhow!(format!(
            "missing required env: {:?}",
            missing
        )));
    }
    Ok(())
}
