use anyhow::{Context, Result};
use clap::Parser;
use s4_probe::batch::inspect::{render_hex_report, PayloadStats};
use s4_probe::batch::{build_batch_payload, BatchConfig, HeaderProfile};
use s4_probe::cli::{BoundaryArgs, PayloadArgs};
use s4_probe::odata::{fetch_csrf, post_batch, simple_get, S4Connection};
use s4_probe::report::{banner, excerpt, rule, thin_rule};
use s4_probe::util::env::preflight_check;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// CSRF fetch, plain GET and `$batch` POST against S/4HANA with Basic Auth.
#[derive(Parser, Debug)]
#[command(name = "batch_test", version)]
struct Cli {
    #[command(flatten)]
    payload: PayloadArgs,
    #[command(flatten)]
    boundaries: BoundaryArgs,
    /// Use Gateway (Fiori/Postman) headers instead of the direct-backend profile
    #[arg(long, default_value_t = false)]
    gateway_headers: bool,
    /// Skip the unbatched GET sanity check
    #[arg(long, default_value_t = false)]
    skip_simple_get: bool,
    /// Where the sent payload and its hex dump are saved
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    s4_probe::util::env::bootstrap_cli("batch_test", "info")?;
    let cli = Cli::parse();

    preflight_check(
        "batch_test",
        &["S4_BASE_URL", "S4_USER", "S4_PASSWORD"],
        &["S4_BASE_URL", "S4_USER", "S4_PASSWORD", "S4_ODATA_PATH", "S4_SAP_CLIENT"],
    )?;
    let conn = S4Connection::from_env()?;
    let http = conn.http_client("s4-probe/batch_test")?;

    let mut cfg = cli.boundaries.apply(BatchConfig::from_env());
    cfg.sap_client = conn.sap_client.clone();
    if !cli.gateway_headers {
        let host = conn
            .host_header()
            .with_context(|| format!("cannot derive Host header from {}", conn.base_url))?;
        cfg = cfg.with_profile(HeaderProfile::Direct { host });
    }

    banner("S/4HANA $batch TEST");
    println!("Service root: {}", conn.service_root());
    println!("User:         {}", conn.user);
    println!("Header style: {:?}", cfg.profile);
    println!();

    println!("Step 1: fetching CSRF token...");
    let session = fetch_csrf(&http, &conn).await?;
    println!(
        "  token: {} chars, cookies: {}",
        session.token.len(),
        session.cookies.len()
    );
    for (name, _) in &session.cookies {
        println!("    - {}", name);
    }
    println!();

    let filters = cli.payload.filters();
    let fields = cli.payload.fields();
    println!("Step 2: building payload...");
    let payload = build_batch_payload(&filters, &fields, &cfg);
    let stats = PayloadStats::of(&payload, &cfg);
    println!(
        "  {} bytes, {} CRLF, {} bare LF",
        stats.total_bytes, stats.crlf, stats.bare_lf
    );
    if !stats.looks_well_formed() {
        warn!("batch_test: payload structure looks wrong, sending anyway");
    }
    println!();

    if !cli.skip_simple_get {
        println!("Step 3: plain GET on {} (no batch)...", cfg.entity_set);
        let probe = simple_get(&http, &conn, &session, &cfg.entity_set, 1).await?;
        println!("  status: {}", probe.status);
        if !probe.status.is_success() {
            println!("  body: {}", excerpt(&probe.body, 500));
            println!("  the entity set itself is not readable; a $batch failure would not be a payload problem");
        }
        println!();
    }

    println!("Step 4: POST $batch...");
    println!("{}", thin_rule());
    println!("{}", payload);
    println!("{}", thin_rule());
    let response = post_batch(&http, &conn, &session, &cfg, payload.clone()).await?;

    println!();
    println!("{}", rule());
    println!("RESPONSE");
    println!("{}", rule());
    println!("Status:       {}", response.status);
    println!(
        "Content-Type: {}",
        response.content_type.as_deref().unwrap_or("-")
    );
    println!();
    println!("{}", excerpt(&response.body, 4000));
    println!();

    if response.is_batch_accepted() {
        println!("SUCCESS: batch accepted by S/4HANA (check inner part statuses above)");
    } else {
        println!("FAILED: batch rejected with {}", response.status);
    }

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;
    let payload_path = cli.out_dir.join("batch_test_payload.txt");
    let hex_path = cli.out_dir.join("batch_test_payload_hex.txt");
    fs::write(&payload_path, payload.as_bytes())
        .with_context(|| format!("writing {}", payload_path.display()))?;
    fs::write(&hex_path, render_hex_report(&payload))
        .with_context(|| format!("writing {}", hex_path.display()))?;
    info!(
        payload = %payload_path.display(),
        hex = %hex_path.display(),
        "batch_test: payload saved"
    );
    Ok(())
}
