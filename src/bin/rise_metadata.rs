use anyhow::Result;
use s4_probe::odata::metadata::{probe_metadata, MetadataStatus};
use s4_probe::odata::S4Connection;
use s4_probe::report::{banner, excerpt, thin_rule};
use s4_probe::util::env::preflight_check;

#[tokio::main]
async fn main() -> Result<()> {
    s4_probe::util::env::bootstrap_cli("rise_metadata", "warn")?;
    preflight_check(
        "rise_metadata",
        &["S4_BASE_URL", "S4_USER", "S4_PASSWORD"],
        &["S4_BASE_URL", "S4_USER", "S4_ODATA_PATH", "S4_SAP_CLIENT"],
    )?;

    let conn = S4Connection::from_env()?;
    let http = conn.http_client("s4-probe/rise_metadata")?;
    let url = conn.metadata_url();

    banner("S/4HANA $metadata PROBE");
    println!("URL:  {}", url);
    println!("User: {}", conn.user);
    println!(
        "TLS verification: {}",
        if conn.accept_invalid_certs { "off" } else { "on" }
    );
    println!();

    let probe = match probe_metadata(&http, &url, &conn.user, &conn.password).await {
        Ok(p) => p,
        Err(e) => {
            println!("Request failed: {:#}", e);
            if let Some(re) = e.downcast_ref::<reqwest::Error>() {
                println!("  {}", s4_probe::http::describe_transport_error(re));
            }
            return Err(e);
        }
    };

    let status = probe.classification();
    println!("Status:       {}", probe.status);
    println!(
        "Content-Type: {}",
        probe.content_type.as_deref().unwrap_or("-")
    );
    println!("Length:       {} bytes", probe.body.len());
    println!();
    println!("{}", status.headline());
    if let Some(hint) = status.hint() {
        println!("  {}", hint);
    }

    if status == MetadataStatus::Available {
        let findings = probe.findings();
        println!();
        println!("Metadata checks:");
        println!("  valid EDMX document:        {}", yes_no(findings.is_edmx));
        println!(
            "  RFM_MASS_CHANGE referenced: {}",
            yes_no(findings.has_mass_change_entity)
        );
        println!(
            "  function imports present:   {}",
            yes_no(findings.has_function_imports)
        );
        println!();
        println!("First 500 characters:");
        println!("{}", thin_rule());
        println!("{}", excerpt(&probe.body, 500));
    } else if status.shows_body() {
        println!();
        println!("Response body:");
        println!("{}", excerpt(&probe.body, 1000));
    }
    Ok(())
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}
