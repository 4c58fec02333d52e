use anyhow::Result;
use s4_probe::destinations::DestinationClient;
use s4_probe::http::{build_client, describe_transport_error, DEFAULT_TIMEOUT_SECS};
use s4_probe::odata::metadata::{probe_metadata, MetadataStatus};
use s4_probe::odata::S4Connection;
use s4_probe::report::{banner, excerpt, rule};
use s4_probe::util::env::{env_opt, preflight_check};
use s4_probe::xsuaa::{fetch_token, OAuthCredentials};
use tracing::warn;

const DEFAULT_DESTINATION: &str = "S4HANA_PCE_SSO";

#[tokio::main]
async fn main() -> Result<()> {
    s4_probe::util::env::bootstrap_cli("s4_connection", "warn")?;
    preflight_check(
        "s4_connection",
        &["S4_BASE_URL", "S4_USER", "S4_PASSWORD"],
        &[
            "S4_BASE_URL",
            "S4_USER",
            "S4_ODATA_PATH",
            "S4_SAP_CLIENT",
            "DESTINATION_URI",
            "S4_DESTINATION_NAME",
        ],
    )?;

    let conn = S4Connection::from_env()?;
    banner("S/4HANA CONNECTION DIAGNOSIS");

    println!("1. Direct $metadata call");
    println!("{}", rule());
    let http = conn.http_client("s4-probe/s4_connection")?;
    let url = conn.metadata_url();
    println!("URL:  {}", url);
    println!("User: {}", conn.user);
    let direct = match probe_metadata(&http, &url, &conn.user, &conn.password).await {
        Ok(probe) => {
            let status = probe.classification();
            println!("Status: {}", probe.status);
            println!("{}", status.headline());
            if let Some(hint) = status.hint() {
                println!("  {}", hint);
            }
            if status.shows_body() {
                println!("Body: {}", excerpt(&probe.body, 500));
            }
            Some(status)
        }
        Err(e) => {
            println!("Request failed: {:#}", e);
            if let Some(re) = e.downcast_ref::<reqwest::Error>() {
                println!("  {}", describe_transport_error(re));
            }
            None
        }
    };
    println!();

    println!("2. Destination configuration");
    println!("{}", rule());
    let dest_name =
        env_opt("S4_DESTINATION_NAME").unwrap_or_else(|| DEFAULT_DESTINATION.to_string());
    let destination = match env_opt("DESTINATION_URI") {
        None => {
            println!("DESTINATION_URI not set, skipping");
            None
        }
        Some(uri) => match destination_summary(&uri, &dest_name).await {
            Ok(summary) => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                Some(summary)
            }
            Err(e) => {
                warn!(error = %e, "s4_connection: destination lookup failed");
                println!("Could not read destination {}: {:#}", dest_name, e);
                None
            }
        },
    };
    println!();

    println!("3. Diagnosis");
    println!("{}", rule());
    match direct {
        Some(MetadataStatus::Available) => {
            println!("- direct access works; if the deployed app still fails, look at the destination/Cloud Connector path");
        }
        Some(MetadataStatus::Unauthorized) => {
            println!("- credentials rejected: verify S4_USER/S4_PASSWORD and that the user is not locked");
        }
        Some(MetadataStatus::Forbidden) => {
            println!("- user lacks authorization for the service (S_SERVICE) or the service is inactive");
        }
        Some(MetadataStatus::NotFound) => {
            println!("- service not found: check S4_ODATA_PATH and /IWFND/MAINT_SERVICE");
        }
        Some(MetadataStatus::Unexpected(code)) => {
            println!("- unexpected HTTP {} from S/4HANA", code);
        }
        None => {
            println!("- S/4HANA host not reachable from here; internal hosts are only reachable through the Cloud Connector");
        }
    }
    if let Some(summary) = &destination {
        if summary["ProxyType"] == "OnPremise" {
            println!("- destination is OnPremise: requests go through the Cloud Connector, check its mapping for the URL above");
        }
        if summary["sap-client"].is_null() {
            println!("- destination has no sap-client property; the default client of the system will be used");
        }
    }
    Ok(())
}

async fn destination_summary(uri: &str, name: &str) -> Result<serde_json::Value> {
    let creds = OAuthCredentials::from_env("DESTINATION")?;
    let http = build_client("s4-probe/s4_connection", DEFAULT_TIMEOUT_SECS, false)?;
    let token = fetch_token(&http, &creds).await?;
    let client = DestinationClient::new(uri, http, &token);
    Ok(client.get(name).await?.summary())
}
