use anyhow::Result;
use s4_probe::destinations::DestinationClient;
use s4_probe::http::{build_client, DEFAULT_TIMEOUT_SECS};
use s4_probe::report::{banner, rule, token_preview};
use s4_probe::util::env::{env_req, preflight_check};
use s4_probe::xsuaa::{fetch_token, OAuthCredentials};

#[tokio::main]
async fn main() -> Result<()> {
    s4_probe::util::env::bootstrap_cli("list_destinations", "info")?;
    preflight_check(
        "list_destinations",
        &["DESTINATION_URI", "DESTINATION_CLIENT_ID", "DESTINATION_CLIENT_SECRET"],
        &["DESTINATION_URI", "DESTINATION_CLIENT_ID", "XSUAA_URL"],
    )?;

    let creds = OAuthCredentials::from_env("DESTINATION")?;
    let http = build_client("s4-probe/list_destinations", DEFAULT_TIMEOUT_SECS, false)?;

    banner("BTP DESTINATIONS");
    println!("Step 1: getting OAuth token...");
    let token = fetch_token(&http, &creds).await?;
    println!("  token: {}", token_preview(&token.access_token));
    println!();

    println!("Step 2: listing destinations...");
    let client = DestinationClient::new(&env_req("DESTINATION_URI")?, http, &token);
    let destinations = client.list().await?;
    println!("  found {} destination(s)", destinations.len());
    for (i, d) in destinations.iter().enumerate() {
        println!(
            "  {}. {} [{}] {} ({})",
            i + 1,
            d.name,
            d.kind.as_deref().unwrap_or("-"),
            d.url.as_deref().unwrap_or("-"),
            d.proxy_type.as_deref().unwrap_or("-")
        );
    }
    println!();

    if let Some(first) = destinations.first() {
        println!("Step 3: details of {}...", first.name);
        let detail = client.get(&first.name).await?;
        println!("{}", rule());
        println!("{}", serde_json::to_string_pretty(&detail.redacted())?);
        println!("{}", rule());
    }
    Ok(())
}
