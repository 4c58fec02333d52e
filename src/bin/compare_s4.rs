use anyhow::{bail, Result};
use s4_probe::compare::{
    compare, fetch_endpoint, parse_endpoints, Comparison, EndpointOutcome, COMPARE_TIMEOUT_SECS,
};
use s4_probe::report::{banner, excerpt, rule, thin_rule};
use s4_probe::util::env::{env_flag, env_parse, env_req, preflight_check};

// COMPARE_ENDPOINTS="Internal=http://host-a:44380/...$metadata?sap-client=200;External=https://host-b:44300/...$metadata?sap-client=200"
#[tokio::main]
async fn main() -> Result<()> {
    s4_probe::util::env::bootstrap_cli("compare_s4", "warn")?;
    preflight_check(
        "compare_s4",
        &["COMPARE_ENDPOINTS", "S4_USER", "S4_PASSWORD"],
        &["COMPARE_ENDPOINTS", "S4_USER", "S4_PASSWORD"],
    )?;

    let endpoints = parse_endpoints(
        &env_req("COMPARE_ENDPOINTS")?,
        env_flag("S4_ACCEPT_INVALID_CERTS", false),
    )?;
    if endpoints.len() < 2 {
        bail!("COMPARE_ENDPOINTS needs at least two NAME=URL entries");
    }
    let user = env_req("S4_USER")?;
    let password = env_req("S4_PASSWORD")?;
    let timeout = env_parse("COMPARE_TIMEOUT_SECS", COMPARE_TIMEOUT_SECS);

    banner("COMPARING S/4HANA $metadata ENDPOINTS");
    println!("User: {}", user);
    println!();

    let mut outcomes = Vec::with_capacity(endpoints.len());
    for endpoint in &endpoints {
        println!("{}", thin_rule());
        println!("Testing: {}", endpoint.name);
        println!("URL: {}", endpoint.url);
        println!("{}", thin_rule());

        let outcome = fetch_endpoint(endpoint, &user, &password, timeout).await;
        match &outcome {
            EndpointOutcome::Success(m) => {
                println!("Status:       {}", m.status);
                println!("Content-Type: {}", m.content_type.as_deref().unwrap_or("-"));
                println!("Length:       {} bytes", m.length);
                println!("SHA-256:      {}", m.digest);
                println!("Preview:      {}", excerpt(&m.body, 200));
            }
            EndpointOutcome::Failed { status, error, .. } => {
                match status {
                    Some(s) => println!("Status: {}", s),
                    None => println!("Connection failed"),
                }
                println!("Error:  {}", error);
            }
        }
        println!();
        outcomes.push(outcome);
    }

    println!("{}", rule());
    println!("COMPARISON");
    println!("{}", rule());
    match compare(&outcomes) {
        Comparison::Identical { digest, length } => {
            println!("IDENTICAL: every endpoint serves the same metadata");
            println!("  SHA-256: {}", digest);
            println!("  Length:  {} bytes", length);
        }
        Comparison::Different(rows) => {
            println!("DIFFERENT: endpoints serve different metadata");
            for (name, digest, length) in rows {
                println!("  {}: {} ({} bytes)", name, digest, length);
            }
        }
        Comparison::Incomplete(rows) => {
            println!("Cannot compare: fewer than two endpoints answered 200");
            for (name, state) in rows {
                println!("  {}: {}", name, state);
            }
        }
    }
    Ok(())
}
