use anyhow::Result;
use clap::Parser;
use s4_probe::http::{build_client, DEFAULT_TIMEOUT_SECS};
use s4_probe::report::{banner, token_preview};
use s4_probe::xsuaa::{fetch_token, OAuthCredentials};

/// Fetch a client-credentials token from XSUAA and describe it.
#[derive(Parser, Debug)]
#[command(name = "xsuaa_token", version)]
struct Cli {
    /// Env prefix of the credential set (<PREFIX>_CLIENT_ID, <PREFIX>_CLIENT_SECRET, ...)
    #[arg(long, default_value = "DESTINATION")]
    prefix: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    s4_probe::util::env::bootstrap_cli("xsuaa_token", "info")?;
    let cli = Cli::parse();

    let creds = OAuthCredentials::from_env(&cli.prefix)?;
    banner("XSUAA CLIENT-CREDENTIALS TOKEN");
    println!("Token URL: {}", creds.token_url);
    println!("Client ID: {}", creds.client_id);
    println!();

    let http = build_client("s4-probe/xsuaa_token", DEFAULT_TIMEOUT_SECS, false)?;
    let token = fetch_token(&http, &creds).await?;

    println!("Access token: {}", token_preview(&token.access_token));
    println!("Token type:   {}", token.token_type.as_deref().unwrap_or("-"));
    match token.expires_in {
        Some(secs) => println!("Expires in:   {}s", secs),
        None => println!("Expires in:   -"),
    }
    if let Some(jti) = &token.jti {
        println!("JTI:          {}", jti);
    }
    let scopes = token.scopes();
    println!("Scopes ({}):", scopes.len());
    for scope in scopes {
        println!("  - {}", scope);
    }
    Ok(())
}
