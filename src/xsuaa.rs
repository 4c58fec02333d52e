//! XSUAA OAuth 2.0 client-credentials flow
//!
//! Every BTP-side probe (destination service, deployed mass-change app) starts
//! with one of these tokens.
//!
//! Environment variables, for a given `<PREFIX>`:
//! - <PREFIX>_TOKEN_URL: full token endpoint (wins over the XSUAA base URL)
//! - <PREFIX>_XSUAA_URL or XSUAA_URL: authorization server base URL
//! - <PREFIX>_CLIENT_ID / <PREFIX>_CLIENT_SECRET: service key credentials

use crate::util::env::{env_first, env_opt, env_req};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};

#[derive(Clone)]
pub struct OAuthCredentials {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

impl OAuthCredentials {
    pub fn new(xsuaa_url: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            token_url: token_endpoint(xsuaa_url),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }

    /// Load the credential set stored under `prefix` (e.g. `DESTINATION`, `MASS_CHANGE`).
    pub fn from_env(prefix: &str) -> Result<Self> {
        let token_url = match env_opt(&format!("{prefix}_TOKEN_URL")) {
            Some(url) => url,
            None => {
                let xsuaa_key = format!("{prefix}_XSUAA_URL");
                let base = env_first(&[xsuaa_key.as_str(), "XSUAA_URL"])
                    .with_context(|| format!("{prefix}_TOKEN_URL or XSUAA_URL not set"))?;
                token_endpoint(&base)
            }
        };
        Ok(Self {
            token_url,
            client_id: env_req(&format!("{prefix}_CLIENT_ID"))?,
            client_secret: env_req(&format!("{prefix}_CLIENT_SECRET"))?,
        })
    }
}

/// `<xsuaa>/oauth/token`
pub fn token_endpoint(xsuaa_url: &str) -> String {
    format!("{}/oauth/token", xsuaa_url.trim_end_matches('/'))
}

#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &crate::report::token_preview(&self.access_token))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

impl AccessToken {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// POST the client-credentials grant and parse the token response.
pub async fn fetch_token(http: &Client, creds: &OAuthCredentials) -> Result<AccessToken> {
    debug!(
        token_url = %creds.token_url,
        client_id = %creds.client_id,
        "xsuaa: requesting client-credentials token"
    );

    let params = [
        ("grant_type", "client_credentials"),
        ("client_id", creds.client_id.as_str()),
        ("client_secret", creds.client_secret.as_str()),
    ];

    let response = http
        .post(&creds.token_url)
        .form(&params)
        .send()
        .await
        .context("Failed to send XSUAA token request")?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("XSUAA token request failed: {} - {}", status, error_text);
    }

    let token = response
        .json::<AccessToken>()
        .await
        .context("Failed to parse XSUAA token response")?;

    info!(
        token_type = token.token_type.as_deref().unwrap_or("-"),
        expires_in = token.expires_in.unwrap_or_default(),
        token_len = token.access_token.len(),
        "xsuaa: token acquired"
    );

    Ok(token)
}
