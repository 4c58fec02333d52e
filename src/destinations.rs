use crate::xsuaa::AccessToken;
use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

/// BTP Destination service, subaccount level.
/// API (base): `<uri>/destination-configuration/v1/`
///
/// Key endpoints:
/// - GET subaccountDestinations - every destination in the subaccount
/// - GET subaccountDestinations/{name} - one destination
#[derive(Debug, Clone)]
pub struct DestinationClient {
    base_url: String,
    http: Client,
    bearer: String,
}

/// One destination. Well-known properties are typed; everything else
/// (including `Password`) stays in `properties`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
    #[serde(rename = "Authentication", default)]
    pub authentication: Option<String>,
    #[serde(rename = "ProxyType", default)]
    pub proxy_type: Option<String>,
    #[serde(rename = "User", default)]
    pub user: Option<String>,
    #[serde(rename = "sap-client", default)]
    pub sap_client: Option<String>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

const SECRET_PROPERTIES: [&str; 3] = ["Password", "clientSecret", "tokenServicePassword"];

impl Destination {
    /// The fields that matter when debugging connectivity.
    pub fn summary(&self) -> Value {
        json!({
            "Name": self.name,
            "Type": self.kind,
            "URL": self.url,
            "Authentication": self.authentication,
            "ProxyType": self.proxy_type,
            "User": self.user,
            "sap-client": self.sap_client,
        })
    }

    /// Full destination as JSON with secret properties masked.
    pub fn redacted(&self) -> Value {
        let mut v = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(obj) = v.as_object_mut() {
            for key in SECRET_PROPERTIES {
                if let Some(slot) = obj.get_mut(key) {
                    *slot = Value::String("***".to_string());
                }
            }
        }
        v
    }
}

impl DestinationClient {
    pub fn new(base_url: &str, http: Client, token: &AccessToken) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            bearer: token.bearer(),
        }
    }

    fn url(&self, tail: &str) -> String {
        format!(
            "{}/destination-configuration/v1/subaccountDestinations{}",
            self.base_url, tail
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(%url, "destinations: GET");
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, &self.bearer)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .context("Failed to send destination service request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Destination service request failed: {} - {}", status, error_text);
        }

        response
            .json::<T>()
            .await
            .context("Failed to parse destination service response")
    }

    pub async fn list(&self) -> Result<Vec<Destination>> {
        let destinations: Vec<Destination> = self.get_json(&self.url("")).await?;
        info!(count = destinations.len(), "destinations: listed");
        Ok(destinations)
    }

    pub async fn get(&self, name: &str) -> Result<Destination> {
        let tail = format!("/{}", urlencoding::encode(name));
        self.get_json(&self.url(&tail))
            .await
            .with_context(|| format!("fetching destination {name}"))
    }
}
