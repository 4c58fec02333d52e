//! Direct access to the S/4HANA OData v2 service with Basic Auth.
//!
//! Mutating `$batch` calls need a CSRF token: fetch it with
//! `X-CSRF-Token: Fetch` on the service root, then replay both the token and
//! the session cookies from that response on the POST.

pub mod metadata;

use crate::batch::BatchConfig;
use crate::http::{build_client, DEFAULT_TIMEOUT_SECS};
use crate::report::excerpt;
use crate::util::env::{env_flag, env_opt, env_parse, env_req};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::{Client, StatusCode};
use std::fmt;
use tracing::{debug, info, warn};

pub const DEFAULT_SERVICE_PATH: &str = "/sap/opu/odata/sap/RFM_MANAGE_SALES_ORDERS_SRV/";
pub const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Clone)]
pub struct S4Connection {
    /// Scheme, host and port, e.g. `https://s4.example:44300`.
    pub base_url: String,
    pub service_path: String,
    pub sap_client: String,
    pub user: String,
    pub password: String,
    pub accept_invalid_certs: bool,
    pub timeout_secs: u64,
}

impl fmt::Debug for S4Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S4Connection")
            .field("base_url", &self.base_url)
            .field("service_path", &self.service_path)
            .field("sap_client", &self.sap_client)
            .field("user", &self.user)
            .field("password", &"***")
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl S4Connection {
    /// Reads `S4_BASE_URL`, `S4_USER`, `S4_PASSWORD` (required) and
    /// `S4_ODATA_PATH`, `S4_SAP_CLIENT`, `S4_ACCEPT_INVALID_CERTS`, `S4_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: env_req("S4_BASE_URL")?,
            service_path: env_opt("S4_ODATA_PATH")
                .unwrap_or_else(|| DEFAULT_SERVICE_PATH.to_string()),
            sap_client: env_opt("S4_SAP_CLIENT")
                .unwrap_or_else(|| crate::batch::DEFAULT_SAP_CLIENT.to_string()),
            user: env_req("S4_USER")?,
            password: env_req("S4_PASSWORD")?,
            accept_invalid_certs: env_flag("S4_ACCEPT_INVALID_CERTS", false),
            timeout_secs: env_parse("S4_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Service root, always ending in `/`.
    pub fn service_root(&self) -> String {
        let path = self.service_path.trim_matches('/');
        format!("{}/{}/", self.base_url.trim_end_matches('/'), path)
    }

    pub fn metadata_url(&self) -> String {
        format!("{}$metadata?sap-client={}", self.service_root(), self.sap_client)
    }

    pub fn batch_url(&self) -> String {
        format!("{}$batch", self.service_root())
    }

    pub fn entity_url(&self, entity_set: &str) -> String {
        format!("{}{}", self.service_root(), entity_set)
    }

    /// `host[:port]` as it should appear in an embedded `Host:` header.
    pub fn host_header(&self) -> Option<String> {
        let url = url::Url::parse(&self.base_url).ok()?;
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    pub fn http_client(&self, user_agent: &str) -> Result<Client> {
        build_client(user_agent, self.timeout_secs, self.accept_invalid_certs)
    }
}

/// CSRF token plus the session cookies it is bound to.
#[derive(Clone, Default)]
pub struct CsrfSession {
    pub token: String,
    pub cookies: Vec<(String, String)>,
}

impl fmt::Debug for CsrfSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.cookies.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("CsrfSession")
            .field("token_len", &self.token.len())
            .field("cookies", &names)
            .finish()
    }
}

impl CsrfSession {
    /// `Cookie` request header value, `None` when the server set no cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn apply(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.cookie_header() {
            Some(cookie) => req.header(COOKIE, cookie),
            None => req,
        }
    }
}

/// `name=value` pairs of every `Set-Cookie` header; attributes are dropped and
/// a later cookie with the same name replaces the earlier one.
pub fn session_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for raw in headers.get_all(SET_COOKIE) {
        let Ok(raw) = raw.to_str() else {
            warn!("odata: skipping non-ASCII Set-Cookie header");
            continue;
        };
        let pair = raw.split(';').next().unwrap_or_default();
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            continue;
        }
        let value = value.trim().to_string();
        match out.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => out.push((name, value)),
        }
    }
    out
}

/// Status, content type and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpExchange {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpExchange {
    async fn read(resp: reqwest::Response) -> Result<Self> {
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await.context("failed to read response body")?;
        Ok(Self {
            status,
            content_type,
            body,
        })
    }

    /// Gateway answers a processed batch with 200 or 202; errors of the inner
    /// requests are reported inside the multipart body.
    pub fn is_batch_accepted(&self) -> bool {
        matches!(self.status, StatusCode::OK | StatusCode::ACCEPTED)
    }
}

/// GET the service root with `X-CSRF-Token: Fetch`.
pub async fn fetch_csrf(http: &Client, conn: &S4Connection) -> Result<CsrfSession> {
    let url = conn.service_root();
    debug!(%url, "odata: fetching CSRF token");

    let resp = http
        .get(&url)
        .query(&[("sap-client", conn.sap_client.as_str())])
        .header(CSRF_HEADER, "Fetch")
        .header(ACCEPT, "application/json")
        .basic_auth(&conn.user, Some(&conn.password))
        .send()
        .await
        .context("CSRF fetch request failed")?;

    let status = resp.status();
    if status != StatusCode::OK {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("CSRF fetch failed: {} - {}", status, excerpt(&body, 500));
    }

    let token = resp
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("required"))
        .context("CSRF token not returned by S/4HANA")?;
    let cookies = session_cookies(resp.headers());

    info!(
        token_len = token.len(),
        cookies = cookies.len(),
        "odata: CSRF token obtained"
    );
    Ok(CsrfSession { token, cookies })
}

/// Plain (unbatched) GET on an entity set, replaying the session cookies.
/// Useful to tell authorization problems apart from batch payload problems.
pub async fn simple_get(
    http: &Client,
    conn: &S4Connection,
    session: &CsrfSession,
    entity_set: &str,
    top: u32,
) -> Result<HttpExchange> {
    let top = top.to_string();
    let req = http
        .get(conn.entity_url(entity_set))
        .query(&[("sap-client", conn.sap_client.as_str()), ("$top", top.as_str())])
        .header(ACCEPT, "application/json")
        .basic_auth(&conn.user, Some(&conn.password));

    let resp = session
        .apply(req)
        .send()
        .await
        .context("simple GET request failed")?;
    let exchange = HttpExchange::read(resp).await?;
    info!(status = %exchange.status, entity_set, "odata: simple GET done");
    Ok(exchange)
}

/// POST a prepared multipart payload to `$batch`.
///
/// Any HTTP status is returned as-is; only transport failures are errors.
pub async fn post_batch(
    http: &Client,
    conn: &S4Connection,
    session: &CsrfSession,
    cfg: &BatchConfig,
    payload: String,
) -> Result<HttpExchange> {
    let url = conn.batch_url();
    info!(%url, bytes = payload.len(), "odata: sending $batch");

    let req = http
        .post(&url)
        .query(&[("sap-client", conn.sap_client.as_str())])
        .header(CONTENT_TYPE, cfg.content_type())
        .header(ACCEPT, "multipart/mixed")
        .header(CSRF_HEADER, session.token.as_str())
        .basic_auth(&conn.user, Some(&conn.password))
        .body(payload.into_bytes());

    let resp = session
        .apply(req)
        .send()
        .await
        .context("$batch request failed")?;
    let exchange = HttpExchange::read(resp).await?;

    if exchange.is_batch_accepted() {
        info!(status = %exchange.status, "odata: $batch accepted");
    } else {
        warn!(
            status = %exchange.status,
            body_excerpt = %excerpt(&exchange.body, 500),
            "odata: $batch rejected"
        );
    }
    Ok(exchange)
}
