use crate::report::excerpt;
use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tracing::info;

/// What a `$metadata` status code says about the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataStatus {
    Available,
    Unauthorized,
    Forbidden,
    NotFound,
    Unexpected(u16),
}

impl From<StatusCode> for MetadataStatus {
    fn from(status: StatusCode) -> Self {
        match status {
            StatusCode::OK => Self::Available,
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            other => Self::Unexpected(other.as_u16()),
        }
    }
}

impl MetadataStatus {
    pub fn headline(&self) -> String {
        match self {
            Self::Available => "SUCCESS: service is available and accessible".to_string(),
            Self::Unauthorized => "AUTHENTICATION FAILED (401 Unauthorized)".to_string(),
            Self::Forbidden => "FORBIDDEN (403)".to_string(),
            Self::NotFound => "NOT FOUND (404)".to_string(),
            Self::Unexpected(code) => format!("Unexpected status code: {code}"),
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Available => None,
            Self::Unauthorized => Some("check username/password"),
            Self::Forbidden => Some(
                "authentication OK but the service is not available/authorized for this user \
                 (check S_SERVICE and activation in /IWFND/MAINT_SERVICE)",
            ),
            Self::NotFound => Some("service path doesn't exist or the service is not activated"),
            Self::Unexpected(_) => None,
        }
    }

    /// Whether the response body is worth showing to the operator.
    pub fn shows_body(&self) -> bool {
        matches!(self, Self::Forbidden | Self::Unexpected(_))
    }
}

/// Markers looked for in an EDMX document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataFindings {
    pub is_edmx: bool,
    pub has_mass_change_entity: bool,
    pub has_function_imports: bool,
}

impl MetadataFindings {
    pub fn scan(body: &str) -> Self {
        Self {
            is_edmx: body.contains("<?xml") && body.contains("edmx:Edmx"),
            has_mass_change_entity: body.contains("RFM_MASS_CHANGE"),
            has_function_imports: body.contains("FunctionImport"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetadataProbe {
    pub url: String,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl MetadataProbe {
    pub fn classification(&self) -> MetadataStatus {
        self.status.into()
    }

    pub fn findings(&self) -> MetadataFindings {
        MetadataFindings::scan(&self.body)
    }
}

/// GET a `$metadata` document with Basic Auth. TLS verification and timeout
/// come from the client the caller built.
pub async fn probe_metadata(
    http: &Client,
    url: &str,
    user: &str,
    password: &str,
) -> Result<MetadataProbe> {
    info!(%url, "odata: probing $metadata");
    let resp = http
        .get(url)
        .header(ACCEPT, "application/xml")
        .basic_auth(user, Some(password))
        .send()
        .await
        .with_context(|| format!("$metadata request to {url} failed"))?;

    let status = resp.status();
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    let body = resp.text().await.context("failed to read $metadata body")?;

    info!(
        %status,
        bytes = body.len(),
        preview = %excerpt(&body, 80),
        "odata: $metadata answered"
    );
    Ok(MetadataProbe {
        url: url.to_string(),
        status,
        content_type,
        body,
    })
}
