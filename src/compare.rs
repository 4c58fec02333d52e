//! Compare what several hosts serve for the same `$metadata` document.
//!
//! Typical use: the internal Cloud Connector host and the public RISE host
//! should expose the very same service; a digest mismatch means they don't.

use crate::http::build_client;
use crate::report::excerpt;
use anyhow::{anyhow, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

pub const COMPARE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEndpoint {
    pub name: String,
    pub url: String,
    pub accept_invalid_certs: bool,
}

/// Parse `name=url` entries separated by `;` or newlines. The first `=`
/// splits, so URLs may carry query strings.
pub fn parse_endpoints(raw: &str, accept_invalid_certs: bool) -> Result<Vec<MetadataEndpoint>> {
    raw.split([';', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (name, url) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("endpoint entry must be NAME=URL: {entry}"))?;
            Ok(MetadataEndpoint {
                name: name.trim().to_string(),
                url: url.trim().to_string(),
                accept_invalid_certs,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct FetchedMetadata {
    pub name: String,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub length: usize,
    pub digest: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub enum EndpointOutcome {
    Success(FetchedMetadata),
    Failed {
        name: String,
        status: Option<StatusCode>,
        error: String,
    },
}

impl EndpointOutcome {
    pub fn name(&self) -> &str {
        match self {
            Self::Success(m) => &m.name,
            Self::Failed { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Identical { digest: String, length: usize },
    /// `(name, digest, length)` per successful endpoint.
    Different(Vec<(String, String, usize)>),
    /// Fewer than two endpoints answered 200; `(name, status or error)`.
    Incomplete(Vec<(String, String)>),
}

pub fn sha256_hex(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Fetch one endpoint. Never fails: transport errors and non-200 answers are
/// folded into `EndpointOutcome::Failed` so the comparison can still report.
pub async fn fetch_endpoint(
    endpoint: &MetadataEndpoint,
    user: &str,
    password: &str,
    timeout_secs: u64,
) -> EndpointOutcome {
    let failed = |status: Option<StatusCode>, error: String| EndpointOutcome::Failed {
        name: endpoint.name.clone(),
        status,
        error,
    };

    let http = match build_client("s4-probe/compare", timeout_secs, endpoint.accept_invalid_certs)
    {
        Ok(c) => c,
        Err(e) => return failed(None, e.to_string()),
    };

    let resp = match http
        .get(&endpoint.url)
        .basic_auth(user, Some(password))
        .header(ACCEPT, "application/xml")
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(endpoint = %endpoint.name, error = %e, "compare: connection failed");
            return failed(
                None,
                format!("{} ({})", e, crate::http::describe_transport_error(&e)),
            );
        }
    };

    let status = resp.status();
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    let body = match resp.text().await {
        Ok(b) => b,
        Err(e) => return failed(Some(status), e.to_string()),
    };

    if status != StatusCode::OK {
        return failed(Some(status), excerpt(&body, 500));
    }

    let digest = sha256_hex(&body);
    info!(endpoint = %endpoint.name, bytes = body.len(), %digest, "compare: fetched");
    EndpointOutcome::Success(FetchedMetadata {
        name: endpoint.name.clone(),
        status,
        content_type,
        length: body.len(),
        digest,
        body,
    })
}

pub fn compare(outcomes: &[EndpointOutcome]) -> Comparison {
    let successful: Vec<&FetchedMetadata> = outcomes
        .iter()
        .filter_map(|o| match o {
            EndpointOutcome::Success(m) => Some(m),
            EndpointOutcome::Failed { .. } => None,
        })
        .collect();

    if successful.len() < 2 {
        return Comparison::Incomplete(
            outcomes
                .iter()
                .map(|o| {
                    let state = match o {
                        EndpointOutcome::Success(m) => m.status.to_string(),
                        EndpointOutcome::Failed {
                            status: Some(s), ..
                        } => s.to_string(),
                        EndpointOutcome::Failed { status: None, .. } => "Failed".to_string(),
                    };
                    (o.name().to_string(), state)
                })
                .collect(),
        );
    }

    let first = successful[0];
    if successful.iter().all(|m| m.digest == first.digest) {
        Comparison::Identical {
            digest: first.digest.clone(),
            length: first.length,
        }
    } else {
        Comparison::Different(
            successful
                .iter()
                .map(|m| (m.name.clone(), m.digest.clone(), m.length))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetched(name: &str, body: &str) -> EndpointOutcome {
        EndpointOutcome::Success(FetchedMetadata {
            name: name.to_string(),
            status: StatusCode::OK,
            content_type: None,
            length: body.len(),
            digest: sha256_hex(body),
            body: body.to_string(),
        })
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_parse_endpoints() {
        let eps = parse_endpoints(
            "Internal (s4-sb4:44380)=http://s4-sb4:44380/x/$metadata?sap-client=200;\n External=https://h:44300/x/$metadata?sap-client=200 ;",
            true,
        )
        .unwrap();
        assert_eq!(eps.len(), 2);
        assert_eq!(eps[0].name, "Internal (s4-sb4:44380)");
        assert_eq!(eps[0].url, "http://s4-sb4:44380/x/$metadata?sap-client=200");
        assert_eq!(eps[1].name, "External");
        assert!(eps[1].accept_invalid_certs);

        assert!(parse_endpoints("no-separator", false).is_err());
    }

    #[test]
    fn test_compare_identical_and_different() {
        assert_eq!(
            compare(&[fetched("a", "<x/>"), fetched("b", "<x/>")]),
            Comparison::Identical {
                digest: sha256_hex("<x/>"),
                length: 4
            }
        );
        match compare(&[fetched("a", "<x/>"), fetched("b", "<y/>")]) {
            Comparison::Different(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[1].0, "b");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_compare_incomplete() {
        let outcomes = vec![
            fetched("a", "<x/>"),
            EndpointOutcome::Failed {
                name: "b".to_string(),
                status: None,
                error: "dns".to_string(),
            },
        ];
        assert_eq!(
            compare(&outcomes),
            Comparison::Incomplete(vec![
                ("a".to_string(), "200 OK".to_string()),
                ("b".to_string(), "Failed".to_string()),
            ])
        );
    }

    #[tokio::test]
    async fn test_fetch_endpoint_outcomes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok/$metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<edmx/>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/denied/$metadata"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let ok = MetadataEndpoint {
            name: "ok".to_string(),
            url: format!("{}/ok/$metadata", server.uri()),
            accept_invalid_certs: false,
        };
        let denied = MetadataEndpoint {
            name: "denied".to_string(),
            url: format!("{}/denied/$metadata", server.uri()),
            accept_invalid_certs: false,
        };

        match fetch_endpoint(&ok, "u", "p", 5).await {
            EndpointOutcome::Success(m) => {
                assert_eq!(m.length, 7);
                assert_eq!(m.digest, sha256_hex("<edmx/>"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match fetch_endpoint(&denied, "u", "p", 5).await {
            EndpointOutcome::Failed { status, error, .. } => {
                assert_eq!(status, Some(StatusCode::FORBIDDEN));
                assert_eq!(error, "Forbidden");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
