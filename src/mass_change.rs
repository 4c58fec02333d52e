//! Client for the deployed mass-change service (OData v4 actions on BTP).
//!
//! The service receives filters + field values as JSON, builds the `$batch`
//! payload itself and forwards it to S/4HANA through the destination, so these
//! calls exercise the whole chain end to end.
//!
//! Actions under `<service>/odata/v4/mass-change/`:
//! - scheduleMassChange: `{filters, fieldsToUpdate}` -> job result
//! - reverseMassChange: same body, undoes a previous run
//! - readOrders: `{filters}` -> matching order items
//! - testS4Endpoints: `{}` -> reachability report of the configured S/4 hosts

use crate::batch::{BatchFilters, UpdateFields};
use crate::http::{build_client, DEFAULT_TIMEOUT_SECS};
use crate::util::env::{env_parse, env_req};
use crate::xsuaa::{fetch_token, AccessToken, OAuthCredentials};
use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SERVICE_PATH: &str = "/odata/v4/mass-change";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Schedule,
    Reverse,
    ReadOrders,
    TestS4Endpoints,
}

impl Action {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Schedule => "scheduleMassChange",
            Self::Reverse => "reverseMassChange",
            Self::ReadOrders => "readOrders",
            Self::TestS4Endpoints => "testS4Endpoints",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MassChangeRequest {
    pub filters: BatchFilters,
    pub fields_to_update: UpdateFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "JOB_SCHEDULED")]
    JobScheduled,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub fiori_app_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderItem {
    #[serde(default)]
    pub sales_order: Option<String>,
    #[serde(default)]
    pub plant: Option<String>,
    #[serde(default)]
    pub requirement_segment: Option<String>,
    #[serde(default)]
    pub storage_location: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadOrdersResult {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub orders: Vec<OrderItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointCheck {
    pub endpoint: String,
    pub status: String,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub content_length: Option<u64>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EndpointCheck {
    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsReport {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub results: Vec<EndpointCheck>,
}

impl EndpointsReport {
    pub fn working(&self) -> impl Iterator<Item = &EndpointCheck> {
        self.results.iter().filter(|r| r.is_success())
    }
}

#[derive(Debug, Clone)]
pub struct MassChangeClient {
    base_url: String,
    http: Client,
    bearer: String,
}

impl MassChangeClient {
    /// `app_url` is the application root; `SERVICE_PATH` is appended unless
    /// the URL already points at the service.
    pub fn new(app_url: &str, http: Client, token: &AccessToken) -> Self {
        let trimmed = app_url.trim_end_matches('/');
        let base_url = if trimmed.ends_with(SERVICE_PATH) {
            trimmed.to_string()
        } else {
            format!("{trimmed}{SERVICE_PATH}")
        };
        Self {
            base_url,
            http,
            bearer: token.bearer(),
        }
    }

    pub fn action_url(&self, action: Action) -> String {
        format!("{}/{}", self.base_url, action.path())
    }

    async fn post_action<B, T>(&self, action: Action, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.action_url(action);
        debug!(%url, "mass_change: POST action");
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, &self.bearer)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to call {}", action.path()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("{} failed: {} - {}", action.path(), status, error_text);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse {} response", action.path()))
    }

    pub async fn schedule(&self, request: &MassChangeRequest) -> Result<JobResult> {
        let result: JobResult = self.post_action(Action::Schedule, request).await?;
        log_job(Action::Schedule, &result);
        Ok(result)
    }

    pub async fn reverse(&self, request: &MassChangeRequest) -> Result<JobResult> {
        let result: JobResult = self.post_action(Action::Reverse, request).await?;
        log_job(Action::Reverse, &result);
        Ok(result)
    }

    pub async fn read_orders(&self, filters: &BatchFilters) -> Result<ReadOrdersResult> {
        let result: ReadOrdersResult = self
            .post_action(Action::ReadOrders, &json!({ "filters": filters }))
            .await?;
        info!(
            plant = %filters.plant,
            count = result.count.unwrap_or(result.orders.len() as u64),
            "mass_change: orders read"
        );
        Ok(result)
    }

    pub async fn test_s4_endpoints(&self) -> Result<EndpointsReport> {
        self.post_action(Action::TestS4Endpoints, &json!({})).await
    }
}

/// Token from the `MASS_CHANGE_*` credential set plus `MASS_CHANGE_APP_URL`.
pub async fn connect_from_env(user_agent: &str) -> Result<MassChangeClient> {
    let creds = OAuthCredentials::from_env("MASS_CHANGE")?;
    let app_url = env_req("MASS_CHANGE_APP_URL")?;
    let http = build_client(
        user_agent,
        env_parse("MASS_CHANGE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        false,
    )?;
    let token = fetch_token(&http, &creds).await?;
    Ok(MassChangeClient::new(&app_url, http, &token))
}

fn log_job(action: Action, result: &JobResult) {
    match result.status {
        JobStatus::JobScheduled => info!(
            action = action.path(),
            id = result.id.as_deref().unwrap_or("-"),
            "mass_change: job scheduled"
        ),
        _ => warn!(
            action = action.path(),
            status = ?result.status,
            message = result.message.as_deref().unwrap_or("-"),
            "mass_change: job not scheduled"
        ),
    }
}

/// Forward/reverse pair for the round-trip run. Reads use the filters of
/// the job that comes next, so each read shows what that job will touch.
#[derive(Debug, Clone)]
pub struct SequencePlan {
    pub forward: MassChangeRequest,
    pub reverse: MassChangeRequest,
    pub read_delay: Duration,
    pub job_delay: Duration,
}

#[derive(Debug, Clone)]
pub enum SequenceStep {
    Read {
        plant: String,
        result: ReadOrdersResult,
    },
    Job {
        action: Action,
        result: JobResult,
    },
}

async fn read_step(client: &MassChangeClient, filters: &BatchFilters) -> Result<SequenceStep> {
    let result = client.read_orders(filters).await?;
    Ok(SequenceStep::Read {
        plant: filters.plant.clone(),
        result,
    })
}

/// READ -> reverse -> READ -> forward -> READ, sleeping between calls so the
/// background job has time to finish. Stops at the first failing call.
pub async fn run_sequence<F>(
    client: &MassChangeClient,
    plan: &SequencePlan,
    mut on_step: F,
) -> Result<Vec<SequenceStep>>
where
    F: FnMut(&SequenceStep),
{
    let mut steps = Vec::with_capacity(5);
    let mut record = |step: SequenceStep, steps: &mut Vec<SequenceStep>| {
        on_step(&step);
        steps.push(step);
    };

    record(read_step(client, &plan.reverse.filters).await?, &mut steps);
    tokio::time::sleep(plan.read_delay).await;

    let result = client.reverse(&plan.reverse).await?;
    record(
        SequenceStep::Job {
            action: Action::Reverse,
            result,
        },
        &mut steps,
    );
    tokio::time::sleep(plan.job_delay).await;

    record(read_step(client, &plan.forward.filters).await?, &mut steps);
    tokio::time::sleep(plan.read_delay).await;

    let result = client.schedule(&plan.forward).await?;
    record(
        SequenceStep::Job {
            action: Action::Schedule,
            result,
        },
        &mut steps,
    );
    tokio::time::sleep(plan.job_delay).await;

    record(read_step(client, &plan.reverse.filters).await?, &mut steps);
    Ok(steps)
}
