//! Compute Engine v1 REST client.
//!
//! ```text
//! GET  {endpoint}/compute/v1/projects/{project}/zones/{zone}/instances/{instance}
//! POST .../instances/{instance}/start   → Operation
//! POST .../instances/{instance}/stop    → Operation
//! POST .../zones/{zone}/operations/{operation}/wait   (until status == DONE)
//! ```
//!
//! `start` and `stop` resolve once the operation reports `DONE`, bounded
//! by the configured operation timeout.

use std::time::Duration;

use bytes::Bytes;
use http::Method;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info};

use wakegate_config::ComputeConfig;

use crate::api::{ApiFuture, InstanceApi};
use crate::error::{ComputeError, ComputeResult};
use crate::http::{Endpoint, HttpTransport};
use crate::token::TokenSource;
use crate::types::{InstanceRef, InstanceStatus};

/// Timeout for single non-blocking API calls (get, submit).
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between `wait` calls that return before the operation is done.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct InstanceResource {
    status: String,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    errors: Vec<OperationErrorItem>,
}

#[derive(Debug, Deserialize)]
struct OperationErrorItem {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl Operation {
    fn is_done(&self) -> bool {
        self.status == "DONE"
    }

    /// Joined error messages of a finished operation, if it failed.
    fn failure(&self) -> Option<String> {
        let errors = &self.error.as_ref()?.errors;
        if errors.is_empty() {
            return Some("operation reported an error without details".to_string());
        }
        Some(
            errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Talks to the Compute Engine API for one instance.
pub struct GceClient {
    instance: InstanceRef,
    endpoint: Endpoint,
    http: HttpTransport,
    tokens: TokenSource,
    operation_timeout: Duration,
    poll_interval: Duration,
}

impl GceClient {
    /// Build a client from the `[compute]` config section.
    ///
    /// Uses the static access token when configured, otherwise the
    /// metadata server.
    pub fn new(config: &ComputeConfig, operation_timeout: Duration) -> ComputeResult<Self> {
        let tokens = match &config.access_token {
            Some(token) => TokenSource::fixed(token),
            None => TokenSource::metadata(&config.metadata_host)?,
        };
        Self::with_parts(
            InstanceRef::new(&config.project, &config.zone, &config.instance),
            Endpoint::parse(&config.endpoint)?,
            tokens,
            operation_timeout,
        )
    }

    pub fn with_parts(
        instance: InstanceRef,
        endpoint: Endpoint,
        tokens: TokenSource,
        operation_timeout: Duration,
    ) -> ComputeResult<Self> {
        Ok(Self {
            instance,
            endpoint,
            http: HttpTransport::new()?,
            tokens,
            operation_timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override the pause between unfinished `wait` responses.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn zone_path(&self) -> String {
        format!(
            "{}/compute/v1/projects/{}/zones/{}",
            self.endpoint.base_path, self.instance.project, self.instance.zone
        )
    }

    fn instance_path(&self) -> String {
        format!("{}/instances/{}", self.zone_path(), self.instance.instance)
    }

    async fn call(&self, method: Method, path: &str, timeout: Duration) -> ComputeResult<Bytes> {
        let token = self.tokens.token(&self.http).await?;
        let body = (method == Method::POST).then(Bytes::new);
        let response = self
            .http
            .request(
                &self.endpoint,
                method.clone(),
                path,
                &[
                    ("authorization", format!("Bearer {token}")),
                    ("accept", "application/json".to_string()),
                ],
                body,
                timeout,
            )
            .await?;

        if !response.is_success() {
            return Err(ComputeError::Status {
                method: method.to_string(),
                path: path.to_string(),
                code: response.status,
                body: response.body_text(),
            });
        }
        Ok(response.body)
    }

    async fn fetch_status(&self) -> ComputeResult<InstanceStatus> {
        let body = self
            .call(Method::GET, &self.instance_path(), CALL_TIMEOUT)
            .await?;
        let resource: InstanceResource = serde_json::from_slice(&body)?;
        let status = InstanceStatus::from_gce(&resource.status);
        debug!(instance = %self.instance, raw = %resource.status, %status, "fetched instance status");
        Ok(status)
    }

    /// Submit `start` or `stop` and wait for the operation to finish.
    async fn run_operation(&self, action: &'static str) -> ComputeResult<()> {
        let deadline = Instant::now()
            .checked_add(self.operation_timeout)
            .ok_or_else(|| ComputeError::TimeoutOutOfRange {
                what: format!("{action} operation"),
                after: self.operation_timeout,
            })?;
        let path = format!("{}/{action}", self.instance_path());

        info!(instance = %self.instance, action, "submitting instance operation");
        let body = self.call(Method::POST, &path, CALL_TIMEOUT).await?;
        let mut op: Operation = serde_json::from_slice(&body)?;

        loop {
            if op.is_done() {
                return match op.failure() {
                    Some(message) => Err(ComputeError::Operation {
                        name: op.name,
                        message,
                    }),
                    None => {
                        info!(instance = %self.instance, action, operation = %op.name, "instance operation completed");
                        Ok(())
                    }
                };
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ComputeError::Timeout {
                    what: format!("{action} operation {}", op.name),
                    after: self.operation_timeout,
                });
            }

            debug!(operation = %op.name, status = %op.status, "waiting for operation");
            let wait_path = format!("{}/operations/{}/wait", self.zone_path(), op.name);
            let body = self.call(Method::POST, &wait_path, remaining).await?;
            op = serde_json::from_slice(&body)?;

            if !op.is_done() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                tokio::time::sleep(self.poll_interval.min(remaining)).await;
            }
        }
    }
}

impl InstanceApi for GceClient {
    fn instance(&self) -> &InstanceRef {
        &self.instance
    }

    fn status(&self) -> ApiFuture<'_, InstanceStatus> {
        Box::pin(self.fetch_status())
    }

    fn start(&self) -> ApiFuture<'_, ()> {
        Box::pin(self.run_operation("start"))
    }

    fn stop(&self) -> ApiFuture<'_, ()> {
        Box::pin(self.run_operation("stop"))
    }
}
