//! HTTP adapter for the coordinator boundary.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::CoordinatorError;
use crate::domain::models::{Capability, CoordinatorConfig, Heartbeat, Task, TaskOutcome};
use crate::domain::ports::{Coordinator, Credentials};

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    agent_id: &'a str,
    capabilities: &'a [Capability],
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    #[serde(default)]
    tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
struct SuccessReport<'a> {
    outcome: &'a TaskOutcome,
}

#[derive(Debug, Serialize)]
struct FailureReport<'a> {
    reason: &'a str,
}

/// JSON-over-HTTP coordinator client.
///
/// Connection pooling comes from the shared `reqwest::Client`; the bearer
/// credential is attached per call so a cleared credential store stops
/// traffic immediately. A 401 maps to `CoordinatorError::Unauthenticated`,
/// which the runtime treats as fatal rather than retryable.
pub struct HttpCoordinator {
    http: ReqwestClient,
    base_url: String,
}

impl HttpCoordinator {
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        let http = ReqwestClient::builder()
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn map_send_error(err: reqwest::Error) -> CoordinatorError {
        if err.is_timeout() {
            CoordinatorError::Timeout
        } else {
            CoordinatorError::Network(err.to_string())
        }
    }

    /// Convert a non-success response into the coordinator error taxonomy.
    async fn classify_failure(response: Response) -> CoordinatorError {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return CoordinatorError::Unauthenticated;
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "failed to read error body".to_string());
        CoordinatorError::Remote {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl Coordinator for HttpCoordinator {
    async fn register(
        &self,
        agent_id: &str,
        capabilities: &[Capability],
        credentials: &Credentials,
    ) -> Result<(), CoordinatorError> {
        let response = self
            .http
            .post(self.url("/api/v1/agents/register"))
            .bearer_auth(credentials.token())
            .json(&RegisterRequest {
                agent_id,
                capabilities,
            })
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }
        debug!(agent_id = %agent_id, "agent registered");
        Ok(())
    }

    async fn poll_tasks(
        &self,
        agent_id: &str,
        credentials: &Credentials,
    ) -> Result<Vec<Task>, CoordinatorError> {
        let response = self
            .http
            .get(self.url(&format!("/api/v1/agents/{agent_id}/tasks")))
            .bearer_auth(credentials.token())
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }

        let poll: PollResponse = response
            .json()
            .await
            .map_err(|e| CoordinatorError::Protocol(e.to_string()))?;
        debug!(agent_id = %agent_id, count = poll.tasks.len(), "polled tasks");
        Ok(poll.tasks)
    }

    async fn report_success(
        &self,
        task_id: Uuid,
        outcome: &TaskOutcome,
        credentials: &Credentials,
    ) -> Result<(), CoordinatorError> {
        let response = self
            .http
            .post(self.url(&format!("/api/v1/tasks/{task_id}/success")))
            .bearer_auth(credentials.token())
            .json(&SuccessReport { outcome })
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }
        Ok(())
    }

    async fn report_failure(
        &self,
        task_id: Uuid,
        reason: &str,
        credentials: &Credentials,
    ) -> Result<(), CoordinatorError> {
        let response = self
            .http
            .post(self.url(&format!("/api/v1/tasks/{task_id}/failure")))
            .bearer_auth(credentials.token())
            .json(&FailureReport { reason })
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }
        Ok(())
    }

    async fn send_heartbeat(
        &self,
        heartbeat: &Heartbeat,
        credentials: &Credentials,
    ) -> Result<(), CoordinatorError> {
        let response = self
            .http
            .post(self.url(&format!("/api/v1/agents/{}/heartbeat", heartbeat.agent_id)))
            .bearer_auth(credentials.token())
            .json(heartbeat)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }
        Ok(())
    }
}
