//! `BoardClient`: a retrying HTTP client for the Kanban board's task API,
//! plus the trait that lets the Event Router and CLI swap in a mock for
//! tests without a live board.

use std::time::Duration;

use async_trait::async_trait;
use prism_core::errors::{PrismError, Result};
use rand::Rng;
use reqwest::{Method, StatusCode};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::types::{BoardTask, CreateTaskRequest, CreateTaskResponse};

/// Retry policy for transient board-API failures (network errors, 5xx, 429).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Starting backoff delay.
    pub base_delay: Duration,
    /// Ceiling each individual backoff delay is capped to.
    pub max_delay: Duration,
    /// Total wall-clock budget for a single call, across all retries.
    pub deadline: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            deadline: Duration::from_secs(30),
        }
    }
}

/// A generic Kanban-board task API. `update_task_status` is optional per the
/// board contract; the default implementation reports it unsupported rather
/// than panicking, so a board client that only implements the required
/// methods still satisfies the trait.
#[async_trait]
pub trait BoardClient: Send + Sync {
    /// List every task currently on the board for `project_id`.
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<BoardTask>>;

    /// Create a task and return its assigned board id.
    async fn create_task(&self, project_id: &str, title: &str, body: &str) -> Result<String>;

    /// Fetch a task by its board id, including its current column.
    async fn get_task(&self, board_id: &str) -> Result<BoardTask>;

    /// Move a task to a new status column, if the board supports it.
    async fn update_task_status(&self, board_id: &str, status: &str) -> Result<()> {
        let _ = (board_id, status);
        Err(PrismError::ConfigurationMissing(
            "this board client does not support update_task_status".into(),
        ))
    }
}

/// `BoardClient` over a generic Kanban board's REST API, with bounded
/// exponential backoff and decorrelated jitter on transient failures.
pub struct HttpBoardClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    retry: RetryConfig,
}

impl HttpBoardClient {
    /// Build a client against `base_url` (no trailing slash), optionally
    /// bearer-authenticated with `api_token`.
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Result<Self> {
        Self::with_retry(base_url, api_token, RetryConfig::default())
    }

    /// Build a client with an explicit retry policy, for tests that want a
    /// tighter deadline than the production default.
    pub fn with_retry(
        base_url: impl Into<String>,
        api_token: Option<String>,
        retry: RetryConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PrismError::InvariantViolation(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, base_url: base_url.into(), api_token, retry })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, self.url(path));
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Send a request built fresh on each attempt, retrying transient
    /// failures (network errors, 5xx, 429) with capped exponential backoff
    /// and decorrelated jitter, up to `self.retry.deadline` total.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let start = Instant::now();
        let mut delay = self.retry.base_delay;

        loop {
            let response = build().send().await;

            match response {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    if !is_retryable_status(status) {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(PrismError::InvalidInput(format!(
                            "board API returned {status}: {body}"
                        )));
                    }
                    warn!(%status, "board API call failed, will retry if within deadline");
                }
                Err(e) => {
                    warn!(error = %e, "board API request failed, will retry if within deadline");
                }
            }

            if start.elapsed() >= self.retry.deadline {
                return Err(PrismError::ExternalUnavailable(
                    "board API call exceeded retry deadline".into(),
                ));
            }

            let jittered = decorrelated_jitter(delay, self.retry.base_delay, self.retry.max_delay);
            let remaining = self.retry.deadline.saturating_sub(start.elapsed());
            let sleep_for = jittered.min(remaining);
            debug!(delay_ms = sleep_for.as_millis(), "backing off before retry");
            tokio::time::sleep(sleep_for).await;
            delay = jittered;
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// AWS-style decorrelated jitter: next delay is a random point between the
/// base delay and three times the previous delay, capped at `max`.
fn decorrelated_jitter(previous: Duration, base: Duration, max: Duration) -> Duration {
    let upper = (previous.as_millis() as u64).saturating_mul(3).max(base.as_millis() as u64);
    let upper = upper.min(max.as_millis() as u64).max(base.as_millis() as u64);
    let lower = base.as_millis() as u64;
    let millis = if upper > lower { rand::thread_rng().gen_range(lower..=upper) } else { lower };
    Duration::from_millis(millis)
}

#[async_trait]
impl BoardClient for HttpBoardClient {
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<BoardTask>> {
        let path = format!("/projects/{project_id}/tasks");
        let response = self.send_with_retry(|| self.request(Method::GET, &path)).await?;
        response
            .json()
            .await
            .map_err(|e| PrismError::ExternalUnavailable(format!("malformed board response: {e}")))
    }

    async fn create_task(&self, project_id: &str, title: &str, body: &str) -> Result<String> {
        let path = format!("/projects/{project_id}/tasks");
        let payload = CreateTaskRequest { project_id, title, body };
        let response = self
            .send_with_retry(|| self.request(Method::POST, &path).json(&payload))
            .await?;
        let created: CreateTaskResponse = response
            .json()
            .await
            .map_err(|e| PrismError::ExternalUnavailable(format!("malformed board response: {e}")))?;
        Ok(created.id)
    }

    async fn get_task(&self, board_id: &str) -> Result<BoardTask> {
        let path = format!("/tasks/{board_id}");
        let response = self.send_with_retry(|| self.request(Method::GET, &path)).await?;
        response
            .json()
            .await
            .map_err(|e| PrismError::ExternalUnavailable(format!("malformed board response: {e}")))
    }

    async fn update_task_status(&self, board_id: &str, status: &str) -> Result<()> {
        let path = format!("/tasks/{board_id}/status");
        let payload = serde_json::json!({ "status": status });
        self.send_with_retry(|| self.request(Method::PATCH, &path).json(&payload)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_task_returns_assigned_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/projects/proj/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "b-1" })))
            .mount(&server)
            .await;

        let client = HttpBoardClient::new(server.uri(), None).unwrap();
        let id = client.create_task("proj", "Add feature", "body").await.unwrap();
        assert_eq!(id, "b-1");
    }

    #[tokio::test]
    async fn fatal_4xx_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpBoardClient::new(server.uri(), None).unwrap();
        let err = client.get_task("missing").await.unwrap_err();
        assert!(matches!(err, PrismError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn deadline_exhausted_yields_external_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let retry = RetryConfig {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            deadline: Duration::from_millis(60),
        };
        let client = HttpBoardClient::with_retry(server.uri(), None, retry).unwrap();
        let err = client.get_task("flaky").await.unwrap_err();
        assert!(matches!(err, PrismError::ExternalUnavailable(_)));
    }

    #[tokio::test]
    async fn transient_5xx_then_success_retries_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/retry-me"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/retry-me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "retry-me",
                "project_id": "proj",
                "title": "Flaky",
                "body": "",
                "column": "todo",
            })))
            .mount(&server)
            .await;

        let client = HttpBoardClient::new(server.uri(), None).unwrap();
        let task = client.get_task("retry-me").await.unwrap();
        assert_eq!(task.id, "retry-me");
    }
}
