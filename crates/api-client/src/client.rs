use std::time::Duration;

use shopwatch_api_types::{RunListResponse, RunRecord, StartRunRequest, StartRunResponse};

use crate::error::{classify, ApiError};

/// Typed HTTP client for the agent backend.
///
/// One-shot request/response calls only; the push-event subscription lives
/// in [`crate::channel`]. No business logic here — each method maps a typed
/// request to a typed response and classifies failures into [`ApiError`].
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new client with the given base URL and request timeout.
    ///
    /// The timeout makes "call never resolves" equivalent to "call fails"
    /// for the lifecycle state machine upstream.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// WebSocket endpoint for the push-event subscription keyed by client id.
    pub fn push_channel_url(&self, client_id: &str) -> String {
        push_channel_url(&self.base_url, client_id)
    }

    /// Start a run. On success the response carries the client id for the
    /// push subscription and the dynamic-filter map for the prompt rewriter.
    pub async fn start_run(&self, req: &StartRunRequest) -> Result<StartRunResponse, ApiError> {
        let resp = self
            .client
            .post(self.url("/agent/run"))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    /// Ask the backend to stop the running agent. Best-effort; the caller
    /// decides what a failure means for displayed status.
    pub async fn stop_run(&self) -> Result<(), ApiError> {
        let resp = self.client.post(self.url("/agent/stop")).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(classify(status, &body))
        }
    }

    /// Fetch the persisted record of one run.
    pub async fn fetch_run(&self, run_id: &str) -> Result<RunRecord, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!("/agent/runs/{run_id}")))
            .send()
            .await?;
        parse_response(resp).await
    }

    /// List a user's persisted runs, newest first.
    pub async fn list_runs(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<RunListResponse, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!(
                "/agent/runs?user_id={user_id}&page={page}&per_page={per_page}"
            )))
            .send()
            .await?;
        parse_response(resp).await
    }
}

/// Derive the WebSocket push endpoint from an HTTP base URL and client id.
pub fn push_channel_url(base_url: &str, client_id: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{ws_base}/ws/{client_id}")
}

/// Parse an HTTP response: the deserialized body on 2xx, a classified
/// [`ApiError`] otherwise.
async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(classify(status, &body));
    }
    resp.json()
        .await
        .map_err(|e| ApiError::Generic(format!("malformed response body: {e}")))
}
