use std::time::Duration;

use tracing::warn;

use shopwatch_api_types::RunRecord;

use crate::client::ApiClient;
use crate::error::ApiError;

/// Configuration for retry behaviour on snapshot fetches.
pub struct RetryConfig {
    pub max_retries: usize,
    pub delays: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delays: vec![1, 2, 4],
        }
    }
}

/// Fetch a run record, retrying with backoff.
///
/// Retries on network errors and 5xx responses only. Validation and
/// not-found outcomes return immediately — retrying cannot fix them.
pub async fn fetch_run_with_retry(
    client: &ApiClient,
    run_id: &str,
    config: &RetryConfig,
) -> Result<RunRecord, ApiError> {
    let max_attempts = config.max_retries + 1;

    for attempt in 0..max_attempts {
        match client.fetch_run(run_id).await {
            Err(ApiError::Generic(reason))
                if attempt + 1 < max_attempts && attempt < config.delays.len() =>
            {
                warn!(
                    "run fetch attempt {}/{} failed ({}), retrying in {}s…",
                    attempt + 1,
                    max_attempts,
                    reason,
                    config.delays[attempt],
                );
                tokio::time::sleep(Duration::from_secs(config.delays[attempt])).await;
            }
            other => return other,
        }
    }

    unreachable!()
}
