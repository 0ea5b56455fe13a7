//! Bridge between the synchronous terminal loop and the async API client.
//!
//! The app issues [`AsyncCommand`]s; each one runs on the tokio runtime and
//! posts exactly one [`CommandResult`] back over a std mpsc channel that the
//! dispatch loop drains between frames. Failures come back as values, never
//! panics, so a dead backend degrades to banners instead of a crash.

use std::sync::mpsc;
use std::time::Duration;

use tracing::debug;

use shopwatch_api_client::{fetch_run_with_retry, ApiClient, ApiError, RetryConfig};
use shopwatch_api_types::{
    RunListResponse, RunRecord, StartRunRequest, StartRunResponse,
};

use crate::config::AppConfig;

/// Why a run record is being fetched; decides what the app does with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    /// Eager fetch when a session view mounts.
    Mount,
    /// One-time authoritative fetch after `agent_finished`.
    Reconcile,
}

#[derive(Debug)]
pub enum AsyncCommand {
    StartRun { request: StartRunRequest },
    StopRun,
    FetchRun { run_id: String, reason: FetchReason },
    FetchHistory { user_id: String, page: u32 },
}

#[derive(Debug)]
pub enum CommandResult {
    RunStarted(Result<StartRunResponse, ApiError>),
    RunStopped(Result<(), ApiError>),
    RunFetched {
        /// The run the fetch was issued for. Results for a run the app has
        /// since navigated away from are dropped, not applied.
        run_id: String,
        reason: FetchReason,
        result: Result<RunRecord, ApiError>,
    },
    HistoryFetched(Result<RunListResponse, ApiError>),
}

pub const HISTORY_PAGE_SIZE: u32 = 10;

/// Spawn `command` onto the ambient tokio runtime; its result arrives on
/// `results`. Requires an entered runtime, which `main` guarantees.
pub fn dispatch(command: AsyncCommand, config: &AppConfig, results: mpsc::Sender<CommandResult>) {
    let base_url = config.server.url.clone();
    let timeout = Duration::from_secs(config.server.request_timeout_secs);
    tokio::spawn(async move {
        let result = execute(command, &base_url, timeout).await;
        // Send fails only when the app is already shutting down.
        if results.send(result).is_err() {
            debug!("dropping async result: app gone");
        }
    });
}

async fn execute(command: AsyncCommand, base_url: &str, timeout: Duration) -> CommandResult {
    let client = match ApiClient::new(base_url, timeout) {
        Ok(client) => client,
        Err(err) => return failed(command, err),
    };

    match command {
        AsyncCommand::StartRun { request } => {
            CommandResult::RunStarted(client.start_run(&request).await)
        }
        AsyncCommand::StopRun => CommandResult::RunStopped(client.stop_run().await),
        AsyncCommand::FetchRun { run_id, reason } => {
            let result = match reason {
                // Mount fetches race the live stream; one shot is enough.
                FetchReason::Mount => client.fetch_run(&run_id).await,
                // The reconcile fetch is the authoritative one; retry it.
                FetchReason::Reconcile => {
                    fetch_run_with_retry(&client, &run_id, &RetryConfig::default()).await
                }
            };
            CommandResult::RunFetched {
                run_id,
                reason,
                result,
            }
        }
        AsyncCommand::FetchHistory { user_id, page } => CommandResult::HistoryFetched(
            client.list_runs(&user_id, page, HISTORY_PAGE_SIZE).await,
        ),
    }
}

/// Map a command that never reached the wire to its failure result.
fn failed(command: AsyncCommand, err: ApiError) -> CommandResult {
    match command {
        AsyncCommand::StartRun { .. } => CommandResult::RunStarted(Err(err)),
        AsyncCommand::StopRun => CommandResult::RunStopped(Err(err)),
        AsyncCommand::FetchRun { run_id, reason } => CommandResult::RunFetched {
            run_id,
            reason,
            result: Err(err),
        },
        AsyncCommand::FetchHistory { .. } => CommandResult::HistoryFetched(Err(err)),
    }
}
