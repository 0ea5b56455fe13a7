use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backend-persisted record of one run, fetched over REST.
///
/// Created and owned entirely by the backend; the dashboard only reads it —
/// once eagerly when a session view mounts, and once more after
/// `agent_finished`, when it becomes authoritative over the live stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default)]
    pub task: String,
    /// Terminal status if the run has settled ("completed" / "failed").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Stepwise-summary GIF rendered by the backend after the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_gif_url: Option<String>,
    /// Full browser recording, if the backend captured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_history: Option<AgentHistory>,
}

impl RunRecord {
    pub fn steps(&self) -> &[StepRecord] {
        self.agent_history
            .as_ref()
            .map(|h| h.history.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentHistory {
    #[serde(default)]
    pub history: Vec<StepRecord>,
}

/// One think/act iteration as the backend persisted it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_output: Option<ModelOutput>,
    #[serde(default)]
    pub result: Vec<StepResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelOutput {
    #[serde(default)]
    pub current_state: CurrentState,
    /// Raw action payloads, each a single-key tagged union.
    #[serde(default)]
    pub action: Vec<serde_json::Value>,
}

/// The agent's state block; field names match the backend wire format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    /// Wire name for the agent's memory slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub important_contents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_progress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future_plans: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepResult {
    #[serde(default)]
    pub extracted_content: String,
}

/// One row of the run-history listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "_id")]
    pub id: String,
    /// Identity-provider user id, named for the provider on the wire.
    #[serde(rename = "clerk_id")]
    pub user_id: String,
    pub task: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_gif_url: Option<String>,
}
