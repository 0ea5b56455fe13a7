//! Shared wire types for the shopwatch agent backend.
//!
//! This crate is the single source of truth for request/response bodies the
//! dashboard exchanges with the backend. Field names follow the backend
//! wire format, not Rust conventions, so every rename is explicit here.

use serde::{Deserialize, Serialize};

// Re-export run-record types for convenience
pub use shopwatch_core::normalize::RawPushMessage;
pub use shopwatch_core::rewrite::DynamicFilterMap;
pub use shopwatch_core::run::{RunRecord, RunSummary};

// ─── Start / stop ────────────────────────────────────────────────────────────

/// Body of `POST /agent/run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRunRequest {
    pub task: String,
    /// Identity-provider user id of the submitter.
    pub user_id: String,
    #[serde(flatten)]
    pub settings: AgentSettings,
}

/// Tunables forwarded to the agent executor. Defaults mirror what the
/// dashboard has always sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub agent_type: String,
    pub llm_provider: String,
    pub llm_model_name: String,
    pub llm_temperature: f64,
    pub max_steps: u32,
    pub max_actions_per_step: u32,
    pub use_vision: bool,
    pub headless: bool,
    pub tool_calling_method: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            agent_type: "custom".to_string(),
            llm_provider: "openai".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_temperature: 0.2,
            max_steps: 20,
            max_actions_per_step: 3,
            use_vision: true,
            headless: false,
            tool_calling_method: "function_call".to_string(),
        }
    }
}

/// Response of `POST /agent/run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRunResponse {
    pub task: String,
    #[serde(default)]
    pub dynamic_filters: DynamicFilterMap,
    /// Key for the push-event subscription.
    pub client_id: String,
    pub run_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

// ─── History ─────────────────────────────────────────────────────────────────

/// Response of `GET /agent/runs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunListResponse {
    pub agent_runs: Vec<RunSummary>,
    pub total: u64,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Error body the backend returns on non-2xx responses. Validation errors
/// carry `type: "VALIDATION_ERROR"` plus a user-facing message and detail.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorBody {
    pub const VALIDATION: &'static str = "VALIDATION_ERROR";

    pub fn is_validation(&self) -> bool {
        self.error_type.as_deref() == Some(Self::VALIDATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_run_request_flattens_settings() {
        let request = StartRunRequest {
            task: "find a laptop".to_string(),
            user_id: "user_1".to_string(),
            settings: AgentSettings::default(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["task"], "find a laptop");
        // Settings sit at the top level of the body, not nested.
        assert_eq!(value["llm_model_name"], "gpt-4o-mini");
        assert_eq!(value["max_steps"], 20);
        assert!(value.get("settings").is_none());
    }

    #[test]
    fn start_run_response_defaults_optional_fields() {
        let response: StartRunResponse = serde_json::from_value(serde_json::json!({
            "task": "find a laptop",
            "client_id": "c1",
            "run_id": "r1",
        }))
        .unwrap();
        assert!(response.dynamic_filters.is_empty());
        assert_eq!(response.status, "");
    }

    #[test]
    fn validation_error_body_is_recognized() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"type":"VALIDATION_ERROR","error":"Task too vague","detail":"Name a product"}"#,
        )
        .unwrap();
        assert!(body.is_validation());
        assert_eq!(body.error.as_deref(), Some("Task too vague"));

        let generic: ErrorBody = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert!(!generic.is_validation());
    }
}
