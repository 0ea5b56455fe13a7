//! Boundary between loosely-shaped inbound JSON and the closed
//! [`NormalizedEvent`] vocabulary.
//!
//! Two paths feed the projector: push-channel frames (`normalize`) and the
//! persisted run record (`decompose_run`). Both produce structurally
//! identical events, so live and historical data share one reducer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{
    ActionPayload, AgentPhase, EventPayload, LogPayload, NormalizedEvent, ScreenshotPayload,
    ScreenshotSource, StatusPayload, UpdatePayload,
};
use crate::run::RunRecord;

/// A raw frame as delivered by the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPushMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Why a frame was dropped. Rejections affect that frame only; prior and
/// subsequent frames are untouched.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Rejected {
    #[error("unhandled message type: {0}")]
    UnknownType(String),
    #[error("{message_type} frame missing required field: {field}")]
    MissingField {
        message_type: String,
        field: &'static str,
    },
    #[error("step is not a non-negative integer")]
    InvalidStep,
    #[error("unknown agent status: {0}")]
    UnknownStatus(String),
}

/// Convert one push frame into a normalized event.
///
/// Unknown `type` values are rejected rather than failing, keeping the
/// channel forward-compatible with new frame kinds.
pub fn normalize(raw: &RawPushMessage) -> Result<NormalizedEvent, Rejected> {
    let data = raw.data.as_ref().unwrap_or(&serde_json::Value::Null);
    let step = parse_step(data)?;
    let timestamp = raw.timestamp.unwrap_or_else(Utc::now);

    let payload = match raw.message_type.as_str() {
        "browser_screenshot" => {
            let shot = require_str(raw, data, "screenshot")?;
            EventPayload::Screenshot(ScreenshotPayload {
                image: ScreenshotSource::classify(shot),
            })
        }
        "agent_log" => EventPayload::Log(LogPayload {
            prefix: require_str(raw, data, "prefix")?.to_string(),
            content: require_str(raw, data, "content")?.to_string(),
        }),
        "agent_action" => {
            let action = require_str(raw, data, "action")?;
            let index = u32_field(data, "action_number").unwrap_or(1).max(1);
            let total = u32_field(data, "total_actions").unwrap_or(1).max(index);
            EventPayload::Action(ActionPayload {
                action_json: action.to_string(),
                index,
                total,
            })
        }
        "agent_update" => {
            let memory = str_field(data, "memory");
            let progress = str_field(data, "task_progress");
            let plans = str_field(data, "future_plans");
            if memory.is_none() && progress.is_none() && plans.is_none() {
                return Err(Rejected::MissingField {
                    message_type: raw.message_type.clone(),
                    field: "memory/task_progress/future_plans",
                });
            }
            EventPayload::Update(UpdatePayload {
                memory: memory.unwrap_or_default().to_string(),
                task_progress: progress.unwrap_or_default().to_string(),
                future_plans: plans.unwrap_or_default().to_string(),
            })
        }
        "agent_status" => {
            let status = require_str(raw, data, "status")?;
            let phase = AgentPhase::parse(status)
                .ok_or_else(|| Rejected::UnknownStatus(status.to_string()))?;
            EventPayload::Status(StatusPayload { status: phase })
        }
        "agent_finished" => EventPayload::Finished,
        other => return Err(Rejected::UnknownType(other.to_string())),
    };

    Ok(NormalizedEvent {
        step,
        timestamp,
        payload,
    })
}

/// Decompose a persisted run record into the same event shape the push
/// channel produces.
///
/// Per step-record: at most one "Summary" log (summary preferred over
/// thought), one progress update when a state block exists, one action event
/// per raw action with a 1-based index, and one "Result" log per non-empty
/// extracted content. Step numbers are the record's position in the history.
pub fn decompose_run(record: &RunRecord) -> Vec<NormalizedEvent> {
    let timestamp = Utc::now();
    let mut events = Vec::new();

    for (index, step_record) in record.steps().iter().enumerate() {
        let step = index as u32;

        if let Some(output) = &step_record.model_output {
            let state = &output.current_state;
            let summary = [state.summary.as_deref(), state.thought.as_deref()]
                .into_iter()
                .flatten()
                .find(|s| !s.is_empty());
            if let Some(content) = summary {
                events.push(NormalizedEvent {
                    step,
                    timestamp,
                    payload: EventPayload::Log(LogPayload {
                        prefix: "Summary".to_string(),
                        content: content.to_string(),
                    }),
                });
            }

            events.push(NormalizedEvent {
                step,
                timestamp,
                payload: EventPayload::Update(UpdatePayload {
                    memory: state.important_contents.clone().unwrap_or_default(),
                    task_progress: state.task_progress.clone().unwrap_or_default(),
                    future_plans: state.future_plans.clone().unwrap_or_default(),
                }),
            });

            let total = output.action.len().max(1) as u32;
            for (action_index, action) in output.action.iter().enumerate() {
                events.push(NormalizedEvent {
                    step,
                    timestamp,
                    payload: EventPayload::Action(ActionPayload {
                        action_json: action.to_string(),
                        index: action_index as u32 + 1,
                        total,
                    }),
                });
            }
        }

        for result in &step_record.result {
            if result.extracted_content.is_empty() {
                continue;
            }
            events.push(NormalizedEvent {
                step,
                timestamp,
                payload: EventPayload::Log(LogPayload {
                    prefix: "Result".to_string(),
                    content: result.extracted_content.clone(),
                }),
            });
        }
    }

    events
}

fn parse_step(data: &serde_json::Value) -> Result<u32, Rejected> {
    match data.get("step") {
        None | Some(serde_json::Value::Null) => Ok(0),
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(Rejected::InvalidStep),
    }
}

fn str_field<'a>(data: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    data.get(field).and_then(|v| v.as_str())
}

fn u32_field(data: &serde_json::Value, field: &str) -> Option<u32> {
    data.get(field)
        .and_then(|v| v.as_u64())
        .and_then(|n| u32::try_from(n).ok())
}

fn require_str<'a>(
    raw: &RawPushMessage,
    data: &'a serde_json::Value,
    field: &'static str,
) -> Result<&'a str, Rejected> {
    match str_field(data, field) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Rejected::MissingField {
            message_type: raw.message_type.clone(),
            field,
        }),
    }
}
