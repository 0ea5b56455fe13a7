use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single normalized event in a run's timeline.
///
/// Both the live push channel and the persisted run record decompose into
/// this one shape, so the projector never has to care where an event came
/// from. The payload enum carries the kind: an event cannot hold a payload
/// that disagrees with its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Agent step this event belongs to. Events without a step are step 0.
    pub step: u32,
    /// When the backend emitted the event.
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl NormalizedEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Log,
    Action,
    Update,
    ScreenshotFrame,
    StatusChange,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Log(LogPayload),
    Action(ActionPayload),
    Update(UpdatePayload),
    Screenshot(ScreenshotPayload),
    Status(StatusPayload),
    Finished,
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Log(_) => EventKind::Log,
            EventPayload::Action(_) => EventKind::Action,
            EventPayload::Update(_) => EventKind::Update,
            EventPayload::Screenshot(_) => EventKind::ScreenshotFrame,
            EventPayload::Status(_) => EventKind::StatusChange,
            EventPayload::Finished => EventKind::Finished,
        }
    }
}

/// A labeled narrative line from the agent, e.g. prefix "Summary" or "Result".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPayload {
    pub prefix: String,
    pub content: String,
}

impl LogPayload {
    /// Summary lines head their step group in the timeline view.
    pub fn is_summary(&self) -> bool {
        self.prefix.to_lowercase().contains("summary")
    }
}

/// One browser action among `total` issued in a single agent step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
    /// Opaque single-key tagged union, decoded on demand by `action::format_action`.
    pub action_json: String,
    /// 1-based position within the step.
    pub index: u32,
    pub total: u32,
}

/// The agent's self-reported state of mind for a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub memory: String,
    pub task_progress: String,
    pub future_plans: String,
}

/// A browser screenshot, either streamed inline or hosted after the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotPayload {
    pub image: ScreenshotSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenshotSource {
    /// Base64-encoded PNG streamed over the push channel.
    Inline(String),
    /// Externally hosted artifact (history GIF, recording frame).
    Url(String),
}

impl ScreenshotSource {
    /// The backend sends hosted artifacts as absolute URLs and live frames
    /// as bare base64, so the scheme prefix is the discriminator.
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            ScreenshotSource::Url(raw.to_string())
        } else {
            ScreenshotSource::Inline(raw.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: AgentPhase,
}

/// The backend's view of the agent, as carried by `agent_status` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentPhase {
    Running,
    Completed,
    Failed,
}

impl AgentPhase {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(AgentPhase::Running),
            "completed" => Some(AgentPhase::Completed),
            "failed" => Some(AgentPhase::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AgentPhase::Completed | AgentPhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentPhase::Running => "running",
            AgentPhase::Completed => "completed",
            AgentPhase::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_kind_matches_variant() {
        let log = EventPayload::Log(LogPayload {
            prefix: "Summary".to_string(),
            content: "searching".to_string(),
        });
        assert_eq!(log.kind(), EventKind::Log);
        assert_eq!(EventPayload::Finished.kind(), EventKind::Finished);
    }

    #[test]
    fn screenshot_source_splits_on_scheme() {
        assert_eq!(
            ScreenshotSource::classify("https://cdn.example.com/run.gif"),
            ScreenshotSource::Url("https://cdn.example.com/run.gif".to_string())
        );
        assert_eq!(
            ScreenshotSource::classify("iVBORw0KGgo="),
            ScreenshotSource::Inline("iVBORw0KGgo=".to_string())
        );
    }

    #[test]
    fn phase_parses_known_values_only() {
        assert_eq!(AgentPhase::parse("running"), Some(AgentPhase::Running));
        assert_eq!(AgentPhase::parse("completed"), Some(AgentPhase::Completed));
        assert_eq!(AgentPhase::parse("failed"), Some(AgentPhase::Failed));
        assert_eq!(AgentPhase::parse("paused"), None);
        assert!(AgentPhase::Completed.is_terminal());
        assert!(!AgentPhase::Running.is_terminal());
    }
}
