//! Event constructors for tests.

use chrono::Utc;

use crate::event::{
    ActionPayload, AgentPhase, EventPayload, LogPayload, NormalizedEvent, ScreenshotPayload,
    ScreenshotSource, StatusPayload, UpdatePayload,
};

pub fn log_event(step: u32, prefix: &str, content: &str) -> NormalizedEvent {
    NormalizedEvent {
        step,
        timestamp: Utc::now(),
        payload: EventPayload::Log(LogPayload {
            prefix: prefix.to_string(),
            content: content.to_string(),
        }),
    }
}

pub fn action_event(step: u32, action_json: &str, index: u32, total: u32) -> NormalizedEvent {
    NormalizedEvent {
        step,
        timestamp: Utc::now(),
        payload: EventPayload::Action(ActionPayload {
            action_json: action_json.to_string(),
            index,
            total,
        }),
    }
}

pub fn update_event(step: u32, task_progress: &str) -> NormalizedEvent {
    NormalizedEvent {
        step,
        timestamp: Utc::now(),
        payload: EventPayload::Update(UpdatePayload {
            memory: String::new(),
            task_progress: task_progress.to_string(),
            future_plans: String::new(),
        }),
    }
}

pub fn screenshot_event(inline: &str) -> NormalizedEvent {
    NormalizedEvent {
        step: 0,
        timestamp: Utc::now(),
        payload: EventPayload::Screenshot(ScreenshotPayload {
            image: ScreenshotSource::Inline(inline.to_string()),
        }),
    }
}

pub fn status_event(status: AgentPhase) -> NormalizedEvent {
    NormalizedEvent {
        step: 0,
        timestamp: Utc::now(),
        payload: EventPayload::Status(StatusPayload { status }),
    }
}

pub fn finished_event() -> NormalizedEvent {
    NormalizedEvent {
        step: 0,
        timestamp: Utc::now(),
        payload: EventPayload::Finished,
    }
}
