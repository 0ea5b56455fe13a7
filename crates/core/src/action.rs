//! Decoding of raw browser-action payloads into presentable form.
//!
//! An action payload is a single-key tagged union, e.g.
//! `{"go_to_url": {"url": "https://…"}}`. `format_action` is total: any
//! input, including truncated JSON or unknown kinds, yields a renderable.

use serde::{Deserialize, Serialize};

/// A browser action in a shape the view layer can render directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderableAction {
    Navigate { url: String },
    InputText { text: String, index: u64 },
    Click { index: u64 },
    CopyToClipboard { text: String },
    Done { text: String },
    /// Recognized as a tagged union but the kind is not in the vocabulary.
    Other { kind: String, args: String },
    /// Not parseable as a tagged union at all; carries the raw string.
    Raw(String),
}

impl RenderableAction {
    /// Short label for the badge in front of the action row.
    pub fn label(&self) -> &str {
        match self {
            RenderableAction::Navigate { .. } => "Navigate",
            RenderableAction::InputText { .. } => "Input Text",
            RenderableAction::Click { .. } => "Click",
            RenderableAction::CopyToClipboard { .. } => "Copy to Clipboard",
            RenderableAction::Done { .. } => "Complete",
            RenderableAction::Other { kind, .. } => kind,
            RenderableAction::Raw(_) => "Action",
        }
    }
}

/// Decode a raw action payload. Never fails; malformed input degrades to
/// [`RenderableAction::Raw`].
pub fn format_action(action_json: &str) -> RenderableAction {
    let value: serde_json::Value = match serde_json::from_str(action_json) {
        Ok(value) => value,
        Err(_) => return RenderableAction::Raw(action_json.to_string()),
    };

    let Some(object) = value.as_object() else {
        return RenderableAction::Raw(action_json.to_string());
    };
    let Some((kind, args)) = object.iter().next() else {
        return RenderableAction::Raw(action_json.to_string());
    };

    match kind.as_str() {
        "go_to_url" => match args.get("url").and_then(|v| v.as_str()) {
            Some(url) => RenderableAction::Navigate {
                url: url.to_string(),
            },
            None => fallback(kind, args),
        },
        "input_text" => {
            let text = args.get("text").and_then(|v| v.as_str());
            let index = args.get("index").and_then(|v| v.as_u64());
            match (text, index) {
                (Some(text), Some(index)) => RenderableAction::InputText {
                    text: text.to_string(),
                    index,
                },
                _ => fallback(kind, args),
            }
        }
        "click_element" => match args.get("index").and_then(|v| v.as_u64()) {
            Some(index) => RenderableAction::Click { index },
            None => fallback(kind, args),
        },
        "copy_to_clipboard" => match args.get("text").and_then(|v| v.as_str()) {
            Some(text) => RenderableAction::CopyToClipboard {
                text: text.to_string(),
            },
            None => fallback(kind, args),
        },
        "done" => match args.get("text").and_then(|v| v.as_str()) {
            Some(text) => RenderableAction::Done {
                text: text.to_string(),
            },
            None => fallback(kind, args),
        },
        _ => fallback(kind, args),
    }
}

fn fallback(kind: &str, args: &serde_json::Value) -> RenderableAction {
    RenderableAction::Other {
        kind: kind.to_string(),
        args: args.to_string(),
    }
}
