//! One-shot decoding of upstream chat-completion reply bodies.

use serde_json::Value;

/// Text substituted for a reply whose shape does not carry readable content.
pub const REPLY_EXTRACTION_FALLBACK: &str = "Error, could not read content. Please try again.";

const REPLY_CONTENT_POINTER: &str = "/choices/0/message/content";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Decoded upstream reply: either the assistant text or a shape mismatch.
pub enum UpstreamReply {
    Content(String),
    ShapeMismatch { detail: String },
}

impl UpstreamReply {
    /// Decodes a parsed response body, expecting `choices[0].message.content`.
    pub fn from_body(body: &Value) -> Self {
        match body.pointer(REPLY_CONTENT_POINTER) {
            Some(Value::String(text)) => Self::Content(text.clone()),
            Some(other) => Self::ShapeMismatch {
                detail: format!(
                    "{REPLY_CONTENT_POINTER} is {} instead of a string",
                    json_type_name(other)
                ),
            },
            None => Self::ShapeMismatch {
                detail: format!("{REPLY_CONTENT_POINTER} is absent"),
            },
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Self::Content(_))
    }

    /// Returns the assistant text, or the fixed fallback on a shape mismatch.
    pub fn into_text(self) -> String {
        match self {
            Self::Content(text) => text,
            Self::ShapeMismatch { .. } => REPLY_EXTRACTION_FALLBACK.to_string(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
