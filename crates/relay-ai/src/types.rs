use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::UpstreamReply;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `MessageRole` values.
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// One `{role, content}` entry of a conversation context.
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: text.into(),
        }
    }
}

#[derive(Debug, Error)]
/// Failures of a single upstream completion call.
pub enum UpstreamError {
    #[error("missing upstream API key")]
    MissingApiKey,
    #[error("invalid upstream configuration: {0}")]
    InvalidConfig(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("malformed upstream response body: {0}")]
    Serde(#[from] serde_json::Error),
}

impl UpstreamError {
    /// Short stable label for audit logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Http(error) if error.is_timeout() => "timeout",
            Self::Http(_) => "transport",
            Self::HttpStatus { .. } => "http_status",
            Self::Serde(_) => "malformed_body",
        }
    }
}

#[async_trait]
/// Trait contract for one request/response call to the completion service.
///
/// Implementations must be safe to share across every live session: the
/// gateway holds a single instance for the whole process.
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, context: &[Message]) -> Result<UpstreamReply, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::{Message, MessageRole};

    #[test]
    fn unit_message_serializes_as_role_content_pair() {
        let encoded = serde_json::to_value(Message::user("hello")).expect("serialize");
        assert_eq!(
            encoded,
            serde_json::json!({"role": "user", "content": "hello"})
        );
        let decoded: Message =
            serde_json::from_value(serde_json::json!({"role": "assistant", "content": "hi"}))
                .expect("deserialize");
        assert_eq!(decoded.role, MessageRole::Assistant);
        assert_eq!(decoded.content, "hi");
    }
}
