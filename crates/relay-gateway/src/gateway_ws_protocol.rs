//! Client-facing frame contract for the relay websocket.
//!
//! Every server reply, success or failure, is a text frame immediately
//! followed by the `[END]` sentinel frame.

use serde_json::Value;
use thiserror::Error;

pub const END_OF_TURN_MARKER: &str = "[END]";
pub const UNAUTHORIZED_NOTICE: &str = "Unauthorized.";
pub const INVALID_FORMAT_NOTICE: &str = "Invalid message format.";
pub const PROCESSING_ERROR_NOTICE: &str = "Error processing the message.";

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
/// Reasons an inbound frame cannot be used.
pub enum InboundFrameError {
    #[error("frame is not valid JSON")]
    InvalidJson,
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame field '{0}' must be a string")]
    InvalidField(&'static str),
    #[error("frame is missing a non-empty 'token'")]
    MissingToken,
    #[error("frame is missing a non-empty 'message'")]
    MissingMessage,
    #[error("frame message exceeds {max_chars} characters")]
    MessageTooLong { max_chars: usize },
    #[error("binary frame is not UTF-8 text")]
    NonUtf8,
}

impl InboundFrameError {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidJson => "invalid_json",
            Self::NotAnObject => "not_an_object",
            Self::InvalidField(_) => "invalid_field",
            Self::MissingToken => "missing_token",
            Self::MissingMessage => "missing_message",
            Self::MessageTooLong { .. } => "message_too_long",
            Self::NonUtf8 => "non_utf8",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Decoded `{token?, message?}` client envelope.
pub struct InboundEnvelope {
    pub token: Option<String>,
    pub message: Option<String>,
}

impl InboundEnvelope {
    /// Returns the token required on the handshake frame.
    pub fn handshake_token(&self) -> Result<&str, InboundFrameError> {
        self.token
            .as_deref()
            .and_then(relay_core::non_empty_trimmed)
            .ok_or(InboundFrameError::MissingToken)
    }

    /// Returns the user text a relay cycle needs.
    pub fn user_text(&self, max_chars: usize) -> Result<&str, InboundFrameError> {
        let message = self
            .message
            .as_deref()
            .filter(|message| !message.trim().is_empty())
            .ok_or(InboundFrameError::MissingMessage)?;
        if message.chars().count() > max_chars {
            return Err(InboundFrameError::MessageTooLong { max_chars });
        }
        Ok(message)
    }
}

/// Parses one inbound text frame. `null` fields count as absent.
pub fn parse_inbound_envelope(raw: &str) -> Result<InboundEnvelope, InboundFrameError> {
    let value = serde_json::from_str::<Value>(raw).map_err(|_| InboundFrameError::InvalidJson)?;
    let object = value.as_object().ok_or(InboundFrameError::NotAnObject)?;
    Ok(InboundEnvelope {
        token: optional_string_field(object, "token")?,
        message: optional_string_field(object, "message")?,
    })
}

fn optional_string_field(
    object: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, InboundFrameError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(InboundFrameError::InvalidField(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_inbound_envelope, InboundEnvelope, InboundFrameError};

    #[test]
    fn unit_parses_token_only_handshake_frame() {
        let envelope = parse_inbound_envelope(r#"{"token":"abc"}"#).expect("parse");
        assert_eq!(envelope.handshake_token(), Ok("abc"));
        assert_eq!(envelope.message, None);
        assert_eq!(
            envelope.user_text(100),
            Err(InboundFrameError::MissingMessage)
        );
    }

    #[test]
    fn unit_accepts_message_with_or_without_token() {
        for raw in [
            r#"{"token":"abc","message":"hello"}"#,
            r#"{"message":"hello"}"#,
            r#"{"message":"hello","token":null,"extra":1}"#,
        ] {
            let envelope = parse_inbound_envelope(raw).expect("parse");
            assert_eq!(envelope.user_text(100), Ok("hello"));
        }
    }

    #[test]
    fn unit_rejects_non_json_and_non_object_frames() {
        assert_eq!(
            parse_inbound_envelope("hello"),
            Err(InboundFrameError::InvalidJson)
        );
        assert_eq!(
            parse_inbound_envelope(r#"["hello"]"#),
            Err(InboundFrameError::NotAnObject)
        );
        assert_eq!(
            parse_inbound_envelope(r#"{"message":42}"#),
            Err(InboundFrameError::InvalidField("message"))
        );
    }

    #[test]
    fn unit_blank_values_are_missing() {
        let envelope = InboundEnvelope {
            token: Some("  ".to_string()),
            message: Some(" \n ".to_string()),
        };
        assert_eq!(
            envelope.handshake_token(),
            Err(InboundFrameError::MissingToken)
        );
        assert_eq!(
            envelope.user_text(100),
            Err(InboundFrameError::MissingMessage)
        );
    }

    #[test]
    fn regression_message_length_is_counted_in_characters() {
        let envelope = InboundEnvelope {
            token: None,
            message: Some("ééé".to_string()),
        };
        assert_eq!(envelope.user_text(3), Ok("ééé"));
        assert_eq!(
            envelope.user_text(2),
            Err(InboundFrameError::MessageTooLong { max_chars: 2 })
        );
    }
}
