//! Upstream completion surface for the relay gateway.
//!
//! Holds the conversation message model, the `CompletionClient` seam the
//! gateway relays through, the pooled chat-completions HTTP client, and the
//! one-shot decoding of upstream reply bodies.
mod chat_completions;
mod reply;
mod types;

pub use chat_completions::{ChatCompletionsClient, ChatCompletionsConfig, GenerationParameters};
pub use reply::{UpstreamReply, REPLY_EXTRACTION_FALLBACK};
pub use types::{CompletionClient, Message, MessageRole, UpstreamError};
