use relay_ai::Message;

/// Selects which part of a session's context is sent upstream on each turn.
///
/// The stored context is never truncated; a window only narrows the slice
/// handed to the completion client. Implementations must keep the most
/// recent user message in the returned slice.
pub trait ContextWindow: Send + Sync {
    fn select<'a>(&self, context: &'a [Message]) -> &'a [Message];
}

#[derive(Debug, Clone, Copy, Default)]
/// Sends the whole accumulated context.
pub struct FullContext;

impl ContextWindow for FullContext {
    fn select<'a>(&self, context: &'a [Message]) -> &'a [Message] {
        context
    }
}
