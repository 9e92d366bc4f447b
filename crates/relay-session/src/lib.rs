//! Per-connection conversation state for the relay gateway.
//!
//! A `ConversationSession` is owned by exactly one connection task. It is
//! never shared, persisted, or locked; concurrency safety comes from that
//! single ownership rather than synchronization.
mod context_window;
mod conversation;

pub use context_window::{ContextWindow, FullContext};
pub use conversation::{ConversationSession, PendingTurn};
