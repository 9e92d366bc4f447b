use relay_access::Identity;
use relay_ai::Message;

#[derive(Debug)]
/// One connection's authenticated identity and append-only context.
pub struct ConversationSession {
    session_id: String,
    identity: Identity,
    context: Vec<Message>,
    completed_turns: u64,
}

impl ConversationSession {
    pub fn new(session_id: impl Into<String>, identity: Identity) -> Self {
        Self {
            session_id: session_id.into(),
            identity,
            context: Vec::new(),
            completed_turns: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn context(&self) -> &[Message] {
        &self.context
    }

    pub fn completed_turns(&self) -> u64 {
        self.completed_turns
    }

    /// Appends the user message and returns a guard for the matching reply.
    ///
    /// Dropping the guard without `commit` removes the user message again, so
    /// the context only ever grows by whole user/assistant pairs. This also
    /// covers the owning task being cancelled while the upstream call is
    /// in flight.
    pub fn begin_turn(&mut self, user_text: impl Into<String>) -> PendingTurn<'_> {
        let base_len = self.context.len();
        self.context.push(Message::user(user_text));
        PendingTurn {
            session: self,
            base_len,
            committed: false,
        }
    }
}

#[derive(Debug)]
/// A user turn awaiting its assistant reply.
pub struct PendingTurn<'a> {
    session: &'a mut ConversationSession,
    base_len: usize,
    committed: bool,
}

impl PendingTurn<'_> {
    /// Full context including the pending user message.
    pub fn context(&self) -> &[Message] {
        &self.session.context
    }

    pub fn user_text(&self) -> &str {
        self.session
            .context
            .get(self.base_len)
            .map(|message| message.content.as_str())
            .unwrap_or_default()
    }

    /// Appends the assistant reply, completing the turn.
    pub fn commit(mut self, reply: impl Into<String>) {
        self.session.context.push(Message::assistant(reply));
        self.session.completed_turns = self.session.completed_turns.saturating_add(1);
        self.committed = true;
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::debug!(
                session_id = %self.session.session_id,
                "rolling back unanswered user turn"
            );
            self.session.context.truncate(self.base_len);
        }
    }
}
