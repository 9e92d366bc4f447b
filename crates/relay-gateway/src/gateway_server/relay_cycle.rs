//! One user-message to upstream-reply cycle.
use relay_ai::{UpstreamError, UpstreamReply};

use super::connection::{next_inbound, GatewayConnection, InboundPayload};
use super::*;

enum RelayOutcome {
    Finished(Result<UpstreamReply, UpstreamError>),
    Abandoned,
}

impl GatewayConnection {
    /// Relays `user_text` upstream with the session context and answers the
    /// client.
    ///
    /// The socket keeps being read while the call is in flight: text frames
    /// are queued for later turns and a close abandons the call. Reading
    /// pauses once `MAX_QUEUED_INBOUND_FRAMES` frames are waiting. Only a
    /// completed reply extends the context; every other outcome leaves it
    /// exactly as it was before the cycle.
    pub(super) async fn run_relay_cycle(
        &mut self,
        session: &mut ConversationSession,
        user_text: String,
    ) -> ControlFlow<()> {
        let subject = session.identity().subject.clone();
        let client = Arc::clone(&self.state.config.client);
        let window = Arc::clone(&self.state.config.context_window);
        let started = std::time::Instant::now();
        let turn = session.begin_turn(user_text);

        let outcome = {
            let mut upstream = client.complete(window.select(turn.context()));
            let mut outcome = None;
            while outcome.is_none() {
                outcome = tokio::select! {
                    result = &mut upstream => Some(RelayOutcome::Finished(result)),
                    inbound = next_inbound(&mut self.receiver, &mut self.sender),
                        if self.queued.len() < MAX_QUEUED_INBOUND_FRAMES => match inbound {
                        InboundPayload::Closed => Some(RelayOutcome::Abandoned),
                        payload => {
                            self.queued.push_back(payload);
                            None
                        }
                    },
                };
            }
            outcome
        };

        match outcome {
            None | Some(RelayOutcome::Abandoned) => {
                drop(turn);
                tracing::info!(
                    connection_id = %self.connection_id,
                    subject = %subject,
                    "client closed during upstream call; abandoning turn"
                );
                ControlFlow::Break(())
            }
            Some(RelayOutcome::Finished(Err(error))) => {
                drop(turn);
                self.state.counters.note_upstream_failure();
                tracing::warn!(
                    connection_id = %self.connection_id,
                    subject = %subject,
                    kind = error.kind(),
                    error = %error,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "upstream call failed"
                );
                self.send_reply(PROCESSING_ERROR_NOTICE).await
            }
            Some(RelayOutcome::Finished(Ok(reply))) => {
                if let UpstreamReply::ShapeMismatch { detail } = &reply {
                    tracing::warn!(
                        connection_id = %self.connection_id,
                        detail = %detail,
                        "upstream reply had no readable content"
                    );
                }
                let reply_text = reply.into_text();
                let user_message = turn.user_text().to_string();
                turn.commit(reply_text.clone());
                self.state.counters.note_relay_cycle_completed();
                tracing::info!(
                    connection_id = %self.connection_id,
                    subject = %subject,
                    user_message = %user_message,
                    reply = %reply_text,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "relay cycle completed"
                );
                self.send_reply(&reply_text).await
            }
        }
    }
}
