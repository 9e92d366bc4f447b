//! Per-connection websocket state machine.
//!
//! `Connecting -> Authenticating -> Active -> Closing -> Closed`. One task
//! drives one connection; its `ConversationSession` never leaves that task.
use tokio::time::MissedTickBehavior;

use super::*;
use crate::gateway_ws_protocol::InboundEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum GatewayConnectionState {
    Connecting,
    Authenticating,
    Active,
    Closing,
    Closed,
}

impl GatewayConnectionState {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    pub(super) fn is_shutting_down(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum InboundPayload {
    Text(String),
    NonUtf8,
    Closed,
}

pub(super) type WsSender = SplitSink<WebSocket, WsMessage>;
pub(super) type WsReceiver = SplitStream<WebSocket>;

pub(super) struct GatewayConnection {
    pub(super) state: Arc<GatewayServerState>,
    pub(super) connection_id: String,
    pub(super) phase: GatewayConnectionState,
    pub(super) sender: WsSender,
    pub(super) receiver: WsReceiver,
    /// Frames that arrived while an upstream call was in flight.
    pub(super) queued: VecDeque<InboundPayload>,
}

pub(super) async fn run_gateway_ws_connection(state: Arc<GatewayServerState>, socket: WebSocket) {
    let tracking_state = Arc::clone(&state);
    let _active = tracking_state.counters.track_connection();
    let (sender, receiver) = socket.split();
    let mut connection = GatewayConnection {
        connection_id: state.next_connection_id(),
        state,
        phase: GatewayConnectionState::Connecting,
        sender,
        receiver,
        queued: VecDeque::new(),
    };
    connection.run().await;
}

/// Waits for the next payload-bearing frame, answering pings on the way.
pub(super) async fn next_inbound(
    receiver: &mut WsReceiver,
    sender: &mut WsSender,
) -> InboundPayload {
    loop {
        let Some(Ok(message)) = receiver.next().await else {
            return InboundPayload::Closed;
        };
        match message {
            WsMessage::Text(text) => return InboundPayload::Text(text.as_str().to_string()),
            WsMessage::Binary(bytes) => {
                return match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => InboundPayload::Text(text),
                    Err(_) => InboundPayload::NonUtf8,
                };
            }
            WsMessage::Ping(payload) => {
                if sender.send(WsMessage::Pong(payload)).await.is_err() {
                    return InboundPayload::Closed;
                }
            }
            WsMessage::Pong(_) => {}
            WsMessage::Close(_) => return InboundPayload::Closed,
        }
    }
}

impl GatewayConnection {
    async fn run(&mut self) {
        self.transition(GatewayConnectionState::Authenticating);
        if let Some((mut session, first_envelope)) = self.authenticate().await {
            self.transition(GatewayConnectionState::Active);
            let flow = match first_envelope {
                Some(envelope) => self.handle_envelope(&mut session, envelope).await,
                None => ControlFlow::Continue(()),
            };
            if flow.is_continue() {
                self.serve_active(&mut session).await;
            }
            tracing::debug!(
                connection_id = %self.connection_id,
                completed_turns = session.completed_turns(),
                context_len = session.context().len(),
                "releasing conversation session"
            );
        }
        let _ = self.close().await;
    }

    pub(super) fn transition(&mut self, next: GatewayConnectionState) {
        tracing::debug!(
            connection_id = %self.connection_id,
            from = self.phase.as_str(),
            to = next.as_str(),
            "connection state transition"
        );
        self.phase = next;
    }

    /// Reads exactly one handshake frame and binds a session on success.
    ///
    /// A `message` carried by the handshake frame is handed back so it can be
    /// relayed as the first turn.
    async fn authenticate(&mut self) -> Option<(ConversationSession, Option<InboundEnvelope>)> {
        let raw = match next_inbound(&mut self.receiver, &mut self.sender).await {
            InboundPayload::Closed => return None,
            InboundPayload::NonUtf8 => {
                self.reject_handshake(InboundFrameError::NonUtf8.as_str())
                    .await;
                return None;
            }
            InboundPayload::Text(raw) => raw,
        };
        let envelope = match parse_inbound_envelope(&raw) {
            Ok(envelope) => envelope,
            Err(error) => {
                self.reject_handshake(error.as_str()).await;
                return None;
            }
        };

        let verification = match envelope.handshake_token() {
            Ok(token) => {
                let config = &self.state.config;
                config.verifier.verify(token, &config.allow_list).await
            }
            Err(error) => {
                self.reject_handshake(error.as_str()).await;
                return None;
            }
        };
        match verification {
            Ok(identity) => {
                tracing::info!(
                    connection_id = %self.connection_id,
                    subject = %identity.subject,
                    issuer = %identity.issuer,
                    "connection authenticated"
                );
                let session = ConversationSession::new(self.connection_id.clone(), identity);
                let first_envelope = envelope.message.is_some().then_some(envelope);
                Some((session, first_envelope))
            }
            Err(error) => {
                self.reject_handshake(error.reason.as_str()).await;
                None
            }
        }
    }

    async fn reject_handshake(&mut self, reason: &str) {
        self.state.counters.note_auth_failure();
        tracing::warn!(
            connection_id = %self.connection_id,
            reason,
            "connection authentication failed"
        );
        let _ = self.send_reply(UNAUTHORIZED_NOTICE).await;
    }

    async fn serve_active(&mut self, session: &mut ConversationSession) {
        let mut heartbeat = tokio::time::interval(Duration::from_secs(
            self.state.config.ws_heartbeat_interval_seconds.max(1),
        ));
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.tick().await;

        loop {
            let payload = match self.queued.pop_front() {
                Some(payload) => payload,
                None => {
                    let inbound = tokio::select! {
                        inbound = next_inbound(&mut self.receiver, &mut self.sender) => Some(inbound),
                        _ = heartbeat.tick() => None,
                    };
                    match inbound {
                        Some(payload) => payload,
                        None => {
                            if self
                                .sender
                                .send(WsMessage::Ping(axum::body::Bytes::new()))
                                .await
                                .is_err()
                            {
                                return;
                            }
                            continue;
                        }
                    }
                }
            };
            if self.handle_payload(session, payload).await.is_break() {
                return;
            }
            heartbeat.reset();
        }
    }

    async fn handle_payload(
        &mut self,
        session: &mut ConversationSession,
        payload: InboundPayload,
    ) -> ControlFlow<()> {
        match payload {
            InboundPayload::Closed => ControlFlow::Break(()),
            InboundPayload::NonUtf8 => self.reject_format(InboundFrameError::NonUtf8).await,
            InboundPayload::Text(raw) => match parse_inbound_envelope(&raw) {
                Ok(envelope) => self.handle_envelope(session, envelope).await,
                Err(error) => self.reject_format(error).await,
            },
        }
    }

    async fn handle_envelope(
        &mut self,
        session: &mut ConversationSession,
        envelope: InboundEnvelope,
    ) -> ControlFlow<()> {
        match envelope.user_text(self.state.config.max_message_chars) {
            Ok(text) => self.run_relay_cycle(session, text.to_string()).await,
            Err(error) => self.reject_format(error).await,
        }
    }

    async fn reject_format(&mut self, error: InboundFrameError) -> ControlFlow<()> {
        self.state.counters.note_format_error();
        tracing::warn!(
            connection_id = %self.connection_id,
            reason = error.as_str(),
            "rejected malformed inbound frame"
        );
        self.send_reply(INVALID_FORMAT_NOTICE).await
    }

    /// Sends one reply frame followed by the end-of-turn marker.
    pub(super) async fn send_reply(&mut self, text: &str) -> ControlFlow<()> {
        for frame in [text, END_OF_TURN_MARKER] {
            if self
                .sender
                .send(WsMessage::Text(frame.to_string().into()))
                .await
                .is_err()
            {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Releases the transport. Returns `false` when the connection was
    /// already shutting down, in which case nothing is sent.
    pub(super) async fn close(&mut self) -> bool {
        if self.phase.is_shutting_down() {
            return false;
        }
        self.transition(GatewayConnectionState::Closing);
        let _ = self.sender.send(WsMessage::Close(None)).await;
        let _ = self.sender.close().await;
        self.queued.clear();
        self.transition(GatewayConnectionState::Closed);
        true
    }
}
