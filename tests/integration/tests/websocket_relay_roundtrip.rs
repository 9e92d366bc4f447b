use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use httpmock::prelude::*;
use relay_access::{AllowList, GoogleIdTokenVerifier, IdTokenVerifierConfig};
use relay_ai::{ChatCompletionsClient, ChatCompletionsConfig, GenerationParameters};
use relay_gateway::{
    build_gateway_router, GatewayServerConfig, END_OF_TURN_MARKER, PROCESSING_ERROR_NOTICE,
    UNAUTHORIZED_NOTICE,
};
use relay_session::FullContext;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message as ClientWsMessage},
    MaybeTlsStream, WebSocketStream,
};

const ORIGIN: &str = "https://chat.example.com";
const AUDIENCE: &str = "client-123.apps.googleusercontent.com";
const CHAT_PATH: &str = "/api/v1/chat/completions";

type ClientSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

fn gateway_config(server: &MockServer) -> GatewayServerConfig {
    let mut verifier_config = IdTokenVerifierConfig::google(AUDIENCE);
    verifier_config.tokeninfo_url = server.url("/tokeninfo");
    verifier_config.request_timeout_ms = 2_000;
    let verifier = GoogleIdTokenVerifier::new(verifier_config).expect("verifier");

    let client = ChatCompletionsClient::new(ChatCompletionsConfig {
        api_url: server.url(CHAT_PATH),
        api_key: "test-upstream-key".to_string(),
        model: "llama-3.3-70b".to_string(),
        request_timeout_ms: 2_000,
        generation: GenerationParameters::default(),
    })
    .expect("upstream client");

    GatewayServerConfig {
        bind: "127.0.0.1:0".to_string(),
        allowed_origin: ORIGIN.to_string(),
        allow_list: AllowList::from_comma_list("ada@example.com, grace@example.com"),
        verifier: Arc::new(verifier),
        client: Arc::new(client),
        context_window: Arc::new(FullContext),
        model: "llama-3.3-70b".to_string(),
        max_message_chars: 1_000,
        ws_heartbeat_interval_seconds: 20,
    }
}

fn tokeninfo_claims(email: &str) -> serde_json::Value {
    json!({
        "iss": "https://accounts.google.com",
        "aud": AUDIENCE,
        "sub": "1234567890",
        "email": email,
        "email_verified": "true",
        "exp": (relay_core::unix_now_secs() + 3_600).to_string(),
    })
}

fn chat_reply(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

async fn spawn_gateway(config: GatewayServerConfig) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral listener");
    let addr = listener.local_addr().expect("listener addr");
    let app = build_gateway_router(config);
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    (addr, handle)
}

async fn connect(addr: SocketAddr) -> ClientSocket {
    let mut request = format!("ws://{addr}/")
        .into_client_request()
        .expect("websocket request");
    request
        .headers_mut()
        .insert("origin", HeaderValue::from_static(ORIGIN));
    let (socket, _) = connect_async(request).await.expect("websocket connection");
    socket
}

async fn send_json(socket: &mut ClientSocket, frame: serde_json::Value) {
    socket
        .send(ClientWsMessage::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

async fn recv_reply(socket: &mut ClientSocket) -> String {
    let mut frames = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while frames.len() < 2 {
            match socket.next().await {
                Some(Ok(ClientWsMessage::Text(text))) => frames.push(text.as_str().to_string()),
                Some(Ok(ClientWsMessage::Ping(_) | ClientWsMessage::Pong(_))) => continue,
                other => panic!("expected reply frames, got {other:?}"),
            }
        }
    })
    .await
    .expect("reply should arrive");
    assert_eq!(frames[1], END_OF_TURN_MARKER);
    frames.swap_remove(0)
}

#[tokio::test]
async fn integration_two_turns_relay_growing_context_to_upstream() {
    let server = MockServer::start_async().await;
    let tokeninfo = server.mock(|when, then| {
        when.method(POST)
            .path("/tokeninfo")
            .body_includes("id_token=ada-token");
        then.status(200).json_body(tokeninfo_claims("ada@example.com"));
    });
    let mut first_turn = server.mock(|when, then| {
        when.method(POST)
            .path(CHAT_PATH)
            .header("authorization", "Bearer test-upstream-key")
            .json_body_includes(
                json!({
                    "model": "llama-3.3-70b",
                    "messages": [{"role": "user", "content": "Hi"}],
                    "venice_parameters": {"enable_web_search": "on"}
                })
                .to_string(),
            );
        then.status(200).json_body(chat_reply("Hello Ada"));
    });

    let (addr, handle) = spawn_gateway(gateway_config(&server)).await;
    let mut socket = connect(addr).await;

    send_json(&mut socket, json!({"token": "ada-token", "message": "Hi"})).await;
    assert_eq!(recv_reply(&mut socket).await, "Hello Ada");
    first_turn.assert();
    first_turn.delete();

    let second_turn = server.mock(|when, then| {
        when.method(POST).path(CHAT_PATH).json_body_includes(
            json!({
                "messages": [
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello Ada"},
                    {"role": "user", "content": "And then?"}
                ]
            })
            .to_string(),
        );
        then.status(200).json_body(chat_reply("Then we talk."));
    });

    send_json(
        &mut socket,
        json!({"token": "ada-token", "message": "And then?"}),
    )
    .await;
    assert_eq!(recv_reply(&mut socket).await, "Then we talk.");
    second_turn.assert();
    tokeninfo.assert_calls(1);

    socket.close(None).await.expect("close websocket");
    handle.abort();
}

#[tokio::test]
async fn integration_failed_upstream_turn_is_not_resent_as_context() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/tokeninfo");
        then.status(200).json_body(tokeninfo_claims("grace@example.com"));
    });
    let mut failing = server.mock(|when, then| {
        when.method(POST).path(CHAT_PATH);
        then.status(503).body("upstream overloaded");
    });

    let (addr, handle) = spawn_gateway(gateway_config(&server)).await;
    let mut socket = connect(addr).await;

    send_json(&mut socket, json!({"token": "grace-token", "message": "first"})).await;
    assert_eq!(recv_reply(&mut socket).await, PROCESSING_ERROR_NOTICE);
    failing.assert();
    failing.delete();

    let recovered = server.mock(|when, then| {
        when.method(POST).path(CHAT_PATH).json_body_includes(
            json!({"messages": [{"role": "user", "content": "second"}]}).to_string(),
        );
        then.status(200).json_body(chat_reply("Back online."));
    });
    send_json(&mut socket, json!({"message": "second"})).await;
    assert_eq!(recv_reply(&mut socket).await, "Back online.");
    recovered.assert();

    socket.close(None).await.expect("close websocket");
    handle.abort();
}

#[tokio::test]
async fn integration_rejected_identity_never_reaches_upstream() {
    let server = MockServer::start_async().await;
    let tokeninfo = server.mock(|when, then| {
        when.method(POST).path("/tokeninfo");
        then.status(400)
            .json_body(json!({"error": "invalid_token", "error_description": "Invalid Value"}));
    });
    let upstream = server.mock(|when, then| {
        when.method(POST).path(CHAT_PATH);
        then.status(200).json_body(chat_reply("should not be sent"));
    });

    let (addr, handle) = spawn_gateway(gateway_config(&server)).await;
    let mut socket = connect(addr).await;

    send_json(&mut socket, json!({"token": "forged", "message": "Hi"})).await;
    assert_eq!(recv_reply(&mut socket).await, UNAUTHORIZED_NOTICE);
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match socket.next().await {
                None | Some(Err(_)) | Some(Ok(ClientWsMessage::Close(_))) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "gateway should close after rejecting identity");

    tokeninfo.assert();
    upstream.assert_calls(0);
    handle.abort();
}
