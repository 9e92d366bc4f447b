use httpmock::prelude::*;
use relay_access::{
    AllowList, GoogleIdTokenVerifier, IdTokenVerifierConfig, TokenVerifier, UnauthorizedReason,
};
use serde_json::json;

const AUDIENCE: &str = "client-123.apps.googleusercontent.com";

fn verifier_for(server: &MockServer) -> GoogleIdTokenVerifier {
    let mut config = IdTokenVerifierConfig::google(AUDIENCE);
    config.tokeninfo_url = format!("{}/tokeninfo", server.base_url());
    config.request_timeout_ms = 2_000;
    GoogleIdTokenVerifier::new(config).expect("verifier")
}

fn claims_for(email: &str) -> serde_json::Value {
    json!({
        "iss": "accounts.google.com",
        "aud": AUDIENCE,
        "sub": "1234567890",
        "email": email,
        "email_verified": "true",
        "exp": (relay_core::unix_now_secs() + 3_600).to_string(),
    })
}

#[tokio::test]
async fn integration_accepts_allow_listed_subject_from_provider_claims() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/tokeninfo")
            .body_includes("id_token=valid-token");
        then.status(200).json_body(claims_for("ada@example.com"));
    });

    let identity = verifier_for(&server)
        .verify("valid-token", &AllowList::new(["ada@example.com"]))
        .await
        .expect("token should verify");

    mock.assert();
    assert_eq!(identity.subject, "ada@example.com");
    assert_eq!(identity.issuer, "accounts.google.com");
    assert_eq!(identity.audience, AUDIENCE);
}

#[tokio::test]
async fn functional_rejects_valid_token_for_subject_outside_allow_list() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/tokeninfo");
        then.status(200).json_body(claims_for("mallory@example.com"));
    });

    let error = verifier_for(&server)
        .verify("valid-token", &AllowList::new(["ada@example.com"]))
        .await
        .expect_err("subject is not allow-listed");
    assert_eq!(error.reason, UnauthorizedReason::NotAllowListed);
}

#[tokio::test]
async fn functional_provider_rejection_is_unauthorized() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/tokeninfo");
        then.status(400)
            .json_body(json!({"error": "invalid_token", "error_description": "Invalid Value"}));
    });

    let error = verifier_for(&server)
        .verify("forged-token", &AllowList::new(["ada@example.com"]))
        .await
        .expect_err("provider rejected token");
    assert_eq!(error.reason, UnauthorizedReason::ProviderRejected);
}

#[tokio::test]
async fn regression_provider_outage_fails_closed() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/tokeninfo");
        then.status(503).body("unavailable");
    });

    let error = verifier_for(&server)
        .verify("valid-token", &AllowList::new(["ada@example.com"]))
        .await
        .expect_err("outage must not fail open");
    assert_eq!(error.reason, UnauthorizedReason::ProviderUnavailable);

    let mut unreachable = IdTokenVerifierConfig::google(AUDIENCE);
    unreachable.tokeninfo_url = "http://127.0.0.1:9/tokeninfo".to_string();
    unreachable.request_timeout_ms = 500;
    let error = GoogleIdTokenVerifier::new(unreachable)
        .expect("verifier")
        .verify("valid-token", &AllowList::new(["ada@example.com"]))
        .await
        .expect_err("unreachable provider must not fail open");
    assert_eq!(error.reason, UnauthorizedReason::ProviderUnavailable);
}

#[tokio::test]
async fn regression_blank_token_never_reaches_provider() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST).path("/tokeninfo");
        then.status(200).json_body(claims_for("ada@example.com"));
    });

    let error = verifier_for(&server)
        .verify("   ", &AllowList::new(["ada@example.com"]))
        .await
        .expect_err("blank token");
    assert_eq!(error.reason, UnauthorizedReason::MissingToken);
    mock.assert_calls(0);
}
