//! Turns parsed CLI flags into a validated gateway configuration.
//!
//! The upstream client and token verifier built here are the process-wide
//! shared instances; they live until the server future returns.
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use relay_access::{AllowList, GoogleIdTokenVerifier, IdTokenVerifierConfig};
use relay_ai::{ChatCompletionsClient, ChatCompletionsConfig, GenerationParameters};
use relay_cli::Cli;
use relay_core::{non_empty_trimmed, split_comma_list};
use relay_gateway::GatewayServerConfig;
use relay_session::FullContext;

const TOKENINFO_REQUEST_TIMEOUT_MS: u64 = 10_000;

pub(crate) fn build_gateway_config(cli: &Cli) -> Result<GatewayServerConfig> {
    let allowed_origin = validate_allowed_origin(&cli.allowed_origin)?;

    let allow_list = AllowList::from_comma_list(&cli.allowed_users);
    if allow_list.is_empty() {
        bail!("--allowed-users must name at least one subject");
    }

    let audience = cli
        .google_client_id()
        .context("--google-client-id (or VITE_GOOGLE_CLIENT_ID) is required")?
        .to_string();
    let trusted_issuers = split_comma_list(&cli.trusted_issuers);
    if trusted_issuers.is_empty() {
        bail!("--trusted-issuers must name at least one issuer");
    }
    let tokeninfo_url = non_empty_trimmed(&cli.tokeninfo_url)
        .context("--tokeninfo-url cannot be empty")?
        .to_string();
    let verifier = GoogleIdTokenVerifier::new(IdTokenVerifierConfig {
        tokeninfo_url,
        audience,
        trusted_issuers,
        request_timeout_ms: TOKENINFO_REQUEST_TIMEOUT_MS,
    })
    .context("failed to build identity provider http client")?;

    let model = cli.upstream_model.trim().to_string();
    let client = ChatCompletionsClient::new(ChatCompletionsConfig {
        api_url: cli.upstream_api_url.trim().to_string(),
        api_key: cli.upstream_api_key.clone(),
        model: model.clone(),
        request_timeout_ms: cli.upstream_timeout_ms,
        generation: GenerationParameters::default(),
    })
    .context("invalid --upstream-api-url/--upstream-api-key/--upstream-model")?;

    tracing::debug!(
        allow_listed_subjects = allow_list.len(),
        model = %model,
        "startup configuration validated"
    );

    Ok(GatewayServerConfig {
        bind: cli.bind_address(),
        allowed_origin,
        allow_list,
        verifier: Arc::new(verifier),
        client: Arc::new(client),
        context_window: Arc::new(FullContext),
        model,
        max_message_chars: cli.max_message_chars,
        ws_heartbeat_interval_seconds: cli.ws_heartbeat_seconds,
    })
}

fn validate_allowed_origin(raw: &str) -> Result<String> {
    let origin = non_empty_trimmed(raw).context("--allowed-origin cannot be empty")?;
    if !(origin.starts_with("http://") || origin.starts_with("https://")) {
        bail!("--allowed-origin must be an http(s) origin, got '{origin}'");
    }
    Ok(origin.trim_end_matches('/').to_string())
}
