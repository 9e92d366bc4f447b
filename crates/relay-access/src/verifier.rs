use async_trait::async_trait;
use thiserror::Error;

use crate::{validate_id_token_claims, AllowList, IdTokenClaims, Identity, TrustPolicy};

pub const DEFAULT_GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
pub const DEFAULT_GOOGLE_TRUSTED_ISSUERS: [&str; 2] =
    ["accounts.google.com", "https://accounts.google.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates why a token was refused.
pub enum UnauthorizedReason {
    MissingToken,
    ProviderUnavailable,
    ProviderRejected,
    MalformedClaims,
    InvalidAudience,
    InvalidIssuer,
    Expired,
    UnverifiedEmail,
    NotAllowListed,
}

impl UnauthorizedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::ProviderRejected => "provider_rejected",
            Self::MalformedClaims => "malformed_claims",
            Self::InvalidAudience => "invalid_audience",
            Self::InvalidIssuer => "invalid_issuer",
            Self::Expired => "expired",
            Self::UnverifiedEmail => "unverified_email",
            Self::NotAllowListed => "not_allow_listed",
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("unauthorized: {}", .reason.as_str())]
/// Fail-closed verification outcome. Never carries the token itself.
pub struct Unauthorized {
    pub reason: UnauthorizedReason,
}

impl From<UnauthorizedReason> for Unauthorized {
    fn from(reason: UnauthorizedReason) -> Self {
        Self { reason }
    }
}

#[async_trait]
/// Trait contract for validating an opaque identity token.
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str, allow_list: &AllowList) -> Result<Identity, Unauthorized>;
}

#[derive(Debug, Clone)]
/// Static configuration for `GoogleIdTokenVerifier`.
pub struct IdTokenVerifierConfig {
    pub tokeninfo_url: String,
    pub audience: String,
    pub trusted_issuers: Vec<String>,
    pub request_timeout_ms: u64,
}

impl IdTokenVerifierConfig {
    pub fn google(audience: impl Into<String>) -> Self {
        Self {
            tokeninfo_url: DEFAULT_GOOGLE_TOKENINFO_URL.to_string(),
            audience: audience.into(),
            trusted_issuers: DEFAULT_GOOGLE_TRUSTED_ISSUERS
                .iter()
                .map(|issuer| issuer.to_string())
                .collect(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone)]
/// Verifies ID tokens through the identity provider's tokeninfo endpoint.
///
/// The provider checks the signature; the returned claims are then held to
/// the configured audience, issuer set, expiry and allow-list.
pub struct GoogleIdTokenVerifier {
    client: reqwest::Client,
    tokeninfo_url: String,
    policy: TrustPolicy,
}

impl GoogleIdTokenVerifier {
    pub fn new(config: IdTokenVerifierConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(
                config.request_timeout_ms.max(1),
            ))
            .build()?;
        Ok(Self {
            client,
            tokeninfo_url: config.tokeninfo_url,
            policy: TrustPolicy {
                audience: config.audience,
                trusted_issuers: config.trusted_issuers,
            },
        })
    }

    async fn fetch_claims(&self, token: &str) -> Result<IdTokenClaims, UnauthorizedReason> {
        let response = self
            .client
            .post(self.tokeninfo_url.as_str())
            .form(&[("id_token", token)])
            .send()
            .await
            .map_err(|error| {
                tracing::warn!(error = %error, "identity provider request failed");
                UnauthorizedReason::ProviderUnavailable
            })?;
        let status = response.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), "identity provider unavailable");
            return Err(UnauthorizedReason::ProviderUnavailable);
        }
        if !status.is_success() {
            return Err(UnauthorizedReason::ProviderRejected);
        }
        let raw = response
            .text()
            .await
            .map_err(|_| UnauthorizedReason::ProviderUnavailable)?;
        serde_json::from_str::<IdTokenClaims>(&raw).map_err(|_| UnauthorizedReason::MalformedClaims)
    }
}

#[async_trait]
impl TokenVerifier for GoogleIdTokenVerifier {
    async fn verify(&self, token: &str, allow_list: &AllowList) -> Result<Identity, Unauthorized> {
        let token = relay_core::non_empty_trimmed(token).ok_or(UnauthorizedReason::MissingToken)?;
        let claims = self.fetch_claims(token).await?;
        let identity = validate_id_token_claims(
            &claims,
            &self.policy,
            allow_list,
            relay_core::unix_now_secs(),
        )?;
        Ok(identity)
    }
}
