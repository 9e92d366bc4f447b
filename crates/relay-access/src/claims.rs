//! Claim checks applied after the identity provider accepts a token.

use relay_core::TokenExpiry;
use serde::Deserialize;
use serde_json::Value;

use crate::{AllowList, Identity, UnauthorizedReason};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
/// Claims reported by the identity provider for an accepted token.
///
/// Numeric and boolean claims arrive as JSON strings from some providers,
/// so they are kept as raw values and normalized on access.
pub struct IdTokenClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<Value>,
    #[serde(default)]
    pub exp: Option<Value>,
}

impl IdTokenClaims {
    fn expires_unix(&self) -> Result<Option<u64>, UnauthorizedReason> {
        match &self.exp {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => number
                .as_u64()
                .map(Some)
                .ok_or(UnauthorizedReason::MalformedClaims),
            Some(Value::String(raw)) => raw
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| UnauthorizedReason::MalformedClaims),
            Some(_) => Err(UnauthorizedReason::MalformedClaims),
        }
    }

    fn email_explicitly_unverified(&self) -> bool {
        match &self.email_verified {
            Some(Value::Bool(verified)) => !verified,
            Some(Value::String(raw)) => raw.trim().eq_ignore_ascii_case("false"),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Trusted audience and issuer set a token must have been minted for.
pub struct TrustPolicy {
    pub audience: String,
    pub trusted_issuers: Vec<String>,
}

/// Validates provider claims against the trust policy and allow-list.
///
/// Checks run audience, issuer, expiry, subject, allow-list so the reported
/// reason is the first failed gate.
pub fn validate_id_token_claims(
    claims: &IdTokenClaims,
    policy: &TrustPolicy,
    allow_list: &AllowList,
    now_unix: u64,
) -> Result<Identity, UnauthorizedReason> {
    let audience = claims
        .aud
        .as_deref()
        .filter(|aud| *aud == policy.audience)
        .ok_or(UnauthorizedReason::InvalidAudience)?;
    let issuer = claims
        .iss
        .as_deref()
        .filter(|iss| policy.trusted_issuers.iter().any(|trusted| trusted.as_str() == *iss))
        .ok_or(UnauthorizedReason::InvalidIssuer)?;

    let expires_unix = claims.expires_unix()?;
    if TokenExpiry::evaluate(expires_unix, now_unix).is_lapsed() {
        return Err(UnauthorizedReason::Expired);
    }

    // Allow-list entries are matched byte for byte; a padded claim is not
    // quietly normalized into one.
    let subject = claims
        .email
        .as_deref()
        .filter(|email| !email.is_empty() && email.trim() == *email)
        .ok_or(UnauthorizedReason::MalformedClaims)?;
    if claims.email_explicitly_unverified() {
        return Err(UnauthorizedReason::UnverifiedEmail);
    }
    if !allow_list.contains(subject) {
        return Err(UnauthorizedReason::NotAllowListed);
    }

    Ok(Identity {
        subject: subject.to_string(),
        issuer: issuer.to_string(),
        audience: audience.to_string(),
        account_id: claims.sub.clone(),
        expires_unix,
    })
}
