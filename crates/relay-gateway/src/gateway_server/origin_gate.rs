//! Cross-origin gate applied before a websocket upgrade is accepted.
use super::*;

pub(super) fn enforce_allowed_origin(
    allowed_origin: &str,
    headers: &HeaderMap,
) -> Result<(), GatewayApiError> {
    let observed = headers
        .get(ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::trim);
    match observed {
        Some(origin) if origin_matches(allowed_origin, origin) => Ok(()),
        Some(origin) => {
            tracing::warn!(origin = %origin, "rejected websocket upgrade from disallowed origin");
            Err(GatewayApiError::forbidden(
                "origin_not_allowed",
                "websocket origin is not allowed",
            ))
        }
        None => {
            tracing::warn!("rejected websocket upgrade without origin header");
            Err(GatewayApiError::forbidden(
                "origin_required",
                "websocket upgrade requires an Origin header",
            ))
        }
    }
}

fn origin_matches(allowed_origin: &str, observed: &str) -> bool {
    allowed_origin.trim().trim_end_matches('/') == observed.trim_end_matches('/')
}
