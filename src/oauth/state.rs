//! OAuth request and `state` parameter codec.
//!
//! The `state` parameter only carries the client redirect target. It is
//! client-supplied and is not bound to the originating `/authorize` request,
//! so the redirect allow-list check in [`validate_redirect_uri`] is the sole
//! protection against open redirects and must run on every callback before a
//! token is issued or a redirect is performed.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::DenialError;
use crate::oauth::types::AuthorizeQuery;

/// Redirect target carried through a provider round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthState {
    pub redirect_uri: String,
}

/// Extract the client redirect target from an inbound authorize request.
///
/// An already-encoded `state` wins over a bare `redirect_uri`.
pub fn parse_authorize_request(query: &AuthorizeQuery) -> Result<OAuthState, DenialError> {
    if let Some(state) = query.state.as_deref().filter(|value| !value.is_empty()) {
        return decode_state(state);
    }

    match query.redirect_uri.as_deref().filter(|value| !value.is_empty()) {
        Some(redirect_uri) => Ok(OAuthState {
            redirect_uri: redirect_uri.to_string(),
        }),
        None => Err(DenialError::MalformedRequest(
            "redirect_uri or state is required".to_string(),
        )),
    }
}

/// Encode state as base64 (URL-safe, unpadded) JSON.
pub fn encode_state(state: &OAuthState) -> String {
    // Serializing a struct with a single String field cannot fail.
    let json = serde_json::to_vec(state).unwrap_or_default();
    BASE64_URL_SAFE_NO_PAD.encode(json)
}

/// Decode state produced by [`encode_state`].
///
/// Standard-alphabet base64 is accepted as well since browser clients
/// commonly produce it.
pub fn decode_state(encoded: &str) -> Result<OAuthState, DenialError> {
    let trimmed = encoded.trim();
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| BASE64_STANDARD.decode(trimmed))
        .map_err(|e| DenialError::InvalidState(format!("state is not base64: {}", e)))?;

    let state: OAuthState = serde_json::from_slice(&bytes)
        .map_err(|e| DenialError::InvalidState(format!("state is not valid JSON: {}", e)))?;

    if state.redirect_uri.is_empty() {
        return Err(DenialError::InvalidState(
            "state redirectUri is empty".to_string(),
        ));
    }

    Ok(state)
}

/// Exact, byte-for-byte membership test against the allow-list.
pub fn validate_redirect_uri(uri: &str, allowed: &[String]) -> Result<(), DenialError> {
    if allowed.iter().any(|candidate| candidate == uri) {
        Ok(())
    } else {
        Err(DenialError::RedirectNotAllowed(uri.to_string()))
    }
}
