//! Identity and token types shared by every provider adapter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DenialError;

/// Identity providers the gateway can broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Facebook,
    Aaf,
    Github,
    Twitter,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Google,
        ProviderKind::Facebook,
        ProviderKind::Aaf,
        ProviderKind::Github,
        ProviderKind::Twitter,
    ];

    /// Path segment and log label for the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Facebook => "facebook",
            ProviderKind::Aaf => "aaf",
            ProviderKind::Github => "github",
            ProviderKind::Twitter => "twitter",
        }
    }

    /// Prefix used for environment configuration, e.g. `GOOGLE_CLIENT_ID`.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            ProviderKind::Google => "GOOGLE",
            ProviderKind::Facebook => "FACEBOOK",
            ProviderKind::Aaf => "AAF",
            ProviderKind::Github => "GITHUB",
            ProviderKind::Twitter => "TWITTER",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = DenialError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| DenialError::ProviderNotEnabled(value.to_string()))
    }
}

/// Normalized identity attributes extracted from any provider.
///
/// `sub` is stable per provider account. `email` is informational only and
/// never used to decide who a caller is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    pub sub: String,
    pub email: String,
    pub email_verified: bool,
}

/// Normalized result of an authorization-code exchange. Used once, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// Client credentials registered with a provider.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

/// Query parameters accepted on `GET .../authorize`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeQuery {
    pub client_id: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub response_type: Option<String>,
    pub redirect_uri: Option<String>,
}

/// Query parameters a provider sends back on `GET .../idpresponse`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    /// OAuth 1.0a request token echoed back by Twitter
    pub oauth_token: Option<String>,
    /// OAuth 1.0a verifier issued by Twitter
    pub oauth_verifier: Option<String>,
    /// Set by Twitter when the user cancels the consent screen
    pub denied: Option<String>,
}
