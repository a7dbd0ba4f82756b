//! Standardized error types following the `error-authgate-<domain>-<number>` format.
//!
//! Adapters, codecs and token engines raise typed errors carrying a private,
//! operator-facing message. [`GatewayError`] is the only type that is turned
//! into an HTTP response, and it only ever exposes one of two fixed public
//! messages.

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// The single message returned to callers for every denial.
pub const PUBLIC_DENIAL_MESSAGE: &str = "Access denied";

/// The message returned to callers for storage and programming failures.
pub const PUBLIC_INTERNAL_MESSAGE: &str = "Internal server error";

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-authgate-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when PORT cannot be parsed
    #[error("error-authgate-config-2 Parsing PORT into u16 failed: {0:?}")]
    PortParsingFailed(std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-authgate-config-3 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-authgate-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// No signing secret was configured
    #[error("error-authgate-config-5 At least one authorization signing secret must be configured")]
    SigningSecretsMissing,

    /// The current signing secret is too short to be trusted
    #[error(
        "error-authgate-config-6 Signing secret is {length} characters, at least {minimum} required"
    )]
    SigningSecretTooShort { length: usize, minimum: usize },

    /// An identity verifier entry could not be parsed
    #[error("error-authgate-config-7 Invalid identity verifier '{0}': {1}")]
    VerifierParsingFailed(String, String),

    /// A provider was configured with a client id but is missing other settings
    #[error("error-authgate-config-8 Provider {0} is incomplete: {1}")]
    ProviderIncomplete(String, String),

    /// A URL setting could not be parsed
    #[error("error-authgate-config-9 Invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

/// Expected, user-facing rejections.
///
/// The message of each variant is private. Callers only ever see
/// [`PUBLIC_DENIAL_MESSAGE`].
#[derive(Debug, Error)]
pub enum DenialError {
    /// A required request parameter is missing or malformed
    #[error("error-authgate-denial-1 Malformed request: {0}")]
    MalformedRequest(String),

    /// The encoded state parameter could not be decoded
    #[error("error-authgate-denial-2 Invalid state: {0}")]
    InvalidState(String),

    /// The redirect target is not in the allow-list
    #[error("error-authgate-denial-3 Redirect URI not allowed: {0}")]
    RedirectNotAllowed(String),

    /// The provider reported an error on its callback
    #[error("error-authgate-denial-4 Provider {provider} returned an error: {error}")]
    ProviderRejected { provider: String, error: String },

    /// Granted scopes do not match what the flow requires
    #[error("error-authgate-denial-5 Unexpected scope from {provider}: {scope}")]
    ScopeMismatch { provider: String, scope: String },

    /// No usable email address was found for the account
    #[error("error-authgate-denial-6 No usable email for {provider} account: {reason}")]
    EmailNotUsable { provider: String, reason: String },

    /// The client id or client credentials do not match configuration
    #[error("error-authgate-denial-7 Invalid client: {0}")]
    InvalidClient(String),

    /// No verifier is registered for the token audience
    #[error("error-authgate-denial-8 No identity verifier for audience {0:?}")]
    UnknownAudience(Vec<String>),

    /// An identity token failed verification
    #[error("error-authgate-denial-9 Identity token rejected by {verifier}: {reason}")]
    IdentityTokenRejected { verifier: String, reason: String },

    /// The verified identity token is missing required claims
    #[error("error-authgate-denial-10 Identity token missing required claim: {0}")]
    IdentityClaimMissing(String),

    /// No bearer token was presented
    #[error("error-authgate-denial-11 Missing bearer token")]
    MissingToken,

    /// The access token failed verification against every configured secret
    #[error("error-authgate-denial-12 Access token rejected: {0}")]
    AccessTokenRejected(String),

    /// The user referenced by a verified token does not exist
    #[error("error-authgate-denial-13 User not found: {0}")]
    UserNotFound(String),

    /// The user account is disabled
    #[error("error-authgate-denial-14 User disabled: {0}")]
    UserDisabled(String),

    /// The user is locked out until the given time
    #[error("error-authgate-denial-15 User {user_id} denied authentication before {until}")]
    UserLockedOut { user_id: String, until: String },

    /// The request targets a different user than the authenticated one
    #[error(
        "error-authgate-denial-16 Cross-account request: authenticated {authenticated} requested {requested}"
    )]
    CrossAccount {
        authenticated: String,
        requested: String,
    },

    /// The requested data action does not exist
    #[error("error-authgate-denial-17 Unknown action: {0}")]
    UnknownAction(String),

    /// The provider is not enabled on this deployment
    #[error("error-authgate-denial-18 Provider not enabled: {0}")]
    ProviderNotEnabled(String),
}

/// Non-200 or malformed responses from an identity provider.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request to the provider could not be completed
    #[error("error-authgate-upstream-1 {provider} {step} request failed: {reason}")]
    Transport {
        provider: String,
        step: &'static str,
        reason: String,
    },

    /// The provider answered with a non-200 status
    #[error("error-authgate-upstream-2 {provider} {step} returned {status}: {body}")]
    UnexpectedStatus {
        provider: String,
        step: &'static str,
        status: u16,
        body: String,
    },

    /// The provider answered with a body that does not match the expected schema
    #[error("error-authgate-upstream-3 {provider} {step} response malformed: {reason}")]
    MalformedResponse {
        provider: String,
        step: &'static str,
        reason: String,
    },
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when database connection fails
    #[error("error-authgate-storage-1 Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Error when query execution fails
    #[error("error-authgate-storage-2 Query execution failed: {0}")]
    QueryFailed(String),

    /// Error when database operation fails
    #[error("error-authgate-storage-3 Database error: {0}")]
    DatabaseError(String),

    /// Error when data validation fails
    #[error("error-authgate-storage-4 Invalid data: {0}")]
    InvalidData(String),

    /// Error when requested resource is not found
    #[error("error-authgate-storage-5 Not found: {0}")]
    NotFound(String),

    /// Error when a record with the same key already exists
    #[error("error-authgate-storage-6 Already exists: {0}")]
    AlreadyExists(String),
}

/// Coarse classification checked by the outermost dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Denial,
    UpstreamFailure,
    Unexpected,
}

/// Every failure a request handler can produce.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Denied(#[from] DenialError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("error-authgate-unexpected-1 {0}")]
    Unexpected(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Denied(_) => ErrorKind::Denial,
            GatewayError::Upstream(_) => ErrorKind::UpstreamFailure,
            GatewayError::Storage(_) | GatewayError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// The message that may be shown to the caller.
    pub fn public_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Denial | ErrorKind::UpstreamFailure => PUBLIC_DENIAL_MESSAGE,
            ErrorKind::Unexpected => PUBLIC_INTERNAL_MESSAGE,
        }
    }

    /// The detailed message for operators. Never sent to the caller.
    pub fn private_message(&self) -> String {
        self.to_string()
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Denial | ErrorKind::UpstreamFailure => StatusCode::UNAUTHORIZED,
            ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log the private message at a level matching the error kind.
    pub fn log(&self) {
        match self.kind() {
            ErrorKind::Denial => tracing::warn!(error = %self.private_message(), "request denied"),
            ErrorKind::UpstreamFailure => {
                tracing::warn!(error = %self.private_message(), "identity provider failure")
            }
            ErrorKind::Unexpected => {
                tracing::error!(error = %self.private_message(), "internal server error")
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        (status, Json(json!({ "message": self.public_message() }))).into_response()
    }
}
