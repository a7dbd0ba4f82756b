//! Ordered HMAC signing secrets.
//!
//! Index 0 signs new access tokens; every entry is accepted for verification.
//! Rotation prepends a secret. Old secrets are dropped only once the tokens they
//! signed have expired.

use rand::Rng;
use rand::distributions::Alphanumeric;
use std::fmt;

use crate::errors::ConfigError;

/// Shortest secret accepted in the signing position.
pub const MIN_SIGNING_SECRET_LENGTH: usize = 32;

#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecretSet(Vec<String>);

impl SigningSecretSet {
    /// Validate a newest-first list of secrets.
    pub fn new(secrets: Vec<String>) -> Result<Self, ConfigError> {
        let current = secrets.first().ok_or(ConfigError::SigningSecretsMissing)?;
        check_length(current)?;
        Ok(Self(secrets))
    }

    /// The secret new tokens are signed with.
    pub fn current(&self) -> &str {
        &self.0[0]
    }

    /// All secrets, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new set signing with `secret` and still accepting every current entry.
    pub fn rotate(&self, secret: String) -> Result<Self, ConfigError> {
        let mut secrets = Vec::with_capacity(self.0.len() + 1);
        secrets.push(secret);
        secrets.extend(self.0.iter().cloned());
        Self::new(secrets)
    }

    /// `;`-joined form accepted by `AUTHZ_SIGNING_SECRETS`.
    pub fn to_env_value(&self) -> String {
        self.0.join(";")
    }
}

/// A random alphanumeric secret, never shorter than [`MIN_SIGNING_SECRET_LENGTH`].
pub fn generate_secret(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length.max(MIN_SIGNING_SECRET_LENGTH))
        .map(char::from)
        .collect()
}

/// Enforce [`MIN_SIGNING_SECRET_LENGTH`] on a secret that will sign tokens.
pub fn check_length(secret: &str) -> Result<(), ConfigError> {
    let length = secret.chars().count();
    if length < MIN_SIGNING_SECRET_LENGTH {
        return Err(ConfigError::SigningSecretTooShort {
            length,
            minimum: MIN_SIGNING_SECRET_LENGTH,
        });
    }
    Ok(())
}

impl TryFrom<String> for SigningSecretSet {
    type Error = ConfigError;

    /// Parse a `;`-separated, newest-first list.
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(
            value
                .split(';')
                .map(str::trim)
                .filter(|secret| !secret.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl fmt::Debug for SigningSecretSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecretSet([{} redacted])", self.0.len())
    }
}
