//! OAuth 1.0a HMAC-SHA1 request signing (RFC 5849 section 3.4).

use base64::prelude::*;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha1::Sha1;

use crate::errors::GatewayError;

type HmacSha1 = Hmac<Sha1>;

const NONCE_LENGTH: usize = 32;

/// RFC 3986 unreserved-only encoding: everything but `A-Za-z0-9-._~` is escaped.
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// `METHOD&enc(url)&enc(sorted params)`.
///
/// Parameters are encoded first, then sorted by encoded key and value.
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| (percent_encode(key), percent_encode(value)))
        .collect();
    encoded.sort();

    let parameter_string = encoded
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&parameter_string)
    )
}

/// Base64 HMAC-SHA1 over the signature base string, keyed with
/// `enc(consumer_secret)&enc(token_secret)`.
pub fn create_signature(
    method: &str,
    url: &str,
    params: &[(String, String)],
    consumer_secret: &str,
    token_secret: Option<&str>,
) -> Result<String, GatewayError> {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret.unwrap_or_default())
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| GatewayError::Unexpected(format!("hmac key: {}", e)))?;
    mac.update(signature_base_string(method, url, params).as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// 32 alphanumeric characters from the thread-local CSPRNG.
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

/// A request to be signed for the `Authorization: OAuth ...` header.
#[derive(Default)]
pub struct SignedRequest<'a> {
    pub method: &'a str,
    /// Base URL without query string.
    pub url: &'a str,
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    pub token: Option<&'a str>,
    pub token_secret: Option<&'a str>,
    /// Protocol parameters beyond the standard set, e.g. `oauth_callback`.
    pub oauth_extra: Vec<(&'a str, &'a str)>,
    /// Query string and form body parameters, which are signed but not sent in the header.
    pub request_params: Vec<(&'a str, &'a str)>,
}

impl SignedRequest<'_> {
    fn oauth_params(&self, nonce: &str, timestamp: i64) -> Vec<(String, String)> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.to_string()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some(token) = self.token {
            params.push(("oauth_token".to_string(), token.to_string()));
        }
        params.extend(
            self.oauth_extra
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );
        params
    }

    /// Header value with a fresh nonce and the current timestamp.
    pub fn authorization_header(&self) -> Result<String, GatewayError> {
        self.authorization_header_at(&generate_nonce(), chrono::Utc::now().timestamp())
    }

    pub fn authorization_header_at(
        &self,
        nonce: &str,
        timestamp: i64,
    ) -> Result<String, GatewayError> {
        let mut oauth_params = self.oauth_params(nonce, timestamp);

        let mut signed = oauth_params.clone();
        signed.extend(
            self.request_params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );
        let signature = create_signature(
            self.method,
            self.url,
            &signed,
            self.consumer_secret,
            self.token_secret,
        )?;

        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();

        let fields = oauth_params
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", percent_encode(key), percent_encode(value)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {}", fields))
    }
}
