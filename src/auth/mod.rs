//! Authentication module for the Postal client.
//!
//! Postal authenticates server-side API calls with a per-server API key sent
//! in the `X-Server-API-Key` header.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::errors::{PostalError, PostalResult};
use crate::transport::API_KEY_HEADER;

/// Authentication provider trait.
///
/// Implementations of this trait provide authentication credentials
/// for API requests.
pub trait AuthProvider: Send + Sync {
    /// Apply authentication to request headers.
    fn apply_auth(&self, headers: &mut HeaderMap) -> PostalResult<()>;

    /// Name of the header carrying the credential.
    fn header_name(&self) -> &str;

    /// Validate the credentials.
    fn validate(&self) -> PostalResult<()>;
}

/// API key authentication provider.
pub struct ApiKeyAuth {
    api_key: SecretString,
}

impl ApiKeyAuth {
    /// Creates a new API key authentication provider.
    pub fn new(api_key: SecretString) -> Self {
        Self { api_key }
    }

    /// Creates from a string API key.
    pub fn from_string(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
        }
    }

    /// Gets a hint of the API key for debugging (last 4 characters).
    pub fn key_hint(&self) -> String {
        let key = self.api_key.expose_secret();
        if key.len() > 4 && key.is_char_boundary(key.len() - 4) {
            format!("...{}", &key[key.len() - 4..])
        } else {
            "****".to_string()
        }
    }
}

impl AuthProvider for ApiKeyAuth {
    fn apply_auth(&self, headers: &mut HeaderMap) -> PostalResult<()> {
        let mut value =
            HeaderValue::from_str(self.api_key.expose_secret()).map_err(|_| PostalError::Request {
                message: format!("API key {} is not a valid header value", self.key_hint()),
            })?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
        Ok(())
    }

    fn header_name(&self) -> &str {
        API_KEY_HEADER
    }

    fn validate(&self) -> PostalResult<()> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(PostalError::configuration("API key cannot be empty"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("api_key", &"[REDACTED]")
            .field("key_hint", &self.key_hint())
            .finish()
    }
}
