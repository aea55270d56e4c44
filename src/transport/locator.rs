//! Base address normalization and path joining.

use url::Url;

use crate::errors::{PostalError, PostalResult};

/// Validated, normalized base address of the Postal server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    base: String,
}

impl ResourceLocator {
    /// Validates `base_url` and standardizes it.
    ///
    /// A missing scheme defaults to `https`. Hosts containing `localhost` or
    /// `127.0.0.1` are always addressed over `http`, even when `https` was
    /// requested explicitly, so local development servers work without TLS.
    pub fn build(base_url: &str) -> PostalResult<Self> {
        let mut url = Self::validate(base_url)?;

        let host = url.host_str().unwrap_or_default();
        if host.contains("localhost") || host.contains("127.0.0.1") {
            // An explicit `:443` must survive the scheme change.
            let absolute = with_scheme(base_url);
            if let Some(rest) = absolute.strip_prefix("https://") {
                url = Url::parse(&format!("http://{}", rest))?;
            }
        }

        Ok(Self {
            base: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Parses `base_url`, prepending `https://` when no scheme is given.
    pub fn validate(base_url: &str) -> PostalResult<Url> {
        if base_url.is_empty() {
            return Err(PostalError::configuration("URL cannot be empty"));
        }

        let url = Url::parse(&with_scheme(base_url))?;

        if url.host_str().map_or(true, str::is_empty) {
            return Err(PostalError::configuration("URL must have a host"));
        }

        Ok(url)
    }

    /// Joins the base address with `path` using exactly one slash.
    pub fn join_path(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Returns the standardized base address without a trailing slash.
    pub fn as_str(&self) -> &str {
        &self.base
    }
}

fn with_scheme(base_url: &str) -> std::borrow::Cow<'_, str> {
    if base_url.starts_with("http://") || base_url.starts_with("https://") {
        base_url.into()
    } else {
        format!("https://{}", base_url).into()
    }
}

impl std::fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base)
    }
}
