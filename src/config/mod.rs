//! Configuration module for the Postal client.
//!
//! [`PostalConfig`] is a plain value object. Replacing it on a client
//! affects later calls only; calls already in flight keep the settings
//! they started with.

use std::time::Duration;

use crate::errors::{PostalError, PostalResult};

/// Default request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum retry count.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default interval between retries.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Default concurrency hint.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Runtime settings for the Postal client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostalConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt, used by
    /// [`RetryConfig::from_config`](crate::resilience::RetryConfig::from_config).
    pub max_retries: u32,
    /// Wait between retries.
    pub retry_interval: Duration,
    /// Idle connections kept per host by the default executor.
    pub max_concurrency: usize,
    /// Log request and response bodies.
    pub debug: bool,
}

impl Default for PostalConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            debug: false,
        }
    }
}

impl PostalConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> PostalConfigBuilder {
        PostalConfigBuilder::new()
    }

    /// Checks the configuration for values the client cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`PostalError::Configuration`] for a zero timeout or a zero
    /// concurrency hint.
    pub fn validate(&self) -> PostalResult<()> {
        if self.timeout.is_zero() {
            return Err(PostalError::configuration("timeout must be greater than zero"));
        }
        if self.max_concurrency == 0 {
            return Err(PostalError::configuration(
                "max concurrency must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Builder for `PostalConfig`.
#[derive(Debug, Default)]
pub struct PostalConfigBuilder {
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_interval: Option<Duration>,
    max_concurrency: Option<usize>,
    debug: bool,
}

impl PostalConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    /// Sets the maximum retry count.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the interval between retries.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = Some(interval);
        self
    }

    /// Sets the concurrency hint.
    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    /// Enables body logging.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> PostalResult<PostalConfig> {
        let config = PostalConfig {
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_interval: self.retry_interval.unwrap_or(DEFAULT_RETRY_INTERVAL),
            max_concurrency: self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
            debug: self.debug,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PostalConfig::default();

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_interval, Duration::from_secs(1));
        assert_eq!(config.max_concurrency, 10);
        assert!(!config.debug);
    }

    #[test]
    fn test_config_builder_success() {
        let config = PostalConfig::builder()
            .timeout_secs(5)
            .max_retries(0)
            .retry_interval(Duration::from_millis(250))
            .max_concurrency(4)
            .debug(true)
            .build()
            .unwrap();

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_interval, Duration::from_millis(250));
        assert_eq!(config.max_concurrency, 4);
        assert!(config.debug);
    }

    #[test]
    fn test_config_builder_defaults_match_default() {
        assert_eq!(PostalConfig::builder().build().unwrap(), PostalConfig::default());
    }

    #[test]
    fn test_config_builder_rejects_zero_timeout() {
        let err = PostalConfig::builder()
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "configuration_error");
    }

    #[test]
    fn test_config_builder_rejects_zero_concurrency() {
        assert!(PostalConfig::builder().max_concurrency(0).build().is_err());
    }
}
