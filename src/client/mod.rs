//! Postal API client.
//!
//! Provides the main client interface for sending messages.

use std::sync::Arc;

use crate::auth::{ApiKeyAuth, AuthProvider};
use crate::config::PostalConfig;
use crate::errors::{PostalError, PostalResult};
use crate::middleware::Middleware;
use crate::transport::{
    ApiRequest, Executor, RequestContext, ReqwestExecutor, ResourceLocator, Transport,
};
use crate::types::{Message, RawMessage, SendResult};
use crate::validation::{validate_message, validate_raw_message};

/// Path of the structured send endpoint.
pub const SEND_MESSAGE_PATH: &str = "send/message";

/// Path of the raw send endpoint.
pub const SEND_RAW_PATH: &str = "send/raw";

/// The main Postal client.
///
/// Sending takes `&self` and may run concurrently from many tasks.
/// [`with_config`](Self::with_config) and
/// [`with_middleware`](Self::with_middleware) take `&mut self`, so the
/// client has to be configured before it is shared.
///
/// # Example
///
/// ```rust,no_run
/// use postal_client::{Message, PostalClient, RequestContext};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = PostalClient::new("https://postal.example.com", "your_api_key")?;
///
///     let message = Message {
///         to: vec!["user@example.com".to_string()],
///         from: "sender@example.com".to_string(),
///         subject: "Hello".to_string(),
///         html_body: Some("<p>Hello</p>".to_string()),
///         ..Default::default()
///     };
///
///     let result = client.send(&RequestContext::new(), &message).await?;
///     assert!(result.is_success());
///     Ok(())
/// }
/// ```
pub struct PostalClient {
    config: PostalConfig,
    transport: Transport,
}

impl PostalClient {
    /// Creates a new client builder.
    pub fn builder() -> PostalClientBuilder {
        PostalClientBuilder::new()
    }

    /// Creates a client with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PostalError::Configuration`] for an invalid base URL or an
    /// empty API key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> PostalResult<Self> {
        PostalClientBuilder::new()
            .base_url(base_url)
            .api_key(api_key)
            .build()
    }

    /// Validates and sends a message.
    ///
    /// # Errors
    ///
    /// Returns [`PostalError::Validation`] without contacting the server if
    /// the message is invalid; otherwise any error of
    /// [`Transport::submit`].
    pub async fn send(&self, ctx: &RequestContext, message: &Message) -> PostalResult<SendResult> {
        validate_message(message)?;
        self.transport
            .submit(ctx, ApiRequest::post(SEND_MESSAGE_PATH, message))
            .await
    }

    /// Validates and sends a pre-formatted message.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_raw(
        &self,
        ctx: &RequestContext,
        message: &RawMessage,
    ) -> PostalResult<SendResult> {
        validate_raw_message(message)?;
        self.transport
            .submit(ctx, ApiRequest::post(SEND_RAW_PATH, message))
            .await
    }

    /// Adds a middleware. The first middleware added is the outermost.
    pub fn with_middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.transport.add_middleware(Arc::new(middleware));
        self
    }

    /// Replaces the configuration for subsequent calls.
    ///
    /// `max_concurrency` only takes effect when the client is built.
    ///
    /// # Errors
    ///
    /// Returns [`PostalError::Configuration`]
    /// if `config` fails validation; the current configuration is kept.
    pub fn with_config(&mut self, config: PostalConfig) -> PostalResult<&mut Self> {
        config.validate()?;
        self.transport.apply_config(&config);
        self.config = config;
        Ok(self)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PostalConfig {
        &self.config
    }

    /// Returns the standardized base address.
    pub fn base_url(&self) -> &str {
        self.transport.locator().as_str()
    }
}

impl std::fmt::Debug for PostalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostalClient")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .finish()
    }
}

/// Builder for the Postal client.
#[derive(Default)]
pub struct PostalClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    config: PostalConfig,
    executor: Option<Arc<dyn Executor>>,
    auth: Option<Arc<dyn AuthProvider>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl PostalClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: PostalConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a custom base executor in place of the reqwest one.
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Sets a custom auth provider.
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Adds a middleware. The first middleware added is the outermost.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`PostalError::Configuration`] if the base URL is missing or
    /// invalid, no usable credentials were given, the configuration is
    /// invalid, or the HTTP client cannot be created.
    pub fn build(self) -> PostalResult<PostalClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| PostalError::configuration("base URL is required"))?;
        let locator = ResourceLocator::build(&base_url)?;

        let auth: Arc<dyn AuthProvider> = match (self.auth, self.api_key) {
            (Some(auth), _) => auth,
            (None, Some(api_key)) => Arc::new(ApiKeyAuth::from_string(api_key)),
            (None, None) => return Err(PostalError::configuration("API key is required")),
        };
        auth.validate()?;

        self.config.validate()?;

        let executor: Arc<dyn Executor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(ReqwestExecutor::new(self.config.max_concurrency).map_err(|e| {
                PostalError::configuration(format!("failed to create HTTP client: {}", e))
            })?),
        };

        let mut transport = Transport::new(locator, auth, executor);
        transport.apply_config(&self.config);
        for middleware in self.middleware {
            transport.add_middleware(middleware);
        }

        tracing::debug!(base_url = %transport.locator(), "Postal client created");

        Ok(PostalClient {
            config: self.config,
            transport,
        })
    }
}

impl std::fmt::Debug for PostalClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostalClientBuilder")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("config", &self.config)
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TIMEOUT;
    use crate::errors::ErrorKind;
    use crate::mocks::{MockExecutor, MockResponse};
    use crate::transport::{executor_fn, HttpRequest};
    use http::header::HeaderValue;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn message() -> Message {
        Message {
            to: vec!["a@b.co".to_string()],
            from: "s@d.com".to_string(),
            subject: "Hi".to_string(),
            plain_body: Some("hi".to_string()),
            ..Default::default()
        }
    }

    fn client(mock: &Arc<MockExecutor>) -> PostalClient {
        PostalClient::builder()
            .base_url("postal.example.com")
            .api_key("srv_key")
            .executor(Arc::clone(mock) as Arc<dyn Executor>)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_message() {
        let mock = Arc::new(MockExecutor::new().with_response(MockResponse::success("m1")));
        let client = client(&mock);

        let result = client
            .send(&RequestContext::new(), &message())
            .await
            .unwrap();

        assert_eq!(result.message_id, "m1");
        assert!(result.is_success());

        let sent = mock.last_request().unwrap();
        assert_eq!(sent.url.as_str(), "https://postal.example.com/send/message");
        assert_eq!(sent.timeout, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_invalid_message_never_sent() {
        let mock = Arc::new(MockExecutor::new().with_response(MockResponse::success("m1")));
        let client = client(&mock);

        let err = client
            .send(&RequestContext::new(), &Message::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_send_raw() {
        let mock = Arc::new(MockExecutor::new().with_response(MockResponse::success("r1")));
        let client = client(&mock);

        let raw = RawMessage {
            mail: "Subject: hi\r\n\r\nhi".to_string(),
            to: vec!["a@b.co".to_string()],
            from: "s@d.com".to_string(),
            ..Default::default()
        };
        let result = client.send_raw(&RequestContext::new(), &raw).await.unwrap();

        assert_eq!(result.message_id, "r1");
        let sent = mock.last_request().unwrap();
        assert_eq!(sent.path(), "/send/raw");
        let body: RawMessage = serde_json::from_slice(&sent.body).unwrap();
        assert_eq!(body, raw);
    }

    #[tokio::test]
    async fn test_with_config_affects_later_calls() {
        let mock = Arc::new(MockExecutor::new());
        mock.set_default(MockResponse::success("m1"));
        let mut client = client(&mock);

        client
            .with_config(PostalConfig {
                timeout: Duration::from_secs(2),
                debug: true,
                ..PostalConfig::default()
            })
            .unwrap();
        client
            .send(&RequestContext::new(), &message())
            .await
            .unwrap();

        assert_eq!(client.config().timeout, Duration::from_secs(2));
        assert_eq!(
            mock.last_request().unwrap().timeout,
            Some(Duration::from_secs(2))
        );
    }

    #[tokio::test]
    async fn test_with_config_rejects_invalid() {
        let mock = Arc::new(MockExecutor::new());
        mock.set_default(MockResponse::success("m1"));
        let mut client = client(&mock);

        let err = client
            .with_config(PostalConfig {
                timeout: Duration::ZERO,
                ..PostalConfig::default()
            })
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(client.config().timeout, DEFAULT_TIMEOUT);
        client
            .send(&RequestContext::new(), &message())
            .await
            .unwrap();
        assert_eq!(mock.last_request().unwrap().timeout, Some(DEFAULT_TIMEOUT));
    }

    #[tokio::test]
    async fn test_middleware_order() {
        let mock = Arc::new(MockExecutor::new().with_response(MockResponse::success("m1")));
        let order = Arc::new(Mutex::new(Vec::new()));

        let tag = |name: &'static str, order: Arc<Mutex<Vec<&'static str>>>| {
            move |next: Arc<dyn Executor>| -> Arc<dyn Executor> {
                let order = Arc::clone(&order);
                executor_fn(move |mut req: HttpRequest| {
                    let next = Arc::clone(&next);
                    let order = Arc::clone(&order);
                    async move {
                        order.lock().push(name);
                        req.headers
                            .append("x-layers", HeaderValue::from_static(name));
                        next.execute(&req).await
                    }
                })
            }
        };

        let mut client = client(&mock);
        client
            .with_middleware(tag("outer", Arc::clone(&order)))
            .with_middleware(tag("inner", Arc::clone(&order)));

        client
            .send(&RequestContext::new(), &message())
            .await
            .unwrap();

        assert_eq!(*order.lock(), vec!["outer", "inner"]);
        let sent = mock.last_request().unwrap();
        let layers: Vec<_> = sent
            .headers
            .get_all("x-layers")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(layers, vec!["outer", "inner"]);
    }

    #[test]
    fn test_builder_requires_base_url() {
        let err = PostalClient::builder().api_key("srv_key").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_builder_requires_api_key() {
        let err = PostalClient::builder()
            .base_url("https://postal.example.com")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = PostalClient::builder()
            .base_url("https://postal.example.com")
            .api_key("")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        assert!(PostalClient::builder()
            .base_url("")
            .api_key("srv_key")
            .build()
            .is_err());
        assert!(PostalClient::builder()
            .base_url("https://")
            .api_key("srv_key")
            .build()
            .is_err());
    }

    #[test]
    fn test_localhost_is_standardized_to_http() {
        let mock = Arc::new(MockExecutor::new());
        let client = PostalClient::builder()
            .base_url("https://localhost:5000/")
            .api_key("srv_key")
            .executor(Arc::clone(&mock) as Arc<dyn Executor>)
            .build()
            .unwrap();

        assert_eq!(client.base_url(), "http://localhost:5000");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let builder = PostalClient::builder().api_key("srv_secret");
        assert!(!format!("{:?}", builder).contains("srv_secret"));
    }
}
