//! Main platform API client with builder pattern.
//!
//! [`TryoutLinkClient`] is the single choke point for backend calls. It
//! attaches the session's bearer token, refreshes it transparently on a 401
//! and unwraps the response envelope to the payload type the caller asks for.

use crate::{
    auth::{AuthBootstrap, BootstrapOutcome, TokenRefresher},
    config::ApiRoutes,
    error::{Result, TryoutLinkError},
    event_handlers::SessionEventHandlers,
    models::HttpVersion,
    pipeline::{PreparedRequest, RefreshOnUnauthorized, RequestConfig, Transport},
    session::SessionStore,
    timeouts::TryoutLinkTimeouts,
};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Platform API client.
///
/// Use [`TryoutLinkClientBuilder`] to construct instances. Clones share the
/// HTTP connection pool, the session and the refresher.
///
/// # Examples
///
/// ```rust,no_run
/// use serde::Deserialize;
/// use tryout_link::TryoutLinkClient;
///
/// #[derive(Deserialize)]
/// struct Exam {
///     id: i64,
///     title: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = TryoutLinkClient::builder()
///     .base_url("http://localhost:3000/api")
///     .timeout(std::time::Duration::from_secs(30))
///     .build()?;
///
/// client.login("a@x.com", "Passw0rd", true).await?;
/// let exams: Vec<Exam> = client.get("/exams").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TryoutLinkClient {
    transport: Transport,
    pipeline: RefreshOnUnauthorized,
    session: SessionStore,
    refresher: TokenRefresher,
    routes: Arc<ApiRoutes>,
    bootstrap: Arc<AuthBootstrap>,
    timeouts: TryoutLinkTimeouts,
}

impl TryoutLinkClient {
    /// Create a new builder for configuring the client
    pub fn builder() -> TryoutLinkClientBuilder {
        TryoutLinkClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// The session this client reads tokens from and writes refreshes to.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn routes(&self) -> &ApiRoutes {
        &self.routes
    }

    pub fn timeouts(&self) -> &TryoutLinkTimeouts {
        &self.timeouts
    }

    /// Shared single-flight refresher used by the pipeline.
    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    /// Validate a persisted session once per client. See
    /// [`AuthBootstrap`](crate::auth::AuthBootstrap).
    pub async fn bootstrap(&self) -> BootstrapOutcome {
        self.bootstrap.run(self).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with(path, RequestConfig::default()).await
    }

    pub async fn get_with<T: DeserializeOwned>(&self, path: &str, config: RequestConfig) -> Result<T> {
        self.request(Method::GET, path, None, config).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post_with(path, body, RequestConfig::default()).await
    }

    pub async fn post_with<B, T>(&self, path: &str, body: &B, config: RequestConfig) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(to_json(body)?), config)
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.put_with(path, body, RequestConfig::default()).await
    }

    pub async fn put_with<B, T>(&self, path: &str, body: &B, config: RequestConfig) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, path, Some(to_json(body)?), config)
            .await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.patch_with(path, body, RequestConfig::default()).await
    }

    pub async fn patch_with<B, T>(&self, path: &str, body: &B, config: RequestConfig) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PATCH, path, Some(to_json(body)?), config)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.delete_with(path, RequestConfig::default()).await
    }

    pub async fn delete_with<T: DeserializeOwned>(&self, path: &str, config: RequestConfig) -> Result<T> {
        self.request(Method::DELETE, path, None, config).await
    }

    /// Send a request through the pipeline and decode the unwrapped payload.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
        config: RequestConfig,
    ) -> Result<T> {
        let mut request = PreparedRequest::new(method, path).with_config(config);
        if let Some(body) = body {
            request = request.with_body(body);
        }

        let data = self.pipeline.execute(request).await?;
        serde_json::from_value(data).map_err(|e| {
            TryoutLinkError::SerializationError(format!(
                "Unexpected payload for {}: {}",
                path, e
            ))
        })
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<JsonValue> {
    serde_json::to_value(body).map_err(TryoutLinkError::from)
}

/// Builder for configuring [`TryoutLinkClient`] instances.
pub struct TryoutLinkClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    timeouts: TryoutLinkTimeouts,
    http_version: HttpVersion,
    session: Option<SessionStore>,
    handlers: Option<SessionEventHandlers>,
    routes: ApiRoutes,
}

impl Default for TryoutLinkClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TryoutLinkClientBuilder {
    fn new() -> Self {
        let timeouts = TryoutLinkTimeouts::default();
        Self {
            base_url: None,
            timeout: timeouts.receive_timeout,
            timeouts,
            http_version: HttpVersion::default(),
            session: None,
            handlers: None,
            routes: ApiRoutes::default(),
        }
    }

    /// Set the API base URL, e.g. `https://tryout.example.com/api`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set request timeout (for HTTP requests)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set comprehensive timeout configuration.
    ///
    /// This overrides individual timeout settings like `timeout()`.
    pub fn timeouts(mut self, timeouts: TryoutLinkTimeouts) -> Self {
        self.timeout = timeouts.receive_timeout;
        self.timeouts = timeouts;
        self
    }

    pub fn http_version(mut self, version: HttpVersion) -> Self {
        self.http_version = version;
        self
    }

    /// Use an existing session store. Without one, a store with in-memory
    /// storage is created.
    pub fn session(mut self, session: SessionStore) -> Self {
        self.session = Some(session);
        self
    }

    /// Register session lifecycle callbacks on the session store.
    pub fn event_handlers(mut self, handlers: SessionEventHandlers) -> Self {
        self.handlers = Some(handlers);
        self
    }

    pub fn routes(mut self, routes: ApiRoutes) -> Self {
        self.routes = routes;
        self
    }

    /// Set the UI route used for the login redirect.
    pub fn login_redirect(mut self, path: impl Into<String>) -> Self {
        self.routes.login_redirect = path.into();
        self
    }

    /// Build the client
    pub fn build(self) -> Result<TryoutLinkClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| TryoutLinkError::ConfigurationError("base_url is required".into()))?;

        let mut client_builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeouts.connection_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));

        client_builder = match self.http_version {
            HttpVersion::Http1 => {
                log::debug!("[CLIENT] Using HTTP/1.1 only");
                client_builder.http1_only()
            },
            HttpVersion::Http2 => {
                log::debug!("[CLIENT] Using HTTP/2 with prior knowledge");
                client_builder.http2_prior_knowledge()
            },
            HttpVersion::Auto => client_builder,
        };

        let http_client = client_builder
            .build()
            .map_err(|e| TryoutLinkError::ConfigurationError(e.to_string()))?;

        let session = self.session.unwrap_or_default();
        if let Some(handlers) = self.handlers {
            session.set_event_handlers(handlers);
        }

        let transport = Transport::new(base_url, http_client);
        let refresher = TokenRefresher::new(
            transport.clone(),
            session.clone(),
            self.routes.refresh.clone(),
            self.routes.login_redirect.clone(),
            self.timeouts.refresh_timeout,
        );
        let pipeline = RefreshOnUnauthorized::new(transport.clone(), session.clone(), refresher.clone());
        let bootstrap = Arc::new(AuthBootstrap::new(self.routes.me.clone()));

        Ok(TryoutLinkClient {
            transport,
            pipeline,
            session,
            refresher,
            routes: Arc::new(self.routes),
            bootstrap,
            timeouts: self.timeouts,
        })
    }
}
