//! Request pipeline.
//!
//! Every API call goes through two named stages:
//!
//! 1. [`Transport`]: a single HTTP attempt. It builds the request, attaches
//!    the bearer token it is given, sends it and unwraps the response
//!    envelope down to its `data` payload.
//! 2. [`RefreshOnUnauthorized`]: reads the bearer token from the session,
//!    runs the transport, and on a 401 refreshes the token pair once and
//!    re-issues the request with the new access token.
//!
//! Transient failures are never retried here; that is the query layer's job.

use crate::auth::refresh::TokenRefresher;
use crate::error::{ApiError, Result, TryoutLinkError};
use crate::models::ApiEnvelope;
use crate::session::SessionStore;
use log::{debug, warn};
use reqwest::Method;
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    /// Send without a bearer token and never refresh on 401.
    pub skip_auth: bool,
    /// Overrides the client-wide request timeout.
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// An API call waiting to be sent (or re-sent).
///
/// The body is kept as JSON so the request can be rebuilt for the retry;
/// reqwest request builders with bodies cannot be cloned.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<JsonValue>,
    pub config: RequestConfig,
    retried: bool,
}

impl PreparedRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            config: RequestConfig::default(),
            retried: false,
        }
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether this request has already been re-issued after a refresh.
    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

/// Single-attempt HTTP transport with envelope unwrapping.
#[derive(Clone)]
pub(crate) struct Transport {
    base_url: String,
    http_client: reqwest::Client,
}

impl Transport {
    pub(crate) fn new(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send `request` once and return the envelope's `data`.
    pub(crate) async fn send(
        &self,
        request: &PreparedRequest,
        bearer: Option<&str>,
    ) -> Result<JsonValue> {
        let url = self.url_for(&request.path);
        let mut builder = self.http_client.request(request.method.clone(), &url);

        if !request.config.query.is_empty() {
            builder = builder.query(&request.config.query);
        }
        for (name, value) in &request.config.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let start = Instant::now();
        debug!(
            "[API_HTTP] {} {} (auth={}, retried={})",
            request.method,
            request.path,
            bearer.is_some(),
            request.retried
        );

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        let duration_ms = start.elapsed().as_millis();

        if !status.is_success() {
            let error = ApiError::from_body(status.as_u16(), &body);
            warn!(
                "[API_HTTP] {} {} failed: status={} message=\"{}\" duration_ms={}",
                request.method, request.path, status, error.message, duration_ms
            );
            return Err(error.into());
        }

        debug!(
            "[API_HTTP] {} {} status={} duration_ms={}",
            request.method, request.path, status, duration_ms
        );
        unwrap_envelope(status.as_u16(), &body)
    }
}

/// Strip the success envelope. A `success: false` body is an error even when
/// the status code is 2xx.
pub(crate) fn unwrap_envelope(status_code: u16, body: &str) -> Result<JsonValue> {
    if body.trim().is_empty() {
        return Ok(JsonValue::Null);
    }

    let envelope: ApiEnvelope = serde_json::from_str(body).map_err(|e| {
        TryoutLinkError::SerializationError(format!("Invalid response envelope: {}", e))
    })?;

    if !envelope.success {
        return Err(ApiError::from_body(status_code, body).into());
    }

    Ok(envelope.data.unwrap_or(JsonValue::Null))
}

/// Pipeline step: attach the bearer token, and on a 401 refresh once and
/// retry.
///
/// Contract:
/// - the request is sent with the session's current access token, unless
///   `skip_auth` is set;
/// - a 401 on a request that was not retried yet marks it retried, awaits the
///   refresh and re-sends it with the new access token;
/// - a 401 on the retried request, and every other error, is returned as is;
/// - if the refresh fails the original 401 is returned. The refresher has
///   already cleared the session and raised the expiry events;
/// - if the session was cleared while the request was in flight, the 401 is
///   returned without a refresh and without expiry events.
#[derive(Clone)]
pub struct RefreshOnUnauthorized {
    transport: Transport,
    session: SessionStore,
    refresher: TokenRefresher,
}

impl RefreshOnUnauthorized {
    pub(crate) fn new(transport: Transport, session: SessionStore, refresher: TokenRefresher) -> Self {
        Self {
            transport,
            session,
            refresher,
        }
    }

    pub async fn execute(&self, mut request: PreparedRequest) -> Result<JsonValue> {
        let sent_with = if request.config.skip_auth {
            None
        } else {
            self.session.access_token()
        };

        match self.transport.send(&request, sent_with.as_deref()).await {
            Err(err) if err.is_unauthorized() && !request.retried && !request.config.skip_auth => {
                request.retried = true;
                let token = match self.fresh_access_token(sent_with.as_deref()).await {
                    Ok(token) => token,
                    Err(refresh_err) => {
                        warn!(
                            "[API_HTTP] {} {} unauthorized and refresh failed: {}",
                            request.method, request.path, refresh_err
                        );
                        return Err(err);
                    },
                };
                debug!("[API_HTTP] Retrying {} {} after refresh", request.method, request.path);
                self.transport.send(&request, Some(&token)).await
            },
            other => other,
        }
    }

    /// Access token to retry with. If another call already refreshed while
    /// this request was in flight, its token is reused instead of spending the
    /// refresh token again.
    ///
    /// A request sent with a token that has since been cleared (logout, or a
    /// failed refresh that already raised the expiry) gives up quietly.
    async fn fresh_access_token(&self, sent_with: Option<&str>) -> Result<String> {
        match (self.session.access_token(), sent_with) {
            (Some(current), _) if Some(current.as_str()) != sent_with => {
                debug!("[AUTH_REFRESH] Token already rotated by a concurrent refresh");
                return Ok(current);
            },
            (None, Some(_)) => {
                debug!("[AUTH_REFRESH] Session cleared while the request was in flight");
                return Err(TryoutLinkError::SessionExpired);
            },
            _ => {},
        }
        let tokens = self.refresher.refresh().await?;
        Ok(tokens.access_token)
    }
}
