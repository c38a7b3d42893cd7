//! Token refresh flow.
//!
//! Exchanges the refresh token for a new token pair while keeping the current
//! user and storage scope. Refreshes are single-flight: callers that ask for a
//! refresh while one is already running await the same call instead of
//! spending the refresh token a second time.
//!
//! The call runs as its own task. A waiter that gives up (timeout, dropped
//! view) does not abort it, and the rotated pair is stored either way.

use crate::error::{Result, TryoutLinkError};
use crate::event_handlers::SessionExpiredNotice;
use crate::models::{RefreshRequest, RefreshResponse, TokenPair};
use crate::pipeline::{PreparedRequest, RequestConfig, Transport};
use crate::session::SessionStore;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use log::{debug, error, warn};
use parking_lot::Mutex;
use reqwest::Method;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

type SharedRefresh = Shared<BoxFuture<'static, Result<TokenPair>>>;

struct InFlight {
    generation: u64,
    future: SharedRefresh,
}

/// Everything one refresh call needs. Cloned into the shared future so the
/// future does not keep the refresher itself alive.
#[derive(Clone)]
struct RefreshCall {
    transport: Transport,
    session: SessionStore,
    refresh_path: String,
    login_redirect: String,
    timeout: Duration,
}

impl RefreshCall {
    async fn run(self) -> Result<TokenPair> {
        let Some(refresh_token) = self.session.refresh_token() else {
            debug!("[AUTH_REFRESH] No refresh token held");
            self.expire();
            return Err(TryoutLinkError::SessionExpired);
        };

        let body = serde_json::to_value(RefreshRequest {
            refresh_token: refresh_token.clone(),
        })?;
        let request = PreparedRequest::new(Method::POST, &self.refresh_path)
            .with_body(body)
            .with_config(RequestConfig::new().skip_auth().timeout(self.timeout));

        let response = self.transport.send(&request, None).await.and_then(|data| {
            serde_json::from_value::<RefreshResponse>(data).map_err(TryoutLinkError::from)
        });

        let current = self.session.snapshot();
        if current.refresh_token() != Some(refresh_token.as_str()) {
            // Logged out or logged in again while the refresh was running. The
            // new session wins and no expiry is raised for the old one.
            warn!("[AUTH_REFRESH] Session changed during refresh, discarding outcome");
            return current.tokens().ok_or(TryoutLinkError::SessionExpired);
        }

        match response {
            Ok(RefreshResponse { tokens }) => {
                self.session.set_auth(current.user().cloned(), tokens.clone(), current.remember_me());
                debug!("[AUTH_REFRESH] Token pair rotated");
                Ok(tokens)
            },
            Err(e) => {
                warn!("[AUTH_REFRESH] Refresh failed: {}", e);
                self.expire();
                Err(TryoutLinkError::SessionExpired)
            },
        }
    }

    /// Terminal failure: drop the session, tell the user, send them to login.
    fn expire(&self) {
        self.session.clear_auth();
        let handlers = self.session.event_handlers();
        handlers.emit_session_expired(SessionExpiredNotice::default());
        handlers.emit_login_required(&self.login_redirect);
    }
}

struct RefresherInner {
    call: RefreshCall,
    in_flight: Mutex<Option<InFlight>>,
    next_generation: AtomicU64,
}

impl RefresherInner {
    fn finish(&self, generation: u64) {
        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|f| f.generation == generation) {
            *slot = None;
        }
    }
}

/// Single-flight token refresher shared by every request of a client.
#[derive(Clone)]
pub struct TokenRefresher {
    inner: Arc<RefresherInner>,
}

impl TokenRefresher {
    pub(crate) fn new(
        transport: Transport,
        session: SessionStore,
        refresh_path: impl Into<String>,
        login_redirect: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(RefresherInner {
                call: RefreshCall {
                    transport,
                    session,
                    refresh_path: refresh_path.into(),
                    login_redirect: login_redirect.into(),
                    timeout,
                },
                in_flight: Mutex::new(None),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Refresh the token pair, joining a refresh that is already running.
    ///
    /// On failure the session is cleared, the session-expired notice and the
    /// login redirect are raised once, and every waiter gets
    /// [`TryoutLinkError::SessionExpired`].
    pub async fn refresh(&self) -> Result<TokenPair> {
        let (generation, future) = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(in_flight) => {
                    debug!("[AUTH_REFRESH] Joining in-flight refresh");
                    (in_flight.generation, in_flight.future.clone())
                },
                None => {
                    let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                    let inner = Arc::clone(&self.inner);
                    let task = tokio::spawn(async move {
                        let result = inner.call.clone().run().await;
                        inner.finish(generation);
                        result
                    });
                    let future = async move {
                        task.await.unwrap_or_else(|e| {
                            error!("[AUTH_REFRESH] Refresh task did not complete: {}", e);
                            Err(TryoutLinkError::Cancelled)
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(InFlight {
                        generation,
                        future: future.clone(),
                    });
                    (generation, future)
                },
            }
        };

        let result = future.await;
        // The task clears its own slot; this covers a task that panicked.
        self.inner.finish(generation);
        result
    }

    /// Whether a refresh call is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }
}
