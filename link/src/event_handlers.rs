//! Session lifecycle event handlers.
//!
//! Provides callback-based hooks the UI layer registers to react to session
//! changes it cannot observe from a single request:
//!
//! - [`on_session_expired`](SessionEventHandlers::on_session_expired): the
//!   refresh token was rejected; show a "session expired" notice
//! - [`on_login_required`](SessionEventHandlers::on_login_required): navigate
//!   to the login entry point
//! - [`on_auth_change`](SessionEventHandlers::on_auth_change): the session
//!   switched between authenticated and anonymous
//!
//! # Example
//!
//! ```rust,no_run
//! use tryout_link::{SessionEventHandlers, TryoutLinkClient};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handlers = SessionEventHandlers::new()
//!     .on_session_expired(|notice| eprintln!("{}", notice))
//!     .on_login_required(|path| println!("redirect to {}", path));
//!
//! let client = TryoutLinkClient::builder()
//!     .base_url("http://localhost:3000/api")
//!     .event_handlers(handlers)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

/// User-visible notice raised when the session cannot be refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionExpiredNotice {
    pub message: String,
}

impl SessionExpiredNotice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for SessionExpiredNotice {
    fn default() -> Self {
        Self::new("Your session has expired. Please log in again.")
    }
}

impl fmt::Display for SessionExpiredNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub type OnSessionExpiredCallback = Arc<dyn Fn(SessionExpiredNotice) + Send + Sync>;

/// Receives the login path to navigate to.
pub type OnLoginRequiredCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Receives the new `is_authenticated` value.
pub type OnAuthChangeCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Session lifecycle event handlers.
///
/// All handlers are optional. Handlers run synchronously on the task that
/// triggered the event and must not block.
#[derive(Clone, Default)]
pub struct SessionEventHandlers {
    pub(crate) on_session_expired: Option<OnSessionExpiredCallback>,
    pub(crate) on_login_required: Option<OnLoginRequiredCallback>,
    pub(crate) on_auth_change: Option<OnAuthChangeCallback>,
}

impl fmt::Debug for SessionEventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEventHandlers")
            .field("on_session_expired", &self.on_session_expired.is_some())
            .field("on_login_required", &self.on_login_required.is_some())
            .field("on_auth_change", &self.on_auth_change.is_some())
            .finish()
    }
}

impl SessionEventHandlers {
    /// Create a new empty `SessionEventHandlers` (no callbacks registered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked when a refresh fails and the session is
    /// cleared.
    pub fn on_session_expired(
        mut self,
        f: impl Fn(SessionExpiredNotice) + Send + Sync + 'static,
    ) -> Self {
        self.on_session_expired = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked when the user must be sent to the login
    /// entry point.
    ///
    /// # Example
    /// ```rust
    /// use tryout_link::SessionEventHandlers;
    ///
    /// let handlers = SessionEventHandlers::new()
    ///     .on_login_required(|path| println!("navigate: {}", path));
    /// ```
    pub fn on_login_required(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_login_required = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked whenever `is_authenticated` flips.
    pub fn on_auth_change(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_auth_change = Some(Arc::new(f));
        self
    }

    /// Returns `true` if any handler is registered.
    pub fn has_any(&self) -> bool {
        self.on_session_expired.is_some()
            || self.on_login_required.is_some()
            || self.on_auth_change.is_some()
    }

    pub(crate) fn emit_session_expired(&self, notice: SessionExpiredNotice) {
        if let Some(cb) = &self.on_session_expired {
            cb(notice);
        }
    }

    pub(crate) fn emit_login_required(&self, login_path: &str) {
        if let Some(cb) = &self.on_login_required {
            cb(login_path);
        }
    }

    pub(crate) fn emit_auth_change(&self, authenticated: bool) {
        if let Some(cb) = &self.on_auth_change {
            cb(authenticated);
        }
    }
}
