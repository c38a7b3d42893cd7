//! Session store: the single owner of the current user and token pair.
//!
//! The store is an explicit context handed to the client, the refresher and
//! the bootstrap at construction time. It is cheap to clone (`Arc` inside) and
//! every clone sees the same session.
//!
//! State changes only through four actions: [`SessionStore::set_auth`],
//! [`SessionStore::clear_auth`], [`SessionStore::update_user`] and
//! [`SessionStore::set_loading`]. Each takes the state lock once, so readers
//! never observe a partially applied action. Persisting to storage happens
//! after the state lock is released; a separate writer lock keeps persisted
//! writes in the same order as the state changes.

use crate::event_handlers::SessionEventHandlers;
use crate::models::{TokenPair, User};
use crate::storage::{SessionStorage, StorageScope};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot of the session.
///
/// `is_authenticated()` is derived from the token pair, never stored, so it
/// holds if and only if both tokens are present.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<User>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    remember_me: bool,
    is_loading: bool,
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Token pair, if both tokens are present.
    pub fn tokens(&self) -> Option<TokenPair> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.refresh_token.is_some()
    }

    /// True while the startup session check is in progress.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Whether the tokens are kept in durable storage.
    pub fn remember_me(&self) -> bool {
        self.remember_me
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("remember_me", &self.remember_me)
            .field("is_loading", &self.is_loading)
            .finish()
    }
}

struct StoreInner {
    state: RwLock<Session>,
    writer: Mutex<()>,
    storage: SessionStorage,
    changes: watch::Sender<Session>,
    handlers: RwLock<SessionEventHandlers>,
}

/// Shared handle to the session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    /// Create the store, rehydrating the token pair from `storage`.
    ///
    /// A rehydrated session holds tokens but no user and starts with
    /// `is_loading() == true` until the bootstrap has validated it. An empty
    /// storage also starts loading so route guards wait for the bootstrap.
    pub fn restore(storage: SessionStorage) -> Self {
        let mut session = Session {
            is_loading: true,
            ..Session::default()
        };

        match storage.load() {
            Ok(Some((tokens, scope))) => {
                debug!("[SESSION] Rehydrated token pair from {:?} storage", scope);
                session.access_token = Some(tokens.access_token);
                session.refresh_token = Some(tokens.refresh_token);
                session.remember_me = scope.is_durable();
            },
            Ok(None) => debug!("[SESSION] No persisted tokens"),
            Err(e) => warn!("[SESSION] Failed to read persisted tokens: {}", e),
        }

        let (changes, _) = watch::channel(session.clone());
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(session),
                writer: Mutex::new(()),
                storage,
                changes,
                handlers: RwLock::new(SessionEventHandlers::default()),
            }),
        }
    }

    /// Store backed by fresh in-memory storage.
    pub fn in_memory() -> Self {
        Self::restore(SessionStorage::in_memory())
    }

    /// Current session (cloned).
    pub fn snapshot(&self) -> Session {
        self.inner.state.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.state.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner.state.read().refresh_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.read().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.read().is_loading
    }

    /// Receive every session change. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.changes.subscribe()
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.inner.storage
    }

    /// Replace the registered event handlers.
    pub fn set_event_handlers(&self, handlers: SessionEventHandlers) {
        *self.inner.handlers.write() = handlers;
    }

    pub(crate) fn event_handlers(&self) -> SessionEventHandlers {
        self.inner.handlers.read().clone()
    }

    /// Store an authenticated session and persist the token pair into the
    /// scope selected by `remember_me`.
    pub fn set_auth(&self, user: Option<User>, tokens: TokenPair, remember_me: bool) {
        let scope = StorageScope::from_remember_me(remember_me);
        let persisted = tokens.clone();
        self.apply(
            |session| {
                session.user = user;
                session.access_token = Some(tokens.access_token);
                session.refresh_token = Some(tokens.refresh_token);
                session.remember_me = remember_me;
            },
            |storage| {
                if let Err(e) = storage.persist(&persisted, scope) {
                    warn!("[SESSION] Failed to persist tokens to {:?} storage: {}", scope, e);
                }
            },
        );
        debug!("[SESSION] Authenticated (scope={:?})", scope);
    }

    /// Reset to the empty session and remove persisted tokens from both scopes.
    pub fn clear_auth(&self) {
        self.apply(
            |session| *session = Session::default(),
            |storage| {
                if let Err(e) = storage.clear() {
                    warn!("[SESSION] Failed to remove persisted tokens: {}", e);
                }
            },
        );
        debug!("[SESSION] Cleared");
    }

    /// Replace the user only. Tokens are untouched.
    pub fn update_user(&self, user: User) {
        self.apply(|session| session.user = Some(user), |_| {});
    }

    pub fn set_loading(&self, loading: bool) {
        self.apply(|session| session.is_loading = loading, |_| {});
    }

    fn apply(&self, action: impl FnOnce(&mut Session), persist: impl FnOnce(&SessionStorage)) {
        let (was_authenticated, is_authenticated) = {
            let _writer = self.inner.writer.lock();
            let (before, snapshot) = {
                let mut state = self.inner.state.write();
                let before = state.is_authenticated();
                action(&mut state);
                (before, state.clone())
            };
            persist(&self.inner.storage);
            let after = snapshot.is_authenticated();
            // Still under the writer lock so subscribers see actions in order.
            self.inner.changes.send_replace(snapshot);
            (before, after)
        };

        if was_authenticated != is_authenticated {
            self.event_handlers().emit_auth_change(is_authenticated);
        }
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &*self.inner.state.read())
            .finish()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
