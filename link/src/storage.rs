//! Persisted token storage.
//!
//! Mirrors the browser storage model the platform front-end relies on: a
//! durable scope that survives restarts ("remember me") and a tab-scoped one
//! that lives only as long as the current process. Both hold the token pair
//! under the fixed keys [`ACCESS_TOKEN_KEY`] and [`REFRESH_TOKEN_KEY`].
//!
//! Backends implement [`TokenStorage`]; [`MemoryTokenStorage`] and
//! [`FileTokenStorage`] are provided.

mod file;

pub use file::FileTokenStorage;

use crate::error::Result;
use crate::models::TokenPair;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Key/value storage backend for persisted tokens.
///
/// Methods take `&self`: a backend is shared between the session store and
/// whoever else inspects it, so implementations use interior mutability.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use tryout_link::storage::TokenStorage;
///
/// struct KeychainStorage;
///
/// impl TokenStorage for KeychainStorage {
///     fn get_item(&self, key: &str) -> Result<Option<String>> {
///         // Read from the OS keychain
///         Ok(None)
///     }
///
///     fn set_item(&self, key: &str, value: &str) -> Result<()> {
///         Ok(())
///     }
///
///     fn remove_item(&self, key: &str) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait TokenStorage: Send + Sync {
    /// Returns `Ok(None)` if nothing is stored under `key`.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Overwrites any existing value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Returns `Ok(())` even if nothing was stored.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Write several keys. Backends that can should apply them in one write so
    /// a crash never leaves half of a token pair behind.
    fn set_items(&self, items: &[(&str, &str)]) -> Result<()> {
        for (key, value) in items {
            self.set_item(key, value)?;
        }
        Ok(())
    }

    fn remove_items(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove_item(key)?;
        }
        Ok(())
    }

    /// Read the token pair. Both keys must be present.
    fn load_tokens(&self) -> Result<Option<TokenPair>> {
        let access = self.get_item(ACCESS_TOKEN_KEY)?;
        let refresh = self.get_item(REFRESH_TOKEN_KEY)?;
        Ok(match (access, refresh) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => None,
        })
    }

    fn save_tokens(&self, tokens: &TokenPair) -> Result<()> {
        self.set_items(&[
            (ACCESS_TOKEN_KEY, &tokens.access_token),
            (REFRESH_TOKEN_KEY, &tokens.refresh_token),
        ])
    }

    fn remove_tokens(&self) -> Result<()> {
        self.remove_items(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])
    }
}

/// In-memory storage.
///
/// Does NOT persist across restarts. Used as the tab-scoped backend and, in
/// tests, as a durable backend that outlives a simulated reload by sharing the
/// same instance. Clones share the same map.
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStorage {
    items: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().remove(key);
        Ok(())
    }

    fn set_items(&self, items: &[(&str, &str)]) -> Result<()> {
        let mut map = self.items.write();
        for (key, value) in items {
            map.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove_items(&self, keys: &[&str]) -> Result<()> {
        let mut map = self.items.write();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// Which storage scope holds the persisted token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScope {
    /// Survives restarts ("remember me" checked).
    Durable,
    /// Lives only for the current process.
    Tab,
}

impl StorageScope {
    pub fn from_remember_me(remember_me: bool) -> Self {
        if remember_me {
            StorageScope::Durable
        } else {
            StorageScope::Tab
        }
    }

    pub fn is_durable(self) -> bool {
        self == StorageScope::Durable
    }
}

/// Pair of storage backends, one per scope.
#[derive(Clone)]
pub struct SessionStorage {
    durable: Arc<dyn TokenStorage>,
    tab: Arc<dyn TokenStorage>,
}

impl SessionStorage {
    pub fn new(durable: Arc<dyn TokenStorage>, tab: Arc<dyn TokenStorage>) -> Self {
        Self { durable, tab }
    }

    /// Both scopes in memory. Nothing survives the process.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryTokenStorage::new()),
            Arc::new(MemoryTokenStorage::new()),
        )
    }

    pub fn scope(&self, scope: StorageScope) -> &Arc<dyn TokenStorage> {
        match scope {
            StorageScope::Durable => &self.durable,
            StorageScope::Tab => &self.tab,
        }
    }

    /// Load the persisted pair, durable scope first.
    pub fn load(&self) -> Result<Option<(TokenPair, StorageScope)>> {
        if let Some(tokens) = self.durable.load_tokens()? {
            return Ok(Some((tokens, StorageScope::Durable)));
        }
        Ok(self.tab.load_tokens()?.map(|tokens| (tokens, StorageScope::Tab)))
    }

    /// Persist into `scope` and drop any stale copy from the other scope.
    pub fn persist(&self, tokens: &TokenPair, scope: StorageScope) -> Result<()> {
        let other = match scope {
            StorageScope::Durable => StorageScope::Tab,
            StorageScope::Tab => StorageScope::Durable,
        };
        self.scope(scope).save_tokens(tokens)?;
        self.scope(other).remove_tokens()
    }

    pub fn clear(&self) -> Result<()> {
        // Attempt both scopes even if the first fails.
        let durable = self.durable.remove_tokens();
        let tab = self.tab.remove_tokens();
        durable.and(tab)
    }
}

impl Default for SessionStorage {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for SessionStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStorage").finish_non_exhaustive()
    }
}
