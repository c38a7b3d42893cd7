//! File-based durable token storage.
//!
//! Stores the token pair in TOML format with secure file permissions
//! (0600 on Unix).
//!
//! # File Location
//!
//! - Windows: `~/.tryout/session.toml`
//! - Linux/macOS: `~/.config/tryout/session.toml`
//!
//! # File Format
//!
//! ```toml
//! [items]
//! accessToken = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9..."
//! refreshToken = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9..."
//! ```

use super::TokenStorage;
use crate::error::{Result, TryoutLinkError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Durable token storage backed by a TOML file.
///
/// The file is read once at construction and rewritten on every change.
#[derive(Debug)]
pub struct FileTokenStorage {
    file_path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    items: HashMap<String, String>,
}

impl FileTokenStorage {
    /// Default session file path.
    pub fn default_path() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".tryout").join("session.toml")
            } else {
                PathBuf::from(".tryout").join("session.toml")
            }
        }

        #[cfg(not(target_os = "windows"))]
        {
            if let Some(config_dir) = dirs::config_dir() {
                config_dir.join("tryout").join("session.toml")
            } else if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".config").join("tryout").join("session.toml")
            } else {
                PathBuf::from(".tryout").join("session.toml")
            }
        }
    }

    /// Open the storage at the default location.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_path())
    }

    /// Open the storage at a custom location. A missing file is an empty store.
    pub fn with_path(file_path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = file_path.into();
        let items = Self::load_from_disk(&file_path)?;
        Ok(Self {
            file_path,
            cache: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn load_from_disk(path: &Path) -> Result<HashMap<String, String>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            TryoutLinkError::StorageError(format!(
                "Cannot read session file '{}': {}",
                path.display(),
                e
            ))
        })?;

        match toml::from_str::<SessionFile>(&contents) {
            Ok(file) => Ok(file.items),
            Err(e) => {
                // A corrupted file means "logged out", not a hard failure.
                log::warn!(
                    "[STORAGE] Ignoring corrupted session file '{}': {}",
                    path.display(),
                    e
                );
                Ok(HashMap::new())
            },
        }
    }

    fn save_to_disk(&self, items: &HashMap<String, String>) -> Result<()> {
        if items.is_empty() {
            if self.file_path.exists() {
                fs::remove_file(&self.file_path).map_err(|e| {
                    TryoutLinkError::StorageError(format!(
                        "Failed to remove session file '{}': {}",
                        self.file_path.display(),
                        e
                    ))
                })?;
            }
            return Ok(());
        }

        let file = SessionFile {
            items: items.clone(),
        };
        let contents = toml::to_string_pretty(&file).map_err(|e| {
            TryoutLinkError::StorageError(format!("Failed to serialize session: {}", e))
        })?;

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TryoutLinkError::StorageError(format!(
                    "Failed to create session directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        fs::write(&self.file_path, contents).map_err(|e| {
            TryoutLinkError::StorageError(format!(
                "Failed to write session file '{}': {}",
                self.file_path.display(),
                e
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.file_path, permissions).map_err(|e| {
                TryoutLinkError::StorageError(format!(
                    "Failed to set file permissions for '{}': {}",
                    self.file_path.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }
}

impl TokenStorage for FileTokenStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cache.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut cache = self.cache.lock();
        cache.insert(key.to_string(), value.to_string());
        self.save_to_disk(&cache)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.remove_items(&[key])
    }

    fn set_items(&self, items: &[(&str, &str)]) -> Result<()> {
        let mut cache = self.cache.lock();
        for (key, value) in items {
            cache.insert(key.to_string(), value.to_string());
        }
        self.save_to_disk(&cache)
    }

    fn remove_items(&self, keys: &[&str]) -> Result<()> {
        let mut cache = self.cache.lock();
        let mut removed = false;
        for key in keys {
            removed |= cache.remove(*key).is_some();
        }
        if removed {
            self.save_to_disk(&cache)?;
        }
        Ok(())
    }
}
