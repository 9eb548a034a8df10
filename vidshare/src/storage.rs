//! Durable client-side storage.
//!
//! A string key/value store in the spirit of browser local storage. The
//! bearer credential lives under [`TOKEN_KEY`], the theme preference under
//! [`THEME_KEY`]. [`FileStorage`] survives process restarts; [`MemoryStorage`]
//! lasts as long as the process.

use crate::types::Theme;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Storage key holding the bearer credential.
pub const TOKEN_KEY: &str = "access_token";
/// Storage key holding the theme preference.
pub const THEME_KEY: &str = "theme";

/// String key/value storage shared by everything in the process.
pub trait ClientStorage: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`. `None` removes the key entirely.
    fn set(&self, key: &str, value: Option<&str>);
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] io::Error),
    #[error("storage file is not a JSON object of strings: {0}")]
    Format(#[from] serde_json::Error),
}

type Values = BTreeMap<String, String>;

fn lock(values: &Mutex<Values>) -> MutexGuard<'_, Values> {
    values.lock().unwrap_or_else(PoisonError::into_inner)
}

fn apply(values: &mut Values, key: &str, value: Option<&str>) {
    match value {
        Some(value) => {
            values.insert(key.to_string(), value.to_string());
        }
        None => {
            values.remove(key);
        }
    }
}

/// Process-local storage; nothing outlives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<Values>,
}

impl ClientStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: Option<&str>) {
        apply(&mut lock(&self.values), key, value);
    }
}

/// Storage persisted as a JSON object in a single file.
///
/// The whole file is rewritten on every change. A failed write is logged and
/// the new value still applies in memory for the rest of the process.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    values: Mutex<Values>,
}

impl FileStorage {
    /// Opens the storage file at `path`, starting empty if it does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Values::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Values::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &Values) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(values)?)?;
        Ok(())
    }
}

impl ClientStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: Option<&str>) {
        let mut values = lock(&self.values);
        apply(&mut values, key, value);
        if let Err(err) = self.persist(&values) {
            tracing::warn!(path = %self.path.display(), key, error = %err, "failed to persist client storage");
        }
    }
}

/// The bearer credential, held under [`TOKEN_KEY`].
///
/// At most one credential exists at a time. Setting an empty value removes
/// the key rather than storing an empty string.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn ClientStorage>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(storage: Arc<dyn ClientStorage>) -> Self {
        Self { storage }
    }

    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).filter(|token| !token.is_empty())
    }

    pub fn set(&self, token: Option<&str>) {
        self.storage
            .set(TOKEN_KEY, token.filter(|token| !token.is_empty()));
    }

    pub fn clear(&self) {
        self.set(None);
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("present", &self.get().is_some())
            .finish()
    }
}

/// The light/dark preference, held under [`THEME_KEY`].
#[derive(Clone)]
pub struct ThemePreference {
    storage: Arc<dyn ClientStorage>,
}

impl ThemePreference {
    #[must_use]
    pub fn new(storage: Arc<dyn ClientStorage>) -> Self {
        Self { storage }
    }

    /// Anything other than a stored `dark` reads as [`Theme::Light`].
    #[must_use]
    pub fn get(&self) -> Theme {
        match self.storage.get(THEME_KEY).as_deref() {
            Some("dark") => Theme::Dark,
            _ => Theme::Light,
        }
    }

    pub fn set(&self, theme: Theme) {
        self.storage.set(THEME_KEY, Some(theme.as_str()));
    }
}

impl fmt::Debug for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThemePreference").field(&self.get()).finish()
    }
}
