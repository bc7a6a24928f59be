//! Durable storage for the credential pair.
//!
//! Stores are passive key-value mirrors: no validation, no network I/O.
//! Only `SessionManager` writes to them.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CredentialPair, StoreError};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Token file name in cache directory
const TOKEN_FILE: &str = "tokens.json";

/// Keyring service name
const SERVICE_NAME: &str = "taskdash";

pub trait TokenStore: Send + Sync {
    /// Read both entries. Missing entries come back as `None`.
    fn load(&self) -> Result<CredentialPair, StoreError>;

    /// Write both entries; a `None` field removes that entry
    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError>;

    /// Overwrite only the access entry
    fn save_access(&self, access_token: &str) -> Result<(), StoreError>;

    /// Remove both entries. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), StoreError>;
}

// ============================================================================
// File store
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(rename = "accessToken", default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// JSON file holding the two token entries, kept in the cache directory
pub struct FileTokenStore {
    cache_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn token_path(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_FILE)
    }

    fn read(&self) -> Result<TokenFile, StoreError> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(TokenFile::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, file: &TokenFile) -> Result<(), StoreError> {
        let path = self.token_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(file)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<CredentialPair, StoreError> {
        let file = self.read()?;
        Ok(CredentialPair {
            access_token: file.access_token,
            refresh_token: file.refresh_token,
        })
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.write(&TokenFile {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
        })
    }

    fn save_access(&self, access_token: &str) -> Result<(), StoreError> {
        // A corrupt file must not block writing a fresh token
        let mut file = self.read().unwrap_or_else(|e| {
            warn!(error = %e, path = %self.token_path().display(), "Token file unreadable, rewriting it");
            TokenFile::default()
        });
        file.access_token = Some(access_token.to_string());
        self.write(&file)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ============================================================================
// Keyring store
// ============================================================================

/// One OS keychain entry per token key
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entry = Entry::new(&self.service, key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let entry = Entry::new(&self.service, key)?;
        entry.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let entry = Entry::new(&self.service, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        match value {
            Some(v) => self.set(key, v),
            None => self.remove(key),
        }
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<CredentialPair, StoreError> {
        Ok(CredentialPair {
            access_token: self.get(ACCESS_TOKEN_KEY)?,
            refresh_token: self.get(REFRESH_TOKEN_KEY)?,
        })
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.put(ACCESS_TOKEN_KEY, pair.access_token.as_deref())?;
        self.put(REFRESH_TOKEN_KEY, pair.refresh_token.as_deref())
    }

    fn save_access(&self, access_token: &str) -> Result<(), StoreError> {
        self.set(ACCESS_TOKEN_KEY, access_token)
    }

    fn clear(&self) -> Result<(), StoreError> {
        debug!(service = %self.service, "Clearing keyring tokens");
        self.remove(ACCESS_TOKEN_KEY)?;
        self.remove(REFRESH_TOKEN_KEY)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store, nothing survives a restart
#[derive(Default)]
pub struct MemoryTokenStore {
    pair: Mutex<CredentialPair>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: Mutex::new(pair),
        }
    }

    fn pair(&self) -> std::sync::MutexGuard<'_, CredentialPair> {
        self.pair.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<CredentialPair, StoreError> {
        Ok(self.pair().clone())
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        *self.pair() = pair.clone();
        Ok(())
    }

    fn save_access(&self, access_token: &str) -> Result<(), StoreError> {
        self.pair().access_token = Some(access_token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.pair() = CredentialPair::empty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_store() -> (tempfile::TempDir, FileTokenStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTokenStore::new(dir.path().join("nested"));
        (dir, store)
    }

    #[test]
    fn test_file_store_load_after_save_returns_pair() {
        let (_dir, store) = file_store();
        let pairs = [
            CredentialPair::new("a", "r"),
            CredentialPair::empty(),
            CredentialPair {
                access_token: None,
                refresh_token: Some("r-only".into()),
            },
        ];
        for pair in pairs {
            store.save(&pair).expect("save");
            assert_eq!(store.load().expect("load"), pair);
        }
    }

    #[test]
    fn test_file_store_missing_file_loads_empty() {
        let (_dir, store) = file_store();
        assert_eq!(store.load().expect("load"), CredentialPair::empty());
    }

    #[test]
    fn test_file_store_uses_fixed_keys() {
        let (dir, store) = file_store();
        store.save(&CredentialPair::new("a", "r")).expect("save");
        let raw = std::fs::read_to_string(dir.path().join("nested").join(TOKEN_FILE))
            .expect("token file written");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(json[ACCESS_TOKEN_KEY], "a");
        assert_eq!(json[REFRESH_TOKEN_KEY], "r");
    }

    #[test]
    fn test_file_store_save_access_keeps_refresh() {
        let (_dir, store) = file_store();
        store.save(&CredentialPair::new("old", "r")).expect("save");
        store.save_access("new").expect("save access");
        assert_eq!(store.load().expect("load"), CredentialPair::new("new", "r"));
    }

    #[test]
    fn test_file_store_clear_is_idempotent() {
        let (_dir, store) = file_store();
        store.save(&CredentialPair::new("a", "r")).expect("save");
        store.clear().expect("first clear");
        store.clear().expect("second clear");
        assert_eq!(store.load().expect("load"), CredentialPair::empty());
    }

    #[test]
    fn test_file_store_corrupt_file_is_an_error() {
        let (dir, store) = file_store();
        let path = dir.path().join("nested");
        std::fs::create_dir_all(&path).expect("mkdir");
        std::fs::write(path.join(TOKEN_FILE), "not json").expect("write");
        assert!(matches!(store.load(), Err(StoreError::Parse(_))));
    }

    #[test]
    fn test_file_store_save_access_rewrites_corrupt_file() {
        let (dir, store) = file_store();
        let path = dir.path().join("nested");
        std::fs::create_dir_all(&path).expect("mkdir");
        std::fs::write(path.join(TOKEN_FILE), "{\"refreshToken\": ").expect("write");

        store.save_access("fresh").expect("save access");

        let pair = store.load().expect("file readable again");
        assert_eq!(pair.access_token.as_deref(), Some("fresh"));
        assert_eq!(pair.refresh_token, None);
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        store.save(&CredentialPair::new("a", "r")).expect("save");
        store.save_access("b").expect("save access");
        assert_eq!(store.load().expect("load"), CredentialPair::new("b", "r"));
        store.clear().expect("clear");
        assert!(store.load().expect("load").is_empty());
    }
}
