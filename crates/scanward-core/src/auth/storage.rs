//! Durable key-value storage for the session credential.
//!
//! The session store keeps exactly one key (`SESSION_KEY`). Backends:
//! - `FileStorage`: JSON file in the application data directory
//! - `KeyringStorage`: OS keychain entry
//! - `MemoryStorage`: process-local map, lost on exit

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::AuthError;

/// Key under which the session credential is persisted.
pub const SESSION_KEY: &str = "scanward.session.token";

/// Keyring service name.
const SERVICE_NAME: &str = "scanward";

/// Storage file name in the data directory.
const STORAGE_FILE: &str = "session.json";

/// Async key-value persistence. Implementations may be slow (remote
/// services, OS keychain prompts), so callers must not assume they resolve
/// immediately.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;
    async fn remove(&self, key: &str) -> Result<(), AuthError>;
}

/// Which backend to persist sessions in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl StorageKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Some(StorageKind::File),
            "keyring" => Some(StorageKind::Keyring),
            "memory" => Some(StorageKind::Memory),
            _ => None,
        }
    }

    /// Open the backend, rooted at `data_dir` where relevant.
    pub fn open(self, data_dir: &Path) -> Arc<dyn SessionStorage> {
        match self {
            StorageKind::File => Arc::new(FileStorage::new(data_dir.to_path_buf())),
            StorageKind::Keyring => Arc::new(KeyringStorage::new()),
            StorageKind::Memory => Arc::new(MemoryStorage::new()),
        }
    }
}

fn unavailable(context: &str, e: impl std::fmt::Display) -> AuthError {
    AuthError::StorageUnavailable(format!("{}: {}", context, e))
}

// ============================================================================
// File storage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    saved_at: DateTime<Utc>,
}

/// Persists entries as JSON in `<data_dir>/session.json`.
pub struct FileStorage {
    data_dir: PathBuf,
}

impl FileStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn storage_path(&self) -> PathBuf {
        self.data_dir.join(STORAGE_FILE)
    }

    async fn load(&self) -> Result<HashMap<String, StoredEntry>, AuthError> {
        let path = self.storage_path();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(unavailable("Failed to read session file", e)),
        };

        serde_json::from_str(&contents).map_err(|e| unavailable("Failed to parse session file", e))
    }

    async fn save(&self, entries: &HashMap<String, StoredEntry>) -> Result<(), AuthError> {
        let path = self.storage_path();
        if entries.is_empty() {
            return match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(unavailable("Failed to delete session file", e)),
            };
        }

        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| unavailable("Failed to create data directory", e))?;
        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| unavailable("Failed to serialize session file", e))?;
        write_private(&path, contents.as_bytes())
            .await
            .map_err(|e| unavailable("Failed to write session file", e))
    }
}

/// Write a file readable by the owner only; it holds a bearer credential.
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    // `mode` only applies on creation; tighten files left by older versions
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
    }
    file.write_all(contents).await?;
    file.flush().await
}

#[async_trait]
impl SessionStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.load().await?.remove(key).map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let mut entries = match self.load().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Replacing unreadable session file");
                HashMap::new()
            }
        };
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                saved_at: Utc::now(),
            },
        );
        self.save(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        let mut entries = match self.load().await {
            Ok(entries) => entries,
            Err(e) => {
                // Nothing in a corrupt file is recoverable
                warn!(error = %e, "Discarding unreadable session file");
                HashMap::new()
            }
        };
        entries.remove(key);
        self.save(&entries).await
    }
}

// ============================================================================
// Keyring storage
// ============================================================================

/// Persists entries in the OS keychain, one keychain entry per key.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Run a keychain call off the async runtime; some platforms block on
    /// user prompts.
    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T, AuthError>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> Result<T, AuthError> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &key)
                .map_err(|e| unavailable("Failed to create keyring entry", e))?;
            op(entry)
        })
        .await
        .map_err(|e| unavailable("Keyring task failed", e))?
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for KeyringStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(unavailable("Failed to read keychain", e)),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let value = value.to_string();
        self.with_entry(key, move |entry| {
            entry
                .set_password(&value)
                .map_err(|e| unavailable("Failed to store credential in keychain", e))
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(unavailable("Failed to delete credential from keychain", e)),
        })
        .await
    }
}

// ============================================================================
// Memory storage
// ============================================================================

/// In-process storage. Clones share the same map, so two stores built over
/// clones of one `MemoryStorage` behave like two page loads over one origin.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, AuthError> {
        self.entries
            .lock()
            .map_err(|e| unavailable("Memory storage lock poisoned", e))
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        debug!(key, "Storing entry in memory");
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_storage_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), None);

        storage.set(SESSION_KEY, "a.b.c").await.unwrap();
        assert_eq!(storage.get(SESSION_KEY).await.unwrap().as_deref(), Some("a.b.c"));

        storage.set(SESSION_KEY, "d.e.f").await.unwrap();
        assert_eq!(storage.get(SESSION_KEY).await.unwrap().as_deref(), Some("d.e.f"));

        storage.remove(SESSION_KEY).await.unwrap();
        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), None);
        // Last key gone, file gone
        assert!(!dir.path().join("nested").join(STORAGE_FILE).exists());

        // Removing again is fine
        storage.remove(SESSION_KEY).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_storage_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORAGE_FILE), "{not json").unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf());

        match storage.get(SESSION_KEY).await {
            Err(AuthError::StorageUnavailable(_)) => {}
            other => panic!("expected storage error, got {:?}", other),
        }

        // Removing purges the unreadable file
        storage.remove(SESSION_KEY).await.unwrap();
        assert!(!dir.path().join(STORAGE_FILE).exists());
        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_storage_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STORAGE_FILE);
        // Pre-existing world-readable file from an older run
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let storage = FileStorage::new(dir.path().to_path_buf());
        storage.set(SESSION_KEY, "a.b.c").await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        let fresh_dir = tempfile::tempdir().unwrap();
        let fresh = FileStorage::new(fresh_dir.path().to_path_buf());
        fresh.set(SESSION_KEY, "a.b.c").await.unwrap();
        let mode = std::fs::metadata(fresh_dir.path().join(STORAGE_FILE))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }

    // Needs a real OS keychain (Keychain, Credential Manager, kernel keyutils)
    #[tokio::test]
    #[ignore]
    async fn test_keyring_storage_persists_across_handles() {
        let service = format!("scanward-test-{}", std::process::id());
        let writer = KeyringStorage::with_service(service.clone());
        let reader = KeyringStorage::with_service(service);

        writer.set(SESSION_KEY, "a.b.c").await.unwrap();
        assert_eq!(reader.get(SESSION_KEY).await.unwrap().as_deref(), Some("a.b.c"));

        reader.remove(SESSION_KEY).await.unwrap();
        assert_eq!(writer.get(SESSION_KEY).await.unwrap(), None);
        // Removing a missing entry is not an error
        writer.remove(SESSION_KEY).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_storage_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf());

        storage.set("other", "value").await.unwrap();
        storage.set(SESSION_KEY, "a.b.c").await.unwrap();
        storage.remove(SESSION_KEY).await.unwrap();

        assert_eq!(storage.get("other").await.unwrap().as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_memory_storage_clones_share_entries() {
        let storage = MemoryStorage::new();
        let reloaded = storage.clone();

        storage.set(SESSION_KEY, "a.b.c").await.unwrap();
        assert_eq!(reloaded.get(SESSION_KEY).await.unwrap().as_deref(), Some("a.b.c"));

        reloaded.remove(SESSION_KEY).await.unwrap();
        assert_eq!(storage.get(SESSION_KEY).await.unwrap(), None);
    }

    #[test]
    fn test_storage_kind_parse() {
        assert_eq!(StorageKind::parse("file"), Some(StorageKind::File));
        assert_eq!(StorageKind::parse(" Keyring "), Some(StorageKind::Keyring));
        assert_eq!(StorageKind::parse("memory"), Some(StorageKind::Memory));
        assert_eq!(StorageKind::parse("cookie"), None);
    }
}
