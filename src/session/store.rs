use crate::error::SessionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Key/value storage for serialized session records
///
/// Each operation is atomic on its own. Expired entries read as absent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    async fn set(&self, key: &str, record: String, expires_at: DateTime<Utc>) -> Result<(), SessionError>;

    async fn delete(&self, key: &str) -> Result<(), SessionError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    record: String,
    expires_at: DateTime<Utc>,
}

impl StoredEntry {
    fn live(self) -> Option<String> {
        (self.expires_at > Utc::now()).then_some(self.record)
    }
}

/// Process-local store; sessions are lost on restart
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned().and_then(StoredEntry::live))
    }

    async fn set(&self, key: &str, record: String, expires_at: DateTime<Utc>) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > Utc::now());
        entries.insert(key.to_string(), StoredEntry { record, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// One JSON file per session under a directory
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Create the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SessionError::Store(format!("cannot create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SessionError> {
        // URL-safe base64 alphabet only, so the key cannot leave the directory
        let valid = !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(SessionError::Store("invalid session key".to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    /// Delete session files whose expiry has passed. Unreadable files are left
    /// for `get` to report.
    async fn sweep_expired(&self) -> Result<(), SessionError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;

        let now = Utc::now();
        let mut removed = 0usize;
        while let Some(dir_entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?
        {
            let path = dir_entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let Ok(contents) = tokio::fs::read(&path).await else {
                continue;
            };
            let Ok(entry) = serde_json::from_slice::<StoredEntry>(&contents) else {
                continue;
            };

            if entry.expires_at <= now {
                remove_if_present(&path).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "Removed expired session files");
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let path = self.path_for(key)?;

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::Store(e.to_string())),
        };

        let entry: StoredEntry = serde_json::from_slice(&contents)
            .map_err(|e| SessionError::Store(format!("corrupt session file: {e}")))?;

        match entry.live() {
            Some(record) => Ok(Some(record)),
            None => {
                remove_if_present(&path).await?;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, record: String, expires_at: DateTime<Utc>) -> Result<(), SessionError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        self.sweep_expired().await?;

        let contents = serde_json::to_vec(&StoredEntry { record, expires_at })
            .map_err(|e| SessionError::Store(e.to_string()))?;

        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| SessionError::Store(e.to_string()))?;

        debug!(path = %path.display(), "Stored session");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        let path = self.path_for(key)?;
        remove_if_present(&path).await
    }
}

async fn remove_if_present(path: &Path) -> Result<(), SessionError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SessionError::Store(e.to_string())),
    }
}
