//! Credential persistence.
//!
//! The device keeps at most one credential record, serialized as a single
//! camelCase JSON blob under `CREDENTIAL_KEY`. Records are validated on
//! write and again on read.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rl_core::constants::CREDENTIAL_KEY;
use rl_core::{RlError, RlResult};
use rl_models::Credential;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Key-value persistence for the credential record.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> RlResult<Option<Credential>>;
    async fn set(&self, credential: &Credential) -> RlResult<()>;
    async fn clear(&self) -> RlResult<()>;
}

fn decode(blob: &str) -> RlResult<Credential> {
    let credential: Credential = serde_json::from_str(blob)
        .map_err(|e| RlError::InvalidCredential(format!("unreadable credential blob: {e}")))?;
    credential.validate()?;
    Ok(credential)
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    blob: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `credential`.
    pub fn with_credential(credential: &Credential) -> RlResult<Self> {
        credential.validate()?;
        Ok(Self {
            blob: RwLock::new(Some(serde_json::to_string(credential)?)),
        })
    }

    /// Store pre-seeded with an arbitrary blob, valid or not.
    pub fn with_raw(blob: impl Into<String>) -> Self {
        Self {
            blob: RwLock::new(Some(blob.into())),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> RlResult<Option<Credential>> {
        match self.blob.read().await.as_deref() {
            Some(blob) => decode(blob).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, credential: &Credential) -> RlResult<()> {
        credential.validate()?;
        *self.blob.write().await = Some(serde_json::to_string(credential)?);
        Ok(())
    }

    async fn clear(&self) -> RlResult<()> {
        *self.blob.write().await = None;
        Ok(())
    }
}

/// JSON file holding a small key-value map; the credential lives under
/// `CREDENTIAL_KEY`. Writes go through a temporary file and a rename.
pub struct FileCredentialStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> RlResult<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                RlError::Storage(format!("corrupt store {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(RlError::Storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write_map(&self, map: &BTreeMap<String, String>) -> RlResult<()> {
        if map.is_empty() {
            return match tokio::fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(RlError::Storage(format!(
                    "failed to remove {}: {e}",
                    self.path.display()
                ))),
            };
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        let contents = serde_json::to_string_pretty(map)?;
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| RlError::Storage(format!("failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            RlError::Storage(format!("failed to replace {}: {e}", self.path.display()))
        })?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> RlResult<Option<Credential>> {
        let _guard = self.lock.read().await;
        let map = self.read_map().await?;
        match map.get(CREDENTIAL_KEY) {
            Some(blob) => decode(blob).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, credential: &Credential) -> RlResult<()> {
        credential.validate()?;
        let _guard = self.lock.write().await;
        let mut map = self.read_map().await.unwrap_or_else(|e| {
            warn!("replacing unreadable credential store: {e}");
            BTreeMap::new()
        });
        map.insert(CREDENTIAL_KEY.to_string(), serde_json::to_string(credential)?);
        self.write_map(&map).await?;
        debug!("credential saved to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> RlResult<()> {
        let _guard = self.lock.write().await;
        let mut map = self.read_map().await.unwrap_or_default();
        map.remove(CREDENTIAL_KEY);
        self.write_map(&map).await?;
        debug!("credential cleared from {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rl_models::UserRole;
    use tempfile::TempDir;

    fn sample() -> Credential {
        Credential::new("access-1", "refresh-1", "+2348000000", UserRole::Driver, "drv-1")
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get().await.unwrap(), None);

        store.set(&sample()).await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some(sample()));

        store.clear().await.unwrap();
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_rejects_empty_tokens() {
        let store = MemoryCredentialStore::new();
        let bad = Credential::new("", "r", "", UserRole::Passenger, "p-1");
        assert!(matches!(
            store.set(&bad).await,
            Err(RlError::InvalidCredential(_))
        ));
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_blob_on_read() {
        let store = MemoryCredentialStore::with_raw(r#"{"accessToken":"","refreshToken":"r"}"#);
        assert!(store.get().await.is_err());

        let store = MemoryCredentialStore::with_raw("not json");
        assert!(matches!(
            store.get().await,
            Err(RlError::InvalidCredential(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_persists_under_fixed_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("credentials.json");
        let store = FileCredentialStore::new(&path);

        store.set(&sample()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let blob = raw[CREDENTIAL_KEY].as_str().unwrap();
        assert!(blob.contains("\"accessToken\":\"access-1\""));

        let reopened = FileCredentialStore::new(&path);
        assert_eq!(reopened.get().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn test_file_store_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        let store = FileCredentialStore::new(&path);

        store.clear().await.unwrap();
        store.set(&sample()).await.unwrap();
        assert!(path.exists());

        store.clear().await.unwrap();
        assert!(!path.exists());
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{{{").unwrap();
        let store = FileCredentialStore::new(&path);

        assert!(matches!(store.get().await, Err(RlError::Storage(_))));
        // a fresh login overwrites the damage
        store.set(&sample()).await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some(sample()));
    }
}
