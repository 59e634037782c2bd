use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Key-value persistence holding JSON blobs. Mirrors a browser extension's
/// local storage area: whole values are read and written, never patched.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// In-process backend.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Backend storing every key in one JSON object file.
pub struct JsonFileBackend {
    path: PathBuf,
    // Serializes writers within this process only.
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Map::new()),
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes)? {
                Value::Object(map) => Ok(map),
                _ => Err(Error::MalformedSnapshot(
                    "storage file is not a JSON object".into(),
                )),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut all = self.read_all().await?;
        Ok(all.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        all.insert(key.to_string(), value);
        let bytes = serde_json::to_vec_pretty(&Value::Object(all))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}
