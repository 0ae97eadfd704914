//! JSON file-based conversation storage.
//!
//! Data is stored in a hierarchical directory structure based on keys, one
//! JSON file per item. An optional byte quota is enforced before every write
//! so storage failures surface as a typed error instead of a full disk.
//!
//! There is no global instance; construct one `Storage` at startup and pass
//! it where it is needed.

use crate::config::StorageSettings;
use crate::error::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base directory for storage
    pub base_path: PathBuf,
    /// Soft cap on total stored bytes
    pub quota_bytes: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("openchat");
        Self {
            base_path: base,
            quota_bytes: None,
        }
    }
}

impl StorageConfig {
    pub fn from_settings(settings: &StorageSettings) -> Self {
        let mut config = Self::default();
        if let Some(base_path) = &settings.base_path {
            config.base_path = base_path.clone();
        }
        config.quota_bytes = settings.quota_bytes;
        config
    }
}

/// Main storage struct
pub struct Storage {
    config: StorageConfig,
    /// Simple in-memory cache for frequently accessed data
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl Storage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Convert a key path to a file path
    fn key_to_path(&self, key: &[&str]) -> PathBuf {
        let mut path = self.config.base_path.clone();
        for part in key {
            path = path.join(part);
        }
        path.with_extension("json")
    }

    /// Convert a key path to a cache key string
    fn key_to_string(key: &[&str]) -> String {
        key.join("/")
    }

    /// Write data to storage
    pub async fn write<T: Serialize>(&self, key: &[&str], data: &T) -> Result<()> {
        let path = self.key_to_path(key);
        let cache_key = Self::key_to_string(key);

        let json = serde_json::to_string_pretty(data)?;
        self.check_quota(&path, json.len() as u64).await?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&path, &json).await?;

        // Update cache
        let mut cache = self.cache.write().await;
        cache.insert(cache_key, json);

        Ok(())
    }

    /// Fail the write up front when it would push total usage past the quota.
    /// Overwrites only count the delta against the file being replaced.
    async fn check_quota(&self, path: &Path, incoming: u64) -> Result<()> {
        let Some(limit) = self.config.quota_bytes else {
            return Ok(());
        };

        let used = dir_size(&self.config.base_path).await;
        let replaced = fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        let attempted = used.saturating_sub(replaced) + incoming;

        if attempted > limit {
            return Err(Error::StorageQuota { attempted, limit });
        }
        Ok(())
    }

    /// Read data from storage
    pub async fn read<T: DeserializeOwned>(&self, key: &[&str]) -> Result<Option<T>> {
        let path = self.key_to_path(key);
        let cache_key = Self::key_to_string(key);

        // Check cache first
        {
            let cache = self.cache.read().await;
            if let Some(json) = cache.get(&cache_key) {
                let data: T = serde_json::from_str(json)?;
                return Ok(Some(data));
            }
        }

        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path).await?;

        // Update cache
        {
            let mut cache = self.cache.write().await;
            cache.insert(cache_key, json.clone());
        }

        let data: T = serde_json::from_str(&json)?;
        Ok(Some(data))
    }

    /// Update data in storage using a closure
    pub async fn update<T, F>(&self, key: &[&str], updater: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T),
    {
        let mut data: T = self.read(key).await?.unwrap_or_default();
        updater(&mut data);
        self.write(key, &data).await?;
        Ok(data)
    }

    /// Remove data from storage
    pub async fn remove(&self, key: &[&str]) -> Result<()> {
        let path = self.key_to_path(key);
        let cache_key = Self::key_to_string(key);

        // Remove from cache
        {
            let mut cache = self.cache.write().await;
            cache.remove(&cache_key);
        }

        if path.exists() {
            fs::remove_file(&path).await?;
        }

        Ok(())
    }

    /// List all items under a key prefix, sorted. Item ids are time-ordered,
    /// so the sort is chronological.
    pub async fn list(&self, key: &[&str]) -> Result<Vec<Vec<String>>> {
        let mut path = self.config.base_path.clone();
        for part in key {
            path = path.join(part);
        }

        let mut items = Vec::new();

        if !path.exists() {
            return Ok(items);
        }

        let mut entries = fs::read_dir(&path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();

            let name = if let Some(stripped) = name.strip_suffix(".json") {
                stripped.to_string()
            } else {
                name.to_string()
            };

            let mut item_key: Vec<String> = key.iter().map(|s| s.to_string()).collect();
            item_key.push(name);
            items.push(item_key);
        }

        items.sort();
        Ok(items)
    }

    /// Check if a key exists
    pub async fn exists(&self, key: &[&str]) -> bool {
        self.key_to_path(key).exists()
    }

    /// Get the base storage path
    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }
}

/// Total size in bytes of all files under `path`.
async fn dir_size(path: &Path) -> u64 {
    fn walk(path: PathBuf) -> u64 {
        let Ok(entries) = std::fs::read_dir(&path) else {
            return 0;
        };
        entries
            .flatten()
            .map(|entry| {
                let Ok(metadata) = entry.metadata() else {
                    return 0;
                };
                if metadata.is_dir() {
                    walk(entry.path())
                } else {
                    metadata.len()
                }
            })
            .sum()
    }

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || walk(path))
        .await
        .unwrap_or(0)
}
