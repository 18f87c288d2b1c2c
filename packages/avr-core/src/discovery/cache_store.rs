//! Durable storage for the discovery cache.

use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::DiscoveredReceiver;

/// Cache read/write failures.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file is malformed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where the tracker keeps receivers between runs.
pub trait CacheStore: Send + Sync {
    /// Returns every stored receiver; an absent store is empty, not an error.
    fn load(&self) -> Result<Vec<DiscoveredReceiver>, CacheError>;

    /// Replaces the stored set.
    fn save(&self, receivers: &[DiscoveredReceiver]) -> Result<(), CacheError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    receivers: Vec<DiscoveredReceiver>,
}

/// JSON file store written atomically (temp file + rename).
#[derive(Debug, Clone)]
pub struct JsonFileCacheStore {
    path: PathBuf,
}

impl JsonFileCacheStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "receivers.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CacheStore for JsonFileCacheStore {
    fn load(&self) -> Result<Vec<DiscoveredReceiver>, CacheError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let file: CacheFile = serde_json::from_str(&contents)?;
                Ok(file.receivers)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, receivers: &[DiscoveredReceiver]) -> Result<(), CacheError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let contents = serde_json::to_string_pretty(&CacheFile {
            receivers: receivers.to_vec(),
        })?;
        let temp_path = self.temp_path();
        std::fs::write(&temp_path, contents)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
