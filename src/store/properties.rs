//! Key-value property stores.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::PropertyStore;
use crate::error::{Result, TrackError};

/// Properties kept in a flat JSON object on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct FileProperties {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileProperties {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| TrackError::json(&path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(TrackError::io(&path, e)),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PropertyStore for FileProperties {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TrackError::io(parent, e))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.values)
            .map_err(|e| TrackError::json(&self.path, e))?;
        std::fs::write(&self.path, json).map_err(|e| TrackError::io(&self.path, e))
    }
}

#[derive(Debug, Default)]
pub struct MemoryProperties {
    values: BTreeMap<String, String>,
}

impl MemoryProperties {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PropertyStore for MemoryProperties {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
