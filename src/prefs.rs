//! Preference store
//!
//! Small opaque key-value store for scalar settings (mini-mode flag and the
//! like), persisted as a flat TOML file. No schema beyond key/value.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Well-known preference keys.
pub const MINI_MODE: &str = "mini_mode";

/// Flat TOML-backed key-value store. Every `set` persists immediately.
pub struct PrefStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl PrefStore {
    /// Load the store, starting empty if the file doesn't exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            toml::from_str(&raw).map_err(|e| Error::Prefs(e.to_string()))?
        } else {
            debug!(path = %path.display(), "preference file missing, starting empty");
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        self.values.insert(key.to_string(), value.into());
        let raw = toml::to_string(&self.values).map_err(|e| Error::Prefs(e.to_string()))?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");

        let mut store = PrefStore::load(&path).unwrap();
        assert!(store.get(MINI_MODE).is_none());

        store.set(MINI_MODE, "true").unwrap();
        assert!(store.get_bool(MINI_MODE));

        // A fresh load sees the persisted value
        let reloaded = PrefStore::load(&path).unwrap();
        assert_eq!(reloaded.get(MINI_MODE), Some("true"));
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PrefStore::load(dir.path().join("absent.toml")).unwrap();
        assert!(!store.get_bool(MINI_MODE));
    }

    #[test]
    fn test_set_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        let mut store = PrefStore::load(&path).unwrap();

        store.set("player", "mock").unwrap();
        store.set("player", "mpris").unwrap();
        assert_eq!(store.get("player"), Some("mpris"));
    }
}
