use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::warn;
use serde_json::Value;

use crate::repository::LocalCache;

//
// ─── MEMORY CACHE ──────────────────────────────────────────────────────────────
//

/// Process-local cache, used in tests and as a fallback.
#[derive(Debug, Default)]
pub struct MemoryCache {
    map: Mutex<HashMap<String, Value>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.map
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.map
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_owned(), value);
    }
}

//
// ─── FILE CACHE ────────────────────────────────────────────────────────────────
//

/// File-backed cache holding the whole key map as one JSON document.
///
/// The `LocalCache` contract promises that cache traffic never fails, so I/O
/// and decode problems are logged and swallowed here: a corrupt or missing
/// file simply reads as empty, and a failed flush leaves the in-memory view
/// authoritative for the rest of the process.
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    map: Mutex<HashMap<String, Value>>,
}

impl JsonFileCache {
    /// Opens (or seeds) the cache file at `path`.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map = load_map(&path);
        Self {
            path,
            map: Mutex::new(map),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, map: &HashMap<String, Value>) {
        let payload = match serde_json::to_string_pretty(map) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("cache encode failed, keeping in-memory state: {err}");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!("cache directory {} not writable: {err}", parent.display());
                return;
            }
        }
        if let Err(err) = std::fs::write(&self.path, payload) {
            warn!("cache write to {} failed: {err}", self.path.display());
        }
    }
}

fn load_map(path: &Path) -> HashMap<String, Value> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(err) => {
            warn!("cache read from {} failed: {err}", path.display());
            return HashMap::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(map) => map,
        Err(err) => {
            warn!("cache file {} is not valid JSON, starting empty: {err}", path.display());
            HashMap::new()
        }
    }
}

impl LocalCache for JsonFileCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.map
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) {
        let mut map = self
            .map
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        map.insert(key.to_owned(), value);
        self.flush(&map);
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
