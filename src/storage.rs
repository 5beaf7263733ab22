//! Origin-scoped key-value persistence for the consent decision.
//!
//! The consent gate only ever needs one string under one key, so the
//! [`KeyValueStore`] trait is the `localStorage` surface cut down to `get`
//! and `set`. Both calls may fail (private browsing, quota, disabled
//! storage); callers decide what a failure means.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: in-process map. Clones share the same map, so a clone
//!   handed to a second page models a reload within the same browser
//!   profile. [`MemoryStore::unavailable`] fails every call.
//! - [`FileStore`]: one JSON file per origin under a directory, named by the
//!   SHA-256 of the origin. Missing, unreadable or corrupt files read as
//!   empty, the same way a cleared browser profile would.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// Version of the on-disk store format. Files with another version load as
/// empty.
const STORE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Opaque string store scoped to one origin.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory store. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, String>>>,
    available: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Rc::new(RefCell::new(BTreeMap::new())),
            available: true,
        }
    }

    /// A store that fails every read and write.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// A store pre-seeded with one entry.
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        store
            .entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        store
    }

    /// Snapshot of the stored entries.
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.entries.borrow().clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if !self.available {
            return Err(StorageError::Unavailable);
        }
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if !self.available {
            return Err(StorageError::Unavailable);
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    origin: String,
    entries: BTreeMap<String, String>,
}

impl StoreFile {
    fn empty(origin: &str) -> Self {
        Self {
            version: STORE_VERSION,
            origin: origin.to_string(),
            entries: BTreeMap::new(),
        }
    }
}

/// JSON-file store for one origin.
#[derive(Debug, Clone)]
pub struct FileStore {
    origin: String,
    path: PathBuf,
}

impl FileStore {
    /// Store for the origin of `url` inside `dir`. The directory is created
    /// on first write.
    pub fn new(dir: &Path, url: &str) -> Self {
        let origin = origin_of(url);
        let path = dir.join(format!("{}.json", hash_origin(&origin)));
        Self { origin, path }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreFile {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return StoreFile::empty(&self.origin);
        };
        match serde_json::from_str::<StoreFile>(&content) {
            Ok(file) if file.version == STORE_VERSION && file.origin == self.origin => file,
            _ => StoreFile::empty(&self.origin),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load().entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut file = self.load();
        file.entries.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// `scheme://host[:port]` of a URL. Strings without a scheme are their own
/// origin.
pub fn origin_of(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            format!("{}://{}", scheme.to_ascii_lowercase(), host.to_ascii_lowercase())
        }
        None => url.to_string(),
    }
}

/// SHA-256 of the origin, hex encoded.
fn hash_origin(origin: &str) -> String {
    format!("{:x}", Sha256::digest(origin.as_bytes()))
}
