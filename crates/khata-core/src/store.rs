//! Persistence backends for the customer map.
//!
//! The whole map is read once at startup and written in full after every
//! mutation. There is no journal: a failed write leaves memory ahead of disk.

use crate::error::StoreError;
use crate::types::CustomerRecord;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Customer records keyed by canonical name.
pub type CustomerMap = BTreeMap<String, CustomerRecord>;

/// Strategy for loading and saving the customer map.
pub trait Persistence {
    fn load(&self) -> Result<CustomerMap, StoreError>;
    fn save(&self, customers: &CustomerMap) -> Result<(), StoreError>;
}

/// Pretty-printed JSON document on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Persistence for JsonFileStore {
    fn load(&self) -> Result<CustomerMap, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no ledger file yet; starting empty");
                return Ok(CustomerMap::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if raw.trim().is_empty() {
            return Ok(CustomerMap::new());
        }

        let customers: CustomerMap =
            serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        tracing::info!(
            path = %self.path.display(),
            customers = customers.len(),
            "ledger loaded"
        );
        Ok(customers)
    }

    fn save(&self, customers: &CustomerMap) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(customers)?;

        // Write a sibling file and rename so a crash never leaves half a document.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), customers = customers.len(), "ledger saved");
        Ok(())
    }
}

/// In-memory snapshot, shared between clones.
///
/// Lets tests observe exactly what was flushed.
#[derive(Clone, Default)]
pub struct MemoryStore {
    snapshot: Arc<Mutex<CustomerMap>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customers(customers: CustomerMap) -> Self {
        Self {
            snapshot: Arc::new(Mutex::new(customers)),
            saves: Arc::default(),
        }
    }

    /// The last flushed map.
    pub fn snapshot(&self) -> CustomerMap {
        self.snapshot.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Number of completed flushes.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl Persistence for MemoryStore {
    fn load(&self) -> Result<CustomerMap, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, customers: &CustomerMap) -> Result<(), StoreError> {
        if let Ok(mut snapshot) = self.snapshot.lock() {
            *snapshot = customers.clone();
        }
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}
