//! The authoritative customer map.
//!
//! `LedgerStore` owns every `CustomerRecord` for the session and flushes the
//! whole map through its [`Persistence`] backend after each mutation, before
//! control returns to the caller.

use crate::error::{LedgerError, Result, StoreError};
use crate::store::{CustomerMap, MemoryStore, Persistence};
use crate::types::{CustomerRecord, Embedding};

/// Canonical form of a customer name: trimmed, first character upper-case,
/// the rest lower-case (`"  rAVI kumar"` → `"Ravi kumar"`).
pub fn canonical_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Profile fields to merge into a record. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl ProfileUpdate {
    fn apply(self, record: &mut CustomerRecord) {
        if let Some(phone) = self.phone {
            record.phone = phone;
        }
        if let Some(address) = self.address {
            record.address = address;
        }
        if let Some(notes) = self.notes {
            record.notes = notes;
        }
    }
}

/// Whether an upsert created a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

pub struct LedgerStore {
    customers: CustomerMap,
    backend: Box<dyn Persistence>,
}

impl LedgerStore {
    /// Load the full map from `backend`.
    pub fn open(backend: Box<dyn Persistence>) -> std::result::Result<Self, StoreError> {
        let customers = backend.load()?;
        Ok(Self { customers, backend })
    }

    /// Empty store backed by a throwaway [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self {
            customers: CustomerMap::new(),
            backend: Box::new(MemoryStore::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    /// Exact lookup on the canonical form of `name`.
    pub fn get(&self, name: &str) -> Option<&CustomerRecord> {
        self.customers.get(&canonical_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Records in enumeration order (sorted by canonical name).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CustomerRecord)> {
        self.customers.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn customers(&self) -> &CustomerMap {
        &self.customers
    }

    /// Create the record if `name` is new, otherwise merge `update` into it.
    ///
    /// Only the fields set in `update` change; the quick code, face embedding,
    /// fingerprint template and history are never touched here.
    pub fn upsert(&mut self, name: &str, update: ProfileUpdate) -> Result<Upsert> {
        let key = canonical_name(name);
        if key.is_empty() {
            return Err(LedgerError::EmptyName);
        }

        let outcome = match self.customers.get_mut(&key) {
            Some(record) => {
                update.apply(record);
                Upsert::Updated
            }
            None => {
                let mut record = CustomerRecord::default();
                update.apply(&mut record);
                self.customers.insert(key.clone(), record);
                tracing::info!(name = %key, "customer created");
                Upsert::Created
            }
        };

        self.flush()?;
        Ok(outcome)
    }

    /// Mutate an existing record and flush.
    ///
    /// If the flush fails the change stays applied in memory and the error is
    /// returned so the caller can report it. Crate-private: history is only
    /// ever appended through the due accountant.
    pub(crate) fn update<T>(&mut self, name: &str, f: impl FnOnce(&mut CustomerRecord) -> T) -> Result<T> {
        let key = canonical_name(name);
        let record = self
            .customers
            .get_mut(&key)
            .ok_or_else(|| LedgerError::NotFound(key.clone()))?;
        let out = f(record);
        self.flush()?;
        Ok(out)
    }

    /// Replace the face embedding and snapshot reference wholesale, creating
    /// the record if needed.
    pub fn set_face(&mut self, name: &str, embedding: Embedding, photo: Option<String>) -> Result<()> {
        let key = canonical_name(name);
        if key.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        let record = self.customers.entry(key.clone()).or_default();
        record.face_embedding = Some(embedding);
        if let Some(photo) = photo {
            record.photo_reference = photo;
        }
        tracing::info!(name = %key, "face embedding stored");
        self.flush()?;
        Ok(())
    }

    /// Every `(name, embedding)` pair with an embedding on file, in
    /// enumeration order.
    pub fn gallery(&self) -> Vec<(&str, &Embedding)> {
        self.customers
            .iter()
            .filter_map(|(name, r)| r.face_embedding.as_ref().map(|e| (name.as_str(), e)))
            .collect()
    }

    /// Every quick code currently assigned, excluding `except`'s own.
    pub(crate) fn assigned_codes<'a>(&'a self, except: Option<&'a str>) -> impl Iterator<Item = &'a str> {
        self.customers
            .iter()
            .filter(move |(name, _)| Some(name.as_str()) != except)
            .filter_map(|(_, r)| r.quick_code.as_deref())
    }

    /// Write the full map through the backend.
    pub fn flush(&self) -> std::result::Result<(), StoreError> {
        self.backend.save(&self.customers).map_err(|e| {
            tracing::warn!(error = %e, "ledger flush failed; in-memory state is ahead of disk");
            e
        })
    }
}
