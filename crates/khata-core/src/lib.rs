//! khata-core — Customer ledger and identity resolution engine.
//!
//! Holds the customer map, derives running dues from append-only history,
//! assigns collision-free quick codes and matches face embeddings against
//! the enrolled gallery.

pub mod capture;
pub mod dues;
pub mod error;
pub mod fingerprint;
pub mod ledger;
pub mod matcher;
pub mod money;
pub mod order;
pub mod quick_code;
pub mod resolver;
pub mod router;
pub mod store;
pub mod types;

pub use capture::{CaptureError, CapturedFrame, FaceSource};
pub use error::{LedgerError, StoreError};
pub use ledger::{canonical_name, LedgerStore, ProfileUpdate};
pub use matcher::{EuclideanMatcher, MatchResult, Matcher};
pub use money::Money;
pub use resolver::{FaceLookup, IdentityResolver};
pub use store::{JsonFileStore, MemoryStore, Persistence};
pub use types::{CustomerRecord, Embedding, Transaction};
