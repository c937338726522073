//! Persisted store providing named, versioned blocks with atomic commits.
//!
//! A block is a map of field name to JSON value. Reads never block on
//! writers; writes are collected in a [`BlockTransaction`] and applied all
//! together on [`BlockTransaction::commit`], or not at all if the scope is
//! dropped first.
//!
//! ## Example
//!
//! ```
//! use egm_core::storage::{MemoryStorage, PersistentStorage};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), egm_core::storage::StorageError> {
//! let storage = MemoryStorage::new();
//! let store: &dyn PersistentStorage = &storage;
//!
//! let mut tx = store.start_transaction("Meters");
//! tx.set("coin_in", &500_i64)?;
//! tx.set("coin_out", &0_i64)?;
//! tx.commit().await?;
//!
//! let coin_in: Option<i64> = store.read_field("Meters", "coin_in").await?;
//! assert_eq!(coin_in, Some(500));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::BTreeMap;

pub mod config;
pub mod errors;
pub mod memory;
pub mod postgres;

pub use config::StorageConfig;
pub use errors::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Field writes or contents of a block, keyed by field name
pub type FieldMap = BTreeMap<String, Value>;

/// Snapshot of a persisted block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredBlock {
    pub name: String,
    /// Incremented by one on every commit
    pub version: u64,
    pub fields: FieldMap,
}

impl StoredBlock {
    /// Decode a single field, `None` if it was never written
    pub fn field<T: DeserializeOwned>(&self, field: &str) -> StorageResult<Option<T>> {
        match self.fields.get(field) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|_| StorageError::CorruptedField {
                    block: self.name.clone(),
                    field: field.to_string(),
                }),
        }
    }
}

/// Backend contract for the persisted store
#[async_trait]
pub trait PersistentStorage: Send + Sync {
    /// Read the committed state of a block
    async fn read_block(&self, block: &str) -> StorageResult<Option<StoredBlock>>;

    /// Atomically apply all writes to a block and return its new version
    async fn commit(&self, block: &str, writes: FieldMap) -> StorageResult<u64>;
}

impl dyn PersistentStorage + '_ {
    /// Open a write scope on a block
    pub fn start_transaction(&self, block: &str) -> BlockTransaction<'_> {
        BlockTransaction {
            storage: self,
            block: block.to_string(),
            writes: FieldMap::new(),
        }
    }

    /// Read and decode a single field of a block
    pub async fn read_field<T: DeserializeOwned>(
        &self,
        block: &str,
        field: &str,
    ) -> StorageResult<Option<T>> {
        match self.read_block(block).await? {
            Some(stored) => stored.field(field),
            None => Ok(None),
        }
    }
}

/// Write scope collecting field updates for one atomic commit
#[must_use = "writes are discarded unless the transaction is committed"]
pub struct BlockTransaction<'a> {
    storage: &'a dyn PersistentStorage,
    block: String,
    writes: FieldMap,
}

impl BlockTransaction<'_> {
    /// Stage a field write; a later write to the same field wins
    pub fn set<T: Serialize + ?Sized>(&mut self, field: &str, value: &T) -> StorageResult<&mut Self> {
        self.writes
            .insert(field.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Apply every staged write atomically
    pub async fn commit(self) -> StorageResult<u64> {
        let version = self.storage.commit(&self.block, self.writes).await?;
        log::trace!("Committed block {} at version {}", self.block, version);
        Ok(version)
    }
}
