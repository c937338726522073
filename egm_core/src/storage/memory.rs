//! Process-local storage backend.

use super::{FieldMap, PersistentStorage, StorageError, StorageResult, StoredBlock};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

/// In-memory persisted store with commit failure injection
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blocks: Mutex<HashMap<String, StoredBlock>>,
    fail_next_commit: AtomicBool,
    commits: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail without applying any write
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of successful commits across all blocks
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistentStorage for MemoryStorage {
    async fn read_block(&self, block: &str) -> StorageResult<Option<StoredBlock>> {
        let blocks = self.blocks.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(blocks.get(block).cloned())
    }

    async fn commit(&self, block: &str, writes: FieldMap) -> StorageResult<u64> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StorageError::CommitFailed {
                block: block.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let mut blocks = self.blocks.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = blocks
            .entry(block.to_string())
            .or_insert_with(|| StoredBlock {
                name: block.to_string(),
                ..StoredBlock::default()
            });
        stored.version += 1;
        stored.fields.extend(writes);

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(stored.version)
    }
}
