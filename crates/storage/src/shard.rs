//! Sealed per-field shards.

use crate::state::StorageMap;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use slotshard_core::{StorageKey, StorageValue};
use std::collections::btree_map;

/// The storage slots attributable to one top-level field.
///
/// A shard is immutable once sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    label: String,
    storage: StorageMap,
}

impl Shard {
    /// Seal an extracted storage map under `label`.
    pub fn seal(label: impl Into<String>, storage: StorageMap) -> Self {
        Self {
            label: label.into(),
            storage,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn storage(&self) -> &StorageMap {
        &self.storage
    }

    pub fn get(&self, key: &StorageKey) -> StorageValue {
        self.storage.get(key)
    }

    pub fn contains(&self, key: &StorageKey) -> bool {
        self.storage.contains(key)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, StorageKey, StorageValue> {
        self.storage.iter()
    }

    /// Digest of the shard's slots.
    pub fn root(&self) -> B256 {
        self.storage.root()
    }

    pub fn into_storage(self) -> StorageMap {
        self.storage
    }
}
