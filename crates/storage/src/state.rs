//! Contract storage state (slot → word).

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use slotshard_core::{StorageKey, StorageValue};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// One `(key, value)` pair of a storage dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    #[serde(alias = "Key")]
    pub key: StorageKey,
    #[serde(alias = "Value")]
    pub value: StorageValue,
}

/// Account storage: 32-byte slots addressed by 256-bit keys.
///
/// Absent slots read as zero and writing zero removes the slot, so an
/// all-zero word and a missing key are indistinguishable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageMap {
    slots: BTreeMap<StorageKey, StorageValue>,
}

impl StorageMap {
    /// Create an empty storage map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from dump entries, dropping all-zero values.
    pub fn from_entries(entries: impl IntoIterator<Item = StorageEntry>) -> Self {
        entries
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect()
    }

    /// Read a slot. Returns zero if the slot is unset.
    pub fn get(&self, key: &StorageKey) -> StorageValue {
        self.slots.get(key).copied().unwrap_or(B256::ZERO)
    }

    /// Check if a slot holds a non-zero word.
    pub fn contains(&self, key: &StorageKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Write a slot.
    pub fn insert(&mut self, key: StorageKey, value: StorageValue) {
        if value == B256::ZERO {
            self.slots.remove(&key);
        } else {
            self.slots.insert(key, value);
        }
    }

    /// OR `value` into the slot, keeping bytes already present.
    pub fn overlay(&mut self, key: StorageKey, value: StorageValue) {
        let mut word = self.get(&key);
        for (dst, src) in word.0.iter_mut().zip(value.0) {
            *dst |= src;
        }
        self.insert(key, word);
    }

    /// Copy a whole slot from `source`.
    pub fn copy_slot(&mut self, source: &StorageMap, key: &StorageKey) {
        self.insert(*key, source.get(key));
    }

    /// Copy one byte (index 0 is the most significant) of a slot from
    /// `source`, leaving the other bytes of this map's slot untouched.
    pub fn copy_byte(&mut self, source: &StorageMap, key: &StorageKey, index: usize) {
        let mut word = self.get(key);
        word.0[index] = source.get(key).0[index];
        self.insert(*key, word);
    }

    /// Number of non-zero slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate slots in ascending key order.
    pub fn iter(&self) -> btree_map::Iter<'_, StorageKey, StorageValue> {
        self.slots.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, StorageKey, StorageValue> {
        self.slots.keys()
    }

    /// Digest of the full contents.
    ///
    /// Slots are hashed in key order, so equal maps always have equal roots.
    pub fn root(&self) -> B256 {
        let mut hasher = blake3::Hasher::new();
        for (key, value) in &self.slots {
            hasher.update(key.as_slice());
            hasher.update(value.as_slice());
        }
        B256::from(<[u8; 32]>::from(hasher.finalize()))
    }
}

impl FromIterator<(StorageKey, StorageValue)> for StorageMap {
    fn from_iter<I: IntoIterator<Item = (StorageKey, StorageValue)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<'a> IntoIterator for &'a StorageMap {
    type Item = (&'a StorageKey, &'a StorageValue);
    type IntoIter = btree_map::Iter<'a, StorageKey, StorageValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}
