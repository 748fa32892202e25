//! Contract storage for slotshard.
//!
//! This crate provides the slot stores the partitioner reads and writes:
//! - `StorageMap`: committed and extracted account storage (slot → word)
//! - `Shard`: a sealed, labelled storage map for one top-level field
//!
//! # Example
//!
//! ```rust
//! use alloy_primitives::B256;
//! use slotshard_core::slot_index;
//! use slotshard_storage::{Shard, StorageMap};
//!
//! let mut committed = StorageMap::new();
//! committed.insert(slot_index(0), B256::with_last_byte(42));
//!
//! let mut extracted = StorageMap::new();
//! extracted.copy_slot(&committed, &slot_index(0));
//!
//! let shard = Shard::seal("total", extracted);
//! assert_eq!(shard.get(&slot_index(0)), committed.get(&slot_index(0)));
//! ```

pub mod shard;
pub mod state;

// Re-export commonly used types
pub use shard::Shard;
pub use state::{StorageEntry, StorageMap};
