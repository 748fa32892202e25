//! Per-field storage sharding for slotshard.
//!
//! This crate splits a contract's committed storage into one shard per
//! declared top-level field and checks that the shards add back up:
//! - **Partitioner**: recursive slot walk over inplace, dynamic array and
//!   bytes encodings
//! - **Assembler**: runs the partitioner per extraction request and merges
//!   the resulting shards
//! - **Verifier**: compares the merged shards against committed storage
//!
//! # Example
//!
//! ```rust
//! use alloy_primitives::B256;
//! use slotshard_core::{slot_index, ExtractionRequest, TypeDescriptor, TypeRegistry};
//! use slotshard_partition::{verify, ShardGenerator};
//! use slotshard_storage::StorageMap;
//!
//! let registry = TypeRegistry::new([TypeDescriptor::value("t_uint256", 32)]);
//!
//! let mut committed = StorageMap::new();
//! committed.insert(slot_index(0), B256::with_last_byte(1));
//! committed.insert(slot_index(1), B256::with_last_byte(2));
//!
//! let requests = vec![
//!     ExtractionRequest::new("a", "t_uint256", 0, 0),
//!     ExtractionRequest::new("b", "t_uint256", 1, 0),
//! ];
//!
//! let result = ShardGenerator::new(&registry, &committed)
//!     .generate(&requests)
//!     .unwrap();
//! assert_eq!(result.shards.len(), 2);
//! verify(&committed, &result.merged).unwrap();
//! ```

pub mod assembler;
pub mod partitioner;
pub mod verifier;

// Re-export commonly used types
pub use assembler::{Collision, CollisionPolicy, GeneratorConfig, Partitioning, ShardGenerator};
pub use partitioner::{PartitionError, Partitioner, Result, DEFAULT_MAX_DYNAMIC_LENGTH};
pub use verifier::{report, verify, Side, VerificationReport, VerifyError};
