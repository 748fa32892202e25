//! Core storage-layout primitives for slotshard.
//!
//! This crate provides the types shared by the storage and partition crates:
//! - Slot primitives (keccak slot derivation, 256-bit slot arithmetic)
//! - Declared layout (type descriptors, struct members, extraction requests)
//! - The type registry and its classification queries

pub mod hash;
pub mod layout;
pub mod registry;

// Re-export commonly used types at the crate root
pub use hash::{
    data_slot, from_u256, slot_add, slot_index, slot_offset, to_u256, StorageKey, StorageValue,
    WORD_SIZE,
};
pub use layout::{Encoding, ExtractionRequest, Member, TypeDescriptor};
pub use registry::{LayoutError, ResolvedEncoding, TypeClass, TypeRegistry};
