//! Keccak slot derivation and 256-bit slot arithmetic.

use alloy_primitives::{keccak256, B256, U256};

/// A storage slot address (256-bit, big-endian).
pub type StorageKey = B256;

/// A 32-byte storage word.
pub type StorageValue = B256;

/// Number of bytes in one storage word.
pub const WORD_SIZE: u64 = 32;

/// Interpret a storage word as a big-endian integer.
pub fn to_u256(word: &B256) -> U256 {
    U256::from_be_bytes(word.0)
}

/// Encode an integer as a big-endian storage word.
pub fn from_u256(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

/// The slot with the given index.
pub fn slot_index(index: u64) -> StorageKey {
    from_u256(U256::from(index))
}

/// `slot + delta`, wrapping at 2^256 like the EVM does.
pub fn slot_add(slot: &StorageKey, delta: U256) -> StorageKey {
    from_u256(to_u256(slot).wrapping_add(delta))
}

/// `slot + delta` for small offsets.
pub fn slot_offset(slot: &StorageKey, delta: u64) -> StorageKey {
    slot_add(slot, U256::from(delta))
}

/// First payload slot of the dynamic array or long bytes value whose header
/// lives at `slot`.
pub fn data_slot(slot: &StorageKey) -> StorageKey {
    keccak256(slot.as_slice())
}
