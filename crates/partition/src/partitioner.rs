//! Recursive slot walk copying a field's bytes from committed storage.
//!
//! Each entry point takes a slot, a byte offset and a type id and copies
//! every byte the field occupies into an extracted storage accumulator.
//! Inplace values are copied byte by byte so fields packed into a shared
//! slot stay separate; dynamic arrays and long bytes follow their header
//! to the payload at `keccak(slot)`.

use alloy_primitives::U256;
use slotshard_core::{
    data_slot, slot_add, slot_offset, to_u256, Encoding, LayoutError, StorageKey, TypeRegistry,
    WORD_SIZE,
};
use slotshard_storage::StorageMap;
use thiserror::Error;
use tracing::debug;

/// Default upper bound on a length word read from committed storage.
pub const DEFAULT_MAX_DYNAMIC_LENGTH: u64 = 1 << 32;

/// Errors that abort partitioning.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("array type {0} has no base type")]
    MissingBaseType(String),

    #[error("offset {offset} of type {type_id} is out of range")]
    InvalidOffset { type_id: String, offset: u64 },

    #[error("type {type_id} has unusable size of {byte_size} bytes")]
    InvalidTypeSize { type_id: String, byte_size: u64 },

    #[error("length {length} at slot {slot} exceeds the limit of {limit}")]
    LengthOutOfRange {
        slot: StorageKey,
        length: U256,
        limit: u64,
    },

    #[error("slot {slot} is written by both {first} and {second}")]
    ShardCollision {
        slot: StorageKey,
        first: String,
        second: String,
    },
}

pub type Result<T> = std::result::Result<T, PartitionError>;

/// Walks declared types against committed storage.
pub struct Partitioner<'a> {
    registry: &'a TypeRegistry,
    committed: &'a StorageMap,
    max_dynamic_length: u64,
}

impl<'a> Partitioner<'a> {
    pub fn new(registry: &'a TypeRegistry, committed: &'a StorageMap) -> Self {
        Self {
            registry,
            committed,
            max_dynamic_length: DEFAULT_MAX_DYNAMIC_LENGTH,
        }
    }

    /// Set the largest array or bytes length accepted from storage.
    pub fn with_max_dynamic_length(mut self, limit: u64) -> Self {
        self.max_dynamic_length = limit;
        self
    }

    /// Partition a field by its own declared encoding.
    pub fn partition_field(
        &self,
        slot: &StorageKey,
        offset: u64,
        type_id: &str,
        out: &mut StorageMap,
    ) -> Result<()> {
        let encoding = self.registry.get(type_id)?.encoding()?;
        self.partition(encoding, slot, offset, type_id, out)
    }

    /// Dispatch to the procedure for `encoding`.
    pub fn partition(
        &self,
        encoding: Encoding,
        slot: &StorageKey,
        offset: u64,
        type_id: &str,
        out: &mut StorageMap,
    ) -> Result<()> {
        self.dispatch(encoding, slot, offset, type_id, out, 0)
    }

    /// Partition an inplace value: a packed leaf, a struct, or a fixed
    /// array of any of those.
    pub fn partition_inplace(
        &self,
        slot: &StorageKey,
        offset: u64,
        type_id: &str,
        out: &mut StorageMap,
    ) -> Result<()> {
        self.inplace(slot, offset, type_id, out, 0)
    }

    /// Partition a dynamic array: the length slot plus every element
    /// starting at `keccak(slot)`.
    pub fn partition_dynamic_array(
        &self,
        slot: &StorageKey,
        type_id: &str,
        out: &mut StorageMap,
    ) -> Result<()> {
        self.dynamic_array(slot, type_id, out, 0)
    }

    /// Partition a `bytes`/`string` value. Short values live entirely in
    /// the header; long ones (low bit set, header = `2 * length + 1`) spill
    /// into `ceil(length / 32)` slots from `keccak(slot)`.
    pub fn partition_bytes(
        &self,
        slot: &StorageKey,
        type_id: &str,
        out: &mut StorageMap,
    ) -> Result<()> {
        debug!(%slot, type_id, "partition bytes");
        self.registry.get(type_id)?;

        out.copy_slot(self.committed, slot);
        let header = self.committed.get(slot);
        if header.0[31] & 1 == 0 {
            return Ok(());
        }

        let length = (to_u256(&header) - U256::from(1)) / U256::from(2);
        let length = self.checked_length(slot, length)?;
        let data = data_slot(slot);
        for i in 0..length.div_ceil(WORD_SIZE) {
            out.copy_slot(self.committed, &slot_offset(&data, i));
        }
        Ok(())
    }

    // Every nested call moves to a member, base or element type, so an
    // acyclic type table never nests deeper than it has types.
    fn descend(&self, depth: usize, type_id: &str) -> Result<usize> {
        if depth > self.registry.len() {
            return Err(LayoutError::CyclicMember(type_id.to_string()).into());
        }
        Ok(depth + 1)
    }

    fn dispatch(
        &self,
        encoding: Encoding,
        slot: &StorageKey,
        offset: u64,
        type_id: &str,
        out: &mut StorageMap,
        depth: usize,
    ) -> Result<()> {
        match encoding {
            Encoding::Inplace => self.inplace(slot, offset, type_id, out, depth),
            Encoding::DynamicArray => self.dynamic_array(slot, type_id, out, depth),
            Encoding::Bytes => self.partition_bytes(slot, type_id, out),
        }
    }

    fn inplace(
        &self,
        slot: &StorageKey,
        offset: u64,
        type_id: &str,
        out: &mut StorageMap,
        depth: usize,
    ) -> Result<()> {
        debug!(%slot, offset, type_id, depth, "partition inplace");
        let byte_size = self.registry.get(type_id)?.byte_size;
        let depth = self.descend(depth, type_id)?;

        // Fixed array whose elements are dynamic arrays or bytes: one
        // header per slot.
        let resolved = self.registry.resolve_declared_encoding(type_id)?;
        if resolved.stopped_early {
            for i in 0..byte_size / WORD_SIZE {
                self.dispatch(
                    resolved.encoding,
                    &slot_offset(slot, i),
                    0,
                    &resolved.descriptor.id,
                    out,
                    depth,
                )?;
            }
            return Ok(());
        }

        if let Some(structure) = self.registry.find_enclosing_struct(type_id)? {
            let struct_size = structure.byte_size;
            if struct_size == 0 {
                return Err(PartitionError::InvalidTypeSize {
                    type_id: structure.id.clone(),
                    byte_size: struct_size,
                });
            }
            let slots_per_struct = struct_size.div_ceil(WORD_SIZE);

            let mut base = *slot;
            for _ in 0..byte_size / struct_size {
                for member in &structure.members {
                    let encoding = self.registry.get(&member.type_id)?.encoding()?;
                    let member_slot = slot_add(&base, to_u256(&member.slot));
                    self.dispatch(
                        encoding,
                        &member_slot,
                        member.offset,
                        &member.type_id,
                        out,
                        depth,
                    )?;
                }
                base = slot_offset(&base, slots_per_struct);
            }
            return Ok(());
        }

        let end = offset
            .checked_add(byte_size)
            .ok_or_else(|| PartitionError::InvalidOffset {
                type_id: type_id.to_string(),
                offset,
            })?;
        for position in offset..end {
            let key = slot_offset(slot, position / WORD_SIZE);
            let index = (WORD_SIZE - 1 - position % WORD_SIZE) as usize;
            out.copy_byte(self.committed, &key, index);
        }
        Ok(())
    }

    fn dynamic_array(
        &self,
        slot: &StorageKey,
        type_id: &str,
        out: &mut StorageMap,
        depth: usize,
    ) -> Result<()> {
        debug!(%slot, type_id, depth, "partition dynamic array");
        let descriptor = self.registry.get(type_id)?;

        out.copy_slot(self.committed, slot);
        let length = to_u256(&self.committed.get(slot));
        if length.is_zero() {
            return Ok(());
        }
        let length = self.checked_length(slot, length)?;
        let depth = self.descend(depth, type_id)?;

        let element_id = descriptor
            .base
            .as_deref()
            .ok_or_else(|| PartitionError::MissingBaseType(type_id.to_string()))?;
        let element = self.registry.classify(element_id)?;
        let data = data_slot(slot);

        match element.encoding {
            Encoding::Inplace if element.is_nested => {
                let slots_per_element = U256::from(element.byte_size.div_ceil(WORD_SIZE));
                for i in 0..length {
                    let delta = slots_per_element.wrapping_mul(U256::from(i));
                    let element_slot = slot_add(&data, delta);
                    self.inplace(&element_slot, 0, element_id, out, depth)?;
                }
            }
            Encoding::Inplace => {
                if element.byte_size == 0 || element.byte_size > WORD_SIZE {
                    return Err(PartitionError::InvalidTypeSize {
                        type_id: element_id.to_string(),
                        byte_size: element.byte_size,
                    });
                }
                let per_slot = WORD_SIZE / element.byte_size;
                for i in 0..length.div_ceil(per_slot) {
                    let element_slot = slot_offset(&data, i);
                    for j in 0..per_slot {
                        let offset = j * element.byte_size;
                        self.inplace(&element_slot, offset, element_id, out, depth)?;
                    }
                }
            }
            // One header slot per element, each expanded by its own encoding.
            Encoding::DynamicArray | Encoding::Bytes => {
                for i in 0..length {
                    let header = slot_offset(&data, i);
                    self.dispatch(element.encoding, &header, 0, element_id, out, depth)?;
                }
            }
        }
        Ok(())
    }

    fn checked_length(&self, slot: &StorageKey, length: U256) -> Result<u64> {
        if length > U256::from(self.max_dynamic_length) {
            return Err(PartitionError::LengthOutOfRange {
                slot: *slot,
                length,
                limit: self.max_dynamic_length,
            });
        }
        Ok(length.as_limbs()[0])
    }
}
