//! Declared storage layout: type descriptors, struct members and
//! extraction requests.
//!
//! Field names follow the layout JSON emitted by the compiler's
//! `--storage-layout` output after normalisation (`type`, `base`,
//! `encoding`, `numberOfBytes`, `members`, `slot`, `offset`).

use crate::hash::{slot_index, StorageKey};
use crate::registry::{LayoutError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a type is laid out in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Value(s) stored directly at the computed slot(s), possibly packed.
    Inplace,
    /// Length word at the declared slot, elements at `keccak(slot)`.
    DynamicArray,
    /// Short values inline, long values spilled to `keccak(slot)`.
    Bytes,
}

impl Encoding {
    /// Parse a raw encoding name. Returns `None` for encodings this crate
    /// cannot partition (e.g. `mapping`).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "inplace" => Some(Self::Inplace),
            "dynamic_array" => Some(Self::DynamicArray),
            "bytes" => Some(Self::Bytes),
            _ => None,
        }
    }

    /// The raw encoding name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inplace => "inplace",
            Self::DynamicArray => "dynamic_array",
            Self::Bytes => "bytes",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member of a struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Byte offset of the member within its slot.
    #[serde(alias = "Offset", deserialize_with = "serde_helpers::number")]
    pub offset: u64,
    /// Slot of the member relative to the start of the struct.
    #[serde(alias = "Slot", deserialize_with = "serde_helpers::slot")]
    pub slot: StorageKey,
    /// Type id of the member.
    #[serde(rename = "type")]
    pub type_id: String,
}

impl Member {
    pub fn new(type_id: impl Into<String>, slot: u64, offset: u64) -> Self {
        Self {
            offset,
            slot: slot_index(slot),
            type_id: type_id.into(),
        }
    }
}

/// A declared storage type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Unique type id, e.g. `t_array(t_uint8)dyn_storage`.
    #[serde(rename = "type")]
    pub id: String,
    /// Element / underlying type. `None` for leaf types and structs.
    #[serde(
        default,
        deserialize_with = "serde_helpers::non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub base: Option<String>,
    /// Raw encoding name as declared.
    pub encoding: String,
    /// Total size in bytes (a multiple of 32 for anything spanning slots).
    #[serde(
        rename = "numberOfBytes",
        alias = "NumberOfBytes",
        deserialize_with = "serde_helpers::number"
    )]
    pub byte_size: u64,
    /// Ordered struct members. Empty for everything but structs.
    #[serde(
        default,
        deserialize_with = "serde_helpers::null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub members: Vec<Member>,
}

impl TypeDescriptor {
    /// An inplace leaf value such as `t_uint128` or `t_address`.
    pub fn value(id: impl Into<String>, byte_size: u64) -> Self {
        Self {
            id: id.into(),
            base: None,
            encoding: Encoding::Inplace.as_str().to_string(),
            byte_size,
            members: Vec::new(),
        }
    }

    /// A fixed-size array of `base` occupying `byte_size` bytes.
    pub fn fixed_array(id: impl Into<String>, base: impl Into<String>, byte_size: u64) -> Self {
        Self {
            base: Some(base.into()),
            ..Self::value(id, byte_size)
        }
    }

    /// A dynamically-sized array of `base`.
    pub fn dynamic_array(id: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base: Some(base.into()),
            encoding: Encoding::DynamicArray.as_str().to_string(),
            byte_size: 32,
            members: Vec::new(),
        }
    }

    /// A `bytes` or `string` value.
    pub fn bytes(id: impl Into<String>) -> Self {
        Self {
            encoding: Encoding::Bytes.as_str().to_string(),
            ..Self::value(id, 32)
        }
    }

    /// A struct with the given members.
    pub fn structure(id: impl Into<String>, byte_size: u64, members: Vec<Member>) -> Self {
        Self {
            members,
            ..Self::value(id, byte_size)
        }
    }

    /// Override the raw encoding name.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// The declared encoding, if it is one this crate can partition.
    pub fn encoding(&self) -> Result<Encoding> {
        Encoding::parse(&self.encoding).ok_or_else(|| LayoutError::UnsupportedEncoding {
            type_id: self.id.clone(),
            encoding: self.encoding.clone(),
        })
    }

    pub fn is_struct(&self) -> bool {
        !self.members.is_empty()
    }

    pub fn is_flat(&self) -> bool {
        self.base.is_none()
    }

    pub fn is_nested(&self) -> bool {
        self.base.is_some() || self.is_struct()
    }
}

/// A request to extract one top-level storage field into its own shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Field name; becomes the shard's label.
    pub label: String,
    /// Declared type id of the field.
    #[serde(rename = "type")]
    pub type_id: String,
    /// Slot the field starts at.
    #[serde(alias = "Slot", deserialize_with = "serde_helpers::slot")]
    pub slot: StorageKey,
    /// Byte offset of the field within its first slot.
    #[serde(alias = "Offset", deserialize_with = "serde_helpers::number")]
    pub offset: u64,
}

impl ExtractionRequest {
    pub fn new(label: impl Into<String>, type_id: impl Into<String>, slot: u64, offset: u64) -> Self {
        Self {
            label: label.into(),
            type_id: type_id.into(),
            slot: slot_index(slot),
            offset,
        }
    }
}

mod serde_helpers {
    use crate::hash::{from_u256, StorageKey};
    use alloy_primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(u64),
        Text(String),
    }

    /// Accepts `32` as well as `"32"`.
    pub fn number<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(n) => Ok(n),
            NumberOrText::Text(s) => s.trim().parse().map_err(D::Error::custom),
        }
    }

    /// Accepts a `0x` word, a decimal string or a plain number.
    pub fn slot<'de, D>(deserializer: D) -> Result<StorageKey, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(n) => Ok(from_u256(U256::from(n))),
            NumberOrText::Text(s) => s
                .trim()
                .parse::<U256>()
                .map(from_u256)
                .map_err(D::Error::custom),
        }
    }

    pub fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let base = Option::<String>::deserialize(deserializer)?;
        Ok(base.filter(|s| !s.is_empty()))
    }

    pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
    }
}
