//! Type registry: lookup and classification of declared storage types.

use crate::layout::{Encoding, TypeDescriptor};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// Errors raised while interpreting the declared layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("type not found: {0}")]
    TypeNotFound(String),

    #[error("unsupported encoding {encoding:?} for type {type_id}")]
    UnsupportedEncoding { type_id: String, encoding: String },

    #[error("base chain of type {0} is cyclic")]
    CyclicBaseChain(String),

    #[error("member recursion of type {0} is cyclic")]
    CyclicMember(String),
}

/// Result type for layout operations.
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Summary of a declared type as the partitioner sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeClass {
    pub is_struct: bool,
    pub is_nested: bool,
    pub is_flat: bool,
    pub encoding: Encoding,
    pub byte_size: u64,
}

/// Outcome of following an inplace base chain.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedEncoding<'a> {
    /// The type the walk stopped at.
    pub descriptor: &'a TypeDescriptor,
    /// Encoding of that type.
    pub encoding: Encoding,
    /// True when the chain ended at a non-inplace type (the inplace type
    /// is a fixed array of dynamic arrays or bytes).
    pub stopped_early: bool,
}

/// Immutable map from type id to its declaration.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    /// Build a registry from a type table. A repeated id replaces the
    /// earlier declaration.
    pub fn new(descriptors: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        let mut types = HashMap::new();
        for descriptor in descriptors {
            let id = descriptor.id.clone();
            if types.insert(id.clone(), descriptor).is_some() {
                warn!(type_id = %id, "duplicate type declaration, keeping the later one");
            }
        }
        Self { types }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.types.contains_key(type_id)
    }

    /// Look up a declaration.
    pub fn get(&self, type_id: &str) -> Result<&TypeDescriptor> {
        self.types
            .get(type_id)
            .ok_or_else(|| LayoutError::TypeNotFound(type_id.to_string()))
    }

    /// Classify a type by shape, encoding and size.
    pub fn classify(&self, type_id: &str) -> Result<TypeClass> {
        let descriptor = self.get(type_id)?;
        Ok(TypeClass {
            is_struct: descriptor.is_struct(),
            is_nested: descriptor.is_nested(),
            is_flat: descriptor.is_flat(),
            encoding: descriptor.encoding()?,
            byte_size: descriptor.byte_size,
        })
    }

    /// Follow the base chain of `type_id` through inplace non-struct types.
    ///
    /// Stops at the first type whose encoding is not inplace
    /// (`stopped_early = true`), or at a leaf or struct
    /// (`stopped_early = false`).
    pub fn resolve_declared_encoding(&self, type_id: &str) -> Result<ResolvedEncoding<'_>> {
        let mut current = self.get(type_id)?;
        for _ in 0..=self.types.len() {
            let encoding = current.encoding()?;
            if encoding != Encoding::Inplace {
                return Ok(ResolvedEncoding {
                    descriptor: current,
                    encoding,
                    stopped_early: true,
                });
            }
            match &current.base {
                Some(base) if !current.is_struct() => current = self.get(base)?,
                _ => {
                    return Ok(ResolvedEncoding {
                        descriptor: current,
                        encoding,
                        stopped_early: false,
                    })
                }
            }
        }
        Err(LayoutError::CyclicBaseChain(type_id.to_string()))
    }

    /// Follow the base chain of `type_id` until a struct is found.
    ///
    /// Returns `None` for arrays (of arrays) of primitives.
    pub fn find_enclosing_struct(&self, type_id: &str) -> Result<Option<&TypeDescriptor>> {
        let mut current = self.get(type_id)?;
        for _ in 0..=self.types.len() {
            if current.is_struct() {
                return Ok(Some(current));
            }
            match &current.base {
                Some(base) => current = self.get(base)?,
                None => return Ok(None),
            }
        }
        Err(LayoutError::CyclicBaseChain(type_id.to_string()))
    }
}

impl FromIterator<TypeDescriptor> for TypeRegistry {
    fn from_iter<I: IntoIterator<Item = TypeDescriptor>>(iter: I) -> Self {
        Self::new(iter)
    }
}
