//! Shard assembly: one shard per extraction request, plus their union.

use crate::partitioner::{PartitionError, Partitioner, Result, DEFAULT_MAX_DYNAMIC_LENGTH};
use serde::{Deserialize, Serialize};
use slotshard_core::{ExtractionRequest, StorageKey, TypeRegistry};
use slotshard_storage::{Shard, StorageMap};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// What to do when two shards write the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The later shard's value replaces the earlier one.
    #[default]
    LastWins,
    /// Abort generation.
    Reject,
    /// OR the values together, rebuilding slots shared by packed fields.
    Union,
}

/// Configuration for shard generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Handling of slots written by more than one shard.
    pub collision_policy: CollisionPolicy,
    /// Largest array or bytes length accepted from committed storage.
    pub max_dynamic_length: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            collision_policy: CollisionPolicy::default(),
            max_dynamic_length: DEFAULT_MAX_DYNAMIC_LENGTH,
        }
    }
}

impl GeneratorConfig {
    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    pub fn with_max_dynamic_length(mut self, limit: u64) -> Self {
        self.max_dynamic_length = limit;
        self
    }
}

/// A slot written by more than one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collision {
    pub slot: StorageKey,
    /// Label of the shard that wrote the slot first.
    pub first: String,
    /// Label of the shard that wrote it again.
    pub second: String,
}

/// Output of shard generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partitioning {
    /// Union of all shards.
    pub merged: StorageMap,
    /// Shards by label.
    pub shards: BTreeMap<String, Shard>,
    /// Slots claimed by more than one shard, in merge order.
    pub collisions: Vec<Collision>,
}

impl Partitioning {
    pub fn shard(&self, label: &str) -> Option<&Shard> {
        self.shards.get(label)
    }
}

/// Drives the partitioner over a list of extraction requests.
pub struct ShardGenerator<'a> {
    registry: &'a TypeRegistry,
    committed: &'a StorageMap,
    config: GeneratorConfig,
}

impl<'a> ShardGenerator<'a> {
    /// Create a generator with default configuration.
    pub fn new(registry: &'a TypeRegistry, committed: &'a StorageMap) -> Self {
        Self::with_config(registry, committed, GeneratorConfig::default())
    }

    /// Create a generator with the given configuration.
    pub fn with_config(
        registry: &'a TypeRegistry,
        committed: &'a StorageMap,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            registry,
            committed,
            config,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Extract a single request into a sealed shard.
    pub fn extract(&self, request: &ExtractionRequest) -> Result<Shard> {
        let partitioner = Partitioner::new(self.registry, self.committed)
            .with_max_dynamic_length(self.config.max_dynamic_length);

        let mut extracted = StorageMap::new();
        partitioner.partition_field(
            &request.slot,
            request.offset,
            &request.type_id,
            &mut extracted,
        )?;

        let shard = Shard::seal(request.label.clone(), extracted);
        info!(
            label = shard.label(),
            slots = shard.len(),
            root = %shard.root(),
            "sealed shard"
        );
        Ok(shard)
    }

    /// Extract every request in order and merge the shards.
    ///
    /// The first failing request aborts the whole run.
    pub fn generate(&self, requests: &[ExtractionRequest]) -> Result<Partitioning> {
        let mut merged = StorageMap::new();
        let mut owners: HashMap<StorageKey, String> = HashMap::new();
        let mut shards = BTreeMap::new();
        let mut collisions = Vec::new();

        for request in requests {
            let shard = self.extract(request)?;

            for (key, value) in shard.iter() {
                if let Some(first) = owners.insert(*key, request.label.clone()) {
                    let collision = Collision {
                        slot: *key,
                        first,
                        second: request.label.clone(),
                    };
                    warn!(
                        slot = %collision.slot,
                        first = %collision.first,
                        second = %collision.second,
                        policy = ?self.config.collision_policy,
                        "shards overlap"
                    );
                    match self.config.collision_policy {
                        CollisionPolicy::Reject => {
                            return Err(PartitionError::ShardCollision {
                                slot: collision.slot,
                                first: collision.first,
                                second: collision.second,
                            })
                        }
                        CollisionPolicy::LastWins => merged.insert(*key, *value),
                        CollisionPolicy::Union => merged.overlay(*key, *value),
                    }
                    collisions.push(collision);
                } else {
                    merged.insert(*key, *value);
                }
            }

            if shards.insert(request.label.clone(), shard).is_some() {
                warn!(label = %request.label, "duplicate shard label, keeping the later shard");
            }
        }

        info!(
            shards = shards.len(),
            slots = merged.len(),
            collisions = collisions.len(),
            "generated shards"
        );
        Ok(Partitioning {
            merged,
            shards,
            collisions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, U256};
    use slotshard_core::{from_u256, slot_index, LayoutError, Member, TypeDescriptor};

    fn word(n: u64) -> B256 {
        from_u256(U256::from(n))
    }

    fn registry() -> TypeRegistry {
        TypeRegistry::new([
            TypeDescriptor::value("t_uint256", 32),
            TypeDescriptor::value("t_uint128", 16),
            TypeDescriptor::structure(
                "t_struct(Pair)_storage",
                32,
                vec![
                    Member::new("t_uint128", 0, 0),
                    Member::new("t_uint128", 0, 16),
                ],
            ),
        ])
    }

    fn packed_word() -> B256 {
        let mut packed = [0u8; 32];
        packed[..16].copy_from_slice(&[0xAA; 16]);
        packed[16..].copy_from_slice(&[0xBB; 16]);
        B256::from(packed)
    }

    #[test]
    fn test_generate_one_shard_per_request() {
        let registry = registry();
        let committed: StorageMap = [(slot_index(0), word(1)), (slot_index(1), packed_word())]
            .into_iter()
            .collect();
        let requests = vec![
            ExtractionRequest::new("total", "t_uint256", 0, 0),
            ExtractionRequest::new("pair", "t_struct(Pair)_storage", 1, 0),
        ];

        let result = ShardGenerator::new(&registry, &committed)
            .generate(&requests)
            .unwrap();

        assert_eq!(result.shards.len(), 2);
        assert_eq!(result.shard("total").unwrap().get(&slot_index(0)), word(1));
        assert_eq!(result.shard("pair").unwrap().get(&slot_index(1)), packed_word());
        assert_eq!(result.merged, committed);
        assert!(result.collisions.is_empty());
    }

    #[test]
    fn test_failing_request_emits_nothing() {
        let registry = registry();
        let committed: StorageMap = [(slot_index(0), word(1))].into_iter().collect();
        let requests = vec![
            ExtractionRequest::new("total", "t_uint256", 0, 0),
            ExtractionRequest::new("ghost", "t_ghost", 1, 0),
        ];

        let err = ShardGenerator::new(&registry, &committed)
            .generate(&requests)
            .unwrap_err();
        assert_eq!(
            err,
            PartitionError::Layout(LayoutError::TypeNotFound("t_ghost".to_string()))
        );
    }

    fn packed_requests() -> Vec<ExtractionRequest> {
        vec![
            ExtractionRequest::new("low", "t_uint128", 0, 0),
            ExtractionRequest::new("high", "t_uint128", 0, 16),
        ]
    }

    #[test]
    fn test_last_wins_records_collision() {
        let registry = registry();
        let committed: StorageMap = [(slot_index(0), packed_word())].into_iter().collect();

        let result = ShardGenerator::new(&registry, &committed)
            .generate(&packed_requests())
            .unwrap();

        assert_eq!(
            result.collisions,
            vec![Collision {
                slot: slot_index(0),
                first: "low".to_string(),
                second: "high".to_string(),
            }]
        );
        assert_eq!(
            result.merged.get(&slot_index(0)),
            result.shard("high").unwrap().get(&slot_index(0))
        );
        assert_ne!(result.merged, committed);
    }

    #[test]
    fn test_union_rebuilds_packed_slot() {
        let registry = registry();
        let committed: StorageMap = [(slot_index(0), packed_word())].into_iter().collect();
        let config = GeneratorConfig::default().with_collision_policy(CollisionPolicy::Union);

        let result = ShardGenerator::with_config(&registry, &committed, config)
            .generate(&packed_requests())
            .unwrap();

        assert_eq!(result.collisions.len(), 1);
        assert_eq!(result.merged, committed);
    }

    #[test]
    fn test_reject_collision() {
        let registry = registry();
        let committed: StorageMap = [(slot_index(0), packed_word())].into_iter().collect();
        let config = GeneratorConfig::default().with_collision_policy(CollisionPolicy::Reject);

        let err = ShardGenerator::with_config(&registry, &committed, config)
            .generate(&packed_requests())
            .unwrap_err();
        assert_eq!(
            err,
            PartitionError::ShardCollision {
                slot: slot_index(0),
                first: "low".to_string(),
                second: "high".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_label_keeps_later_shard() {
        let registry = registry();
        let committed: StorageMap = [(slot_index(0), word(1)), (slot_index(1), word(2))]
            .into_iter()
            .collect();
        let requests = vec![
            ExtractionRequest::new("value", "t_uint256", 0, 0),
            ExtractionRequest::new("value", "t_uint256", 1, 0),
        ];

        let result = ShardGenerator::new(&registry, &committed)
            .generate(&requests)
            .unwrap();
        assert_eq!(result.shards.len(), 1);
        assert!(result.shard("value").unwrap().contains(&slot_index(1)));
        assert_eq!(result.merged, committed);
    }

    #[test]
    fn test_cyclic_struct_aborts_generation() {
        let registry = TypeRegistry::new([
            TypeDescriptor::value("t_uint256", 32),
            TypeDescriptor::structure(
                "t_struct(S)_storage",
                32,
                vec![
                    Member::new("t_uint256", 0, 0),
                    Member::new("t_struct(S)_storage", 0, 0),
                ],
            ),
        ]);
        let committed: StorageMap = [(slot_index(0), word(1))].into_iter().collect();
        let requests = vec![ExtractionRequest::new("s", "t_struct(S)_storage", 0, 0)];

        let err = ShardGenerator::new(&registry, &committed)
            .generate(&requests)
            .unwrap_err();
        assert_eq!(
            err,
            PartitionError::Layout(LayoutError::CyclicMember("t_struct(S)_storage".to_string()))
        );
    }

    #[test]
    fn test_overflowing_offset_aborts_generation() {
        let registry = registry();
        let committed: StorageMap = [(slot_index(0), word(1))].into_iter().collect();
        let requests = vec![ExtractionRequest::new("x", "t_uint256", 0, u64::MAX - 1)];

        let err = ShardGenerator::new(&registry, &committed)
            .generate(&requests)
            .unwrap_err();
        assert!(matches!(err, PartitionError::InvalidOffset { offset, .. } if offset == u64::MAX - 1));
    }

    #[test]
    fn test_default_config() {
        let config = GeneratorConfig::default();
        assert_eq!(config.collision_policy, CollisionPolicy::LastWins);
        assert_eq!(config.max_dynamic_length, DEFAULT_MAX_DYNAMIC_LENGTH);

        let config = config.with_max_dynamic_length(16);
        assert_eq!(config.max_dynamic_length, 16);
    }
}
