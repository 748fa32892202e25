//! Checks that merged shards reproduce committed storage exactly.

use slotshard_core::{StorageKey, StorageValue};
use slotshard_storage::StorageMap;
use std::fmt;
use thiserror::Error;

/// Which storage map a slot is missing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Committed,
    Merged,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Committed => f.write_str("committed"),
            Side::Merged => f.write_str("merged"),
        }
    }
}

/// A difference between committed and merged storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("slot {slot} is missing from {missing_from} storage")]
    KeyMissing { slot: StorageKey, missing_from: Side },

    #[error("slot {slot} differs: committed {committed}, merged {merged}")]
    ValueMismatch {
        slot: StorageKey,
        committed: StorageValue,
        merged: StorageValue,
    },
}

impl VerifyError {
    pub fn slot(&self) -> &StorageKey {
        match self {
            VerifyError::KeyMissing { slot, .. } | VerifyError::ValueMismatch { slot, .. } => slot,
        }
    }
}

/// Every discrepancy found, ordered by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Number of distinct slots compared.
    pub checked: usize,
    pub discrepancies: Vec<VerifyError>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// The first discrepancy, if any.
    pub fn into_result(self) -> Result<(), VerifyError> {
        match self.discrepancies.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Compare both directions and collect every discrepancy.
pub fn report(committed: &StorageMap, merged: &StorageMap) -> VerificationReport {
    let mut discrepancies = Vec::new();
    let mut checked = committed.len();

    for (slot, value) in committed {
        if !merged.contains(slot) {
            discrepancies.push(VerifyError::KeyMissing {
                slot: *slot,
                missing_from: Side::Merged,
            });
        } else if merged.get(slot) != *value {
            discrepancies.push(VerifyError::ValueMismatch {
                slot: *slot,
                committed: *value,
                merged: merged.get(slot),
            });
        }
    }
    for slot in merged.keys() {
        if !committed.contains(slot) {
            checked += 1;
            discrepancies.push(VerifyError::KeyMissing {
                slot: *slot,
                missing_from: Side::Committed,
            });
        }
    }

    discrepancies.sort_by(|a, b| a.slot().cmp(b.slot()));
    VerificationReport {
        checked,
        discrepancies,
    }
}

/// Fail on the first discrepancy between committed and merged storage.
pub fn verify(committed: &StorageMap, merged: &StorageMap) -> Result<(), VerifyError> {
    report(committed, merged).into_result()
}
