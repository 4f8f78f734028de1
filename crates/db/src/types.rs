use std::time::{SystemTime, UNIX_EPOCH};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// One successful write-path commitment: the transaction reference returned
/// by the external commit step, plus when we recorded it. Append-only, never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct RelayRecord {
    /// Commitment/transaction identifier, as returned by the commit step.
    reference: String,

    /// Unix timestamp (seconds) at record creation.
    created_at: u64,
}

impl RelayRecord {
    pub fn new(reference: String, created_at: u64) -> Self {
        Self {
            reference,
            created_at,
        }
    }

    /// Creates a record stamped with the current time.
    pub fn new_now(reference: String) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_secs();
        Self::new(reference, now)
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }
}
