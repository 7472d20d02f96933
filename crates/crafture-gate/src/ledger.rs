use alloy::primitives::TxHash;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Instant;

/// Records which transaction hashes have already had their finality event
/// processed.
///
/// The claim is keyed on the hash itself, so a notification mechanism that
/// fires more than once for the same transaction can never unlock twice.
#[derive(Debug, Default)]
pub struct FinalityLedger {
    claimed: DashMap<TxHash, Instant>,
}

impl FinalityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `tx`. Returns `true` only for the first caller.
    pub fn try_claim(&self, tx: TxHash) -> bool {
        match self.claimed.entry(tx) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(Instant::now());
                true
            }
        }
    }

    pub fn is_claimed(&self, tx: &TxHash) -> bool {
        self.claimed.contains_key(tx)
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}
