//! Record of endings unlocked across sessions.

use crate::scene::EndingType;
use crate::store::{KvStore, StoreError};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Store key holding the unlocked set.
pub const ENDINGS_KEY: &str = "andromeda_endings";

/// The persisted set of unlocked endings.
///
/// The ledger is the only writer of the set. It keeps an in-memory copy so
/// that a failing store never loses an unlock for the running session.
pub struct EndingLedger<S> {
    store: S,
    unlocked: BTreeSet<EndingType>,
}

impl<S: KvStore> EndingLedger<S> {
    /// Open the ledger, reading whatever set the store already holds.
    pub fn open(store: S) -> Self {
        let unlocked = read_set(&store);
        Self { store, unlocked }
    }

    /// Unlock an ending. Unlocking twice leaves the set unchanged.
    pub fn unlock(&mut self, ending: EndingType) -> &BTreeSet<EndingType> {
        if self.unlocked.insert(ending) {
            info!(ending = %ending, "ending unlocked");
            if let Err(e) = self.persist() {
                warn!(error = %e, "failed to persist ending ledger");
            }
        }
        &self.unlocked
    }

    pub fn unlocked_set(&self) -> &BTreeSet<EndingType> {
        &self.unlocked
    }

    pub fn contains(&self, ending: EndingType) -> bool {
        self.unlocked.contains(&ending)
    }

    /// Whether every normal ending has been reached.
    pub fn is_normal_complete(&self) -> bool {
        EndingType::NORMAL.iter().all(|e| self.unlocked.contains(e))
    }

    /// Number of normal endings unlocked.
    pub fn normal_count(&self) -> usize {
        EndingType::NORMAL
            .iter()
            .filter(|e| self.unlocked.contains(e))
            .count()
    }

    /// Erase the set together with everything else in the store.
    pub fn wipe(&mut self) -> Result<(), StoreError> {
        self.unlocked.clear();
        self.store.clear()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.unlocked)
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
        self.store.put(ENDINGS_KEY, &json)
    }
}

fn read_set<S: KvStore>(store: &S) -> BTreeSet<EndingType> {
    match store.get(ENDINGS_KEY) {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!(error = %e, "ending ledger unreadable, starting empty");
            BTreeSet::new()
        }),
        Ok(None) => BTreeSet::new(),
        Err(e) => {
            warn!(error = %e, "failed to read ending ledger");
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_unlock_is_idempotent() {
        let mut ledger = EndingLedger::open(MemoryStore::new());
        let first = ledger.unlock(EndingType::Connection).clone();
        let second = ledger.unlock(EndingType::Connection).clone();
        assert_eq!(first, second);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_normal_complete_any_order() {
        let mut forward = EndingLedger::open(MemoryStore::new());
        let mut backward = EndingLedger::open(MemoryStore::new());

        for (i, ending) in EndingType::NORMAL.iter().enumerate() {
            assert!(!forward.is_normal_complete());
            forward.unlock(*ending);
            backward.unlock(EndingType::NORMAL[4 - i]);
            assert_eq!(forward.normal_count(), i + 1);
        }

        assert!(forward.is_normal_complete());
        assert!(backward.is_normal_complete());
        assert_eq!(forward.unlocked_set(), backward.unlocked_set());
    }

    #[test]
    fn test_truth_does_not_complete_normals() {
        let mut ledger = EndingLedger::open(MemoryStore::new());
        for ending in &EndingType::NORMAL[..4] {
            ledger.unlock(*ending);
        }
        ledger.unlock(EndingType::Truth);
        ledger.unlock(EndingType::Reconciliation);
        assert!(!ledger.is_normal_complete());
    }

    #[test]
    fn test_persisted_across_opens() {
        let store = MemoryStore::new();
        let mut ledger = EndingLedger::open(store.clone());
        ledger.unlock(EndingType::Stagnation);

        let reopened = EndingLedger::open(store.clone());
        assert!(reopened.contains(EndingType::Stagnation));
        assert_eq!(
            store.get(ENDINGS_KEY).unwrap().as_deref(),
            Some("[\"stagnation\"]")
        );
    }

    #[test]
    fn test_corrupt_ledger_reads_empty() {
        let store = MemoryStore::new();
        store.put(ENDINGS_KEY, "{not json").unwrap();
        let ledger = EndingLedger::open(store);
        assert!(ledger.unlocked_set().is_empty());
    }

    #[test]
    fn test_wipe_clears_store() {
        let store = MemoryStore::new();
        store.put("andromeda_save_slot_1", "{}").unwrap();
        let mut ledger = EndingLedger::open(store.clone());
        ledger.unlock(EndingType::Destruction);

        ledger.wipe().unwrap();
        assert!(ledger.unlocked_set().is_empty());
        assert!(store.is_empty());
    }
}
