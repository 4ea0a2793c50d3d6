//! Dedup ledger: identities of battles already handed downstream.
//!
//! Grows monotonically for the life of the process. Nothing is persisted;
//! a restart re-seeds from whatever the source shows at that moment.

use std::collections::HashSet;

use crate::types::MatchIdentity;

/// Storage behind the "has this battle been handled" question.
///
/// `mark_seen` is the only mutation and is a single test-and-insert, so
/// a battle can never be admitted twice.
pub trait DedupLedger: Send {
    /// Record `id`. Returns `true` if it was new, `false` if already present.
    fn mark_seen(&mut self, id: MatchIdentity) -> bool;

    fn contains(&self, id: &MatchIdentity) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted copy of the contents, safe to hand to readers.
    fn snapshot(&self) -> Vec<MatchIdentity>;
}

/// In-process `HashSet` ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    seen: HashSet<MatchIdentity>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DedupLedger for InMemoryLedger {
    fn mark_seen(&mut self, id: MatchIdentity) -> bool {
        self.seen.insert(id)
    }

    fn contains(&self, id: &MatchIdentity) -> bool {
        self.seen.contains(id)
    }

    fn len(&self) -> usize {
        self.seen.len()
    }

    fn snapshot(&self) -> Vec<MatchIdentity> {
        let mut ids: Vec<_> = self.seen.iter().cloned().collect();
        ids.sort();
        ids
    }
}
