//! Per-subblock erase-cost bookkeeping.
//!
//! The score is `valid * 2 + free`: valid sectors cost a copy each, free pages
//! are space the erase would throw away. Lower is cheaper to reclaim.

use crate::config::*;

/// How a subblock ranks as a reclamation candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclaimable {
    Score(BaseType),
    /// Every page programmed and nothing valid left: erase without copying.
    FullyInvalid,
    /// Evacuated by the reallocator, waits for the next GC erase.
    Excluded(BaseType),
}

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub invalidated: Counter,
    /// Valid sectors currently held.
    pub valid: Counter,
    /// Pages still erased.
    pub free: Counter,
    pub erase_count: Counter,
    /// Usage weight of the writes programmed since the last erase.
    pub heat: Counter,
    pub state: Reclaimable,
}

impl LedgerEntry {
    fn new(capacity: Counter) -> Self {
        LedgerEntry {
            invalidated: 0,
            valid: 0,
            free: capacity,
            erase_count: 0,
            heat: 0,
            state: Reclaimable::Score(capacity),
        }
    }

    pub fn score(&self) -> BaseType {
        self.valid * 2 + self.free
    }

    fn refresh(&mut self) {
        let score = self.score();
        self.state = match self.state {
            Reclaimable::Excluded(_) => Reclaimable::Excluded(score),
            _ if self.valid == 0 && self.free == 0 => Reclaimable::FullyInvalid,
            _ => Reclaimable::Score(score),
        };
    }
}

pub struct EraseCostLedger {
    entries: Vec<LedgerEntry>,
    capacity: Counter,
}

impl EraseCostLedger {
    pub fn new(spp: &SsdParams) -> Self {
        EraseCostLedger {
            entries: vec![LedgerEntry::new(spp.pgs_per_sblk); spp.tt_sblks],
            capacity: spp.pgs_per_sblk,
        }
    }

    pub fn entry(&self, idx: BaseType) -> &LedgerEntry {
        &self.entries[idx]
    }

    pub fn len(&self) -> BaseType {
        self.entries.len()
    }

    pub fn capacity(&self) -> Counter {
        self.capacity
    }

    /// Erased (or never written): nothing to reclaim.
    pub fn is_pristine(&self, idx: BaseType) -> bool {
        let e = &self.entries[idx];
        e.free == self.capacity && e.valid == 0
    }

    pub fn page_programmed(&mut self, idx: BaseType) {
        let e = &mut self.entries[idx];
        assert!(e.free > 0, "subblock {} has no free page left", idx);
        e.free -= 1;
        e.refresh();
    }

    pub fn sector_programmed(&mut self, idx: BaseType, weight: Counter) {
        let e = &mut self.entries[idx];
        e.valid += 1;
        e.heat += weight;
        e.refresh();
    }

    pub fn sector_invalidated(&mut self, idx: BaseType) {
        let e = &mut self.entries[idx];
        assert!(e.valid > 0, "subblock {} has no valid sector to invalidate", idx);
        e.valid -= 1;
        e.invalidated += 1;
        e.refresh();
    }

    pub fn exclude(&mut self, idx: BaseType) {
        let e = &mut self.entries[idx];
        e.state = Reclaimable::Excluded(e.score());
    }

    /// Ledger side of a physical erase.
    pub fn reset(&mut self, idx: BaseType) {
        let e = &mut self.entries[idx];
        e.invalidated = 0;
        e.valid = 0;
        e.free = self.capacity;
        e.heat = 0;
        e.erase_count += 1;
        e.state = Reclaimable::Score(self.capacity);
    }

    pub fn excluded(&self) -> impl Iterator<Item = BaseType> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e.state, Reclaimable::Excluded(_)))
            .map(|(i, _)| i)
    }
}
