#[cfg(test)]
use std::println as debug;

#[cfg(not(test))]
use log::*;

use crate::config::*;
use crate::ftl::Ftl;
use crate::ledger::Reclaimable;
use crate::write_pointer::Stream;

impl Ftl {
    /// Cheapest subblock among the first `realloc_scan_limit` that still holds
    /// data; ties go to the one written hottest.
    pub fn select_reallocation_subblock(&self) -> Option<BaseType> {
        (0..self.spp.realloc_scan_limit)
            .filter(|&idx| !self.is_active(idx) && !self.ledger.is_pristine(idx))
            .filter_map(|idx| {
                let e = self.ledger.entry(idx);
                match e.state {
                    Reclaimable::Score(score) => Some((idx, score, e.heat)),
                    _ => None,
                }
            })
            .min_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
            .map(|(idx, _, _)| idx)
    }

    /// Moves the valid data of one subblock into the hot stream and parks the
    /// subblock until the next GC round erases it.
    pub fn do_data_reallocation(&mut self, stime: Time) -> Option<BaseType> {
        let idx = match self.select_reallocation_subblock() {
            Some(idx) => idx,
            None => {
                debug!("reallocation found no candidate");
                return None;
            }
        };

        let heat = self.ledger.entry(idx).heat;
        let moved = self.evacuate(idx, Stream::Hot);
        self.ledger.exclude(idx);
        self.drain_pending(stime);

        self.stats.realloc_passes += 1;
        debug!("reallocated subblock {} (heat {}): {} sectors to hot stream", idx, heat, moved);
        Some(idx)
    }
}
