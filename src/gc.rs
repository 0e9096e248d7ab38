//! Subblock garbage collection.
//!
//! Victims are picked by walking erase-score thresholds upward; the last
//! threshold that produced a victim is kept so the next round starts there.

#[cfg(test)]
use std::{println as debug, println as trace, println as warn};

#[cfg(not(test))]
use log::*;

use crate::config::*;
use crate::ftl::{Ftl, Relocation};
use crate::ledger::Reclaimable;
use crate::nand::{PageStatus, SectorStatus, SubblockStatus};
use crate::timing::{NandCmd, NandOp};
use crate::write_pointer::Stream;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Victims {
    /// Nothing valid inside: erase straight away.
    pub erase: Vec<BaseType>,
    /// Valid data has to move out first.
    pub migrate: Vec<BaseType>,
}

impl Victims {
    pub fn len(&self) -> BaseType {
        self.erase.len() + self.migrate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, idx: BaseType) -> bool {
        self.erase.contains(&idx) || self.migrate.contains(&idx)
    }
}

impl Ftl {
    pub fn should_gc(&self) -> bool {
        self.nand.free_subblocks() <= self.spp.gc_thres_sblks
    }

    pub fn should_gc_high(&self) -> bool {
        self.nand.free_subblocks() <= self.spp.gc_thres_sblks_high
    }

    /// Picks up to `gc_victims` subblocks plus every subblock the reallocator excluded.
    pub fn select_victims(&mut self) -> Victims {
        let want = self.spp.gc_victims;
        let max = self.spp.max_score();
        let start = self.gc_threshold.min(max);

        let mut victims = Victims::default();
        victims.erase.extend(self.ledger.excluded());
        let bonus = victims.len();

        for threshold in (start..=max).chain(0..start) {
            for idx in 0..self.spp.tt_sblks {
                self.stats.select_time += self.spp.pg_rd_lat;
                if self.is_active(idx) || victims.contains(idx) {
                    continue;
                }

                let state = self.ledger.entry(idx).state;
                match state {
                    Reclaimable::FullyInvalid => victims.erase.push(idx),
                    Reclaimable::Score(score)
                        if score == threshold && !self.ledger.is_pristine(idx) =>
                    {
                        victims.migrate.push(idx);
                        self.gc_threshold = threshold;
                    }
                    _ => continue,
                }

                if victims.len() - bonus == want {
                    return victims;
                }
            }
        }

        victims
    }

    /// Pulls every valid sector out of subblock `idx` and queues it for `stream`.
    pub(crate) fn evacuate(&mut self, idx: BaseType, stream: Stream) -> Counter {
        let base = self.spp.subblock_to_ppa(idx);
        let mut moved = 0;

        for pg in 0..self.spp.pgs_per_sblk {
            let pg_ppa = base.with_page(pg);
            if self.nand.page(&self.spp, &pg_ppa).status != PageStatus::Valid {
                continue;
            }

            let valid: Vec<BaseType> = self
                .nand
                .page_sectors(&self.spp, &pg_ppa)
                .filter(|(_, status)| *status == SectorStatus::Valid)
                .map(|(sec, _)| sec)
                .collect();

            for sec in valid {
                let ppa = pg_ppa.with_sector(sec);
                let lpn = match self.map.reverse(&self.spp, &ppa) {
                    Some(lpn) => lpn,
                    None => panic!("valid sector {} has no reverse mapping", ppa),
                };
                assert_eq!(
                    self.map.get(lpn),
                    crate::mapping::L2pValue::Mapped(ppa),
                    "lpn {} reverse-mapped from {} but mapped elsewhere",
                    lpn,
                    ppa
                );

                self.nand.mark_sector_invalid(&self.spp, &ppa);
                self.ledger.sector_invalidated(idx);
                self.pending.push_back(Relocation { lpn, stream });
                moved += 1;
            }
            self.nand.mark_page_invalid(&self.spp, &pg_ppa);
        }

        let status = if self.ledger.is_pristine(idx) {
            SubblockStatus::Free
        } else {
            SubblockStatus::Invalid
        };
        self.nand.set_subblock_status(&self.spp, &base, status);
        moved
    }

    /// Physical erase of subblock `idx`; it must hold no valid data.
    pub(crate) fn erase(&mut self, idx: BaseType, stime: Time) {
        let ppa = self.spp.subblock_to_ppa(idx);
        assert_eq!(
            self.ledger.entry(idx).valid,
            0,
            "erasing subblock {} would drop valid data",
            idx
        );

        self.nand.erase_subblock(&self.spp, &ppa);
        self.map.clear_subblock(&self.spp, &ppa);
        self.ledger.reset(idx);
        self.nand.set_subblock_status(&self.spp, &ppa, SubblockStatus::Free);

        self.stats.erased_subblocks += 1;
        self.stats.erase_time += self.spp.blk_er_lat / 4;

        if self.spp.enable_gc_delay {
            let spp = &self.spp;
            self.nand
                .lun_mut(spp, &ppa)
                .advance_status(spp, &NandCmd::gc(NandOp::Erase, stime));
        }
    }

    /// One GC round: select, move out valid data, erase, rewrite through the
    /// cold stream. Returns how many subblocks were erased.
    pub fn do_subblock_gc(&mut self, stime: Time) -> BaseType {
        let victims = self.select_victims();
        if victims.is_empty() {
            warn!("GC found no victim, {} free subblocks", self.nand.free_subblocks());
            return 0;
        }

        for &idx in &victims.migrate {
            let moved = self.evacuate(idx, Stream::Cold);
            trace!("GC subblock {} moves {} sectors", idx, moved);
            self.erase(idx, stime);
        }
        for &idx in &victims.erase {
            self.erase(idx, stime);
        }
        self.drain_pending(stime);

        self.stats.gc_rounds += 1;
        debug!(
            "GC round {}: erased {} (direct {}), threshold {}, free {}",
            self.stats.gc_rounds,
            victims.len(),
            victims.erase.len(),
            self.gc_threshold,
            self.nand.free_subblocks()
        );
        victims.len()
    }
}
