#[cfg(test)]
use std::{println as debug, println as trace};
use std::collections::VecDeque;
use byte_unit::Byte;

#[cfg(not(test))]
use log::*;

use crate::config::*;
use crate::error::{FtlError, Result};
use crate::ledger::EraseCostLedger;
use crate::mapping::{L2pValue, MappingTable};
use crate::nand::{NandArray, PageStatus, SectorStatus, SubblockStatus};
use crate::ppa::Ppa;
use crate::request::{IoKind, Request};
use crate::stats::FtlStats;
use crate::timing::{NandCmd, NandOp};
use crate::write_pointer::{Stream, WritePointer};

/// A logical id pulled out of a reclaimed subblock, waiting to be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub lpn: Lpn,
    pub stream: Stream,
}

pub struct Ftl {
    pub(crate) spp: SsdParams,
    pub(crate) nand: NandArray,
    pub(crate) map: MappingTable,
    pub(crate) ledger: EraseCostLedger,

    pub(crate) wp: WritePointer,
    pub(crate) hot_wp: WritePointer,

    usage: Vec<Counter>,
    written: Counter,

    pub(crate) pending: VecDeque<Relocation>,
    // last threshold that produced a GC victim
    pub(crate) gc_threshold: BaseType,
    writes_since_realloc: Counter,

    pub(crate) stats: FtlStats,
}

fn human(bytes: usize) -> String {
    Byte::from_bytes(bytes as _).get_appropriate_unit(true).to_string()
}

impl Ftl {
    pub fn new(cfg: &SsdConfig) -> Result<Self> {
        let spp = SsdParams::new(cfg)?;

        trace!("tt_secs: {}", spp.tt_secs);
        trace!("tt_sblks: {}", spp.tt_sblks);
        trace!(
            "Physical Capacity: {} bytes, {}",
            spp.tt_secs * spp.secsz,
            human(spp.tt_secs * spp.secsz)
        );
        trace!(
            "User Capacity: {} bytes, {}",
            spp.logical_size() * spp.secsz,
            human(spp.logical_size() * spp.secsz)
        );

        Ok(Ftl {
            nand: NandArray::new(&spp),
            map: MappingTable::new(&spp),
            ledger: EraseCostLedger::new(&spp),
            wp: WritePointer::cold(),
            hot_wp: WritePointer::hot(&spp),
            usage: vec![0; spp.logical_size()],
            written: 0,
            pending: VecDeque::new(),
            gc_threshold: 0,
            writes_since_realloc: 0,
            stats: FtlStats::default(),
            spp,
        })
    }

    pub fn params(&self) -> &SsdParams {
        &self.spp
    }

    pub fn nand(&self) -> &NandArray {
        &self.nand
    }

    pub fn ledger(&self) -> &EraseCostLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &FtlStats {
        &self.stats
    }

    pub fn get_max_lba(&self) -> Lpn {
        self.spp.logical_size() - 1
    }

    pub fn lookup(&self, lpn: Lpn) -> L2pValue {
        self.map.get(lpn)
    }

    pub fn reverse_lookup(&self, ppa: &Ppa) -> Option<Lpn> {
        self.map.reverse(&self.spp, ppa)
    }

    pub fn usage(&self, lpn: Lpn) -> Counter {
        self.usage[lpn]
    }

    pub fn write_pointer(&self, stream: Stream) -> WritePointer {
        match stream {
            Stream::Cold => self.wp,
            Stream::Hot => self.hot_wp,
        }
    }

    pub fn allocate_cold(&mut self) -> Ppa {
        self.allocate(Stream::Cold)
    }

    pub fn allocate_hot(&mut self) -> Ppa {
        self.allocate(Stream::Hot)
    }

    /// Hands out the sector under the stream's cursor and advances it.
    /// Subblocks that are not erased, and sectors already programmed by the
    /// other stream, are skipped a whole subblock at a time.
    fn allocate(&mut self, stream: Stream) -> Ppa {
        let Ftl {
            spp, nand, wp, hot_wp, ..
        } = self;
        let wp = match stream {
            Stream::Cold => wp,
            Stream::Hot => hot_wp,
        };

        let mut skipped = 0;
        loop {
            let ppa = wp.ppa();
            let blocked = if wp.at_subblock_start() {
                nand.subblock_status(spp.subblock_index(&ppa)) != SubblockStatus::Free
            } else {
                nand.sector(spp, &ppa) != SectorStatus::Free
            };
            if !blocked {
                wp.advance(spp);
                return ppa;
            }

            skipped += 1;
            if skipped > spp.tt_sblks {
                panic!("capacity exhausted: {:?} stream found no free subblock", stream);
            }
            trace!("{:?} stream skips occupied subblock at {}", stream, ppa);
            wp.skip_subblock(spp);
        }
    }

    pub(crate) fn is_active(&self, idx: BaseType) -> bool {
        self.spp.subblock_index(&self.wp.ppa()) == idx
            || self.spp.subblock_index(&self.hot_wp.ppa()) == idx
    }

    /// Counts one write of `lpn`; returns its weight, 2 once the write budget is mostly spent.
    fn record_usage(&mut self, lpn: Lpn) -> Counter {
        self.written += 1;
        let weight = if self.written * 5 > self.spp.write_budget * 4 { 2 } else { 1 };
        self.usage[lpn] += weight;
        weight
    }

    fn refresh_subblock(&mut self, ppa: &Ppa) {
        let idx = self.spp.subblock_index(ppa);
        let status = if self.ledger.is_pristine(idx) {
            SubblockStatus::Free
        } else if self.ledger.entry(idx).valid > 0 {
            SubblockStatus::Valid
        } else {
            SubblockStatus::Invalid
        };
        self.nand.set_subblock_status(&self.spp, ppa, status);
    }

    /// Programs `lpn` into the free sector `ppa`.
    pub(crate) fn place(&mut self, lpn: Lpn, ppa: &Ppa, weight: Counter) {
        let idx = self.spp.subblock_index(ppa);

        if self.nand.page(&self.spp, ppa).status == PageStatus::Free {
            self.nand.mark_page_valid(&self.spp, ppa);
            self.ledger.page_programmed(idx);
        }
        self.map.set(&self.spp, lpn, ppa);
        self.nand.mark_sector_valid(&self.spp, ppa);
        self.ledger.sector_programmed(idx, weight);

        self.refresh_subblock(ppa);
    }

    /// Marks a sector stale. The page follows once half of it is stale and
    /// nothing valid remains, which for pointer-written pages is the whole half.
    pub(crate) fn invalidate(&mut self, ppa: &Ppa) {
        let half = self.spp.secs_written_per_pg() as u32;
        let pg = self.nand.mark_sector_invalid(&self.spp, ppa);
        let cascade = pg.status == PageStatus::Valid && pg.valid == 0 && pg.invalid >= half;
        if cascade {
            self.nand.mark_page_invalid(&self.spp, ppa);
        }

        self.ledger.sector_invalidated(self.spp.subblock_index(ppa));
        self.refresh_subblock(ppa);
    }

    fn write_lpn(&mut self, lpn: Lpn) -> Ppa {
        let weight = self.record_usage(lpn);
        if let L2pValue::Mapped(old) = self.map.get(lpn) {
            self.invalidate(&old);
        }

        let ppa = self.allocate_cold();
        self.place(lpn, &ppa, weight);
        ppa
    }

    fn charge(&mut self, ppa: &Ppa, cmd: NandCmd) -> Time {
        self.nand.lun_mut(&self.spp, ppa).advance_status(&self.spp, &cmd)
    }

    /// Rewrites every queued relocation through the stream that queued it.
    /// GC rounds and reallocation passes call this before returning, so the
    /// queue is empty whenever a caller range is processed.
    pub(crate) fn drain_pending(&mut self, stime: Time) -> Time {
        let mut maxlat = 0;
        let move_cost = self.spp.pg_wr_lat / self.spp.secs_per_pg as Time;

        while let Some(r) = self.pending.pop_front() {
            let weight = self.record_usage(r.lpn);
            let ppa = self.allocate(r.stream);
            self.place(r.lpn, &ppa, weight);

            match r.stream {
                Stream::Cold => {
                    self.stats.gc_relocated += 1;
                    self.stats.move_time += move_cost;
                }
                Stream::Hot => {
                    self.stats.hot_relocated += 1;
                    self.stats.reallocation_time += move_cost;
                }
            }

            if self.spp.enable_gc_delay {
                let lat = self.charge(&ppa, NandCmd::gc(NandOp::Write, stime));
                maxlat = maxlat.max(lat);
            }
        }
        maxlat
    }

    fn check_range(&self, start: Lpn, len: BaseType) -> Result<()> {
        let size = self.spp.logical_size();
        match start.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(FtlError::LogicalOutOfRange { start, len, size }),
        }
    }

    pub fn handle_request(&mut self, req: &Request) -> Result<Time> {
        match req.kind {
            IoKind::Read => self.handle_read(req.slba, req.nlb, req.stime),
            IoKind::Write => self.handle_write(req.slba, req.nlb, req.stime),
            IoKind::Dsm => Ok(0),
        }
    }

    /// Latency of the slowest mapped logical id in the range.
    pub fn handle_read(&mut self, start: Lpn, len: BaseType, stime: Time) -> Result<Time> {
        self.check_range(start, len)?;

        let mut maxlat = 0;
        for lpn in start..start + len {
            let ppa = match self.map.get(lpn) {
                L2pValue::Mapped(ppa) if self.spp.validate_ppa(&ppa) => ppa,
                _ => continue,
            };
            let lat = self.charge(&ppa, NandCmd::user(NandOp::Read, stime));
            maxlat = maxlat.max(lat);
        }
        self.stats.user_reads += len;

        Ok(maxlat)
    }

    pub fn handle_write(&mut self, start: Lpn, len: BaseType, stime: Time) -> Result<Time> {
        self.check_range(start, len)?;

        let mut maxlat = 0;
        for lpn in start..start + len {
            self.maybe_reclaim(stime);

            let ppa = self.write_lpn(lpn);
            let lat = self.charge(&ppa, NandCmd::user(NandOp::Write, stime));
            maxlat = maxlat.max(lat);

            self.stats.user_writes += 1;
            self.writes_since_realloc += 1;
        }

        Ok(maxlat)
    }

    /// Policy hook run before every user allocation.
    fn maybe_reclaim(&mut self, stime: Time) {
        if self.spp.policy == ReclaimPolicy::Manual {
            return;
        }

        if self.should_gc_high() {
            debug!("free subblocks {} at high watermark", self.nand.free_subblocks());
            for _ in 0..self.spp.gc_rounds_high {
                if self.do_subblock_gc(stime) == 0 {
                    break;
                }
            }
        } else if self.should_gc() {
            self.do_subblock_gc(stime);
        }

        let interval = self.spp.realloc_interval;
        if interval > 0 && self.writes_since_realloc >= interval {
            self.writes_since_realloc = 0;
            self.do_data_reallocation(stime);
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::config::small_config;
    use crate::nand::SubblockStatus;
    use proptest::prelude::ProptestConfig;
    use proptest::{prop_assert_eq, proptest};
    use rand::prelude::*;
    use std::collections::HashSet;

    /// Cross-checks the state tree, ledger and both maps.
    pub(crate) fn check_invariants(fw: &Ftl) {
        let spp = fw.params();
        let cur_pages = [fw.wp.ppa(), fw.hot_wp.ppa()].map(|p| spp.flat_page(&p));

        for idx in 0..spp.tt_sblks {
            let base = spp.subblock_to_ppa(idx);
            let mut valid = 0;
            for pg in 0..spp.pgs_per_sblk {
                let ppa = base.with_page(pg);
                let page = fw.nand().page(spp, &ppa);
                let statuses: Vec<_> = fw.nand().page_sectors(spp, &ppa).map(|(_, s)| s).collect();

                let n_valid = statuses.iter().filter(|s| **s == SectorStatus::Valid).count();
                assert_eq!(page.valid as usize, n_valid);
                valid += n_valid;

                let all_free = statuses.iter().all(|s| *s == SectorStatus::Free);
                assert_eq!(page.status == PageStatus::Free, all_free, "page {}", ppa);
                if n_valid > 0 {
                    assert_eq!(page.status, PageStatus::Valid, "page {}", ppa);
                } else if !cur_pages.contains(&spp.flat_page(&ppa)) {
                    assert_ne!(page.status, PageStatus::Valid, "page {}", ppa);
                }

                for (sec, status) in fw.nand().page_sectors(spp, &ppa) {
                    if status == SectorStatus::Valid {
                        let sppa = ppa.with_sector(sec);
                        let lpn = fw.reverse_lookup(&sppa).expect("valid sector without owner");
                        assert_eq!(fw.lookup(lpn), L2pValue::Mapped(sppa));
                    }
                }
            }
            assert_eq!(fw.ledger().entry(idx).valid, valid, "subblock {}", idx);
        }
    }

    fn small() -> Ftl {
        Ftl::new(&small_config()).unwrap()
    }

    #[test]
    fn write_then_read_resolves() {
        let mut fw = small();

        fw.handle_write(5, 1, 0).unwrap();
        let ppa = match fw.lookup(5) {
            L2pValue::Mapped(ppa) => ppa,
            L2pValue::Unmapped => panic!("lpn 5 not mapped"),
        };
        assert_eq!(ppa, Ppa::default());
        assert_eq!(fw.reverse_lookup(&ppa), Some(5));

        // lun idle again by then, so the read pays only its own latency
        let lat = fw.handle_read(5, 1, 1_000_000_000).unwrap();
        assert_eq!(lat, NAND_READ_LATENCY);
    }

    #[test]
    fn read_of_unmapped_range_costs_nothing() {
        let mut fw = small();
        assert_eq!(fw.handle_read(0, 10, 0).unwrap(), 0);
    }

    #[test]
    fn read_reports_slowest_lun() {
        let mut fw = small();
        fw.handle_write(0, 2, 0).unwrap();

        // both ids share one lun, the second read queues behind the first
        let lat = fw.handle_read(0, 2, 1_000_000_000).unwrap();
        assert_eq!(lat, 2 * NAND_READ_LATENCY);
    }

    #[test]
    fn write_latency_is_max_not_sum() {
        let mut fw = small();
        let lat = fw.handle_write(0, 3, 0).unwrap();
        assert_eq!(lat, 3 * NAND_PROG_LATENCY);
    }

    #[test]
    fn sequential_fill_advances_cold_pointer() {
        let mut fw = Ftl::new(&SsdConfig {
            policy: ReclaimPolicy::Manual,
            ..SsdConfig::default()
        })
        .unwrap();

        fw.handle_write(0, 1024, 0).unwrap();

        let mut expect = WritePointer::cold();
        for _ in 0..1024 {
            expect.advance(fw.params());
        }
        let wp = fw.write_pointer(Stream::Cold);
        assert_eq!(wp, expect);
        // four sectors per page, 64 pages per subblock: four subblocks filled
        assert_eq!((wp.block, wp.subblock, wp.page, wp.sector), (1, 0, 0, 0));

        let mut seen = HashSet::new();
        for lpn in 0..1024 {
            match fw.lookup(lpn) {
                L2pValue::Mapped(ppa) => assert!(seen.insert(ppa), "lpn {} shares {}", lpn, ppa),
                L2pValue::Unmapped => panic!("lpn {} not mapped", lpn),
            }
        }
        assert_eq!(fw.map.mapped_count(), 1024);
    }

    #[test]
    fn rewrite_invalidates_old_sector() {
        let mut fw = small();
        let x = 9;

        fw.handle_write(x, 1, 0).unwrap();
        let L2pValue::Mapped(old) = fw.lookup(x) else { panic!("unmapped") };
        fw.handle_write(x, 1, 0).unwrap();
        let L2pValue::Mapped(new) = fw.lookup(x) else { panic!("unmapped") };

        assert_ne!(old, new);
        assert_eq!(fw.nand().sector(fw.params(), &old), SectorStatus::Invalid);
        assert_eq!(fw.nand().sector(fw.params(), &new), SectorStatus::Valid);
        assert_eq!(fw.reverse_lookup(&new), Some(x));
        // stale until the page is erased
        assert_eq!(fw.reverse_lookup(&old), Some(x));
        check_invariants(&fw);
    }

    #[test]
    fn page_turns_invalid_once_its_half_is_stale() {
        let mut fw = small();
        fw.handle_write(0, 4, 0).unwrap();
        let page = Ppa::default();

        fw.handle_write(0, 3, 0).unwrap();
        assert_eq!(fw.nand().page(fw.params(), &page).status, PageStatus::Valid);

        fw.handle_write(3, 1, 0).unwrap();
        let pg = fw.nand().page(fw.params(), &page);
        assert_eq!(pg.status, PageStatus::Invalid);
        assert_eq!((pg.valid, pg.invalid), (0, 4));
        check_invariants(&fw);
    }

    #[test]
    fn subblock_status_follows_contents() {
        let mut fw = small();
        let spp = fw.params().clone();
        let per_sblk = spp.secs_per_sblk / 2;

        fw.handle_write(0, per_sblk, 0).unwrap();
        assert_eq!(fw.nand().subblock_status(0), SubblockStatus::Valid);
        assert_eq!(fw.nand().free_subblocks(), spp.tt_sblks - 1);

        fw.handle_write(0, per_sblk, 0).unwrap();
        assert_eq!(fw.nand().subblock_status(0), SubblockStatus::Invalid);
        assert_eq!(fw.nand().block(&spp, &Ppa::default()).invalid_subblocks, 1);
        assert_eq!(fw.nand().block(&spp, &Ppa::default()).valid_subblocks, 1);
    }

    #[test]
    fn out_of_range_requests_are_rejected() {
        let mut fw = small();
        let size = fw.params().logical_size();

        assert_eq!(
            fw.handle_write(size - 1, 2, 0),
            Err(FtlError::LogicalOutOfRange { start: size - 1, len: 2, size })
        );
        assert!(fw.handle_read(usize::MAX, 2, 0).is_err());
        assert_eq!(fw.stats().user_writes, 0);
    }

    #[test]
    fn dispatches_requests_by_kind() {
        let mut fw = small();
        let write = Request {
            kind: IoKind::Write,
            slba: 0,
            nlb: 1,
            stime: 0,
        };

        assert_eq!(fw.handle_request(&write).unwrap(), NAND_PROG_LATENCY);
        assert_eq!(fw.handle_request(&Request { kind: IoKind::Dsm, ..write }).unwrap(), 0);
        let read = Request {
            kind: IoKind::Read,
            stime: NAND_PROG_LATENCY,
            ..write
        };
        assert_eq!(fw.handle_request(&read).unwrap(), NAND_READ_LATENCY);
    }

    #[test]
    fn usage_weight_doubles_late_in_budget() {
        let mut fw = Ftl::new(&SsdConfig {
            write_budget: 10,
            ..small_config()
        })
        .unwrap();

        fw.handle_write(0, 8, 0).unwrap();
        assert_eq!(fw.usage(7), 1);
        fw.handle_write(0, 1, 0).unwrap();
        assert_eq!(fw.usage(0), 1 + 2);
    }

    #[test]
    #[should_panic(expected = "capacity exhausted")]
    fn exhaustion_without_gc_is_fatal() {
        let mut fw = small();
        let lpns = fw.params().logical_size();

        // manual policy: keep rewriting until the log runs out of erased subblocks
        for _ in 0..8 {
            fw.handle_write(0, lpns, 0).unwrap();
        }
    }

    #[test]
    fn random_overwrites_under_occupancy_gc() {
        let mut fw = Ftl::new(&SsdConfig {
            policy: ReclaimPolicy::Occupancy,
            realloc_interval: 97,
            ..small_config()
        })
        .unwrap();
        let max_lba = fw.get_max_lba();
        let mut rng = SmallRng::seed_from_u64(7);

        fw.handle_write(0, max_lba + 1, 0).unwrap();
        for i in 0..20 * (max_lba + 1) {
            let lba = rng.gen_range(0..=max_lba);
            fw.handle_write(lba, 1, i as Time * 1_000).unwrap();
        }

        assert!(fw.stats().gc_rounds > 0);
        assert!(fw.stats().realloc_passes > 0);
        assert!(fw.pending.is_empty());
        assert_eq!(fw.map.mapped_count(), max_lba + 1);
        check_invariants(&fw);
    }

    #[test]
    fn allocators_move_only_their_own_cursor() {
        let mut fw = small();
        let cold = fw.write_pointer(Stream::Cold);
        let hot = fw.write_pointer(Stream::Hot);

        assert_eq!(fw.allocate_hot(), hot.ppa());
        assert_eq!(fw.write_pointer(Stream::Cold), cold);
        assert_eq!(fw.write_pointer(Stream::Hot).sector, 2);

        assert_eq!(fw.allocate_cold(), Ppa::default());
        assert_eq!(fw.write_pointer(Stream::Hot).sector, 2);
        assert_eq!(fw.write_pointer(Stream::Cold).sector, 2);
    }

    #[test]
    fn hot_stream_skips_subblock_opened_by_cold_stream() {
        let mut fw = small();
        let spp = fw.params().clone();
        fw.handle_write(0, 3, 0).unwrap();

        fw.hot_wp = WritePointer::cold();
        assert_eq!(fw.allocate_hot(), spp.subblock_to_ppa(1));
        check_invariants(&fw);

        // the cold stream keeps filling its own subblock
        fw.handle_write(3, 1, 0).unwrap();
        assert_eq!(fw.lookup(3), L2pValue::Mapped(Ppa::default().with_sector(6)));
        check_invariants(&fw);
    }

    #[test]
    fn hot_stream_skips_programmed_sector() {
        let mut fw = small();
        let spp = fw.params().clone();
        fw.handle_write(0, 3, 0).unwrap();

        fw.hot_wp = WritePointer {
            sector: 2,
            ..WritePointer::cold()
        };
        assert_eq!(fw.allocate_hot(), spp.subblock_to_ppa(1));
        assert_eq!(fw.lookup(1), L2pValue::Mapped(Ppa::default().with_sector(2)));
        check_invariants(&fw);
    }

    #[test]
    fn high_watermark_runs_several_rounds_per_write() {
        let mut fw = Ftl::new(&SsdConfig {
            policy: ReclaimPolicy::Occupancy,
            gc_thres_pcent: 0.0,
            gc_thres_pcent_high: 0.0,
            gc_rounds_high: 4,
            ..small_config()
        })
        .unwrap();
        let spp = fw.params().clone();
        assert!(fw.should_gc_high());

        let victims = [3, 5, 6];
        for (lpn, &idx) in victims.iter().enumerate() {
            fw.place(10 + lpn, &spp.subblock_to_ppa(idx), 1);
        }

        // three victims, the fourth round finds nothing and ends the loop
        fw.handle_write(0, 1, 0).unwrap();
        assert_eq!(fw.stats().gc_rounds, 3);
        assert_eq!(fw.stats().erased_subblocks, 3);
        for idx in victims {
            assert_eq!(fw.ledger().entry(idx).erase_count, 1);
            assert!(fw.ledger().is_pristine(idx));
        }
        for lpn in 10..13 {
            let L2pValue::Mapped(ppa) = fw.lookup(lpn) else { panic!("lpn {} lost", lpn) };
            assert_eq!(spp.subblock_index(&ppa), 0);
        }
        check_invariants(&fw);

        fw.handle_write(1, 1, 0).unwrap();
        assert_eq!(fw.stats().gc_rounds, 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_rewrites_keep_maps_consistent(lbas in proptest::collection::vec(0usize..64, 1..600)) {
            let mut fw = Ftl::new(&SsdConfig {
                policy: ReclaimPolicy::Occupancy,
                realloc_interval: 31,
                ..small_config()
            })
            .unwrap();

            for (i, &lba) in lbas.iter().enumerate() {
                fw.handle_write(lba, 1, i as Time).unwrap();
            }

            check_invariants(&fw);
            let distinct: HashSet<_> = lbas.iter().collect();
            prop_assert_eq!(fw.map.mapped_count(), distinct.len());
        }
    }
}
