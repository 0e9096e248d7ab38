//! Physical state of the simulated NAND.
//!
//! The channel → lun → plane → block → subblock → page → sector tree is kept
//! as flat arenas indexed by the flattened coordinates from `ppa.rs`, so a
//! lookup is one multiplication chain instead of six pointer hops.

use crate::config::*;
use crate::ppa::Ppa;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorStatus {
    Free,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Free,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubblockStatus {
    /// Erased, nothing programmed yet.
    Free,
    /// Holds at least one valid sector.
    Valid,
    /// Programmed, but every sector written so far is stale.
    Invalid,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub status: PageStatus,
    pub valid: u32,
    pub invalid: u32,
}

impl Page {
    fn new() -> Self {
        Page {
            status: PageStatus::Free,
            valid: 0,
            invalid: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub valid_subblocks: Counter,
    pub invalid_subblocks: Counter,
}

#[derive(Debug, Clone, Default)]
pub struct Lun {
    pub next_avail_time: Time,
    /// Completion time of the last GC command issued to this lun.
    pub gc_end_time: Time,
}

pub struct NandArray {
    sectors: Vec<SectorStatus>,
    pages: Vec<Page>,
    subblocks: Vec<SubblockStatus>,
    blocks: Vec<Block>,
    luns: Vec<Lun>,
    free_subblocks: Counter,
}

impl NandArray {
    pub fn new(spp: &SsdParams) -> Self {
        NandArray {
            sectors: vec![SectorStatus::Free; spp.tt_secs],
            pages: vec![Page::new(); spp.tt_pgs],
            subblocks: vec![SubblockStatus::Free; spp.tt_sblks],
            blocks: vec![Block::default(); spp.tt_blks],
            luns: vec![Lun::default(); spp.tt_luns],
            free_subblocks: spp.tt_sblks,
        }
    }

    pub fn sector(&self, spp: &SsdParams, ppa: &Ppa) -> SectorStatus {
        self.sectors[spp.page_index(ppa)]
    }

    pub fn page(&self, spp: &SsdParams, ppa: &Ppa) -> &Page {
        &self.pages[spp.flat_page(ppa)]
    }

    pub fn block(&self, spp: &SsdParams, ppa: &Ppa) -> &Block {
        &self.blocks[spp.block_index(ppa)]
    }

    pub fn lun(&self, spp: &SsdParams, ppa: &Ppa) -> &Lun {
        &self.luns[spp.lun_index(ppa)]
    }

    pub fn lun_mut(&mut self, spp: &SsdParams, ppa: &Ppa) -> &mut Lun {
        &mut self.luns[spp.lun_index(ppa)]
    }

    pub fn luns(&self) -> &[Lun] {
        &self.luns
    }

    pub fn subblock_status(&self, idx: BaseType) -> SubblockStatus {
        self.subblocks[idx]
    }

    pub fn free_subblocks(&self) -> Counter {
        self.free_subblocks
    }

    pub fn mark_page_valid(&mut self, spp: &SsdParams, ppa: &Ppa) {
        let pg = &mut self.pages[spp.flat_page(ppa)];
        assert_eq!(pg.status, PageStatus::Free, "page {} is not free", ppa);
        pg.status = PageStatus::Valid;
    }

    pub fn mark_page_invalid(&mut self, spp: &SsdParams, ppa: &Ppa) {
        let pg = &mut self.pages[spp.flat_page(ppa)];
        assert_eq!(pg.status, PageStatus::Valid, "page {} is not valid", ppa);
        pg.status = PageStatus::Invalid;
    }

    pub fn mark_sector_valid(&mut self, spp: &SsdParams, ppa: &Ppa) {
        let sec = &mut self.sectors[spp.page_index(ppa)];
        assert_eq!(*sec, SectorStatus::Free, "sector {} is not free", ppa);
        *sec = SectorStatus::Valid;

        let pg = &mut self.pages[spp.flat_page(ppa)];
        assert!((pg.valid as BaseType) < spp.secs_per_pg);
        pg.valid += 1;
    }

    /// Invalidates one sector and returns the page it lives in.
    pub fn mark_sector_invalid(&mut self, spp: &SsdParams, ppa: &Ppa) -> &Page {
        let sec = &mut self.sectors[spp.page_index(ppa)];
        assert_eq!(*sec, SectorStatus::Valid, "sector {} is not valid", ppa);
        *sec = SectorStatus::Invalid;

        let pg = &mut self.pages[spp.flat_page(ppa)];
        assert!(pg.valid > 0 && (pg.invalid as BaseType) < spp.secs_per_pg);
        pg.valid -= 1;
        pg.invalid += 1;
        pg
    }

    /// Physical erase: every page and sector of the subblock back to Free.
    pub fn erase_subblock(&mut self, spp: &SsdParams, ppa: &Ppa) {
        let first_pg = spp.flat_page(&ppa.with_page(0));
        for pg in &mut self.pages[first_pg..first_pg + spp.pgs_per_sblk] {
            *pg = Page::new();
        }

        let first_sec = first_pg * spp.secs_per_pg;
        self.sectors[first_sec..first_sec + spp.secs_per_sblk].fill(SectorStatus::Free);
    }

    /// Moves a subblock to `status`, keeping the block counters and free pool in step.
    pub fn set_subblock_status(&mut self, spp: &SsdParams, ppa: &Ppa, status: SubblockStatus) {
        let idx = spp.subblock_index(ppa);
        let old = self.subblocks[idx];
        if old == status {
            return;
        }

        let blk = &mut self.blocks[spp.block_index(ppa)];
        match old {
            SubblockStatus::Free => self.free_subblocks -= 1,
            SubblockStatus::Valid => blk.valid_subblocks -= 1,
            SubblockStatus::Invalid => blk.invalid_subblocks -= 1,
        }
        match status {
            SubblockStatus::Free => self.free_subblocks += 1,
            SubblockStatus::Valid => {
                assert!(blk.valid_subblocks < spp.sblks_per_blk);
                blk.valid_subblocks += 1
            }
            SubblockStatus::Invalid => {
                assert!(blk.invalid_subblocks < spp.sblks_per_blk);
                blk.invalid_subblocks += 1
            }
        }
        self.subblocks[idx] = status;
    }

    /// Iterates `(sector, status)` pairs of one page.
    pub fn page_sectors<'a>(
        &'a self,
        spp: &'a SsdParams,
        ppa: &Ppa,
    ) -> impl Iterator<Item = (BaseType, SectorStatus)> + 'a {
        let first = spp.page_index(&ppa.with_sector(0));
        self.sectors[first..first + spp.secs_per_pg]
            .iter()
            .copied()
            .enumerate()
    }
}
