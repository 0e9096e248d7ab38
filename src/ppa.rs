use num_integer::Integer;

use crate::config::*;

/// Physical sector address inside the NAND hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ppa {
    pub channel: u32,
    pub lun: u32,
    pub plane: u32,
    pub block: u32,
    pub subblock: u32,
    pub page: u32,
    pub sector: u32,
}

impl Ppa {
    pub fn with_page(mut self, page: BaseType) -> Self {
        self.page = page as u32;
        self
    }

    pub fn with_sector(mut self, sector: BaseType) -> Self {
        self.sector = sector as u32;
        self
    }
}

impl std::fmt::Display for Ppa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ch{}/lun{}/pl{}/blk{}/sblk{}/pg{}/sec{}",
            self.channel, self.lun, self.plane, self.block, self.subblock, self.page, self.sector
        )
    }
}

impl SsdParams {
    pub fn lun_index(&self, ppa: &Ppa) -> BaseType {
        ppa.channel as BaseType * self.luns_per_ch + ppa.lun as BaseType
    }

    pub fn block_index(&self, ppa: &Ppa) -> BaseType {
        (self.lun_index(ppa) * self.pls_per_lun + ppa.plane as BaseType) * self.blks_per_pl
            + ppa.block as BaseType
    }

    /// Flattened channel..subblock coordinate, indexes the erase-cost ledger.
    pub fn subblock_index(&self, ppa: &Ppa) -> BaseType {
        self.block_index(ppa) * self.sblks_per_blk + ppa.subblock as BaseType
    }

    /// Flattened channel..page coordinate, indexes the page arena.
    pub fn flat_page(&self, ppa: &Ppa) -> BaseType {
        self.subblock_index(ppa) * self.pgs_per_sblk + ppa.page as BaseType
    }

    /// Flattened channel..sector coordinate, indexes the reverse map and sector state.
    pub fn page_index(&self, ppa: &Ppa) -> BaseType {
        let idx = self.flat_page(ppa) * self.secs_per_pg + ppa.sector as BaseType;
        debug_assert!(idx < self.tt_secs, "page index {} out of range for {}", idx, ppa);
        idx
    }

    /// Inverse of `subblock_index`; page and sector come back as 0.
    pub fn subblock_to_ppa(&self, idx: BaseType) -> Ppa {
        assert!(idx < self.tt_sblks, "subblock index {} out of range", idx);

        let (rest, subblock) = idx.div_rem(&self.sblks_per_blk);
        let (rest, block) = rest.div_rem(&self.blks_per_pl);
        let (rest, plane) = rest.div_rem(&self.pls_per_lun);
        let (channel, lun) = rest.div_rem(&self.luns_per_ch);

        Ppa {
            channel: channel as u32,
            lun: lun as u32,
            plane: plane as u32,
            block: block as u32,
            subblock: subblock as u32,
            page: 0,
            sector: 0,
        }
    }

    pub fn validate_ppa(&self, ppa: &Ppa) -> bool {
        (ppa.channel as BaseType) < self.nchs
            && (ppa.lun as BaseType) < self.luns_per_ch
            && (ppa.plane as BaseType) < self.pls_per_lun
            && (ppa.block as BaseType) < self.blks_per_pl
            && (ppa.subblock as BaseType) < self.sblks_per_blk
            && (ppa.page as BaseType) < self.pgs_per_sblk
            && (ppa.sector as BaseType) < self.secs_per_pg
    }

    pub fn validate_lpn(&self, lpn: Lpn) -> bool {
        lpn < self.tt_pgs
    }
}
