use crate::config::*;
use crate::ppa::Ppa;

#[derive(Clone, Copy, Debug, PartialEq, Eq)] // for Vec resize
pub enum L2pValue {
    Unmapped,
    Mapped(Ppa),
}

/// Logical → physical table plus its physical → logical inverse.
pub struct MappingTable {
    l2p: Vec<L2pValue>,
    // indexed by page_index, INVALID_LPN when nothing was ever programmed there
    rmap: Vec<Lpn>,
}

impl MappingTable {
    pub fn new(spp: &SsdParams) -> Self {
        let mut l2p = Vec::new();
        l2p.resize(spp.logical_size(), L2pValue::Unmapped);

        MappingTable {
            l2p,
            rmap: vec![INVALID_LPN; spp.tt_secs],
        }
    }

    pub fn get(&self, lpn: Lpn) -> L2pValue {
        self.l2p[lpn]
    }

    /// Binds `lpn` to `ppa` in both directions. The old reverse slot stays stale.
    pub fn set(&mut self, spp: &SsdParams, lpn: Lpn, ppa: &Ppa) {
        assert!(spp.validate_lpn(lpn), "lpn {} outside logical space", lpn);

        self.l2p[lpn] = L2pValue::Mapped(*ppa);
        self.rmap[spp.page_index(ppa)] = lpn;
    }

    pub fn reverse(&self, spp: &SsdParams, ppa: &Ppa) -> Option<Lpn> {
        match self.rmap[spp.page_index(ppa)] {
            INVALID_LPN => None,
            lpn => Some(lpn),
        }
    }

    /// Forgets every reverse entry of an erased subblock.
    pub fn clear_subblock(&mut self, spp: &SsdParams, ppa: &Ppa) {
        let first = spp.page_index(&ppa.with_page(0).with_sector(0));
        self.rmap[first..first + spp.secs_per_sblk].fill(INVALID_LPN);
    }

    pub fn mapped_count(&self) -> Counter {
        self.l2p
            .iter()
            .filter(|v| matches!(v, L2pValue::Mapped(_)))
            .count()
    }
}
