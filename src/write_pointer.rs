use crate::config::*;
use crate::ppa::Ppa;

/// Which log-structured stream a write lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Cold,
    Hot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WritePointer {
    pub channel: BaseType,
    pub lun: BaseType,
    pub plane: BaseType,
    pub block: BaseType,
    pub subblock: BaseType,
    pub page: BaseType,
    pub sector: BaseType,
}

fn check_addr(name: &str, value: BaseType, max: BaseType) {
    assert!(value < max, "write pointer {} = {} beyond bound {}", name, value, max);
}

impl WritePointer {
    pub fn cold() -> Self {
        WritePointer::default()
    }

    /// Starts three quarters across the luns so the streams begin apart.
    pub fn hot(spp: &SsdParams) -> Self {
        let lun_idx = spp.tt_luns * 3 / 4;
        WritePointer {
            channel: lun_idx / spp.luns_per_ch,
            lun: lun_idx % spp.luns_per_ch,
            ..WritePointer::default()
        }
    }

    pub fn ppa(&self) -> Ppa {
        Ppa {
            channel: self.channel as u32,
            lun: self.lun as u32,
            plane: self.plane as u32,
            block: self.block as u32,
            subblock: self.subblock as u32,
            page: self.page as u32,
            sector: self.sector as u32,
        }
    }

    /// True when the cursor sits on the first sector of a subblock.
    pub fn at_subblock_start(&self) -> bool {
        self.page == 0 && self.sector == 0
    }

    /// Steps one allocation forward. Odd pages start at sector 1 so each
    /// pointer programs one half of every page.
    pub fn advance(&mut self, spp: &SsdParams) {
        check_addr("sector", self.sector, spp.secs_per_pg);
        self.sector += 2;
        if self.sector < spp.secs_per_pg {
            return;
        }

        check_addr("page", self.page, spp.pgs_per_sblk);
        self.page += 1;
        if self.page == spp.pgs_per_sblk {
            self.page = 0;
            self.next_subblock(spp);
        }
        self.sector = self.page % 2;
    }

    /// Abandons the current subblock and moves to the start of the next one.
    pub fn skip_subblock(&mut self, spp: &SsdParams) {
        self.page = 0;
        self.sector = 0;
        self.next_subblock(spp);
    }

    fn next_subblock(&mut self, spp: &SsdParams) {
        check_addr("subblock", self.subblock, spp.sblks_per_blk);
        self.subblock += 1;
        if self.subblock < spp.sblks_per_blk {
            return;
        }
        self.subblock = 0;

        check_addr("block", self.block, spp.blks_per_pl);
        self.block += 1;
        if self.block < spp.blks_per_pl {
            return;
        }
        self.block = 0;

        check_addr("plane", self.plane, spp.pls_per_lun);
        self.plane += 1;
        if self.plane < spp.pls_per_lun {
            return;
        }
        self.plane = 0;

        check_addr("lun", self.lun, spp.luns_per_ch);
        self.lun += 1;
        if self.lun < spp.luns_per_ch {
            return;
        }
        self.lun = 0;

        check_addr("channel", self.channel, spp.nchs);
        self.channel += 1;
        if self.channel == spp.nchs {
            self.channel = 0;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::small_config;

    #[test]
    fn even_pages_use_even_sectors() {
        let spp = SsdParams::new(&SsdConfig::default()).unwrap();
        let mut wp = WritePointer::cold();

        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push((wp.page, wp.sector));
            wp.advance(&spp);
        }
        assert_eq!(
            seen,
            vec![(0, 0), (0, 2), (0, 4), (0, 6), (1, 1), (1, 3), (1, 5), (1, 7)]
        );
        assert_eq!((wp.page, wp.sector), (2, 0));
    }

    #[test]
    fn subblock_holds_half_its_sectors() {
        let spp = SsdParams::new(&SsdConfig::default()).unwrap();
        let mut wp = WritePointer::cold();

        for _ in 0..spp.secs_per_sblk / 2 {
            wp.advance(&spp);
        }
        assert_eq!(wp.subblock, 1);
        assert!(wp.at_subblock_start());
    }

    #[test]
    fn wraps_through_every_level() {
        let spp = SsdParams::new(&small_config()).unwrap();
        let mut wp = WritePointer::cold();

        let per_device = spp.tt_secs / 2;
        for i in 0..per_device {
            if i > 0 {
                assert_ne!(wp, WritePointer::cold(), "wrapped early at {}", i);
            }
            wp.advance(&spp);
        }
        assert_eq!(wp, WritePointer::cold());
    }

    #[test]
    fn hot_starts_on_another_lun() {
        let spp = SsdParams::new(&SsdConfig::default()).unwrap();
        let hot = WritePointer::hot(&spp);
        assert_eq!((hot.channel, hot.lun), (1, 2));

        let small = SsdParams::new(&small_config()).unwrap();
        let hot = WritePointer::hot(&small);
        assert_ne!(hot.ppa(), WritePointer::cold().ppa());
    }

    #[test]
    fn skip_moves_to_next_subblock() {
        let spp = SsdParams::new(&small_config()).unwrap();
        let mut wp = WritePointer::cold();
        wp.advance(&spp);
        wp.advance(&spp);

        wp.skip_subblock(&spp);
        assert_eq!(wp.subblock, 1);
        assert!(wp.at_subblock_start());
    }

    #[test]
    #[should_panic(expected = "beyond bound")]
    fn corrupted_coordinate_is_fatal() {
        let spp = SsdParams::new(&small_config()).unwrap();
        let mut wp = WritePointer {
            sector: spp.secs_per_pg,
            ..WritePointer::cold()
        };
        wp.advance(&spp);
    }
}
