use crate::error::ConfigError;

pub type BaseType = usize;

pub type Lpn = BaseType;
pub type Counter = BaseType;
/// Simulated nanoseconds.
pub type Time = u64;

pub const SECTOR_SIZE: BaseType = 512;
pub const SECTORS_PER_PAGE: BaseType = 8;
pub const PAGES_PER_SUBBLOCK: BaseType = 64;
pub const SUBBLOCKS_PER_BLOCK: BaseType = 4;
pub const BLOCKS_PER_PLANE: BaseType = 256;
pub const PLANES_PER_LUN: BaseType = 2;
pub const LUNS_PER_CHANNEL: BaseType = 4;
pub const CHANNELS: BaseType = 2;

pub const NAND_READ_LATENCY: Time = 40_000;
pub const NAND_PROG_LATENCY: Time = 200_000;
pub const NAND_ERASE_LATENCY: Time = 2_000_000;

pub const GC_THRESHOLD: f64 = 0.75;
pub const GC_THRESHOLD_HIGH: f64 = 0.95;

/// Writes counted before usage weighting switches to "recent".
pub const WRITE_BUDGET: Counter = 1_000_000;

pub const INVALID_LPN: Lpn = Lpn::MAX;

/// How the request path decides when to reclaim space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimPolicy {
    /// Run GC from the occupancy predicates after every allocation.
    Occupancy,
    /// Never reclaim implicitly; the caller drives GC and reallocation.
    Manual,
}

/// Everything the harness hands over at start-up.
#[derive(Debug, Clone)]
pub struct SsdConfig {
    pub secsz: BaseType,
    pub secs_per_pg: BaseType,
    pub pgs_per_sblk: BaseType,
    pub sblks_per_blk: BaseType,
    pub blks_per_pl: BaseType,
    pub pls_per_lun: BaseType,
    pub luns_per_ch: BaseType,
    pub nchs: BaseType,

    pub pg_rd_lat: Time,
    pub pg_wr_lat: Time,
    pub blk_er_lat: Time,

    pub gc_thres_pcent: f64,
    pub gc_thres_pcent_high: f64,
    pub enable_gc_delay: bool,
    /// Victims picked per `do_subblock_gc` round.
    pub gc_victims: BaseType,
    /// GC rounds run when `should_gc_high` fires.
    pub gc_rounds_high: BaseType,
    /// User writes between two reallocation passes, 0 disables them.
    pub realloc_interval: Counter,
    /// Subblocks examined by the reallocation sweep, `None` means all.
    pub realloc_scan_limit: Option<BaseType>,
    pub write_budget: Counter,
    pub policy: ReclaimPolicy,
}

impl Default for SsdConfig {
    fn default() -> Self {
        SsdConfig {
            secsz: SECTOR_SIZE,
            secs_per_pg: SECTORS_PER_PAGE,
            pgs_per_sblk: PAGES_PER_SUBBLOCK,
            sblks_per_blk: SUBBLOCKS_PER_BLOCK,
            blks_per_pl: BLOCKS_PER_PLANE,
            pls_per_lun: PLANES_PER_LUN,
            luns_per_ch: LUNS_PER_CHANNEL,
            nchs: CHANNELS,
            pg_rd_lat: NAND_READ_LATENCY,
            pg_wr_lat: NAND_PROG_LATENCY,
            blk_er_lat: NAND_ERASE_LATENCY,
            gc_thres_pcent: GC_THRESHOLD,
            gc_thres_pcent_high: GC_THRESHOLD_HIGH,
            enable_gc_delay: true,
            gc_victims: 1,
            gc_rounds_high: 4,
            realloc_interval: 0,
            realloc_scan_limit: None,
            write_budget: WRITE_BUDGET,
            policy: ReclaimPolicy::Occupancy,
        }
    }
}

/// Validated geometry plus every total derived from it.
#[derive(Debug, Clone)]
pub struct SsdParams {
    pub secsz: BaseType,
    pub secs_per_pg: BaseType,
    pub pgs_per_sblk: BaseType,
    pub sblks_per_blk: BaseType,
    pub blks_per_pl: BaseType,
    pub pls_per_lun: BaseType,
    pub luns_per_ch: BaseType,
    pub nchs: BaseType,

    pub pg_rd_lat: Time,
    pub pg_wr_lat: Time,
    pub blk_er_lat: Time,

    pub secs_per_sblk: BaseType,
    pub secs_per_blk: BaseType,
    pub secs_per_pl: BaseType,
    pub secs_per_lun: BaseType,
    pub secs_per_ch: BaseType,
    pub tt_secs: BaseType,

    pub pgs_per_blk: BaseType,
    pub pgs_per_pl: BaseType,
    pub pgs_per_lun: BaseType,
    pub pgs_per_ch: BaseType,
    pub tt_pgs: BaseType,

    pub sblks_per_pl: BaseType,
    pub sblks_per_lun: BaseType,
    pub sblks_per_ch: BaseType,
    pub tt_sblks: BaseType,

    pub blks_per_lun: BaseType,
    pub blks_per_ch: BaseType,
    pub tt_blks: BaseType,

    pub tt_luns: BaseType,

    // a line is one block index striped over every lun
    pub blks_per_line: BaseType,
    pub pgs_per_line: BaseType,
    pub secs_per_line: BaseType,
    pub tt_lines: BaseType,

    pub gc_thres_sblks: BaseType,
    pub gc_thres_sblks_high: BaseType,
    pub enable_gc_delay: bool,
    pub gc_victims: BaseType,
    pub gc_rounds_high: BaseType,
    pub realloc_interval: Counter,
    pub realloc_scan_limit: BaseType,
    pub write_budget: Counter,
    pub policy: ReclaimPolicy,
}

impl SsdParams {
    pub fn new(cfg: &SsdConfig) -> Result<Self, ConfigError> {
        check_params(cfg)?;

        let secs_per_sblk = cfg.secs_per_pg * cfg.pgs_per_sblk;
        let secs_per_blk = secs_per_sblk * cfg.sblks_per_blk;
        let secs_per_pl = secs_per_blk * cfg.blks_per_pl;
        let secs_per_lun = secs_per_pl * cfg.pls_per_lun;
        let secs_per_ch = secs_per_lun * cfg.luns_per_ch;
        let tt_secs = secs_per_ch * cfg.nchs;

        let pgs_per_blk = cfg.pgs_per_sblk * cfg.sblks_per_blk;
        let pgs_per_pl = pgs_per_blk * cfg.blks_per_pl;
        let pgs_per_lun = pgs_per_pl * cfg.pls_per_lun;
        let pgs_per_ch = pgs_per_lun * cfg.luns_per_ch;
        let tt_pgs = pgs_per_ch * cfg.nchs;

        let sblks_per_pl = cfg.sblks_per_blk * cfg.blks_per_pl;
        let sblks_per_lun = sblks_per_pl * cfg.pls_per_lun;
        let sblks_per_ch = sblks_per_lun * cfg.luns_per_ch;
        let tt_sblks = sblks_per_ch * cfg.nchs;

        let blks_per_lun = cfg.blks_per_pl * cfg.pls_per_lun;
        let blks_per_ch = blks_per_lun * cfg.luns_per_ch;
        let tt_blks = blks_per_ch * cfg.nchs;

        let tt_luns = cfg.luns_per_ch * cfg.nchs;

        let blks_per_line = tt_luns;
        let pgs_per_line = blks_per_line * pgs_per_blk;
        let secs_per_line = pgs_per_line * cfg.secs_per_pg;
        let tt_lines = blks_per_lun;

        Ok(SsdParams {
            secsz: cfg.secsz,
            secs_per_pg: cfg.secs_per_pg,
            pgs_per_sblk: cfg.pgs_per_sblk,
            sblks_per_blk: cfg.sblks_per_blk,
            blks_per_pl: cfg.blks_per_pl,
            pls_per_lun: cfg.pls_per_lun,
            luns_per_ch: cfg.luns_per_ch,
            nchs: cfg.nchs,
            pg_rd_lat: cfg.pg_rd_lat,
            pg_wr_lat: cfg.pg_wr_lat,
            blk_er_lat: cfg.blk_er_lat,
            secs_per_sblk,
            secs_per_blk,
            secs_per_pl,
            secs_per_lun,
            secs_per_ch,
            tt_secs,
            pgs_per_blk,
            pgs_per_pl,
            pgs_per_lun,
            pgs_per_ch,
            tt_pgs,
            sblks_per_pl,
            sblks_per_lun,
            sblks_per_ch,
            tt_sblks,
            blks_per_lun,
            blks_per_ch,
            tt_blks,
            tt_luns,
            blks_per_line,
            pgs_per_line,
            secs_per_line,
            tt_lines,
            gc_thres_sblks: ((1.0 - cfg.gc_thres_pcent) * tt_sblks as f64) as BaseType,
            gc_thres_sblks_high: ((1.0 - cfg.gc_thres_pcent_high) * tt_sblks as f64) as BaseType,
            enable_gc_delay: cfg.enable_gc_delay,
            gc_victims: cfg.gc_victims,
            gc_rounds_high: cfg.gc_rounds_high,
            realloc_interval: cfg.realloc_interval,
            realloc_scan_limit: cfg.realloc_scan_limit.unwrap_or(tt_sblks).min(tt_sblks),
            write_budget: cfg.write_budget,
            policy: cfg.policy,
        })
    }

    /// Highest erase score a subblock can carry: every sector valid, no free page.
    pub fn max_score(&self) -> BaseType {
        self.secs_per_sblk * 2 + self.pgs_per_sblk
    }

    /// Sectors per page handed out by one write pointer, half of the page.
    pub fn secs_written_per_pg(&self) -> BaseType {
        self.secs_per_pg / 2
    }

    /// Logical sectors exposed to the host, one per mapping-table slot.
    pub fn logical_size(&self) -> BaseType {
        self.tt_pgs
    }
}

fn check_params(cfg: &SsdConfig) -> Result<(), ConfigError> {
    let dims = [
        ("secsz", cfg.secsz),
        ("secs_per_pg", cfg.secs_per_pg),
        ("pgs_per_sblk", cfg.pgs_per_sblk),
        ("sblks_per_blk", cfg.sblks_per_blk),
        ("blks_per_pl", cfg.blks_per_pl),
        ("pls_per_lun", cfg.pls_per_lun),
        ("luns_per_ch", cfg.luns_per_ch),
        ("nchs", cfg.nchs),
    ];
    for (name, value) in dims {
        if value == 0 {
            return Err(ConfigError::ZeroDimension(name));
        }
        if value > u32::MAX as BaseType {
            return Err(ConfigError::DimensionTooLarge(name, value));
        }
    }

    if !cfg.luns_per_ch.is_power_of_two() {
        return Err(ConfigError::NotPowerOfTwo("luns_per_ch", cfg.luns_per_ch));
    }
    if !cfg.nchs.is_power_of_two() {
        return Err(ConfigError::NotPowerOfTwo("nchs", cfg.nchs));
    }

    // paired-plane addressing hands out every other sector
    if cfg.secs_per_pg < 2 || cfg.secs_per_pg % 2 != 0 {
        return Err(ConfigError::SectorsPerPage(cfg.secs_per_pg));
    }

    for pcent in [cfg.gc_thres_pcent, cfg.gc_thres_pcent_high] {
        if !(0.0..=1.0).contains(&pcent) {
            return Err(ConfigError::Threshold(pcent));
        }
    }
    if cfg.gc_thres_pcent > cfg.gc_thres_pcent_high {
        return Err(ConfigError::Threshold(cfg.gc_thres_pcent));
    }

    if cfg.gc_victims == 0 {
        return Err(ConfigError::ZeroDimension("gc_victims"));
    }

    Ok(())
}

#[cfg(test)]
pub(crate) fn small_config() -> SsdConfig {
    SsdConfig {
        pgs_per_sblk: 4,
        sblks_per_blk: 2,
        blks_per_pl: 4,
        pls_per_lun: 1,
        luns_per_ch: 2,
        nchs: 1,
        policy: ReclaimPolicy::Manual,
        ..SsdConfig::default()
    }
}
