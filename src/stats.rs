use crate::config::*;

#[derive(Debug, Default, Clone)]
pub struct FtlStats {
    pub user_reads: Counter,
    pub user_writes: Counter,
    pub gc_rounds: Counter,
    pub erased_subblocks: Counter,
    pub gc_relocated: Counter,
    pub hot_relocated: Counter,
    pub realloc_passes: Counter,

    // Simulated time spent in the background passes, on top of lun timing.
    pub select_time: Time,
    pub erase_time: Time,
    pub move_time: Time,
    pub reallocation_time: Time,
}

impl FtlStats {
    /// Physical sector programs per host sector program.
    pub fn write_amplification(&self) -> f64 {
        if self.user_writes == 0 {
            return 0.0;
        }
        (self.user_writes + self.gc_relocated + self.hot_relocated) as f64 / self.user_writes as f64
    }
}
