use crate::config::*;
use crate::nand::Lun;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NandOp {
    Read,
    Write,
    Erase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoSource {
    User,
    Gc,
}

#[derive(Debug, Clone, Copy)]
pub struct NandCmd {
    pub op: NandOp,
    pub source: IoSource,
    pub stime: Time,
}

impl NandCmd {
    pub fn user(op: NandOp, stime: Time) -> Self {
        NandCmd {
            op,
            source: IoSource::User,
            stime,
        }
    }

    pub fn gc(op: NandOp, stime: Time) -> Self {
        NandCmd {
            op,
            source: IoSource::Gc,
            stime,
        }
    }
}

impl Lun {
    /// Queues `cmd` behind whatever the lun is already busy with and returns
    /// its latency as seen from the submission time.
    pub fn advance_status(&mut self, spp: &SsdParams, cmd: &NandCmd) -> Time {
        let op_lat = match cmd.op {
            NandOp::Read => spp.pg_rd_lat,
            NandOp::Write => spp.pg_wr_lat,
            NandOp::Erase => spp.blk_er_lat,
        };

        let nand_stime = self.next_avail_time.max(cmd.stime);
        self.next_avail_time = nand_stime + op_lat;
        if cmd.source == IoSource::Gc {
            self.gc_end_time = self.next_avail_time;
        }

        self.next_avail_time - cmd.stime
    }
}
