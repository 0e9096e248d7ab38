#[macro_use]
extern crate log;
extern crate simplelog;

use std::error::Error;

use clap::Parser;
use rand::prelude::*;
use simplelog::*;
use time::macros::format_description;

use subblock_ftl::config::{BaseType, Time};
use subblock_ftl::{Ftl, IoKind, ReclaimPolicy, Request, SsdConfig};

/// Preconditions a simulated drive and hammers it with random overwrites.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, env = "FTL_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Seed of the random write stream
    #[arg(long, env = "FTL_SEED", default_value = "7")]
    seed: u64,

    /// Capacities written at random after preconditioning
    #[arg(long, env = "FTL_PASSES", default_value = "4")]
    passes: usize,

    /// Blocks per plane, shrinks or grows the drive
    #[arg(long, env = "FTL_BLOCKS_PER_PLANE", default_value = "256")]
    blocks_per_plane: BaseType,

    /// User writes between reallocation passes, 0 disables them
    #[arg(long, env = "FTL_REALLOC_INTERVAL", default_value = "0")]
    realloc_interval: usize,

    /// Keep GC traffic off the lun timelines
    #[arg(long, env = "FTL_NO_GC_DELAY")]
    no_gc_delay: bool,
}

// sectors per precondition request
const CHUNK: BaseType = 64;
// host clock step between two requests
const TICK: Time = 10_000;

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let log_cfg = ConfigBuilder::new()
        .set_time_format_custom(format_description!("[hour]:[minute]:[second].[subsecond]"))
        .build();
    let level: LevelFilter = args
        .log_level
        .parse()
        .map_err(|_| format!("unknown log level {}", args.log_level))?;
    SimpleLogger::init(level, log_cfg)?;

    let cfg = SsdConfig {
        blks_per_pl: args.blocks_per_plane,
        realloc_interval: args.realloc_interval,
        enable_gc_delay: !args.no_gc_delay,
        policy: ReclaimPolicy::Occupancy,
        ..SsdConfig::default()
    };
    let mut fw = Ftl::new(&cfg)?;
    let max_lba = fw.get_max_lba();
    let mut now: Time = 0;

    let mut slba = 0;
    while slba <= max_lba {
        let nlb = CHUNK.min(max_lba + 1 - slba);
        fw.handle_request(&Request {
            kind: IoKind::Write,
            slba,
            nlb,
            stime: now,
        })?;
        slba += nlb;
        now += TICK;
    }
    info!("Drive preconditioned, {} sectors", max_lba + 1);

    let mut rng: SmallRng = SmallRng::seed_from_u64(args.seed);
    let mut worst = 0;

    for c in 0..args.passes {
        for _ in 0..=max_lba {
            let lba = rng.gen_range(0..=max_lba);
            let lat = fw.handle_request(&Request {
                kind: IoKind::Write,
                slba: lba,
                nlb: 1,
                stime: now,
            })?;
            worst = worst.max(lat);
            now += TICK;
        }

        let stats = fw.stats();
        info!(
            "Capacity {} randomly written: WA {:.3}, {} GC rounds, {} subblocks erased, {} realloc passes",
            c,
            stats.write_amplification(),
            stats.gc_rounds,
            stats.erased_subblocks,
            stats.realloc_passes
        );
    }

    let stats = fw.stats();
    debug!("{:?}", stats);
    info!(
        "worst write latency {} ns, free subblocks {}/{}",
        worst,
        fw.nand().free_subblocks(),
        fw.params().tt_sblks
    );

    Ok(())
}
