//! Subblock-granular flash translation layer for an SSD simulator.
//!
//! Logical sectors map onto a channel/lun/plane/block/subblock/page/sector
//! tree. Space is reclaimed per subblock: an erase-cost ledger ranks victims
//! for GC, and a reallocation pass moves hot data into its own stream.

pub mod config;
pub mod error;
pub mod ftl;
pub mod gc;
pub mod ledger;
pub mod mapping;
pub mod nand;
pub mod ppa;
pub mod realloc;
pub mod request;
pub mod stats;
pub mod timing;
pub mod write_pointer;

pub use config::{ReclaimPolicy, SsdConfig, SsdParams};
pub use error::{ConfigError, FtlError, Result};
pub use ftl::Ftl;
pub use gc::Victims;
pub use ledger::Reclaimable;
pub use mapping::L2pValue;
pub use ppa::Ppa;
pub use request::{IoKind, Request};
pub use stats::FtlStats;
pub use write_pointer::{Stream, WritePointer};
