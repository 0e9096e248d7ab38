use thiserror::Error;

use crate::config::{BaseType, Lpn};

/// FTL specialized Result type.
pub type Result<T> = std::result::Result<T, FtlError>;

/// Geometry rejected at start-up.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be non-zero")]
    ZeroDimension(&'static str),
    #[error("{0} must fit a 32-bit address coordinate, got {1}")]
    DimensionTooLarge(&'static str, BaseType),
    #[error("{0} must be a power of two, got {1}")]
    NotPowerOfTwo(&'static str, BaseType),
    #[error("sectors per page must be even and at least 2, got {0}")]
    SectorsPerPage(BaseType),
    #[error("GC threshold out of range: {0}")]
    Threshold(f64),
}

/// Integration errors reported back to the harness. None of them are retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FtlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Unsupported command opcode: {0:#x}")]
    UnsupportedCommand(u8),
    #[error("Logical range {start}+{len} exceeds logical size {size}")]
    LogicalOutOfRange { start: Lpn, len: BaseType, size: BaseType },
}
