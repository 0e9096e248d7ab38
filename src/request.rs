use crate::config::*;
use crate::error::FtlError;

const NVME_CMD_WRITE: u8 = 0x01;
const NVME_CMD_READ: u8 = 0x02;
const NVME_CMD_DSM: u8 = 0x09;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    Read,
    Write,
    /// Dataset management (trim hints); accepted and ignored.
    Dsm,
}

impl TryFrom<u8> for IoKind {
    type Error = FtlError;

    fn try_from(opcode: u8) -> Result<Self, Self::Error> {
        match opcode {
            NVME_CMD_WRITE => Ok(IoKind::Write),
            NVME_CMD_READ => Ok(IoKind::Read),
            NVME_CMD_DSM => Ok(IoKind::Dsm),
            other => Err(FtlError::UnsupportedCommand(other)),
        }
    }
}

/// What the harness hands the FTL for one host command.
#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub kind: IoKind,
    pub slba: Lpn,
    pub nlb: BaseType,
    pub stime: Time,
}
