//! Ioctl command numbers and argument marshaling.
//!
//! Command numbers use the Linux `_IOC` encoding so that a client built
//! against the C driver header computes the same values:
//!
//! ```text
//!  31  30 29            16 15         8 7          0
//! +------+----------------+------------+------------+
//! | dir  |      size      |    type    |     nr     |
//! +------+----------------+------------+------------+
//! ```

use std::mem::size_of;

use crate::err::DriverError;
use crate::regs::{NUM_STS_REGS, Status};

/// Ioctl type byte shared by every command of this driver
pub const MAGICAL_NUMBER: u8 = 243;

const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;

const fn ioc(dir: u32, nr: u8, size: usize) -> u32 {
    (dir << IOC_DIRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)
        | ((MAGICAL_NUMBER as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
}

// The C header passes pointer types to _IOR/_IOW, so the size field
// holds the pointer width rather than the payload size.
const ARG_PTR_SIZE: usize = size_of::<*mut u8>();

/// Clear data registers
pub const CHAR_CLR_DATA_REGS: u32 = ioc(IOC_NONE, 0, 0);
/// Copy the 5-byte status record to the caller
pub const CHAR_GET_STS_REGS: u32 = ioc(IOC_READ, 1, ARG_PTR_SIZE);
/// Set reading permission for data registers
pub const CHAR_SET_RD_DATA_REGS: u32 = ioc(IOC_WRITE, 2, ARG_PTR_SIZE);
/// Set writing permission for data registers
pub const CHAR_SET_WR_DATA_REGS: u32 = ioc(IOC_WRITE, 3, ARG_PTR_SIZE);

/// Argument byte meaning "enable" for the permission commands
pub const ENABLE: u8 = 1;
pub const DISABLE: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlRequest {
    ClearDataRegs,
    GetStatus,
    SetReadEnabled(bool),
    SetWriteEnabled(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlReply {
    Done,
    Status(Status),
}

impl IoctlRequest {
    /// Decodes a raw command number and its user argument.
    ///
    /// Permission commands read one byte; only [`ENABLE`] enables, every
    /// other value disables.
    pub fn decode(code: u32, arg: &[u8]) -> Result<Self, DriverError> {
        let flag = || {
            arg.first()
                .map(|&b| b == ENABLE)
                .ok_or(DriverError::short_argument(1, arg.len()))
        };

        match code {
            CHAR_CLR_DATA_REGS => Ok(Self::ClearDataRegs),
            CHAR_GET_STS_REGS => {
                if arg.len() < NUM_STS_REGS {
                    return Err(DriverError::short_argument(NUM_STS_REGS, arg.len()));
                }
                Ok(Self::GetStatus)
            }
            CHAR_SET_RD_DATA_REGS => Ok(Self::SetReadEnabled(flag()?)),
            CHAR_SET_WR_DATA_REGS => Ok(Self::SetWriteEnabled(flag()?)),
            _ => Err(DriverError::UnknownIoctl(code)),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::ClearDataRegs => CHAR_CLR_DATA_REGS,
            Self::GetStatus => CHAR_GET_STS_REGS,
            Self::SetReadEnabled(_) => CHAR_SET_RD_DATA_REGS,
            Self::SetWriteEnabled(_) => CHAR_SET_WR_DATA_REGS,
        }
    }
}

impl IoctlReply {
    /// Copies the reply payload into a user argument buffer.
    pub fn marshal(&self, arg: &mut [u8]) -> Result<(), DriverError> {
        match self {
            Self::Done => Ok(()),
            Self::Status(status) => {
                let len = arg.len();
                let out = arg
                    .get_mut(..NUM_STS_REGS)
                    .ok_or(DriverError::short_argument(NUM_STS_REGS, len))?;
                out.copy_from_slice(&status.to_record());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::StatusFlags;

    #[test]
    fn test_command_numbers() {
        assert_eq!(CHAR_CLR_DATA_REGS, 0x0000_F300);
        #[cfg(target_pointer_width = "64")]
        {
            assert_eq!(CHAR_GET_STS_REGS, 0x8008_F301);
            assert_eq!(CHAR_SET_RD_DATA_REGS, 0x4008_F302);
            assert_eq!(CHAR_SET_WR_DATA_REGS, 0x4008_F303);
        }
    }

    #[test]
    fn test_decode() {
        assert_eq!(
            IoctlRequest::decode(CHAR_CLR_DATA_REGS, &[]),
            Ok(IoctlRequest::ClearDataRegs)
        );
        assert_eq!(
            IoctlRequest::decode(CHAR_SET_RD_DATA_REGS, &[ENABLE]),
            Ok(IoctlRequest::SetReadEnabled(true))
        );
        assert_eq!(
            IoctlRequest::decode(CHAR_SET_WR_DATA_REGS, &[7]),
            Ok(IoctlRequest::SetWriteEnabled(false))
        );
        assert_eq!(
            IoctlRequest::decode(CHAR_SET_WR_DATA_REGS, &[]),
            Err(DriverError::short_argument(1, 0))
        );
        assert_eq!(
            IoctlRequest::decode(CHAR_GET_STS_REGS, &[0; 4]),
            Err(DriverError::short_argument(5, 4))
        );
        assert_eq!(
            IoctlRequest::decode(0xF304, &[0; 8]),
            Err(DriverError::UnknownIoctl(0xF304))
        );

        let request = IoctlRequest::SetReadEnabled(false);
        assert_eq!(
            IoctlRequest::decode(request.code(), &[DISABLE]),
            Ok(request)
        );
    }

    #[test]
    fn test_marshal_status_record() {
        let reply = IoctlReply::Status(Status {
            read_count: 0x0102,
            write_count: 0x0304,
            flags: StatusFlags::from_raw(0b011),
        });
        let mut arg = [0xFFu8; 6];
        reply.marshal(&mut arg).unwrap();
        assert_eq!(arg, [0x02, 0x01, 0x04, 0x03, 0b011, 0xFF]);

        let mut short = [0u8; 2];
        assert_eq!(
            reply.marshal(&mut short),
            Err(DriverError::short_argument(5, 2))
        );
        assert_eq!(IoctlReply::Done.marshal(&mut []), Ok(()));
    }
}
