use thiserror::Error;

use crate::regs::NUM_DATA_REGS;

#[derive(Error, Debug)]
pub enum VcharError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("MMIO error: {0}")]
    MMIO(#[from] MmioError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("General error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Policy or contract violations raised by the register file itself.
///
/// None of these leave the device unusable; the caller may retry after
/// fixing permissions or the start register.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[error("reading from data registers is disabled")]
    ReadDisabled,

    #[error("writing to data registers is disabled")]
    WriteDisabled,

    #[error("invalid start register {start} (data window holds {} registers)", NUM_DATA_REGS)]
    InvalidStart { start: usize },
}

impl DeviceError {
    pub fn invalid_start(start: usize) -> Self {
        Self::InvalidStart { start }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MmioError {
    #[error("Unmapped memory access at address 0x{0:016x}")]
    UnmappedAccess(u64),

    #[error("Invalid alignment: address 0x{addr:016x} not aligned for {size}-byte access")]
    InvalidAlignment { addr: u64, size: usize },

    #[error("Invalid access size: {size} bytes")]
    InvalidSize { size: usize },

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Invalid region: {size} bytes at 0x{base:016x} run past the end of the address space")]
    InvalidRegion { base: u64, size: u64 },

    #[error(
        "Overlapping MMIO region: new region [0x{new_start:016x}, 0x{new_end:016x}) overlaps with existing region [0x{existing_start:016x}, 0x{existing_end:016x})"
    )]
    OverlappingRegion {
        existing_start: u64,
        existing_end: u64,
        new_start: u64,
        new_end: u64,
    },
}

// Helper constructor for the overlapping region error
impl MmioError {
    pub fn overlapping_region(existing: (u64, u64), new: (u64, u64)) -> Self {
        Self::OverlappingRegion {
            existing_start: existing.0,
            existing_end: existing.1,
            new_start: new.0,
            new_end: new.1,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// A register operation was refused (EFAULT for a kernel driver).
    #[error("Bad address: {0}")]
    Fault(#[from] DeviceError),

    /// A control request was refused by the device (EPERM for a kernel driver).
    #[error("Operation not permitted: {0}")]
    Denied(DeviceError),

    #[error("Unknown ioctl command 0x{0:08x}")]
    UnknownIoctl(u32),

    #[error("Ioctl argument too short: need {expected} bytes, got {actual}")]
    ShortArgument { expected: usize, actual: usize },
}

impl DriverError {
    pub fn short_argument(expected: usize, actual: usize) -> Self {
        Self::ShortArgument { expected, actual }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_messages() {
        let err = DeviceError::invalid_start(300);
        assert!(err.to_string().contains("300"));
        assert!(err.to_string().contains("256"));
        assert!(DeviceError::ReadDisabled.to_string().contains("reading"));
    }

    #[test]
    fn test_error_conversions() {
        let mmio: MmioError = DeviceError::WriteDisabled.into();
        assert_eq!(mmio, MmioError::Device(DeviceError::WriteDisabled));

        let driver: DriverError = DeviceError::ReadDisabled.into();
        let top: VcharError = driver.into();
        assert!(top.to_string().contains("Bad address"));
    }

    #[test]
    fn test_denied_is_not_a_fault() {
        let err = DriverError::Denied(DeviceError::WriteDisabled);
        assert!(err.to_string().starts_with("Operation not permitted"));
        assert_ne!(err, DriverError::from(DeviceError::WriteDisabled));
    }

    #[test]
    fn test_overlapping_region_message() {
        let err = MmioError::overlapping_region((0x1000, 0x1106), (0x1100, 0x1206));
        let msg = err.to_string();
        assert!(msg.contains("0x0000000000001100"));
        assert!(msg.contains("0x0000000000001106"));
    }
}
