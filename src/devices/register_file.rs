//! Virtual character device register bank.
//!
//! The device exposes one control register, five status registers and a
//! 256-byte data window. Reads and writes against the data window are gated
//! by the control bits, clamped to the end of the window, and counted in the
//! status registers. A write that runs past the end of the window is
//! truncated rather than refused and latches the overflow flag.

use crate::devices::MmioDevice;
use crate::err::{DeviceError, MmioError};
use crate::regs::{
    CONTROL_ACCESS_REG, ControlReg, DATA_BASE, NUM_DATA_REGS, NUM_DEV_REGS, STATUS_BASE,
    SplitCounter, Status, StatusFlags,
};

/// Register state of the virtual device.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    control: ControlReg,
    read_count: SplitCounter,
    write_count: SplitCounter,
    flags: StatusFlags,
    data: [u8; NUM_DATA_REGS],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// Creates a register file in its attach state: read and write allowed,
    /// counters at zero, overflow clear, data zeroed.
    pub fn new() -> Self {
        Self {
            control: ControlReg::default(),
            read_count: SplitCounter::new(),
            write_count: SplitCounter::new(),
            flags: StatusFlags::default(),
            data: [0; NUM_DATA_REGS],
        }
    }

    /// Number of bytes that fit between `start` and the end of the data window.
    ///
    /// `start == NUM_DATA_REGS` is accepted and leaves room for nothing.
    fn remaining(start: usize) -> Result<usize, DeviceError> {
        if start > NUM_DATA_REGS {
            return Err(DeviceError::invalid_start(start));
        }
        Ok(NUM_DATA_REGS - start)
    }

    /// Reads up to `buf.len()` data registers starting at `start` into `buf`.
    ///
    /// Returns the number of bytes copied, which is clamped to the end of the
    /// data window. Every successful call bumps the read counter once.
    pub fn read_into(&mut self, start: usize, buf: &mut [u8]) -> Result<usize, DeviceError> {
        if !self.control.read_data() {
            return Err(DeviceError::ReadDisabled);
        }
        let len = buf.len().min(Self::remaining(start)?);

        buf[..len].copy_from_slice(&self.data[start..start + len]);
        self.read_count.increment();

        log::debug!("Read {len} data registers from {start}");
        Ok(len)
    }

    /// Reads up to `len` data registers starting at `start`.
    pub fn read(&mut self, start: usize, len: usize) -> Result<Vec<u8>, DeviceError> {
        let mut buf = vec![0; len.min(NUM_DATA_REGS)];
        let count = self.read_into(start, &mut buf)?;
        buf.truncate(count);
        Ok(buf)
    }

    /// Writes `bytes` into the data registers starting at `start`.
    ///
    /// Bytes past the end of the window are dropped and the overflow flag is
    /// set; the call still succeeds with the truncated count.
    pub fn write(&mut self, start: usize, bytes: &[u8]) -> Result<usize, DeviceError> {
        if !self.control.write_data() {
            return Err(DeviceError::WriteDisabled);
        }
        let remaining = Self::remaining(start)?;

        let len = if bytes.len() > remaining {
            log::warn!(
                "Write of {} bytes at {start} truncated to {remaining}",
                bytes.len()
            );
            self.flags.set_overflow(true);
            remaining
        } else {
            bytes.len()
        };

        self.data[start..start + len].copy_from_slice(&bytes[..len]);
        self.write_count.increment();

        log::debug!("Wrote {len} data registers at {start}");
        Ok(len)
    }

    /// Zeroes the data window and clears the overflow flag.
    ///
    /// Clearing counts as a write and needs write permission.
    pub fn clear(&mut self) -> Result<(), DeviceError> {
        if !self.control.write_data() {
            return Err(DeviceError::WriteDisabled);
        }
        self.data.fill(0);
        self.flags.set_overflow(false);
        Ok(())
    }

    pub fn status(&self) -> Status {
        Status {
            read_count: self.read_count.value(),
            write_count: self.write_count.value(),
            flags: self.flags,
        }
    }

    pub fn set_read_enabled(&mut self, enabled: bool) {
        self.control.set_read_data(enabled);
        self.flags.set_read_access(enabled);
    }

    pub fn set_write_enabled(&mut self, enabled: bool) {
        self.control.set_write_data(enabled);
        self.flags.set_write_access(enabled);
    }

    pub fn control(&self) -> ControlReg {
        self.control
    }

    /// Data window contents, without touching the read counter.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn read_status_byte(&self, index: usize) -> u8 {
        self.status().to_record()[index]
    }
}

fn check_access_size(size: usize) -> Result<(), MmioError> {
    if matches!(size, 1 | 2 | 4 | 8) {
        Ok(())
    } else {
        Err(MmioError::InvalidSize { size })
    }
}

const CONTROL_END: u64 = STATUS_BASE as u64;
const STATUS_END: u64 = DATA_BASE as u64;
const DATA_END: u64 = NUM_DEV_REGS as u64;

impl MmioDevice for RegisterFile {
    /// Flat layout: control at 0, status record at 1..6, data at 6..262.
    /// Data accesses are little-endian and go through the gated read path.
    fn read(&mut self, offset: u64, size: usize) -> Result<u64, MmioError> {
        check_access_size(size)?;

        match offset {
            o if o == CONTROL_ACCESS_REG as u64 => {
                if size != 1 {
                    return Err(MmioError::InvalidSize { size });
                }
                Ok(u64::from(self.control.raw()))
            }
            o if o < STATUS_END => {
                if size != 1 {
                    return Err(MmioError::InvalidSize { size });
                }
                Ok(u64::from(self.read_status_byte((o - CONTROL_END) as usize)))
            }
            o if o < DATA_END => {
                let mut buf = [0u8; 8];
                RegisterFile::read_into(self, (o - STATUS_END) as usize, &mut buf[..size])?;
                Ok(u64::from_le_bytes(buf))
            }
            _ => Err(MmioError::UnmappedAccess(offset)),
        }
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) -> Result<(), MmioError> {
        check_access_size(size)?;

        match offset {
            o if o == CONTROL_ACCESS_REG as u64 => {
                if size != 1 {
                    return Err(MmioError::InvalidSize { size });
                }
                let ctrl = ControlReg::from_raw(value as u8 & ControlReg::WRITABLE_MASK);
                self.set_read_enabled(ctrl.read_data());
                self.set_write_enabled(ctrl.write_data());
            }
            o if o < STATUS_END => {
                if size != 1 {
                    return Err(MmioError::InvalidSize { size });
                }
                // Status registers are read-only, ignore writes
            }
            o if o < DATA_END => {
                let bytes = value.to_le_bytes();
                RegisterFile::write(self, (o - STATUS_END) as usize, &bytes[..size])?;
            }
            _ => return Err(MmioError::UnmappedAccess(offset)),
        }

        Ok(())
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn get_size(&self) -> u64 {
        DATA_END
    }
}
