//! File-handle glue around the register file.
//!
//! [`CharDriver`] plays the role of the loaded driver: it owns the register
//! file from attach until it is dropped. Each [`DeviceHandle`] behaves like
//! an open file on the device node, with its own offset into the data
//! window. All handles and the MMIO window share one register file behind a
//! single mutex.

pub mod ioctl;

pub use ioctl::*;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::devices::{MmioDevice, RegisterFile};
use crate::err::{DriverError, MmioError};
use crate::regs::NUM_DEV_REGS;

pub const DRIVER_DESC: &str = "A sample virtual character device driver";
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

type SharedRegisters = Arc<Mutex<RegisterFile>>;

// Every register operation leaves the file consistent, so a panic while the
// lock was held cannot have left it half-updated.
fn lock(regs: &Mutex<RegisterFile>) -> MutexGuard<'_, RegisterFile> {
    regs.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct CharDriver {
    regs: SharedRegisters,
    open_cnt: u32,
}

impl CharDriver {
    /// Allocates and initializes the register file.
    pub fn attach() -> Self {
        log::info!("{DRIVER_DESC} v{DRIVER_VERSION}: {NUM_DEV_REGS} registers allocated");
        Self {
            regs: Arc::new(Mutex::new(RegisterFile::new())),
            open_cnt: 0,
        }
    }

    pub fn open(&mut self) -> DeviceHandle {
        self.open_cnt = self.open_cnt.wrapping_add(1);
        log::info!("Handle opened event ({})", self.open_cnt);
        DeviceHandle {
            regs: Arc::clone(&self.regs),
            offset: 0,
        }
    }

    /// Number of times the device has been opened since attach.
    pub fn open_count(&self) -> u32 {
        self.open_cnt
    }

    /// Locks the register file for inspection.
    pub fn registers(&self) -> MutexGuard<'_, RegisterFile> {
        lock(&self.regs)
    }

    /// MMIO view of the same register file, ready to hand to an `MmioManager`.
    pub fn mmio_window(&self) -> MmioWindow {
        MmioWindow {
            regs: Arc::clone(&self.regs),
        }
    }
}

impl Drop for CharDriver {
    fn drop(&mut self) {
        log::info!("Exit char driver");
    }
}

/// An open handle on the device node.
pub struct DeviceHandle {
    regs: SharedRegisters,
    offset: usize,
}

impl DeviceHandle {
    /// Reads from the current offset into `buf` and advances the offset.
    ///
    /// Returns 0 once the offset reaches the end of the data window.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, DriverError> {
        log::info!(
            "Handle read event start from {}, {} byte",
            self.offset,
            buf.len()
        );
        let num_bytes = lock(&self.regs)
            .read_into(self.offset, buf)
            .inspect_err(|e| log::warn!("Read refused: {e}"))?;

        self.offset += num_bytes;
        Ok(num_bytes)
    }

    /// Writes `bytes` at the current offset and advances the offset.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, DriverError> {
        log::info!(
            "Handle write event start from {}, {} bytes",
            self.offset,
            bytes.len()
        );
        let num_bytes = lock(&self.regs)
            .write(self.offset, bytes)
            .inspect_err(|e| log::warn!("Write refused: {e}"))?;

        self.offset += num_bytes;
        Ok(num_bytes)
    }

    pub fn seek(&mut self, offset: usize) -> usize {
        self.offset = offset;
        self.offset
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn ioctl(&mut self, request: IoctlRequest) -> Result<IoctlReply, DriverError> {
        log::info!("Handle ioctl event (cmd: {:#x})", request.code());
        let mut regs = lock(&self.regs);

        match request {
            IoctlRequest::ClearDataRegs => {
                regs.clear().map_err(|e| {
                    log::warn!("Can not clear data registers");
                    DriverError::Denied(e)
                })?;
                log::info!("Data registers have been cleared");
            }
            IoctlRequest::GetStatus => {
                log::info!("Got information from status registers");
                return Ok(IoctlReply::Status(regs.status()));
            }
            IoctlRequest::SetReadEnabled(enable) => {
                regs.set_read_enabled(enable);
                log::info!("Data registers have been {} to read", enable_word(enable));
            }
            IoctlRequest::SetWriteEnabled(enable) => {
                regs.set_write_enabled(enable);
                log::info!("Data registers have been {} to write", enable_word(enable));
            }
        }

        Ok(IoctlReply::Done)
    }

    /// Raw ioctl entry point: decodes `code`, reads or fills `arg`.
    pub fn ioctl_raw(&mut self, code: u32, arg: &mut [u8]) -> Result<(), DriverError> {
        let request = IoctlRequest::decode(code, arg)?;
        self.ioctl(request)?.marshal(arg)
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        log::info!("Handle closed event");
    }
}

fn enable_word(enable: bool) -> &'static str {
    if enable { "enable" } else { "disable" }
}

/// Register file seen through the flat MMIO layout.
///
/// Each access takes the device lock, so MMIO traffic interleaves safely
/// with file handles.
pub struct MmioWindow {
    regs: SharedRegisters,
}

impl MmioDevice for MmioWindow {
    fn read(&mut self, offset: u64, size: usize) -> Result<u64, MmioError> {
        MmioDevice::read(&mut *lock(&self.regs), offset, size)
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) -> Result<(), MmioError> {
        MmioDevice::write(&mut *lock(&self.regs), offset, size, value)
    }

    fn reset(&mut self) {
        MmioDevice::reset(&mut *lock(&self.regs));
    }

    fn get_size(&self) -> u64 {
        NUM_DEV_REGS as u64
    }
}
