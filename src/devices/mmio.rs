use std::collections::BTreeMap;

use crate::err::MmioError;

/// A device reachable through a window of absolute addresses.
///
/// Offsets passed in are relative to the device base; the manager has
/// already checked size, alignment and bounds.
pub trait MmioDevice {
    fn read(&mut self, offset: u64, size: usize) -> Result<u64, MmioError>;
    fn write(&mut self, offset: u64, size: usize, value: u64) -> Result<(), MmioError>;
    fn reset(&mut self);
    fn get_size(&self) -> u64;
}

struct MmioRegion {
    base_addr: u64,
    size: u64,
    device: Box<dyn MmioDevice>,
}

impl MmioRegion {
    // Cannot overflow: register_device rejects regions past u64::MAX
    fn end(&self) -> u64 {
        self.base_addr + self.size
    }
}

#[derive(Default)]
pub struct MmioManager {
    regions: BTreeMap<u64, MmioRegion>, // Sorted by base address
}

impl MmioManager {
    pub fn register_device(
        &mut self,
        base: u64,
        device: Box<dyn MmioDevice>,
    ) -> Result<(), MmioError> {
        let size = device.get_size();
        let end = base
            .checked_add(size)
            .ok_or(MmioError::InvalidRegion { base, size })?;

        if let Some(existing) = self.find_overlap(base, end) {
            return Err(MmioError::overlapping_region(existing, (base, end)));
        }

        log::info!("Mapped device at [{base:#x}, {end:#x})");
        self.regions.insert(
            base,
            MmioRegion {
                base_addr: base,
                size,
                device,
            },
        );

        Ok(())
    }

    fn locate(&mut self, addr: u64, size: usize) -> Result<&mut MmioRegion, MmioError> {
        if !matches!(size, 1 | 2 | 4 | 8) {
            return Err(MmioError::InvalidSize { size });
        }
        if addr & (size as u64 - 1) != 0 {
            return Err(MmioError::InvalidAlignment { addr, size });
        }
        let region = self.find_region(addr)?;

        // Accesses may not straddle the end of a device
        match addr.checked_add(size as u64) {
            Some(access_end) if access_end <= region.end() => {}
            _ => return Err(MmioError::UnmappedAccess(addr)),
        }
        Ok(region)
    }

    pub fn handle_write(&mut self, addr: u64, size: usize, value: u64) -> Result<(), MmioError> {
        log::debug!("Write {value:#x} to {addr:#0x} of size {size}");
        let region = self.locate(addr, size)?;
        let offset = addr - region.base_addr;
        region.device.write(offset, size, value)
    }

    pub fn handle_read(&mut self, addr: u64, size: usize) -> Result<u64, MmioError> {
        log::debug!("Read from {addr:#0x} of size {size}");
        let region = self.locate(addr, size)?;
        let offset = addr - region.base_addr;
        region.device.read(offset, size)
    }

    /// Resets every mapped device to its power-on state.
    pub fn reset_all(&mut self) {
        for region in self.regions.values_mut() {
            region.device.reset();
        }
    }

    fn find_region(&mut self, addr: u64) -> Result<&mut MmioRegion, MmioError> {
        let (_, region) = self
            .regions
            .range_mut(..=addr)
            .next_back()
            .ok_or(MmioError::UnmappedAccess(addr))?;

        if addr < region.end() {
            Ok(region)
        } else {
            Err(MmioError::UnmappedAccess(addr))
        }
    }

    /// find a overlapping region if it exists, O(log n)
    fn find_overlap(&self, base: u64, new_end: u64) -> Option<(u64, u64)> {
        if let Some((_, region)) = self.regions.range(base..).next() {
            if region.base_addr < new_end {
                return Some((region.base_addr, region.end()));
            }
        }

        if let Some((_, region)) = self.regions.range(..base).next_back() {
            if region.end() > base {
                return Some((region.base_addr, region.end()));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::RegisterFile;
    use crate::err::DeviceError;

    const BASE: u64 = 0x1000_0000;

    fn manager() -> MmioManager {
        let mut mmio = MmioManager::default();
        mmio.register_device(BASE, Box::new(RegisterFile::new()))
            .unwrap();
        mmio
    }

    #[test]
    fn test_routes_to_register_file() {
        let mut mmio = manager();
        assert_eq!(mmio.handle_read(BASE, 1).unwrap(), 0x03);

        // data register 2 lives at offset 8, naturally aligned for 8 bytes
        mmio.handle_write(BASE + 8, 8, 0x0807_0605_0403_0201).unwrap();
        assert_eq!(mmio.handle_read(BASE + 8, 8).unwrap(), 0x0807_0605_0403_0201);
        assert_eq!(mmio.handle_read(BASE + 9, 1).unwrap(), 0x02);
    }

    #[test]
    fn test_rejects_bad_accesses() {
        let mut mmio = manager();
        assert_eq!(
            mmio.handle_read(BASE, 3),
            Err(MmioError::InvalidSize { size: 3 })
        );
        assert_eq!(
            mmio.handle_read(BASE + 6, 4),
            Err(MmioError::InvalidAlignment {
                addr: BASE + 6,
                size: 4
            })
        );
        assert_eq!(
            mmio.handle_read(BASE - 1, 1),
            Err(MmioError::UnmappedAccess(BASE - 1))
        );
        assert_eq!(
            mmio.handle_read(BASE + 262, 1),
            Err(MmioError::UnmappedAccess(BASE + 262))
        );
        // last 8-byte slot would run past the 262-byte device
        assert_eq!(
            mmio.handle_read(BASE + 256, 8),
            Err(MmioError::UnmappedAccess(BASE + 256))
        );
    }

    #[test]
    fn test_device_errors_propagate() {
        let mut mmio = manager();
        mmio.handle_write(BASE, 1, 0b01).unwrap();
        assert_eq!(
            mmio.handle_write(BASE + 6, 1, 0xFF),
            Err(MmioError::Device(DeviceError::WriteDisabled))
        );

        mmio.reset_all();
        mmio.handle_write(BASE + 6, 1, 0xFF).unwrap();
    }

    #[test]
    fn test_overlapping_regions_are_rejected() {
        let mut mmio = manager();
        let err = mmio
            .register_device(BASE + 0x100, Box::new(RegisterFile::new()))
            .unwrap_err();
        assert_eq!(
            err,
            MmioError::overlapping_region((BASE, BASE + 262), (BASE + 0x100, BASE + 0x206))
        );

        mmio.register_device(BASE + 262, Box::new(RegisterFile::new()))
            .unwrap();
        assert_eq!(
            mmio.register_device(BASE - 0x10, Box::new(RegisterFile::new())),
            Err(MmioError::overlapping_region(
                (BASE, BASE + 262),
                (BASE - 0x10, BASE + 0xF6)
            ))
        );
    }

    #[test]
    fn test_top_of_address_space() {
        let mut mmio = MmioManager::default();
        assert_eq!(
            mmio.register_device(u64::MAX - 10, Box::new(RegisterFile::new())),
            Err(MmioError::InvalidRegion {
                base: u64::MAX - 10,
                size: 262
            })
        );

        // ends exactly at u64::MAX
        let base = u64::MAX - 262;
        mmio.register_device(base, Box::new(RegisterFile::new()))
            .unwrap();
        assert_eq!(
            mmio.handle_read(u64::MAX - 7, 8),
            Err(MmioError::UnmappedAccess(u64::MAX - 7))
        );
        assert_eq!(mmio.handle_read(base, 1).unwrap(), 0x03);
    }
}
