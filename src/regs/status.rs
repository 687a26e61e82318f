//! Status registers: two split 16-bit counters and the device status byte.
//!
//! On the wire the status window is five bytes,
//! `[read_count_low, read_count_high, write_count_low, write_count_high, flags]`.
//! Inside the crate the counters and flags keep their own types and are only
//! packed into that record at the ioctl and MMIO boundaries.

use bitfield::bitfield;

use crate::regs::NUM_STS_REGS;

// Byte offsets inside the status record
pub const READ_COUNT_L_REG: usize = 0;
pub const READ_COUNT_H_REG: usize = 1;
pub const WRITE_COUNT_L_REG: usize = 2;
pub const WRITE_COUNT_H_REG: usize = 3;
pub const DEVICE_STATUS_REG: usize = 4;

bitfield! {
    /// DEVICE_STATUS_REG
    ///
    /// Bits 0 and 1 mirror the control register and are never set by data
    /// operations. Bit 2 latches a truncated write until the data window is
    /// cleared.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StatusFlags(u8);

    // Bits [7:3] - Reserved, unused

    /// Bit [2] - A write was truncated at the end of the data window
    pub overflow, set_overflow: 2;

    /// Bit [1] - Data registers are available to write
    pub write_access, set_write_access: 1;

    /// Bit [0] - Data registers are available to read
    pub read_access, set_read_access: 0;
}

impl StatusFlags {
    /// Value at attach time: readable, writable, no overflow
    pub const ATTACH: u8 = 0b0000_0011;

    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn from_raw(value: u8) -> Self {
        Self(value)
    }

    pub const fn raw(&self) -> u8 {
        self.0
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        Self::from_raw(Self::ATTACH)
    }
}

/// A 16-bit counter kept as a pair of 8-bit registers.
///
/// The low register wraps on its own; the carry into the high register
/// happens only when the low register rolls over to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitCounter {
    low: u8,
    high: u8,
}

impl SplitCounter {
    pub const fn new() -> Self {
        Self { low: 0, high: 0 }
    }

    pub fn increment(&mut self) {
        self.low = self.low.wrapping_add(1);
        if self.low == 0 {
            self.high = self.high.wrapping_add(1);
        }
    }

    pub fn value(&self) -> u16 {
        u16::from_le_bytes([self.low, self.high])
    }

    pub fn low(&self) -> u8 {
        self.low
    }

    pub fn high(&self) -> u8 {
        self.high
    }
}

impl From<u16> for SplitCounter {
    fn from(value: u16) -> Self {
        let [low, high] = value.to_le_bytes();
        Self { low, high }
    }
}

/// Snapshot of the status window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub read_count: u16,
    pub write_count: u16,
    pub flags: StatusFlags,
}

impl Status {
    pub fn read_enabled(&self) -> bool {
        self.flags.read_access()
    }

    pub fn write_enabled(&self) -> bool {
        self.flags.write_access()
    }

    pub fn overflow(&self) -> bool {
        self.flags.overflow()
    }

    /// Pack into the legacy 5-byte status record.
    pub fn to_record(&self) -> [u8; NUM_STS_REGS] {
        let [rc_lo, rc_hi] = self.read_count.to_le_bytes();
        let [wc_lo, wc_hi] = self.write_count.to_le_bytes();
        let mut record = [0u8; NUM_STS_REGS];
        record[READ_COUNT_L_REG] = rc_lo;
        record[READ_COUNT_H_REG] = rc_hi;
        record[WRITE_COUNT_L_REG] = wc_lo;
        record[WRITE_COUNT_H_REG] = wc_hi;
        record[DEVICE_STATUS_REG] = self.flags.raw();
        record
    }

    pub fn from_record(record: [u8; NUM_STS_REGS]) -> Self {
        Self {
            read_count: u16::from_le_bytes([
                record[READ_COUNT_L_REG],
                record[READ_COUNT_H_REG],
            ]),
            write_count: u16::from_le_bytes([
                record[WRITE_COUNT_L_REG],
                record[WRITE_COUNT_H_REG],
            ]),
            flags: StatusFlags::from_raw(record[DEVICE_STATUS_REG]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_counter_carries_into_high_byte() {
        let mut counter = SplitCounter::from(0x00FF);
        counter.increment();
        assert_eq!(counter.low(), 0x00);
        assert_eq!(counter.high(), 0x01);
        assert_eq!(counter.value(), 0x0100);
    }

    #[test]
    fn test_split_counter_wraps_silently() {
        let mut counter = SplitCounter::from(0xFFFF);
        counter.increment();
        assert_eq!(counter.value(), 0);
        assert_eq!(counter, SplitCounter::new());
    }

    #[test]
    fn test_split_counter_full_cycle() {
        let mut counter = SplitCounter::new();
        for _ in 0..65_535 {
            counter.increment();
        }
        assert_eq!(counter.value(), 0xFFFF);
        counter.increment();
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn test_status_flags_bits() {
        let mut flags = StatusFlags::default();
        assert!(flags.read_access());
        assert!(flags.write_access());
        assert!(!flags.overflow());

        flags.set_overflow(true);
        assert_eq!(flags.raw(), 0b111);
    }

    #[test]
    fn test_status_record_layout() {
        let status = Status {
            read_count: 0x1234,
            write_count: 0xABCD,
            flags: StatusFlags::from_raw(0b101),
        };
        assert_eq!(status.to_record(), [0x34, 0x12, 0xCD, 0xAB, 0b101]);
        assert_eq!(Status::from_record(status.to_record()), status);
        assert!(status.read_enabled());
        assert!(!status.write_enabled());
        assert!(status.overflow());
    }
}
