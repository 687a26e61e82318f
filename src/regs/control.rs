/// CONTROL_ACCESS_REG - the single control register of the device
use bitfield::bitfield;

bitfield! {
    /// CONTROL_ACCESS_REG
    ///
    /// Software-settable permission bits gating access to the data window.
    /// Initialized to 0x03 at attach (read and write allowed).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ControlReg(u8);

    // Bits [7:2] - Reserved, unused

    /// Bit [1] - Allow writes to the data registers
    pub write_data, set_write_data: 1;

    /// Bit [0] - Allow reads from the data registers
    pub read_data, set_read_data: 0;
}

impl ControlReg {
    /// Bits that carry meaning; everything else is ignored on write.
    pub const WRITABLE_MASK: u8 = 0b0000_0011;

    /// Value at attach time: read and write both allowed
    pub const ATTACH: u8 = 0b0000_0011;

    /// Create a new control register with all bits cleared
    pub const fn new() -> Self {
        Self(0)
    }

    /// Create control register from raw u8 value
    pub const fn from_raw(value: u8) -> Self {
        Self(value)
    }

    /// Get raw u8 value
    pub const fn raw(&self) -> u8 {
        self.0
    }
}

impl Default for ControlReg {
    fn default() -> Self {
        Self::from_raw(Self::ATTACH)
    }
}
