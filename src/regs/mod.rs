pub mod control;
pub mod status;

pub use control::*;
pub use status::*;

/// Size of one register in bytes
pub const REG_SIZE: usize = 1;
pub const NUM_CTRL_REGS: usize = 1;
pub const NUM_STS_REGS: usize = 5;
pub const NUM_DATA_REGS: usize = 256;
pub const NUM_DEV_REGS: usize = NUM_CTRL_REGS + NUM_STS_REGS + NUM_DATA_REGS;

// Byte offsets of each window in the flat register layout
pub const CONTROL_ACCESS_REG: usize = 0;
pub const STATUS_BASE: usize = CONTROL_ACCESS_REG + NUM_CTRL_REGS * REG_SIZE;
pub const DATA_BASE: usize = STATUS_BASE + NUM_STS_REGS * REG_SIZE;
