pub mod mmio;
pub mod register_file;

pub use mmio::*;
pub use register_file::*;
