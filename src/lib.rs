pub mod debugger;
pub mod devices;
pub mod driver;
pub mod err;
pub mod regs;

pub use devices::*;
pub use driver::*;
pub use err::*;
pub use regs::*;
