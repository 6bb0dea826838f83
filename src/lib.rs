pub mod audio;
pub mod disasm;
pub mod emu;
mod nibble;

pub use nibble::*;
