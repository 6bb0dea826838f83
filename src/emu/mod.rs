mod clock;
mod cpu;
mod execute;
mod framebuffer;
mod keypad;
mod machine;
mod memory;
mod opcode;
mod timers;
mod types;

pub use cpu::*;
pub use framebuffer::*;
pub use keypad::*;
pub use machine::*;
pub use memory::*;
pub use opcode::*;
pub use timers::*;
pub use types::*;
