use std::time::Duration;

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
/// A type alias for the CHIP-8 display buffer representation, indexed `[y][x]`.
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];

/// Error types that can occur while the machine runs.
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("Blocked key wait was interrupted by machine shutdown")]
    Interrupted,

    #[error("Stack pointer {sp:#04X} is outside the call stack (instruction at {pc:#06X})")]
    StackOverflow { sp: u8, pc: u16 },

    #[error("Machine is already running")]
    AlreadyRunning,

    #[error("Failed to spawn clock thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Run-time options for a machine.
#[derive(Clone, Debug)]
pub struct Options {
    /// Drop sprite bits that fall off the screen edge instead of wrapping them.
    pub clip_edges: bool,
    /// Instructions executed per firing of the instruction clock.
    pub instructions_per_block: usize,
    /// Delay between the end of one instruction block and the start of the next.
    pub instruction_period: Duration,
    /// Delay between timer decrements (~60Hz).
    pub timer_period: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            clip_edges: false,
            instructions_per_block: 10,
            instruction_period: Duration::from_millis(20),
            timer_period: Duration::from_micros(16_667),
        }
    }
}
