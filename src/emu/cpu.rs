use std::sync::Arc;

use super::{
    Chip8Error, FrameSink, Framebuffer, Instruction, Keypad, Memory, Opcode, Timers,
    memory::ROM_START_ADDRESS,
};
use crate::u4;

pub const STACK_SIZE: usize = 16;

/// CHIP-8 processor state, driven by the instruction clock.
pub struct Cpu {
    pub(crate) memory: Memory,
    pub(crate) framebuffer: Framebuffer,

    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// Program counter: address of the instruction being executed
    pub(crate) pc: u16,
    /// Stack pointer: index of the top stack slot, 0 when empty
    pub(crate) sp: u8,
    pub(crate) stack: [u16; STACK_SIZE],

    pub(crate) timers: Arc<Timers>,
    pub(crate) keypad: Arc<Keypad>,
    screen: Arc<dyn FrameSink>,
    pub(crate) clip_edges: bool,
}

impl Cpu {
    pub fn new(
        memory: Memory,
        timers: Arc<Timers>,
        keypad: Arc<Keypad>,
        screen: Arc<dyn FrameSink>,
        clip_edges: bool,
    ) -> Self {
        Self {
            memory,
            framebuffer: Framebuffer::new(),
            v: [0; 16],
            i: 0,
            pc: ROM_START_ADDRESS as u16,
            sp: 0,
            stack: [0; STACK_SIZE],
            timers,
            keypad,
            screen,
            clip_edges,
        }
    }

    /// Executes a single instruction (fetch, decode, execute).
    ///
    /// Words that decode to no instruction are skipped. The program counter
    /// always advances by 2 afterwards, which is why jumps target `nnn - 2`.
    pub fn step(&mut self) -> Result<(), Chip8Error> {
        let word = self.memory.read_word(self.pc);

        match Instruction::decode(word) {
            Some(instruction) => {
                log::trace!("{:#06X}: {:?} ({word:#06X})", self.pc, instruction.opcode());

                if instruction.opcode() == Opcode::WaitForKey {
                    // Show the latest drawing while execution is stalled
                    self.push_frame();
                }
                self.execute(instruction)?;
            }
            None => log::trace!("{:#06X}: data {word:#06X}", self.pc),
        }

        self.pc = self.pc.wrapping_add(2);
        Ok(())
    }

    /// Executes `steps` instructions, then pushes the framebuffer.
    pub fn run_block(&mut self, steps: usize) -> Result<(), Chip8Error> {
        for _ in 0..steps {
            self.step()?;
        }

        self.push_frame();
        Ok(())
    }

    /// Sends the framebuffer to the screen if it changed.
    pub fn push_frame(&mut self) {
        self.framebuffer.push(self.screen.as_ref());
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn sp(&self) -> u8 {
        self.sp
    }

    pub fn register(&self, x: u4) -> u8 {
        self.v[x]
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn stack(&self) -> &[u16; STACK_SIZE] {
        &self.stack
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Stack slot at the current stack pointer.
    pub(crate) fn stack_top(&mut self) -> Result<&mut u16, Chip8Error> {
        let (sp, pc) = (self.sp, self.pc);
        self.stack
            .get_mut(sp as usize)
            .ok_or(Chip8Error::StackOverflow { sp, pc })
    }
}
