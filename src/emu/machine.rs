use std::sync::Arc;

use super::{Chip8Error, Cpu, FrameSink, Keypad, Memory, Options, Speaker, Timers, clock::Clock};

/// A running CHIP-8 machine: the instruction clock and the timer clock,
/// plus the keypad and timers they share.
///
/// The render backend hands in a [`FrameSink`] and a [`Speaker`], feeds key
/// events through [`Machine::keypad`], and otherwise only starts and stops the
/// machine.
pub struct Machine {
    options: Options,
    keypad: Arc<Keypad>,
    timers: Arc<Timers>,
    screen: Arc<dyn FrameSink>,
    clocks: Vec<Clock>,
}

impl Machine {
    pub fn new(options: Options, screen: Arc<dyn FrameSink>, speaker: Arc<dyn Speaker>) -> Self {
        Self {
            options,
            keypad: Arc::new(Keypad::new()),
            timers: Arc::new(Timers::new(speaker)),
            screen,
            clocks: Vec::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The keypad the render backend feeds key events into.
    pub fn keypad(&self) -> Arc<Keypad> {
        Arc::clone(&self.keypad)
    }

    /// Delay and sound timers, for front-ends that display them.
    pub fn timers(&self) -> Arc<Timers> {
        Arc::clone(&self.timers)
    }

    /// Loads `rom`, pushes a blank frame and starts both clocks.
    pub fn start(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        if self.is_running() {
            return Err(Chip8Error::AlreadyRunning);
        }

        let mut memory = Memory::new();
        let loaded = memory.load(rom);
        log::info!("Loaded {loaded} byte ROM");

        self.keypad.resume();
        self.timers.reset();

        let mut cpu = Cpu::new(
            memory,
            Arc::clone(&self.timers),
            Arc::clone(&self.keypad),
            Arc::clone(&self.screen),
            self.options.clip_edges,
        );
        cpu.framebuffer.clear();
        cpu.push_frame();

        let steps = self.options.instructions_per_block;
        self.clocks.push(Clock::spawn(
            "instruction clock",
            self.options.instruction_period,
            move || cpu.run_block(steps),
        )?);

        let timers = Arc::clone(&self.timers);
        let timer_clock = Clock::spawn("timer clock", self.options.timer_period, move || {
            timers.tick();
            Ok(())
        });
        match timer_clock {
            Ok(clock) => self.clocks.push(clock),
            Err(e) => {
                self.stop();
                return Err(e);
            }
        }

        log::debug!("Machine started with {:?}", self.options);
        Ok(())
    }

    /// Cancels both clocks, releases a blocked key wait, and waits for the
    /// clock threads to exit.
    pub fn stop(&mut self) {
        if self.clocks.is_empty() {
            return;
        }

        for clock in &mut self.clocks {
            clock.cancel();
        }
        self.keypad.interrupt();

        for mut clock in self.clocks.drain(..) {
            clock.join();
        }
        log::debug!("Machine stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.clocks.is_empty()
    }

    /// False once either clock has terminated on its own (the machine then
    /// appears frozen until stopped).
    pub fn is_healthy(&self) -> bool {
        self.clocks.iter().all(|clock| !clock.is_finished())
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        self.stop();
    }
}
