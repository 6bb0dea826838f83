use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::Chip8Error;
use crate::u4;

/// Keypad state shared between the render loop (which feeds key events) and
/// the instruction clock (which polls keys and blocks on `LD Vx, K`).
pub struct Keypad {
    state: Mutex<KeypadState>,
    key_pressed: Condvar,
}

#[derive(Default)]
struct KeypadState {
    keys: [bool; 16],
    last_key: u4,
    /// Bumped on every key press so a waiter can tell a new press from an old one.
    presses: u64,
    waiting: bool,
    interrupted: bool,
}

impl Keypad {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(KeypadState::default()),
            key_pressed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, KeypadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the state of a key on the keypad, waking a blocked waiter on press.
    ///
    /// Only an up to down change counts as a press; auto-repeat of a held key
    /// is ignored.
    pub fn set_key(&self, key: u4, pressed: bool) {
        let mut state = self.lock();
        let was_pressed = state.keys[key];
        state.keys[key] = pressed;

        if pressed && !was_pressed {
            state.last_key = key;
            state.presses = state.presses.wrapping_add(1);
            self.key_pressed.notify_all();
        }
    }

    /// Non-blocking key poll. `key` comes straight from a register, so values
    /// above 0xF are possible; those keys do not exist and are never pressed.
    pub fn is_pressed(&self, key: u8) -> bool {
        match u4::try_from(key) {
            Ok(key) => self.lock().keys[key],
            Err(key) => {
                log::debug!("Polled nonexistent key {key:#04X}");
                false
            }
        }
    }

    /// Copy of the full key state, for front-ends.
    pub fn keys(&self) -> [bool; 16] {
        self.lock().keys
    }

    /// Blocks until the next key press and returns that key.
    ///
    /// Only presses made after the call begins release it. Returns
    /// [`Chip8Error::Interrupted`] if [`Keypad::interrupt`] is called while waiting.
    pub fn wait_for_key(&self) -> Result<u4, Chip8Error> {
        let mut state = self.lock();
        let seen = state.presses;
        state.waiting = true;

        while state.presses == seen && !state.interrupted {
            state = self
                .key_pressed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        state.waiting = false;
        if state.interrupted {
            return Err(Chip8Error::Interrupted);
        }

        Ok(state.last_key)
    }

    /// True while a caller is blocked in [`Keypad::wait_for_key`].
    pub fn is_waiting(&self) -> bool {
        self.lock().waiting
    }

    /// Releases any blocked waiter and makes future waits fail immediately.
    pub fn interrupt(&self) {
        self.lock().interrupted = true;
        self.key_pressed.notify_all();
    }

    /// Re-arms the keypad after [`Keypad::interrupt`].
    pub fn resume(&self) {
        self.lock().interrupted = false;
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

/// Host keys for CHIP-8 keys 0x0-0xF: the hex pad laid over 1234/QWER/ASDF/ZXCV.
pub const KEY_LAYOUT: [char; 16] = [
    'x', '1', '2', '3', // 0x0 - 0x3
    'q', 'w', 'e', 'a', // 0x4 - 0x7
    's', 'd', 'z', 'c', // 0x8 - 0xB
    '4', 'r', 'f', 'v', // 0xC - 0xF
];

/// CHIP-8 key for a host character, ignoring case.
pub fn key_for_char(c: char) -> Option<u4> {
    let c = c.to_ascii_lowercase();
    KEY_LAYOUT
        .iter()
        .position(|&k| k == c)
        .map(|idx| u4::new(idx as u8))
}
