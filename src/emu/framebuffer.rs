use std::sync::{Mutex, PoisonError};

use super::{DISPLAY_X, DISPLAY_Y, Display};

const BLANK: Display<bool> = [[false; DISPLAY_X]; DISPLAY_Y];

/// Render backend side of the display: receives whole frames from the
/// instruction clock.
pub trait FrameSink: Send + Sync {
    fn present_frame(&self, frame: &Display<bool>);
}

/// 64x32 monochrome framebuffer owned by the CPU.
pub struct Framebuffer {
    pixels: Display<bool>,
    dirty: bool,
}

impl Framebuffer {
    pub fn new() -> Self {
        Self {
            pixels: BLANK,
            dirty: true,
        }
    }

    pub fn clear(&mut self) {
        self.pixels = BLANK;
        self.dirty = true;
    }

    /// XORs `sprite` (one byte per row, MSB leftmost) onto the screen at `(x0, y0)`.
    ///
    /// With `clip_edges` set, bits landing outside the screen are dropped,
    /// otherwise coordinates wrap around. Returns true if any lit pixel was
    /// turned off.
    pub fn draw_sprite(&mut self, x0: u8, y0: u8, sprite: &[u8], clip_edges: bool) -> bool {
        let mut collision = false;

        for (row, &sprite_byte) in sprite.iter().enumerate() {
            for col in 0..8 {
                let x = x0 as usize + col;
                let y = y0 as usize + row;

                if clip_edges && (x >= DISPLAY_X || y >= DISPLAY_Y) {
                    continue;
                }

                let pixel = &mut self.pixels[y % DISPLAY_Y][x % DISPLAY_X];
                let toggle = sprite_byte & (0x80 >> col) != 0;

                if *pixel && toggle {
                    collision = true;
                }
                *pixel ^= toggle;
                self.dirty = true;
            }
        }

        collision
    }

    /// State of the pixel at `(x, y)`, or `None` off the screen.
    pub fn pixel(&self, x: usize, y: usize) -> Option<bool> {
        self.pixels.get(y)?.get(x).copied()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn snapshot(&self) -> Display<bool> {
        self.pixels
    }

    /// Sends the current frame to `sink` if anything changed since the last push.
    pub fn push(&mut self, sink: &dyn FrameSink) {
        if self.dirty {
            sink.present_frame(&self.pixels);
            self.dirty = false;
        }
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`FrameSink`] that keeps the most recent frame for a render loop to pick up.
pub struct Screen {
    state: Mutex<ScreenState>,
}

struct ScreenState {
    frame: Display<bool>,
    changed: bool,
}

impl Screen {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScreenState {
                frame: BLANK,
                changed: true,
            }),
        }
    }

    /// Returns a copy of the latest frame if it changed since the last call.
    pub fn take_frame(&self) -> Option<Display<bool>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.changed {
            return None;
        }

        state.changed = false;
        Some(state.frame)
    }

    /// Returns a copy of the latest frame.
    pub fn frame(&self) -> Display<bool> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frame
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for Screen {
    fn present_frame(&self, frame: &Display<bool>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.frame = *frame;
        state.changed = true;
    }
}
