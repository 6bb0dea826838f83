use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Audio backend: a single tone switched on and off.
pub trait Speaker: Send + Sync {
    fn start_tone(&self);
    fn stop_tone(&self);
}

/// A [`Speaker`] that makes no sound.
pub struct Silent;

impl Speaker for Silent {
    fn start_tone(&self) {}
    fn stop_tone(&self) {}
}

/// Delay and sound timers, shared by the instruction clock (reads/writes) and
/// the timer clock (60Hz decay).
///
/// The speaker is driven under the same lock as the sound timer, so a tone
/// start from `LD ST, Vx` and a tone stop from the decay can't interleave.
pub struct Timers {
    state: Mutex<TimerState>,
    speaker: Arc<dyn Speaker>,
}

#[derive(Default)]
struct TimerState {
    delay: u8,
    sound: u8,
}

impl Timers {
    pub fn new(speaker: Arc<dyn Speaker>) -> Self {
        Self {
            state: Mutex::new(TimerState::default()),
            speaker,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn delay(&self) -> u8 {
        self.lock().delay
    }

    pub fn sound(&self) -> u8 {
        self.lock().sound
    }

    pub fn set_delay(&self, value: u8) {
        self.lock().delay = value;
    }

    /// Sets the sound timer, starting the tone if the value is positive.
    pub fn set_sound(&self, value: u8) {
        let mut state = self.lock();
        state.sound = value;

        if value > 0 {
            self.speaker.start_tone();
        }
    }

    /// One 60Hz tick: decrements both timers, stopping the tone when the sound
    /// timer runs out.
    pub fn tick(&self) {
        let mut state = self.lock();
        state.delay = state.delay.saturating_sub(1);

        if state.sound > 0 {
            state.sound -= 1;
            if state.sound == 0 {
                self.speaker.stop_tone();
            }
        }
    }

    /// Zeroes both timers without touching the speaker.
    pub fn reset(&self) {
        *self.lock() = TimerState::default();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub(crate) struct CountingSpeaker {
        pub(crate) starts: AtomicUsize,
        pub(crate) stops: AtomicUsize,
    }

    impl Speaker for CountingSpeaker {
        fn start_tone(&self) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn stop_tone(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn sound_timer_of_one_stops_after_one_tick() {
        let speaker = Arc::new(CountingSpeaker::default());
        let timers = Timers::new(speaker.clone());

        timers.set_sound(1);
        assert_eq!(speaker.starts.load(Ordering::SeqCst), 1);

        timers.tick();
        assert_eq!(timers.sound(), 0);
        assert_eq!(speaker.stops.load(Ordering::SeqCst), 1);

        timers.tick();
        assert_eq!(speaker.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_sound_timer_does_not_start_tone() {
        let speaker = Arc::new(CountingSpeaker::default());
        let timers = Timers::new(speaker.clone());

        timers.set_sound(0);
        timers.tick();
        assert_eq!(speaker.starts.load(Ordering::SeqCst), 0);
        assert_eq!(speaker.stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn delay_timer_counts_down_to_zero() {
        let timers = Timers::new(Arc::new(Silent));
        timers.set_delay(2);

        timers.tick();
        assert_eq!(timers.delay(), 1);
        timers.tick();
        timers.tick();
        assert_eq!(timers.delay(), 0);
    }
}
