use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::Chip8Error;

/// A repeating activity on its own thread with fixed-delay scheduling: the
/// next firing starts `period` after the previous one finished.
///
/// Dropping the stop sender wakes the thread out of its sleep at once, so a
/// cancelled clock never sits out the rest of its period.
pub(crate) struct Clock {
    name: &'static str,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Clock {
    /// Spawns the clock. The first firing happens immediately.
    ///
    /// The clock stops for good when `task` returns an error or panics; an
    /// [`Chip8Error::Interrupted`] error is a normal shutdown and is not logged
    /// as a failure.
    pub(crate) fn spawn<F>(
        name: &'static str,
        period: Duration,
        mut task: F,
    ) -> Result<Self, Chip8Error>
    where
        F: FnMut() -> Result<(), Chip8Error> + Send + 'static,
    {
        let (stop, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                log::debug!("{name} started");

                loop {
                    match panic::catch_unwind(AssertUnwindSafe(&mut task)) {
                        Ok(Ok(())) => {}
                        Ok(Err(Chip8Error::Interrupted)) => break,
                        Ok(Err(e)) => {
                            log::error!("{name} terminated: {e}");
                            break;
                        }
                        Err(payload) => {
                            let msg = panic_message(&*payload);
                            log::error!("{name} terminated by panic: {msg}");
                            break;
                        }
                    }

                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                log::debug!("{name} stopped");
            })?;

        Ok(Self {
            name,
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Wakes the clock and asks it to stop after the current firing.
    pub(crate) fn cancel(&mut self) {
        self.stop.take();
    }

    /// Waits for the clock thread to exit.
    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("{} thread panicked outside its task", self.name);
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.cancel();
        self.join();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn fires_repeatedly_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut clock = {
            let count = Arc::clone(&count);
            Clock::spawn("test clock", Duration::from_millis(1), move || {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap()
        };

        wait_for(|| count.load(Ordering::SeqCst) >= 3);
        clock.cancel();
        clock.join();

        let stopped_at = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), stopped_at);
    }

    #[test]
    fn cancel_interrupts_a_long_sleep() {
        let mut clock =
            Clock::spawn("sleepy clock", Duration::from_secs(3600), || Ok(())).unwrap();

        let started = Instant::now();
        clock.cancel();
        clock.join();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn error_terminates_only_that_clock() {
        let failing = Clock::spawn("failing clock", Duration::from_millis(1), || {
            Err(Chip8Error::StackOverflow { sp: 16, pc: 0x200 })
        })
        .unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let healthy = {
            let count = Arc::clone(&count);
            Clock::spawn("healthy clock", Duration::from_millis(1), move || {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap()
        };

        wait_for(|| failing.is_finished());
        let seen = count.load(Ordering::SeqCst);
        wait_for(|| count.load(Ordering::SeqCst) > seen + 2);
        assert!(!healthy.is_finished());
    }

    #[test]
    fn panic_is_contained() {
        let clock = Clock::spawn("panicking clock", Duration::from_millis(1), || {
            panic!("bad opcode handler")
        })
        .unwrap();

        wait_for(|| clock.is_finished());
        // Dropping joins without propagating the panic
        drop(clock);
    }
}
