use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use chip8_vm::{
    emu::{Chip8Error, Display, FrameSink, Machine, Options, Speaker},
    u4,
};

#[derive(Default)]
struct RecordingSpeaker {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl RecordingSpeaker {
    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Speaker for RecordingSpeaker {
    fn start_tone(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop_tone(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingScreen {
    frames: Mutex<Vec<Display<bool>>>,
}

impl RecordingScreen {
    fn frames(&self) -> Vec<Display<bool>> {
        self.frames.lock().unwrap().clone()
    }
}

impl FrameSink for RecordingScreen {
    fn present_frame(&self, frame: &Display<bool>) {
        self.frames.lock().unwrap().push(*frame);
    }
}

fn machine() -> (Machine, Arc<RecordingScreen>, Arc<RecordingSpeaker>) {
    let screen = Arc::new(RecordingScreen::default());
    let speaker = Arc::new(RecordingSpeaker::default());
    let machine = Machine::new(Options::default(), screen.clone(), speaker.clone());
    (machine, screen, speaker)
}

fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn pushes_blank_frame_on_start() {
    let (mut machine, screen, _) = machine();
    // JP 0x200
    machine.start(&[0x12, 0x00]).unwrap();

    wait_for("first frame", || !screen.frames().is_empty());
    let first = screen.frames()[0];
    assert!(first.iter().flatten().all(|&pixel| !pixel));
}

#[test]
fn key_wait_resumes_and_sound_timer_stops_tone() {
    let (mut machine, _, speaker) = machine();
    let keypad = machine.keypad();

    // LD V3, K; LD ST, V3; JP 0x204
    machine.start(&[0xF3, 0x0A, 0xF3, 0x18, 0x12, 0x04]).unwrap();

    wait_for("key wait", || keypad.is_waiting());
    assert_eq!(speaker.starts(), 0);

    keypad.set_key(u4::new(0x7), true);
    wait_for("tone start", || speaker.starts() == 1);
    // Seven timer ticks later the tone stops
    wait_for("tone stop", || speaker.stops() == 1);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(speaker.starts(), 1);
    assert_eq!(speaker.stops(), 1);
    assert_eq!(machine.timers().sound(), 0);
    assert!(machine.is_healthy());
}

#[test]
fn stop_releases_blocked_key_wait() {
    let (mut machine, _, _) = machine();
    let keypad = machine.keypad();

    // LD V0, K
    machine.start(&[0xF0, 0x0A]).unwrap();
    wait_for("key wait", || keypad.is_waiting());

    let started = Instant::now();
    machine.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!machine.is_running());
    assert!(!keypad.is_waiting());
}

#[test]
fn start_twice_is_rejected_until_stopped() {
    let (mut machine, _, _) = machine();
    let rom = [0x12, 0x00];

    machine.start(&rom).unwrap();
    assert!(matches!(
        machine.start(&rom),
        Err(Chip8Error::AlreadyRunning)
    ));

    machine.stop();
    machine.start(&rom).unwrap();
    assert!(machine.is_running());
}

#[test]
fn stack_overflow_halts_only_the_instruction_clock() {
    let (mut machine, _, speaker) = machine();

    // LD V0, 0x05; LD ST, V0; CALL 0x204 (recurses until the stack runs out)
    machine
        .start(&[0x60, 0x05, 0xF0, 0x18, 0x22, 0x04])
        .unwrap();

    wait_for("instruction clock to halt", || !machine.is_healthy());
    assert!(machine.is_running());

    // The timer clock keeps running and stops the tone
    wait_for("tone stop", || speaker.stops() == 1);
    assert_eq!(speaker.starts(), 1);
}
