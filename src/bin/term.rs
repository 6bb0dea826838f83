use std::{
    collections::VecDeque,
    io,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    DefaultTerminal, Frame,
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget},
};
use rodio::OutputStream;

use chip8_vm::{
    audio::RodioSpeaker,
    emu::{
        DISPLAY_X, DISPLAY_Y, Display, Keypad, Machine, Options, Screen, Silent, Speaker, Timers,
        key_for_char,
    },
    u4,
};

// Most terminals only report presses, so a key counts as released once no
// press for it has arrived within this window.
const KEY_RELEASE_TIMEOUT: Duration = Duration::from_millis(50);

/// Log lines retained for the log panel and the dump on exit.
const LOG_CAPACITY: usize = 1000;

const SIDEBAR_WIDTH: u16 = 17;
const MIN_WIDTH: u16 = DISPLAY_X as u16 + 2 + SIDEBAR_WIDTH;
const MIN_HEIGHT: u16 = DISPLAY_Y as u16 + 2 + 3;

/// Hex keypad as it appears on the original hardware.
const PAD_ROWS: [[u8; 4]; 4] = [
    [0x1, 0x2, 0x3, 0xC],
    [0x4, 0x5, 0x6, 0xD],
    [0x7, 0x8, 0x9, 0xE],
    [0xA, 0x0, 0xB, 0xF],
];

#[derive(Default)]
struct LogLines {
    lines: VecDeque<String>,
    /// Bytes of a record whose newline has not arrived yet.
    pending: String,
}

impl LogLines {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.pending.push_str(&String::from_utf8_lossy(bytes));

        while let Some(end) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=end).collect();
            self.lines.push_back(line.trim_end().to_string());
            if self.lines.len() > LOG_CAPACITY {
                self.lines.pop_front();
            }
        }
    }
}

/// Keeps the most recent log lines in memory while the terminal is in raw
/// mode; they are written to stderr once it is restored.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<LogLines>>);

impl LogBuffer {
    fn lock(&self) -> MutexGuard<'_, LogLines> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The last `count` complete lines, oldest first.
    fn tail(&self, count: usize) -> Vec<String> {
        let log = self.lock();
        let skip = log.lines.len().saturating_sub(count);
        log.lines.iter().skip(skip).cloned().collect()
    }

    /// Removes and returns everything retained, including an unterminated record.
    fn drain(&self) -> Vec<String> {
        let mut log = self.lock();
        let mut lines: Vec<String> = log.lines.drain(..).collect();
        if !log.pending.is_empty() {
            lines.push(std::mem::take(&mut log.pending));
        }
        lines
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().push_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Screen regions, or `None` from [`Panels::split`] when the terminal is too small.
struct Panels {
    display: Rect,
    log: Rect,
    state: Rect,
    timers: Rect,
    keypad: Rect,
    help: Rect,
}

impl Panels {
    fn split(area: Rect) -> Option<Self> {
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            return None;
        }

        let [main, sidebar] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(SIDEBAR_WIDTH)])
                .areas(area);
        let [display, log] = Layout::vertical([
            Constraint::Length(DISPLAY_Y as u16 + 2),
            Constraint::Min(3),
        ])
        .areas(main);
        let [state, timers, keypad, help] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Length(PAD_ROWS.len() as u16 + 2),
            Constraint::Min(0),
        ])
        .areas(sidebar);

        Some(Self {
            display,
            log,
            state,
            timers,
            keypad,
            help,
        })
    }
}

fn panel(title: &str) -> Block<'_> {
    Block::bordered().title(format!(" {title} "))
}

struct App {
    screen: Arc<Screen>,
    frame: Display<bool>,
    machine: Machine,
    keypad: Arc<Keypad>,
    timers: Arc<Timers>,
    logs: LogBuffer,

    /// Audio output stream (must be kept alive while the machine runs).
    _audio_stream: Option<OutputStream>,

    should_quit: bool,
    key_press_times: [Option<Instant>; 16],
}

impl App {
    fn new(rom: &[u8], options: Options, mute: bool, logs: LogBuffer) -> anyhow::Result<Self> {
        let mut audio_stream = None;
        let speaker: Arc<dyn Speaker> = if mute {
            Arc::new(Silent)
        } else {
            match RodioSpeaker::open() {
                Ok((stream, speaker)) => {
                    audio_stream = Some(stream);
                    Arc::new(speaker)
                }
                Err(e) => {
                    log::warn!("Running without sound: {e:#}");
                    Arc::new(Silent)
                }
            }
        };

        let screen = Arc::new(Screen::new());
        let mut machine = Machine::new(options, screen.clone(), speaker);
        machine.start(rom).context("Failed to start CHIP-8 machine")?;

        Ok(Self {
            keypad: machine.keypad(),
            timers: machine.timers(),
            screen,
            frame: [[false; DISPLAY_X]; DISPLAY_Y],
            machine,
            logs,

            _audio_stream: audio_stream,

            should_quit: false,
            key_press_times: [None; 16],
        })
    }

    fn run(&mut self, terminal: &mut DefaultTerminal) -> anyhow::Result<()> {
        while !self.should_quit {
            if let Some(frame) = self.screen.take_frame() {
                self.frame = frame;
            }

            terminal.draw(|frame| self.draw(frame))?;

            self.release_stale_keys();

            if event::poll(Duration::from_millis(16))?
                && let Event::Key(key) = event::read()?
            {
                self.handle_key_event(key);
            }
        }

        self.machine.stop();
        Ok(())
    }

    fn draw(&self, frame: &mut Frame) {
        frame.render_widget(self, frame.area());
    }

    fn release_stale_keys(&mut self) {
        let now = Instant::now();

        for (idx, press_time) in self.key_press_times.iter_mut().enumerate() {
            if let Some(time) = press_time
                && now.duration_since(*time) > KEY_RELEASE_TIMEOUT
            {
                *press_time = None;
                self.keypad.set_key(u4::new(idx as u8), false);
            }
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char(c) => {
                let Some(chip8_key) = key_for_char(c) else {
                    return;
                };
                let idx = usize::from(chip8_key);

                if key.kind == KeyEventKind::Release {
                    self.key_press_times[idx] = None;
                    self.keypad.set_key(chip8_key, false);
                } else {
                    // Repeats only extend the hold
                    self.key_press_times[idx] = Some(Instant::now());
                    self.keypad.set_key(chip8_key, true);
                }
            }
            _ => {}
        }
    }

    fn status(&self) -> (&'static str, Color) {
        if !self.machine.is_healthy() {
            ("HALTED", Color::Red)
        } else if self.keypad.is_waiting() {
            ("WAITING KEY", Color::Yellow)
        } else {
            ("RUNNING", Color::Green)
        }
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(panels) = Panels::split(area) else {
            Paragraph::new(Line::styled(
                format!("Need a {MIN_WIDTH}x{MIN_HEIGHT} terminal"),
                Style::default().fg(Color::Red),
            ))
            .alignment(Alignment::Center)
            .render(area, buf);
            return;
        };

        let pixel_style = Style::default().fg(Color::Green);
        let rows: Vec<Line> = self
            .frame
            .iter()
            .map(|row| {
                let text: String = row.iter().map(|&lit| if lit { '█' } else { ' ' }).collect();
                Line::styled(text, pixel_style)
            })
            .collect();
        Paragraph::new(rows)
            .alignment(Alignment::Center)
            .block(panel("Display"))
            .render(panels.display, buf);

        let visible = panels.log.height.saturating_sub(2) as usize;
        let log_lines: Vec<Line> = self.logs.tail(visible).into_iter().map(Line::from).collect();
        Paragraph::new(log_lines)
            .block(panel("Log"))
            .render(panels.log, buf);

        let (status, color) = self.status();
        Paragraph::new(Line::styled(status, Style::default().fg(color)))
            .alignment(Alignment::Center)
            .block(panel("State"))
            .render(panels.state, buf);

        Paragraph::new(vec![
            Line::from(format!("DT {:3}", self.timers.delay())),
            Line::from(format!("ST {:3}", self.timers.sound())),
        ])
        .alignment(Alignment::Center)
        .block(panel("Timers"))
        .render(panels.timers, buf);

        let held = self.keypad.keys();
        let held_style = Style::default().fg(Color::Black).bg(Color::Green);
        let mut pad_lines = Vec::with_capacity(PAD_ROWS.len());
        for row in PAD_ROWS {
            let mut spans = Vec::with_capacity(row.len() * 2);
            for (col, key) in row.into_iter().enumerate() {
                if col > 0 {
                    spans.push(Span::raw(" "));
                }
                let style = if held[key as usize] {
                    held_style
                } else {
                    Style::default()
                };
                spans.push(Span::styled(format!("{key:X}"), style));
            }
            pad_lines.push(Line::from(spans));
        }
        Paragraph::new(pad_lines)
            .alignment(Alignment::Center)
            .block(panel("Keypad"))
            .render(panels.keypad, buf);

        Paragraph::new(vec![
            Line::from("1-4 Q-R"),
            Line::from("A-F Z-V"),
            Line::from("Esc quits"),
        ])
        .alignment(Alignment::Center)
        .render(panels.help, buf);
    }
}

/// Terminal front-end for the CHIP-8 virtual machine
#[derive(Parser)]
#[command(about)]
struct Args {
    /// Path to the ROM file to load
    rom_path: PathBuf,

    /// Drop sprite pixels that fall off the screen instead of wrapping them
    #[arg(long)]
    clip_edges: bool,

    /// Disable sound
    #[arg(long)]
    mute: bool,
}

fn main() -> anyhow::Result<()> {
    let logs = LogBuffer::default();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("chip8_vm", log::LevelFilter::Info)
        .filter_module(env!("CARGO_CRATE_NAME"), log::LevelFilter::Info)
        .parse_default_env()
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Pipe(Box::new(logs.clone())))
        .init();

    let result = run(Args::parse(), logs.clone());
    for line in logs.drain() {
        eprintln!("{line}");
    }
    result
}

fn run(args: Args, logs: LogBuffer) -> anyhow::Result<()> {
    let options = Options {
        clip_edges: args.clip_edges,
        ..Options::default()
    };

    let rom = std::fs::read(&args.rom_path).context("Failed to read ROM file")?;
    let mut app =
        App::new(&rom, options, args.mute, logs).context("Failed to initialize application")?;

    let mut terminal = ratatui::init();
    let app_result = app.run(&mut terminal);
    ratatui::restore();

    app_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn log_buffer_keeps_only_recent_lines() {
        let mut logs = LogBuffer::default();
        for idx in 0..LOG_CAPACITY + 250 {
            writeln!(logs, "record {idx}").unwrap();
        }

        let tail = logs.tail(2);
        assert_eq!(
            tail,
            vec![
                format!("record {}", LOG_CAPACITY + 248),
                format!("record {}", LOG_CAPACITY + 249),
            ]
        );

        let all = logs.drain();
        assert_eq!(all.len(), LOG_CAPACITY);
        assert_eq!(all[0], "record 250");
        assert!(logs.tail(10).is_empty());
    }

    #[test]
    fn log_buffer_joins_split_writes() {
        let mut logs = LogBuffer::default();
        logs.write_all(b"first ha").unwrap();
        assert!(logs.tail(5).is_empty());

        logs.write_all(b"lf\nsecond\nthird").unwrap();
        assert_eq!(logs.tail(5), vec!["first half", "second"]);
        assert_eq!(logs.drain(), vec!["first half", "second", "third"]);
    }

    #[test]
    fn small_terminal_has_no_panels() {
        assert!(Panels::split(Rect::new(0, 0, MIN_WIDTH - 1, MIN_HEIGHT)).is_none());
        assert!(Panels::split(Rect::new(0, 0, MIN_WIDTH, MIN_HEIGHT - 1)).is_none());

        let panels = Panels::split(Rect::new(0, 0, MIN_WIDTH, MIN_HEIGHT)).unwrap();
        assert_eq!(panels.display.height, DISPLAY_Y as u16 + 2);
        assert!(panels.display.width >= DISPLAY_X as u16 + 2);
        assert_eq!(panels.keypad.width, SIDEBAR_WIDTH);
    }
}
