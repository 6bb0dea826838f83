use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use clap_num::maybe_hex;
use pixels::{Pixels, SurfaceTexture};
use rodio::OutputStream;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, KeyCode, NamedKey},
    window::{Window, WindowId},
};

use chip8_vm::{
    audio::RodioSpeaker,
    disasm,
    emu::{DISPLAY_X, DISPLAY_Y, Display, Machine, Options, Screen, Silent, Speaker},
    u4,
};

const WINDOW_TITLE: &str = "chip8-vm";

/// The rate at which pixels fade out (phosphor decay).
const DISPLAY_PHOSPHOR_RATE: f32 = 10.0;

/// Physical keys for CHIP-8 keys 0x0-0xF, in the same layout as `KEY_LAYOUT`.
const KEY_MAP: [KeyCode; 16] = [
    KeyCode::KeyX,   // 0x00
    KeyCode::Digit1, // 0x01
    KeyCode::Digit2, // 0x02
    KeyCode::Digit3, // 0x03
    KeyCode::KeyQ,   // 0x04
    KeyCode::KeyW,   // 0x05
    KeyCode::KeyE,   // 0x06
    KeyCode::KeyA,   // 0x07
    KeyCode::KeyS,   // 0x08
    KeyCode::KeyD,   // 0x09
    KeyCode::KeyZ,   // 0x0A
    KeyCode::KeyC,   // 0x0B
    KeyCode::Digit4, // 0x0C
    KeyCode::KeyR,   // 0x0D
    KeyCode::KeyF,   // 0x0E
    KeyCode::KeyV,   // 0x0F
];

struct App {
    pixels: Option<Pixels<'static>>,
    window: Option<Arc<Window>>,
    /// Stores the brightness of each pixel (0.0 to 1.0) to implement phosphor decay.
    display_float: Display<f32>,
    /// Last frame received from the machine.
    frame: Display<bool>,

    /// Audio output stream (must be kept alive while the machine runs).
    _audio_stream: Option<OutputStream>,

    screen: Arc<Screen>,
    machine: Machine,
    halted: bool,
    /// Used for delta time calculation.
    last_frame_instant: Instant,

    /// Stores the result of the application to be returned from main.
    exit_result: anyhow::Result<()>,
}

impl App {
    fn new(rom: &[u8], options: Options, mute: bool) -> anyhow::Result<Self> {
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
            pixels: None,
            window: None,
            display_float: [[0.0; DISPLAY_X]; DISPLAY_Y],
            frame: [[false; DISPLAY_X]; DISPLAY_Y],

            _audio_stream: audio_stream,

            screen,
            machine,
            halted: false,
            last_frame_instant: Instant::now(),
            exit_result: Ok(()),
        })
    }

    fn process_display(&mut self, dt: f32) {
        if let Some(frame) = self.screen.take_frame() {
            self.frame = frame;
        }

        let Some(pixels) = self.pixels.as_mut() else {
            return;
        };

        for (i, pxl) in pixels.frame_mut().chunks_exact_mut(4).enumerate() {
            let x = i % DISPLAY_X;
            let y = i / DISPLAY_X;

            // Lit pixels are at full brightness, unlit ones fade out over time
            self.display_float[y][x] = if self.frame[y][x] {
                1.0
            } else {
                (self.display_float[y][x] - DISPLAY_PHOSPHOR_RATE * dt).max(0.0)
            };

            let rgba = [0, 0xff, 0, (self.display_float[y][x] * 255.0) as u8];
            pxl.copy_from_slice(&rgba);
        }
    }

    fn check_health(&mut self) {
        if self.halted || self.machine.is_healthy() {
            return;
        }

        self.halted = true;
        if let Some(window) = &self.window {
            window.set_title(&format!("{WINDOW_TITLE} (halted)"));
        }
    }

    fn try_resumed(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = {
            let size = LogicalSize::new(DISPLAY_X as u32 * 10, DISPLAY_Y as u32 * 10);
            let min_size = LogicalSize::new(DISPLAY_X as u32, DISPLAY_Y as u32);

            Arc::new(
                event_loop
                    .create_window(
                        Window::default_attributes()
                            .with_title(WINDOW_TITLE)
                            .with_inner_size(size)
                            .with_min_inner_size(min_size),
                    )
                    .context("Failed to create window")?,
            )
        };

        self.window = Some(window.clone());
        self.pixels = {
            let window_size = window.inner_size();
            let surface_texture =
                SurfaceTexture::new(window_size.width, window_size.height, window.clone());

            let pixels = Pixels::new(DISPLAY_X as u32, DISPLAY_Y as u32, surface_texture)
                .context("Failed to create pixels surface")?;

            window.request_redraw();
            Some(pixels)
        };

        // Avoid large dt on first frame
        self.last_frame_instant = Instant::now();
        Ok(())
    }

    fn try_window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        event: WindowEvent,
    ) -> anyhow::Result<()> {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(pixels) = self.pixels.as_mut() {
                    pixels
                        .resize_surface(size.width, size.height)
                        .context("Failed to resize pixels surface")?;
                }
            }

            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame_instant).as_secs_f32();
                self.last_frame_instant = now;

                self.check_health();
                self.process_display(dt);

                if let Some(pixels) = &self.pixels {
                    pixels.render().context("Pixels render error")?;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            WindowEvent::KeyboardInput { event, .. } if !event.repeat => {
                if let Some(key) = KEY_MAP.iter().position(|&k| k == event.physical_key) {
                    let pressed = event.state == ElementState::Pressed;
                    self.machine
                        .keypad()
                        .set_key(u4::new(key as u8), pressed);
                }
            }

            _ => (),
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.try_resumed(event_loop) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Err(e) = self.try_window_event(event_loop, event) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.machine.stop();
    }
}

/// CHIP-8 virtual machine.
///
/// Keys 1-4, Q-R, A-F, Z-V map to CHIP-8 keys.
/// Escape is used to exit the emulator.
#[derive(Parser, Debug)]
#[command(about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a ROM in a window
    Run {
        /// Path to the CHIP-8 ROM file
        rom_path: PathBuf,

        /// Drop sprite pixels that fall off the screen instead of wrapping them
        #[arg(long)]
        clip_edges: bool,

        /// Disable sound
        #[arg(long)]
        mute: bool,
    },

    /// Print one line per instruction word of a ROM
    Disassemble {
        /// Path to the CHIP-8 ROM file
        rom_path: PathBuf,

        /// Address of the first byte (decimal or 0x-prefixed hex)
        #[arg(long, default_value_t = disasm::DEFAULT_ORIGIN, value_parser = maybe_hex::<u16>)]
        origin: u16,
    },
}

fn run(rom_path: PathBuf, options: Options, mute: bool) -> anyhow::Result<()> {
    let rom = std::fs::read(&rom_path).context("Failed to read ROM file")?;

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(&rom, options, mute).context("Failed to initialize application")?;
    event_loop
        .run_app(&mut app)
        .context("Error occurred during event loop execution")?;

    // Return the result captured during the event loop
    app.exit_result
}

fn disassemble(rom_path: PathBuf, origin: u16) -> anyhow::Result<()> {
    let rom = std::fs::read(&rom_path).context("Failed to read ROM file")?;

    for line in disasm::disassemble(&rom, origin) {
        println!("{line}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("chip8_vm", log::LevelFilter::Info)
        .filter_module(env!("CARGO_CRATE_NAME"), log::LevelFilter::Info)
        .parse_default_env()
        .init();

    match Cli::parse().command {
        Command::Run {
            rom_path,
            clip_edges,
            mute,
        } => {
            let options = Options {
                clip_edges,
                ..Options::default()
            };
            run(rom_path, options, mute)
        }
        Command::Disassemble { rom_path, origin } => disassemble(rom_path, origin),
    }
}
