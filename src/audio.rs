use anyhow::Context;
use rodio::{OutputStream, OutputStreamBuilder, Sink, Source, source::SquareWave};

use crate::emu::Speaker;

const TONE_FREQUENCY: f32 = 440.0;
const TONE_VOLUME: f32 = 0.5;

/// Square wave tone on the default audio device, paused while silent.
pub struct RodioSpeaker {
    sink: Sink,
}

impl RodioSpeaker {
    /// Opens the default output device. The returned stream must be kept
    /// alive for as long as the speaker is used.
    pub fn open() -> anyhow::Result<(OutputStream, Self)> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .context("Failed to open audio output stream")?;
        stream.log_on_drop(false);

        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        sink.append(SquareWave::new(TONE_FREQUENCY).amplify(TONE_VOLUME));

        Ok((stream, Self { sink }))
    }
}

impl Speaker for RodioSpeaker {
    fn start_tone(&self) {
        self.sink.play();
    }

    fn stop_tone(&self) {
        self.sink.pause();
    }
}
