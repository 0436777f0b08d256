//! Entry-cue tones. Two fixed tones, distinct in frequency and waveform so an
//! operator can tell the verdict without looking at the panel. Playback is
//! best-effort; a kiosk with no audio device still runs the scan cycle.

use std::time::Duration;

use crate::error::ClientError;
use crate::models::EntryDecision;

pub const SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub waveform: Waveform,
    pub duration: Duration,
}

pub const ALLOWED_TONE: Tone = Tone {
    frequency_hz: 800.0,
    waveform: Waveform::Sine,
    duration: Duration::from_millis(500),
};

pub const DENIED_TONE: Tone = Tone {
    frequency_hz: 400.0,
    waveform: Waveform::Square,
    duration: Duration::from_millis(300),
};

impl Tone {
    pub fn for_decision(decision: EntryDecision) -> Tone {
        match decision {
            EntryDecision::Allowed => ALLOWED_TONE,
            EntryDecision::Denied => DENIED_TONE,
        }
    }

    /// Mono PCM at [`SAMPLE_RATE`].
    pub fn samples(&self) -> Vec<f32> {
        let count = (SAMPLE_RATE as f32 * self.duration.as_secs_f32()) as usize;
        (0..count)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let phase = (2.0 * std::f32::consts::PI * self.frequency_hz * t).sin();
                match self.waveform {
                    Waveform::Sine => phase * 0.4,
                    Waveform::Square => phase.signum() * 0.25,
                }
            })
            .collect()
    }
}

/// Audio output seam. Implementations must not block the scan cycle.
pub trait ToneSink: Send + Sync {
    fn play(&self, tone: Tone) -> Result<(), ClientError>;
}

/// Headless kiosks and tests.
pub struct NullToneSink;

impl ToneSink for NullToneSink {
    fn play(&self, _tone: Tone) -> Result<(), ClientError> {
        Ok(())
    }
}

#[cfg(feature = "audio")]
pub struct RodioToneSink;

#[cfg(feature = "audio")]
impl ToneSink for RodioToneSink {
    fn play(&self, tone: Tone) -> Result<(), ClientError> {
        // Playback outlives the call on its own thread; device errors are
        // logged there and never reach the cycle.
        std::thread::spawn(move || {
            let samples = tone.samples();
            match rodio::OutputStream::try_default() {
                Ok((_stream, handle)) => match rodio::Sink::try_new(&handle) {
                    Ok(sink) => {
                        sink.append(rodio::buffer::SamplesBuffer::new(1, SAMPLE_RATE, samples));
                        sink.sleep_until_end();
                    }
                    Err(e) => tracing::debug!(error = %e, "audio sink unavailable"),
                },
                Err(e) => tracing::debug!(error = %e, "audio output unavailable"),
            }
        });
        Ok(())
    }
}
