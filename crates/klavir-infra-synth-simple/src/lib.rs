use klavir_ports::synth::{Effect, SynthError, SynthPort};
use klavir_ports::types::{PitchName, Volume01};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

mod envelope;
mod pitch;

use envelope::SampleEnvelope;
pub use envelope::Envelope;
pub use pitch::{frequency_for, FALLBACK_FREQUENCY_HZ};

/// Fundamental, octave and third harmonic with their relative gains.
const PITCH_LAYERS: [(f32, f32); 3] = [(1.0, 1.0), (2.0, 0.5), (3.0, 0.25)];
const OUTPUT_AMPLITUDE: f32 = 0.2;
const APPLAUSE_SEED: u64 = 0x6b6c_6176_6972;
const APPLAUSE_CUTOFF_HZ: f32 = 2_500.0;

pub struct SimpleSynth {
    ready: AtomicBool,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    sample_rate_hz: f32,
    max_voices: usize,
    volume: f32,
    voices: Vec<Voice>,
    note_counter: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Waveform {
    Sine,
    Square,
    Triangle,
}

#[derive(Clone, Copy, Debug)]
struct Layer {
    freq: f32,
    gain: f32,
    phase: f32,
}

#[derive(Debug)]
enum Source {
    Tone { waveform: Waveform, layers: Vec<Layer> },
    Noise { rng: StdRng, lowpass_coeff: f32, state: f32 },
}

#[derive(Debug)]
struct Voice {
    source: Source,
    envelope: SampleEnvelope,
    gain: f32,
    delay_samples_left: u32,
    hold_samples: u32,
    elapsed_samples: u32,
    age: u64,
}

/// One sound of an effect: a tone or a noise burst starting `start_ms` after the trigger.
#[derive(Clone, Copy, Debug)]
struct EffectPart {
    freq: Option<f32>,
    waveform: Waveform,
    start_ms: u32,
    hold_ms: u32,
    gain: f32,
}

impl SimpleSynth {
    pub fn new(max_voices: usize) -> Self {
        Self {
            ready: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                sample_rate_hz: 48_000.0,
                max_voices: max_voices.max(8),
                volume: Volume01::new(0.8).get(),
                voices: Vec::new(),
                note_counter: 0,
            }),
        }
    }

    /// Number of voices currently sounding or waiting for their start offset.
    pub fn active_voices(&self) -> usize {
        self.inner.lock().voices.len()
    }
}

impl Default for SimpleSynth {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Inner {
    fn ms_to_samples(&self, ms: f32) -> u32 {
        (self.sample_rate_hz * ms / 1000.0).round() as u32
    }

    fn push_voice(&mut self, source: Source, envelope: Envelope, hold_ms: f32, start_ms: f32, gain: f32) {
        self.note_counter = self.note_counter.wrapping_add(1);

        if self.voices.len() >= self.max_voices {
            if let Some((idx, _)) = self
                .voices
                .iter()
                .enumerate()
                .min_by_key(|(_, voice)| voice.age)
            {
                self.voices.swap_remove(idx);
            }
        }

        let voice = Voice {
            source,
            envelope: envelope.to_samples(self.sample_rate_hz),
            gain: gain * self.volume,
            delay_samples_left: self.ms_to_samples(start_ms),
            hold_samples: self.ms_to_samples(hold_ms).max(1),
            elapsed_samples: 0,
            age: self.note_counter,
        };
        self.voices.push(voice);
    }

    fn pitch_on(&mut self, freq: f32, hold_ms: f32) {
        let norm: f32 = PITCH_LAYERS.iter().map(|(_, gain)| gain).sum();
        let layers = PITCH_LAYERS
            .iter()
            .map(|(ratio, gain)| Layer {
                freq: freq * ratio,
                gain: gain / norm,
                phase: 0.0,
            })
            .collect();
        self.push_voice(
            Source::Tone {
                waveform: Waveform::Sine,
                layers,
            },
            Envelope::PIANO,
            hold_ms,
            0.0,
            1.0,
        );
    }

    fn effect_on(&mut self, effect: Effect) {
        for part in effect_parts(effect) {
            let source = match part.freq {
                Some(freq) => Source::Tone {
                    waveform: part.waveform,
                    layers: vec![Layer {
                        freq,
                        gain: 1.0,
                        phase: 0.0,
                    }],
                },
                None => Source::Noise {
                    rng: StdRng::seed_from_u64(APPLAUSE_SEED),
                    lowpass_coeff: lowpass_coeff(APPLAUSE_CUTOFF_HZ, self.sample_rate_hz),
                    state: 0.0,
                },
            };
            let envelope = if part.freq.is_some() {
                Envelope::EFFECT
            } else {
                Envelope::NOISE_BURST
            };
            self.push_voice(
                source,
                envelope,
                part.hold_ms as f32,
                part.start_ms as f32,
                part.gain,
            );
        }
    }

    fn render(&mut self, frames: usize, out_l: &mut [f32], out_r: &mut [f32]) {
        for value in out_l.iter_mut() {
            *value = 0.0;
        }
        for value in out_r.iter_mut() {
            *value = 0.0;
        }

        let sample_rate_hz = self.sample_rate_hz;
        for voice in &mut self.voices {
            for i in 0..frames {
                if voice.delay_samples_left > 0 {
                    voice.delay_samples_left -= 1;
                    continue;
                }
                let level = voice.envelope.level(voice.elapsed_samples, voice.hold_samples);
                let sample = voice.source.next_sample(sample_rate_hz) * level * voice.gain * OUTPUT_AMPLITUDE;
                out_l[i] += sample;
                out_r[i] += sample;
                voice.elapsed_samples = voice.elapsed_samples.saturating_add(1);
            }
        }

        self.voices.retain(|voice| {
            voice.delay_samples_left > 0
                || voice.elapsed_samples < voice.envelope.end(voice.hold_samples)
        });
    }
}

impl Source {
    fn next_sample(&mut self, sample_rate_hz: f32) -> f32 {
        match self {
            Source::Tone { waveform, layers } => {
                let mut sum = 0.0;
                for layer in layers.iter_mut() {
                    sum += waveform.sample(layer.phase) * layer.gain;
                    layer.phase += TAU * layer.freq / sample_rate_hz;
                    if layer.phase >= TAU {
                        layer.phase -= TAU;
                    }
                }
                sum
            }
            Source::Noise {
                rng,
                lowpass_coeff,
                state,
            } => {
                let white: f32 = rng.gen_range(-1.0..1.0);
                *state += *lowpass_coeff * (white - *state);
                *state
            }
        }
    }
}

impl Waveform {
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => phase.sin(),
            Waveform::Square => {
                if phase < TAU / 2.0 {
                    0.5
                } else {
                    -0.5
                }
            }
            Waveform::Triangle => {
                let x = phase / TAU;
                4.0 * (x - (x + 0.5).floor()).abs() - 1.0
            }
        }
    }
}

fn lowpass_coeff(cutoff_hz: f32, sample_rate_hz: f32) -> f32 {
    let rc = 1.0 / (TAU * cutoff_hz);
    let dt = 1.0 / sample_rate_hz;
    dt / (rc + dt)
}

fn effect_parts(effect: Effect) -> Vec<EffectPart> {
    let tone = |freq: f32, start_ms: u32, hold_ms: u32| EffectPart {
        freq: Some(freq),
        waveform: Waveform::Sine,
        start_ms,
        hold_ms,
        gain: 0.8,
    };

    match effect {
        Effect::Click => vec![EffectPart {
            waveform: Waveform::Triangle,
            ..tone(1_200.0, 0, 15)
        }],
        Effect::Success => vec![tone(523.25, 0, 110), tone(783.99, 100, 220)],
        Effect::Error => vec![
            EffectPart {
                waveform: Waveform::Square,
                gain: 0.5,
                ..tone(220.0, 0, 140)
            },
            EffectPart {
                waveform: Waveform::Square,
                gain: 0.5,
                ..tone(174.61, 150, 220)
            },
        ],
        Effect::Fanfare => vec![
            tone(523.25, 0, 110),
            tone(659.25, 120, 110),
            tone(783.99, 240, 110),
            tone(1_046.5, 360, 500),
        ],
        Effect::Applause => vec![EffectPart {
            freq: None,
            waveform: Waveform::Sine,
            start_ms: 0,
            hold_ms: 1_200,
            gain: 0.6,
        }],
    }
}

impl SynthPort for SimpleSynth {
    fn init(&self, sample_rate_hz: u32) {
        let mut inner = self.inner.lock();
        inner.sample_rate_hz = sample_rate_hz.max(1) as f32;
        if !self.ready.swap(true, Ordering::AcqRel) {
            info!(sample_rate_hz, "synth ready");
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn set_volume(&self, volume: Volume01) {
        self.inner.lock().volume = volume.get();
    }

    fn volume(&self) -> Volume01 {
        Volume01::new(self.inner.lock().volume)
    }

    fn play_pitch(&self, pitch: &PitchName, duration: Duration) -> Result<(), SynthError> {
        if !self.is_ready() {
            return Err(SynthError::NotReady);
        }
        let freq = frequency_for(pitch.as_str()).unwrap_or_else(|| {
            debug!(%pitch, "unknown pitch, using fallback frequency");
            FALLBACK_FREQUENCY_HZ
        });
        let hold_ms = duration.as_secs_f32() * 1000.0;
        self.inner.lock().pitch_on(freq, hold_ms);
        Ok(())
    }

    fn play_effect(&self, effect: Effect) -> Result<(), SynthError> {
        if !self.is_ready() {
            return Err(SynthError::NotReady);
        }
        self.inner.lock().effect_on(effect);
        Ok(())
    }

    fn render(&self, frames: usize, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = frames.min(out_l.len()).min(out_r.len());
        let mut inner = self.inner.lock();
        inner.render(frames, out_l, out_r);
    }
}
