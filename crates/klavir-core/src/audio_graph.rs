use klavir_ports::audio::AudioRenderCallback;
use klavir_ports::synth::SynthPort;
use klavir_ports::types::SampleTime;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

const LIMIT: f32 = 0.98;
const LIMITER_ATTACK: f32 = 0.25;
const LIMITER_RELEASE: f32 = 0.01;

/// Sample position of the last rendered block, written by the audio thread.
pub struct AudioClock {
    sample_time: AtomicU64,
}

impl AudioClock {
    pub fn new() -> Self {
        Self {
            sample_time: AtomicU64::new(0),
        }
    }

    pub fn set(&self, sample_time: SampleTime) {
        self.sample_time.store(sample_time, Ordering::Relaxed);
    }

    pub fn get(&self) -> SampleTime {
        self.sample_time.load(Ordering::Relaxed)
    }
}

impl Default for AudioClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Render callback handed to the output device: synth mix through a peak limiter.
pub struct AudioGraph {
    synth: Arc<dyn SynthPort>,
    clock: Arc<AudioClock>,
    limiter_gain: f32,
}

impl AudioGraph {
    pub fn new(synth: Arc<dyn SynthPort>, clock: Arc<AudioClock>) -> Self {
        Self {
            synth,
            clock,
            limiter_gain: 1.0,
        }
    }

    fn limit(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        let peak = out_l
            .iter()
            .chain(out_r.iter())
            .fold(0.0_f32, |peak, s| peak.max(s.abs()));

        let target_gain = if peak > LIMIT { LIMIT / peak } else { 1.0 };
        let coeff = if target_gain < self.limiter_gain {
            LIMITER_ATTACK
        } else {
            LIMITER_RELEASE
        };
        self.limiter_gain =
            (self.limiter_gain + coeff * (target_gain - self.limiter_gain)).clamp(0.0, 1.0);

        if self.limiter_gain < 0.999 {
            for sample in out_l.iter_mut().chain(out_r.iter_mut()) {
                *sample *= self.limiter_gain;
            }
        }
    }
}

impl AudioRenderCallback for AudioGraph {
    fn render(&mut self, sample_time_start: SampleTime, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len().min(out_r.len());
        let (out_l, out_r) = (&mut out_l[..frames], &mut out_r[..frames]);

        self.synth.render(frames, out_l, out_r);
        self.limit(out_l, out_r);

        self.clock
            .set(sample_time_start.saturating_add(frames as SampleTime));
    }
}
