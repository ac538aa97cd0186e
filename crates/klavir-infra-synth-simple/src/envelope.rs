/// Attack-decay-sustain-release shape. Times in milliseconds, sustain as a level in 0..=1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub attack_ms: f32,
    pub decay_ms: f32,
    pub sustain: f32,
    pub release_ms: f32,
}

/// [`Envelope`] converted to sample counts for one sample rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SampleEnvelope {
    attack: u32,
    decay: u32,
    sustain: f32,
    release: u32,
}

impl Envelope {
    pub const PIANO: Envelope = Envelope {
        attack_ms: 10.0,
        decay_ms: 100.0,
        sustain: 0.7,
        release_ms: 300.0,
    };

    pub const EFFECT: Envelope = Envelope {
        attack_ms: 2.0,
        decay_ms: 30.0,
        sustain: 0.6,
        release_ms: 60.0,
    };

    pub const NOISE_BURST: Envelope = Envelope {
        attack_ms: 40.0,
        decay_ms: 200.0,
        sustain: 0.5,
        release_ms: 400.0,
    };

    pub(crate) fn to_samples(self, sample_rate_hz: f32) -> SampleEnvelope {
        let samples = |ms: f32| (sample_rate_hz * ms / 1000.0).round().max(0.0) as u32;
        SampleEnvelope {
            attack: samples(self.attack_ms),
            decay: samples(self.decay_ms),
            sustain: self.sustain.clamp(0.0, 1.0),
            release: samples(self.release_ms),
        }
    }

    /// Level `elapsed_ms` after the start of a sound held for `hold_ms`.
    pub fn level_at(&self, elapsed_ms: f32, hold_ms: f32) -> f32 {
        let env = self.to_samples(1000.0);
        env.level(elapsed_ms.max(0.0) as u32, hold_ms.max(0.0) as u32)
    }
}

impl SampleEnvelope {
    pub(crate) fn level(&self, elapsed: u32, hold: u32) -> f32 {
        if elapsed < hold {
            return self.held_level(elapsed);
        }
        let since_release = elapsed - hold;
        if since_release >= self.release {
            return 0.0;
        }
        self.held_level(hold) * (1.0 - since_release as f32 / self.release as f32)
    }

    /// First sample at which the sound is silent for good.
    pub(crate) fn end(&self, hold: u32) -> u32 {
        hold.saturating_add(self.release)
    }

    fn held_level(&self, t: u32) -> f32 {
        if t < self.attack {
            t as f32 / self.attack as f32
        } else if t < self.attack + self.decay {
            let x = (t - self.attack) as f32 / self.decay as f32;
            1.0 - (1.0 - self.sustain) * x
        } else {
            self.sustain
        }
    }
}
