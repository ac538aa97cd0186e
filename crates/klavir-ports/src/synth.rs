use crate::types::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum SynthError {
    #[error("synth not initialized")]
    NotReady,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Fixed short sounds used by the UI for feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Click,
    Success,
    Error,
    Fanfare,
    Applause,
}

impl Effect {
    pub const ALL: [Effect; 5] = [
        Effect::Click,
        Effect::Success,
        Effect::Error,
        Effect::Fanfare,
        Effect::Applause,
    ];
}

/// Thread model:
/// - init / set_volume / play_* are called from the core thread (can lock internally)
/// - render is called from the audio thread
///
/// Sounds requested before `init` are rejected with `SynthError::NotReady`.
pub trait SynthPort: Send + Sync {
    fn init(&self, sample_rate_hz: u32);
    fn is_ready(&self) -> bool;

    /// Applies to sounds started after the call; sounding voices keep their gain.
    fn set_volume(&self, volume: Volume01);
    fn volume(&self) -> Volume01;

    /// Unknown pitch names sound at a fallback frequency instead of failing.
    fn play_pitch(&self, pitch: &PitchName, duration: Duration) -> Result<(), SynthError>;
    fn play_effect(&self, effect: Effect) -> Result<(), SynthError>;

    /// Called by audio thread: render frames to out_l/out_r
    fn render(&self, frames: usize, out_l: &mut [f32], out_r: &mut [f32]);
}
