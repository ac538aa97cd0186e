use crate::model::*;
use klavir_ports::types::{Millis, PitchName};
use serde::{Deserialize, Serialize};

const MIN_MULTIPLIER: f32 = 0.1;
const MAX_MULTIPLIER: f32 = 10.0;

/// One realized step of playback. Rests carry no pitch and no sounding time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Index of the source token in the parsed sequence.
    pub token_index: usize,
    pub pitch: Option<PitchName>,
    pub play_ms: Millis,
    pub wait_ms: Millis,
}

impl DurationClass {
    /// Time until the next token at the reference tempo.
    pub fn base_wait_ms(self) -> Millis {
        match self {
            DurationClass::Sixteenth => 125,
            DurationClass::Eighth => 250,
            DurationClass::Quarter => 500,
            DurationClass::QuarterDotted => 750,
            DurationClass::Half => 1000,
            DurationClass::HalfDotted => 1500,
            DurationClass::Whole => 2000,
        }
    }

    /// Sounding time at the reference tempo; a little shorter than the wait
    /// so repeated notes stay distinct.
    pub fn base_play_ms(self) -> Millis {
        self.base_wait_ms() * 9 / 10
    }
}

impl RestLength {
    pub fn base_wait_ms(self) -> Millis {
        match self {
            RestLength::Short => 250,
            RestLength::Medium => 500,
            RestLength::Long => 1000,
            RestLength::ExtraLong => 2000,
        }
    }
}

/// Non-finite or non-positive multipliers fall back to 1.0; the rest are
/// clamped to `0.1..=10.0`.
pub fn sanitize_multiplier(multiplier: f32) -> f32 {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return 1.0;
    }
    multiplier.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER)
}

pub fn scale_ms(ms: Millis, multiplier: f32) -> Millis {
    let multiplier = sanitize_multiplier(multiplier) as f64;
    (ms as f64 * multiplier).round() as Millis
}

impl NotationToken {
    /// `None` for bar breaks, which take no time.
    pub fn timed_event(&self, token_index: usize, multiplier: f32) -> Option<TimedEvent> {
        match self {
            NotationToken::Note(note) => Some(TimedEvent {
                token_index,
                pitch: Some(note.pitch_name()),
                play_ms: scale_ms(note.duration.base_play_ms(), multiplier),
                wait_ms: scale_ms(note.duration.base_wait_ms(), multiplier),
            }),
            NotationToken::Rest(length) => Some(TimedEvent {
                token_index,
                pitch: None,
                play_ms: 0,
                wait_ms: scale_ms(length.base_wait_ms(), multiplier),
            }),
            NotationToken::BarBreak => None,
        }
    }
}

pub fn timeline(tokens: &[NotationToken], multiplier: f32) -> Vec<TimedEvent> {
    tokens
        .iter()
        .enumerate()
        .filter_map(|(idx, token)| token.timed_event(idx, multiplier))
        .collect()
}

pub fn total_duration_ms(events: &[TimedEvent]) -> Millis {
    events
        .iter()
        .fold(0, |total: Millis, event| total.saturating_add(event.wait_ms))
}
