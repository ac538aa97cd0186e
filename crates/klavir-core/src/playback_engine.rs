use klavir_domain_notation::{timeline, NotationToken, TimedEvent};
use klavir_ports::synth::SynthPort;
use klavir_ports::types::{Millis, PitchName};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const CHORD_STAGGER_MS: Millis = 30;
pub const CHORD_SOUND_MS: Millis = 1500;

/// Onset spacing and sounding time used for whole-chord playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordTiming {
    pub stagger_ms: Millis,
    pub sound_ms: Millis,
}

impl Default for ChordTiming {
    fn default() -> Self {
        Self {
            stagger_ms: CHORD_STAGGER_MS,
            sound_ms: CHORD_SOUND_MS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Started,
    Stopped,
}

struct PlaybackState {
    events: Vec<TimedEvent>,
    tempo_multiplier: f32,
    playing: bool,
    /// Next event to realize.
    cursor: usize,
    next_due: Millis,
    current_index: Option<usize>,
    chord: VecDeque<(Millis, PitchName)>,
    chord_timing: ChordTiming,
}

/// Plays one notation source through the synth.
///
/// The engine owns no thread. The owner calls [`PlaybackEngine::tick`] from its
/// timer loop and every step whose due time has passed is realized in token
/// order. Steps are scheduled on a fixed grid from the start time, so a late
/// tick catches up instead of stretching the melody.
pub struct PlaybackEngine {
    synth: Arc<dyn SynthPort>,
    state: Mutex<PlaybackState>,
}

impl PlaybackEngine {
    pub fn new(synth: Arc<dyn SynthPort>) -> Self {
        Self {
            synth,
            state: Mutex::new(PlaybackState {
                events: Vec::new(),
                tempo_multiplier: 1.0,
                playing: false,
                cursor: 0,
                next_due: 0,
                current_index: None,
                chord: VecDeque::new(),
                chord_timing: ChordTiming::default(),
            }),
        }
    }

    pub fn with_chord_timing(mut self, timing: ChordTiming) -> Self {
        self.state.get_mut().chord_timing = timing;
        self
    }

    /// Replaces the melody. A running playback is stopped.
    pub fn load(&self, tokens: &[NotationToken], tempo_multiplier: f32) {
        let mut state = self.state.lock();
        Self::halt(&mut state);
        state.events = timeline(tokens, tempo_multiplier);
        state.tempo_multiplier = tempo_multiplier;
        debug!(
            steps = state.events.len(),
            tempo_multiplier, "playback loaded"
        );
    }

    pub fn step_count(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn tempo_multiplier(&self) -> f32 {
        self.state.lock().tempo_multiplier
    }

    /// Starts a stopped engine or stops a playing one; never runs two passes at once.
    pub fn toggle(&self, now: Millis) -> PlaybackStatus {
        if self.is_playing() {
            self.stop();
            PlaybackStatus::Stopped
        } else {
            self.play(now);
            if self.is_playing() {
                PlaybackStatus::Started
            } else {
                PlaybackStatus::Stopped
            }
        }
    }

    /// Starts from the first token and sounds whatever is due at `now`.
    pub fn play(&self, now: Millis) {
        {
            let mut state = self.state.lock();
            Self::halt(&mut state);
            if state.events.is_empty() {
                debug!("nothing to play");
                return;
            }
            state.playing = true;
            state.next_due = now;
        }
        self.tick(now);
    }

    pub fn stop(&self) {
        Self::halt(&mut self.state.lock());
    }

    /// Sounds all pitches as one chord. Onsets are spread by the chord stagger;
    /// the first pitch sounds immediately.
    pub fn play_chord(&self, pitches: &[PitchName], now: Millis) {
        {
            let mut state = self.state.lock();
            let stagger = state.chord_timing.stagger_ms;
            state.chord = pitches
                .iter()
                .enumerate()
                .map(|(i, pitch)| {
                    let offset = stagger.saturating_mul(i as Millis);
                    (now.saturating_add(offset), pitch.clone())
                })
                .collect();
        }
        self.tick(now);
    }

    /// Realizes everything due at `now`. Returns the token indices of the
    /// notes that sounded.
    pub fn tick(&self, now: Millis) -> Vec<usize> {
        let mut state = self.state.lock();
        let mut sounded = Vec::new();

        let chord_sound = Duration::from_millis(state.chord_timing.sound_ms);
        while state.chord.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, pitch)) = state.chord.pop_front() {
                self.sound(&pitch, chord_sound);
            }
        }

        while state.playing && state.next_due <= now {
            let Some(event) = state.events.get(state.cursor).cloned() else {
                debug!("playback finished");
                state.playing = false;
                state.current_index = None;
                state.cursor = 0;
                break;
            };
            state.current_index = Some(event.token_index);
            if let Some(pitch) = &event.pitch {
                self.sound(pitch, Duration::from_millis(event.play_ms));
                sounded.push(event.token_index);
            }
            state.next_due = state.next_due.saturating_add(event.wait_ms);
            state.cursor += 1;
        }

        sounded
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.lock().current_index
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn halt(state: &mut PlaybackState) {
        state.playing = false;
        state.cursor = 0;
        state.current_index = None;
        state.chord.clear();
    }

    fn sound(&self, pitch: &PitchName, duration: Duration) {
        if let Err(err) = self.synth.play_pitch(pitch, duration) {
            warn!(%pitch, %err, "synth rejected pitch");
        }
    }
}
