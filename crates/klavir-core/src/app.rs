use crate::audio_graph::{AudioClock, AudioGraph};
use crate::ipc::{Command, Event, PracticeMode};
use crate::playback_engine::{ChordTiming, PlaybackEngine};
use klavir_domain_eval::{normalize, NoteKey, PracticeSession};
use klavir_domain_notation::{
    note_tokens, parse_note, parse_report, press_name_for_midi, resolve_tempo_multiplier,
    NotationToken, NoteToken,
};
use klavir_ports::audio::{AudioError, AudioOutputPort, AudioStreamHandle};
use klavir_ports::midi::{
    MidiError, MidiInputPort, MidiInputStream, MidiLikeEvent, PlayerEvent, PlayerEventCallback,
};
use klavir_ports::storage::{SettingsDto, StorageError, StoragePort};
use klavir_ports::synth::{Effect, SynthError, SynthPort};
use klavir_ports::types::{AudioConfig, DeviceId, Millis, PitchName, SampleTime, SourceId};
use parking_lot::Mutex;
use rtrb::{Consumer, RingBuffer};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const MIDI_QUEUE_CAPACITY: usize = 256;
/// Sounding time for notes entered on the on-screen keyboard.
const PRESS_SOUND_MS: u64 = 450;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("midi error: {0}")]
    Midi(#[from] MidiError),
    #[error("synth error: {0}")]
    Synth(#[from] SynthError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("unknown notation source: {0}")]
    UnknownSource(SourceId),
}

struct LoadedSource {
    tokens: Vec<NotationToken>,
    engine: PlaybackEngine,
}

struct ActivePractice {
    source_id: SourceId,
    mode: PracticeMode,
    session: PracticeSession,
    /// Notes of the source as written, in the session's expected order.
    notes: Vec<NoteToken>,
    /// When a perfect challenge starts its next round.
    advance_at: Option<Millis>,
}

impl ActivePractice {
    fn new(source_id: SourceId, mode: PracticeMode, tokens: &[NotationToken]) -> Self {
        Self {
            source_id,
            mode,
            session: PracticeSession::from_tokens(tokens, mode.policy()),
            notes: note_tokens(tokens).copied().collect(),
            advance_at: None,
        }
    }

    fn current_note(&self) -> Option<&NoteToken> {
        if self.notes.is_empty() {
            return None;
        }
        self.notes.get(self.session.progress() % self.notes.len())
    }
}

/// Where a press came from. Keys of a MIDI keyboard make their own sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PressSource {
    Screen,
    Midi,
}

/// Command/event surface driven by one host timer loop.
pub struct AppCore {
    audio_port: Box<dyn AudioOutputPort>,
    midi_port: Box<dyn MidiInputPort>,
    synth: Arc<dyn SynthPort>,
    storage: Option<Box<dyn StoragePort>>,
    settings: SettingsDto,
    sources: HashMap<SourceId, LoadedSource>,
    chord_engine: PlaybackEngine,
    practice: Option<ActivePractice>,
    audio_clock: Arc<AudioClock>,
    audio_stream: Option<Box<dyn AudioStreamHandle>>,
    midi_stream: Option<Box<dyn MidiInputStream>>,
    midi_queue_rx: Option<Consumer<PlayerEvent>>,
    events: VecDeque<Event>,
    started: Instant,
}

impl AppCore {
    pub fn new(
        audio_port: Box<dyn AudioOutputPort>,
        midi_port: Box<dyn MidiInputPort>,
        synth: Arc<dyn SynthPort>,
        storage: Option<Box<dyn StoragePort>>,
    ) -> Self {
        let settings = match storage.as_ref().map(|s| s.load_settings()) {
            Some(Ok(settings)) => settings,
            Some(Err(err)) => {
                warn!(%err, "could not load settings, using defaults");
                SettingsDto::default()
            }
            None => SettingsDto::default(),
        };
        synth.set_volume(settings.master_volume);

        let chord_engine =
            PlaybackEngine::new(synth.clone()).with_chord_timing(chord_timing(&settings));

        Self {
            audio_port,
            midi_port,
            synth,
            storage,
            settings,
            sources: HashMap::new(),
            chord_engine,
            practice: None,
            audio_clock: Arc::new(AudioClock::new()),
            audio_stream: None,
            midi_stream: None,
            midi_queue_rx: None,
            events: VecDeque::new(),
            started: Instant::now(),
        }
    }

    /// Milliseconds since the core was created; the clock every engine runs on.
    pub fn now_ms(&self) -> Millis {
        self.started.elapsed().as_millis() as Millis
    }

    pub fn settings(&self) -> &SettingsDto {
        &self.settings
    }

    pub fn practice_session(&self) -> Option<&PracticeSession> {
        self.practice.as_ref().map(|p| &p.session)
    }

    pub fn is_playing(&self, source_id: &SourceId) -> bool {
        self.sources
            .get(source_id)
            .is_some_and(|s| s.engine.is_playing())
    }

    pub fn current_index(&self, source_id: &SourceId) -> Option<usize> {
        self.sources
            .get(source_id)
            .and_then(|s| s.engine.current_index())
    }

    /// Samples rendered by the open output so far.
    pub fn rendered_samples(&self) -> SampleTime {
        self.audio_clock.get()
    }

    pub fn handle_command(&mut self, cmd: Command) -> Result<(), AppError> {
        let now = self.now_ms();
        self.handle_command_at(cmd, now)
    }

    pub fn handle_command_at(&mut self, cmd: Command, now: Millis) -> Result<(), AppError> {
        match cmd {
            Command::LoadNotation {
                source_id,
                notation,
                tempo,
            } => self.load_notation(source_id, &notation, tempo),
            Command::TogglePlayback { source_id } => {
                let engine = &self.source(&source_id)?.engine;
                engine.toggle(now);
                self.emit_playback(&source_id);
            }
            Command::StopPlayback { source_id } => {
                self.source(&source_id)?.engine.stop();
                self.emit_playback(&source_id);
            }
            Command::PlayChord { notes } => {
                let pitches: Vec<PitchName> = notes
                    .iter()
                    .filter_map(|note| {
                        let pitch = parse_note(note).map(|n| n.pitch_name());
                        if pitch.is_none() {
                            debug!(note = %note, "chord element is not a note");
                        }
                        pitch
                    })
                    .collect();
                self.chord_engine.play_chord(&pitches, now);
            }
            Command::StartPractice { source_id, mode } => {
                let tokens = &self.source(&source_id)?.tokens;
                let practice = ActivePractice::new(source_id, mode, tokens);
                info!(
                    source = %practice.source_id,
                    ?mode,
                    notes = practice.session.expected().len(),
                    "practice started"
                );
                self.practice = Some(practice);
                self.events.push_back(Event::PracticeReset);
            }
            Command::StopPractice => {
                if let Some(practice) = self.practice.take() {
                    info!(source = %practice.source_id, mode = ?practice.mode, "practice stopped");
                    self.events.push_back(Event::PracticeReset);
                }
            }
            Command::PressNote { note } => self.press(&note, PressSource::Screen, now),
            Command::PlayEffect { effect } => self.synth.play_effect(effect)?,
            Command::SetMasterVolume { volume } => {
                self.synth.set_volume(volume);
                self.settings.master_volume = volume;
                self.settings_changed();
            }
            Command::ListAudioOutputs => {
                let devices = self.audio_port.list_outputs()?;
                self.events.push_back(Event::AudioOutputsUpdated { devices });
            }
            Command::SelectAudioOutput { device_id, config } => {
                self.open_audio_output(device_id, config)?;
            }
            Command::ListMidiInputs => {
                let devices = self.midi_port.list_inputs()?;
                self.events.push_back(Event::MidiInputsUpdated { devices });
            }
            Command::SelectMidiInput { device_id } => {
                self.open_midi_input(device_id)?;
            }
        }
        Ok(())
    }

    pub fn tick(&mut self) {
        let now = self.now_ms();
        self.tick_at(now);
    }

    /// Drains MIDI input and advances every engine to `now`.
    pub fn tick_at(&mut self, now: Millis) {
        self.process_midi_inputs(now);
        self.advance_challenge(now);

        for (source_id, source) in &self.sources {
            let before = (source.engine.current_index(), source.engine.is_playing());
            source.engine.tick(now);
            let after = (source.engine.current_index(), source.engine.is_playing());
            if before != after {
                self.events.push_back(Event::PlaybackUpdated {
                    source_id: source_id.clone(),
                    current_index: after.0,
                    playing: after.1,
                });
            }
        }
        self.chord_engine.tick(now);
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    fn source(&self, source_id: &SourceId) -> Result<&LoadedSource, AppError> {
        self.sources
            .get(source_id)
            .ok_or_else(|| AppError::UnknownSource(source_id.clone()))
    }

    fn load_notation(&mut self, source_id: SourceId, notation: &str, tempo: Option<String>) {
        let report = parse_report(notation);
        let note_count = report.notes().count();
        let tempo = tempo.or_else(|| self.settings.default_tempo.clone());
        let multiplier = resolve_tempo_multiplier(tempo.as_deref());

        let synth = self.synth.clone();
        let timing = chord_timing(&self.settings);
        let source = self
            .sources
            .entry(source_id.clone())
            .or_insert_with(|| LoadedSource {
                tokens: Vec::new(),
                engine: PlaybackEngine::new(synth).with_chord_timing(timing),
            });
        let was_playing = source.engine.is_playing();
        source.engine.load(&report.tokens, multiplier);
        source.tokens = report.tokens;

        info!(
            source = %source_id,
            notes = note_count,
            skipped = report.skipped.len(),
            tempo = tempo.as_deref().unwrap_or("default"),
            "notation loaded"
        );

        if let Some(practice) = self.practice.as_mut() {
            if practice.source_id == source_id {
                *practice = ActivePractice::new(source_id.clone(), practice.mode, &source.tokens);
                self.events.push_back(Event::PracticeReset);
            }
        }
        if was_playing {
            self.emit_playback(&source_id);
        }
        self.events.push_back(Event::NotationLoaded {
            source_id,
            note_count,
            skipped: report.skipped,
        });
    }

    fn press(&mut self, input: &str, origin: PressSource, now: Millis) {
        if origin == PressSource::Screen {
            self.sound_press(input);
        }

        let advance_delay = self.settings.challenge_advance_delay_ms;
        let Some(practice) = self.practice.as_mut() else {
            debug!(input, "press outside practice");
            return;
        };
        let session = &mut practice.session;
        let Some(expected) = session.current_expected() else {
            return;
        };

        let errors_before = session.error_count();
        let outcome = session.submit_press(input);
        // A strict miss clears the count; report the miss that caused it.
        let error_count = if outcome.reset {
            errors_before.saturating_add(1)
        } else {
            session.error_count()
        };
        self.events.push_back(Event::PracticeFeedback {
            input: input.to_string(),
            expected: expected.to_string(),
            correct: outcome.correct,
            error_count,
            progress: session.progress(),
            total: session.expected().len(),
        });

        let mut effect = None;
        if outcome.reset {
            practice.advance_at = None;
            self.events.push_back(Event::PracticeReset);
            effect = Some(Effect::Error);
        }
        if outcome.just_completed {
            let reward_eligible = session.is_reward_eligible();
            self.events.push_back(Event::PracticeCompleted {
                perfect: outcome.session_perfect,
                error_count: session.error_count(),
                reward_eligible,
            });
            if reward_eligible {
                practice.advance_at = Some(now.saturating_add(advance_delay));
            }
            effect = Some(if reward_eligible {
                Effect::Fanfare
            } else {
                Effect::Success
            });
        }

        if let Some(effect) = effect {
            if let Err(err) = self.synth.play_effect(effect) {
                warn!(?effect, %err, "feedback effect not played");
            }
        }
    }

    fn sound_press(&self, input: &str) {
        let pitch = parse_note(input)
            .map(|note| note.pitch_name())
            .or_else(|| normalize(input).map(key_pitch));
        let Some(pitch) = pitch else {
            return;
        };
        if let Err(err) = self
            .synth
            .play_pitch(&pitch, Duration::from_millis(PRESS_SOUND_MS))
        {
            warn!(%pitch, %err, "press not sounded");
        }
    }

    /// Starts the next round of a passed challenge once its delay is over.
    fn advance_challenge(&mut self, now: Millis) {
        let Some(practice) = self.practice.as_mut() else {
            return;
        };
        if !practice.advance_at.is_some_and(|at| at <= now) {
            return;
        }
        practice.advance_at = None;
        practice.session.reset();
        info!(source = %practice.source_id, "next challenge round");
        self.events.push_back(Event::PracticeAdvanced {
            source_id: practice.source_id.clone(),
        });
    }

    /// A key that sounds the expected note is submitted with the notation's
    /// own spelling, so `Ees` is matched by the key a keyboard calls `Dis`.
    fn midi_press_name(&self, key: u8) -> String {
        self.practice
            .as_ref()
            .and_then(ActivePractice::current_note)
            .filter(|note| note.is_played_by_key(key))
            .map(|note| note.to_string())
            .unwrap_or_else(|| press_name_for_midi(key))
    }

    fn process_midi_inputs(&mut self, now: Millis) {
        let Some(mut consumer) = self.midi_queue_rx.take() else {
            return;
        };

        let mut pending = Vec::new();
        while let Ok(event) = consumer.pop() {
            pending.push(event);
        }
        self.midi_queue_rx = Some(consumer);

        for event in pending {
            if let MidiLikeEvent::NoteOn { note, .. } = event.event {
                let name = self.midi_press_name(note);
                debug!(note, name = %name, "midi press");
                self.press(&name, PressSource::Midi, now);
            }
        }
    }

    fn open_audio_output(
        &mut self,
        device_id: Option<DeviceId>,
        config: Option<AudioConfig>,
    ) -> Result<(), AppError> {
        if let Some(stream) = self.audio_stream.take() {
            stream.close();
        }

        let config = config.unwrap_or(AudioConfig {
            buffer_size_frames: self.settings.audio_buffer_size_frames,
            ..AudioConfig::default()
        });

        self.synth.init(config.sample_rate_hz);
        let graph = AudioGraph::new(self.synth.clone(), self.audio_clock.clone());
        let stream = self
            .audio_port
            .open_output(device_id.as_ref(), config, Box::new(graph))?;

        self.audio_stream = Some(stream);
        self.settings.selected_audio_out = device_id;
        self.settings.audio_buffer_size_frames = config.buffer_size_frames;
        self.settings_changed();
        Ok(())
    }

    fn open_midi_input(&mut self, device_id: DeviceId) -> Result<(), AppError> {
        if let Some(stream) = self.midi_stream.take() {
            stream.close();
        }

        let (producer, consumer) = RingBuffer::new(MIDI_QUEUE_CAPACITY);
        let producer = Arc::new(Mutex::new(producer));
        let cb: PlayerEventCallback = Arc::new(move |event: PlayerEvent| {
            if let Some(mut guard) = producer.try_lock() {
                let _ = guard.push(event);
            }
        });

        let stream = self.midi_port.open_input(&device_id, cb)?;
        self.midi_stream = Some(stream);
        self.midi_queue_rx = Some(consumer);
        self.settings.selected_midi_in = Some(device_id);
        self.settings_changed();
        Ok(())
    }

    fn emit_playback(&mut self, source_id: &SourceId) {
        let Some(source) = self.sources.get(source_id) else {
            return;
        };
        self.events.push_back(Event::PlaybackUpdated {
            source_id: source_id.clone(),
            current_index: source.engine.current_index(),
            playing: source.engine.is_playing(),
        });
    }

    fn settings_changed(&mut self) {
        self.events.push_back(Event::SettingsUpdated {
            settings: self.settings.clone(),
        });
        if let Some(storage) = self.storage.as_ref() {
            if let Err(err) = storage.save_settings(&self.settings) {
                warn!(%err, "settings not saved");
            }
        }
    }
}

impl Drop for AppCore {
    fn drop(&mut self) {
        if let Some(stream) = self.midi_stream.take() {
            stream.close();
        }
        if let Some(stream) = self.audio_stream.take() {
            stream.close();
        }
    }
}

fn chord_timing(settings: &SettingsDto) -> ChordTiming {
    ChordTiming {
        stagger_ms: settings.chord_stagger_ms,
        sound_ms: settings.chord_sound_ms,
    }
}

/// Middle octave unless the key is marked higher.
fn key_pitch(key: NoteKey) -> PitchName {
    let octave = if key.higher { 5 } else { 4 };
    let sharp = if key.raised { "#" } else { "" };
    PitchName(format!("{}{}{}", key.letter.as_char(), sharp, octave))
}
