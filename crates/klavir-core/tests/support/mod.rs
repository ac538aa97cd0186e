#![allow(dead_code)]

use klavir_ports::audio::{AudioError, AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use klavir_ports::midi::{
    MidiError, MidiInputPort, MidiInputStream, MidiLikeEvent, PlayerEvent, PlayerEventCallback,
};
use klavir_ports::storage::{SettingsDto, StorageError, StoragePort};
use klavir_ports::synth::{Effect, SynthError, SynthPort};
use klavir_ports::types::{
    AudioConfig, AudioOutputDevice, DeviceId, MidiInputDevice, PitchName, Volume01,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq)]
pub enum SynthCall {
    Pitch(String, u64),
    Effect(Effect),
}

/// Synth that records what it was asked to play.
pub struct RecordingSynth {
    ready: AtomicBool,
    sample_rate: AtomicU32,
    volume: Mutex<Volume01>,
    calls: Mutex<Vec<SynthCall>>,
}

impl RecordingSynth {
    pub fn ready() -> Arc<Self> {
        Arc::new(Self::with_ready(true))
    }

    pub fn not_ready() -> Arc<Self> {
        Arc::new(Self::with_ready(false))
    }

    fn with_ready(ready: bool) -> Self {
        Self {
            ready: AtomicBool::new(ready),
            sample_rate: AtomicU32::new(0),
            volume: Mutex::new(Volume01::new(1.0)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<SynthCall> {
        self.calls.lock().clone()
    }

    pub fn pitches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SynthCall::Pitch(name, _) => Some(name),
                SynthCall::Effect(_) => None,
            })
            .collect()
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SynthCall::Effect(effect) => Some(effect),
                SynthCall::Pitch(..) => None,
            })
            .collect()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::SeqCst)
    }
}

impl SynthPort for RecordingSynth {
    fn init(&self, sample_rate_hz: u32) {
        self.sample_rate.store(sample_rate_hz, Ordering::SeqCst);
        self.ready.store(true, Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn set_volume(&self, volume: Volume01) {
        *self.volume.lock() = volume;
    }

    fn volume(&self) -> Volume01 {
        *self.volume.lock()
    }

    fn play_pitch(&self, pitch: &PitchName, duration: Duration) -> Result<(), SynthError> {
        if !self.is_ready() {
            return Err(SynthError::NotReady);
        }
        self.calls.lock().push(SynthCall::Pitch(
            pitch.as_str().to_string(),
            duration.as_millis() as u64,
        ));
        Ok(())
    }

    fn play_effect(&self, effect: Effect) -> Result<(), SynthError> {
        if !self.is_ready() {
            return Err(SynthError::NotReady);
        }
        self.calls.lock().push(SynthCall::Effect(effect));
        Ok(())
    }

    fn render(&self, _frames: usize, out_l: &mut [f32], out_r: &mut [f32]) {
        out_l.fill(0.5);
        out_r.fill(-0.5);
    }
}

pub type SharedCallback = Arc<Mutex<Option<Box<dyn AudioRenderCallback>>>>;

/// Output port that keeps the render callback so tests can pull audio through it.
#[derive(Default)]
pub struct FakeAudioPort {
    pub callback: SharedCallback,
    pub opened: Arc<Mutex<Vec<(Option<DeviceId>, u32)>>>,
}

struct NoopStream;

impl AudioStreamHandle for NoopStream {
    fn close(self: Box<Self>) {}
}

impl AudioOutputPort for FakeAudioPort {
    fn list_outputs(&self) -> Result<Vec<AudioOutputDevice>, AudioError> {
        Ok(vec![AudioOutputDevice {
            id: DeviceId("fake:out".to_string()),
            name: "Fake Output".to_string(),
            default_config: AudioConfig::default(),
        }])
    }

    fn open_output(
        &self,
        device_id: Option<&DeviceId>,
        config: AudioConfig,
        cb: Box<dyn AudioRenderCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        self.opened
            .lock()
            .push((device_id.cloned(), config.sample_rate_hz));
        *self.callback.lock() = Some(cb);
        Ok(Box::new(NoopStream))
    }
}

/// MIDI port whose callback the test can fire by hand.
#[derive(Default)]
pub struct FakeMidiPort {
    pub callback: Arc<Mutex<Option<PlayerEventCallback>>>,
}

impl FakeMidiPort {
    pub fn keyboard(callback: &Arc<Mutex<Option<PlayerEventCallback>>>, event: MidiLikeEvent) {
        if let Some(cb) = callback.lock().as_ref() {
            cb(PlayerEvent {
                at: Instant::now(),
                event,
            });
        }
    }
}

impl MidiInputPort for FakeMidiPort {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError> {
        Ok(vec![MidiInputDevice {
            id: DeviceId("fake:in".to_string()),
            name: "Fake Keyboard".to_string(),
            is_available: true,
        }])
    }

    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: PlayerEventCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError> {
        if device_id.0 != "fake:in" {
            return Err(MidiError::DeviceNotFound(device_id.to_string()));
        }
        *self.callback.lock() = Some(cb);
        Ok(Box::new(NoopStream))
    }
}

impl MidiInputStream for NoopStream {
    fn close(self: Box<Self>) {}
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    pub saved: Arc<Mutex<Option<SettingsDto>>>,
}

impl StoragePort for MemoryStorage {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        Ok(self.saved.lock().clone().unwrap_or_default())
    }

    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        *self.saved.lock() = Some(s.clone());
        Ok(())
    }
}
