use crate::types::*;
use serde::{Deserialize, Serialize};

fn default_master_volume() -> Volume01 {
    Volume01::new(0.8)
}

fn default_chord_stagger_ms() -> Millis {
    30
}

fn default_chord_sound_ms() -> Millis {
    1500
}

fn default_advance_delay_ms() -> Millis {
    1500
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    pub selected_midi_in: Option<DeviceId>,
    pub selected_audio_out: Option<DeviceId>,
    pub audio_buffer_size_frames: Option<u32>,
    #[serde(default = "default_master_volume")]
    pub master_volume: Volume01,
    /// Tempo marking used when a notation source does not name one.
    pub default_tempo: Option<String>,
    #[serde(default = "default_chord_stagger_ms")]
    pub chord_stagger_ms: Millis,
    #[serde(default = "default_chord_sound_ms")]
    pub chord_sound_ms: Millis,
    /// Delay after a perfect challenge before its next round starts.
    #[serde(default = "default_advance_delay_ms")]
    pub challenge_advance_delay_ms: Millis,
}

impl Default for SettingsDto {
    fn default() -> Self {
        Self {
            selected_midi_in: None,
            selected_audio_out: None,
            audio_buffer_size_frames: None,
            master_volume: default_master_volume(),
            default_tempo: None,
            chord_stagger_ms: default_chord_stagger_ms(),
            chord_sound_ms: default_chord_sound_ms(),
            challenge_advance_delay_ms: default_advance_delay_ms(),
        }
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;
}
