use klavir_domain_eval::MismatchPolicy;
use klavir_domain_notation::SkippedElement;
use klavir_ports::storage::SettingsDto;
use klavir_ports::synth::Effect;
use klavir_ports::types::{
    AudioConfig, AudioOutputDevice, DeviceId, MidiInputDevice, SourceId, Volume01,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeMode {
    /// Misses are counted, progress is kept.
    Practice,
    /// Any miss restarts the series; only a perfect run earns the reward.
    Challenge,
}

impl PracticeMode {
    pub fn policy(self) -> MismatchPolicy {
        match self {
            PracticeMode::Practice => MismatchPolicy::Lenient,
            PracticeMode::Challenge => MismatchPolicy::Strict,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    LoadNotation {
        source_id: SourceId,
        notation: String,
        tempo: Option<String>,
    },
    TogglePlayback { source_id: SourceId },
    StopPlayback { source_id: SourceId },
    PlayChord { notes: Vec<String> },
    StartPractice { source_id: SourceId, mode: PracticeMode },
    StopPractice,
    PressNote { note: String },
    PlayEffect { effect: Effect },
    SetMasterVolume { volume: Volume01 },
    ListAudioOutputs,
    SelectAudioOutput {
        device_id: Option<DeviceId>,
        config: Option<AudioConfig>,
    },
    ListMidiInputs,
    SelectMidiInput { device_id: DeviceId },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    NotationLoaded {
        source_id: SourceId,
        note_count: usize,
        skipped: Vec<SkippedElement>,
    },
    PlaybackUpdated {
        source_id: SourceId,
        current_index: Option<usize>,
        playing: bool,
    },
    PracticeFeedback {
        input: String,
        expected: String,
        correct: bool,
        error_count: u32,
        progress: usize,
        total: usize,
    },
    PracticeCompleted {
        perfect: bool,
        error_count: u32,
        reward_eligible: bool,
    },
    PracticeReset,
    /// A passed challenge starts over after the configured delay.
    PracticeAdvanced { source_id: SourceId },
    AudioOutputsUpdated { devices: Vec<AudioOutputDevice> },
    MidiInputsUpdated { devices: Vec<MidiInputDevice> },
    SettingsUpdated { settings: SettingsDto },
}
