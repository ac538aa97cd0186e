use klavir_ports::midi::{
    MidiError, MidiInputPort, MidiInputStream, MidiLikeEvent, PlayerEvent, PlayerEventCallback,
};
use klavir_ports::types::{DeviceId, MidiInputDevice};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort as MidirPort};
use std::time::Instant;
use tracing::{debug, info};

const CONNECTION_NAME: &str = "klavir-keyboard";
const UNKNOWN_INPUT: &str = "Unknown Input";

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;

pub struct MidirMidiInputPort {
    client_name: String,
}

impl MidirMidiInputPort {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn client(&self) -> Result<MidiInput, MidiError> {
        MidiInput::new(&self.client_name).map_err(|e| MidiError::Backend(e.to_string()))
    }

    fn named_ports(midi_in: &MidiInput) -> Vec<(DeviceId, String, MidirPort)> {
        midi_in
            .ports()
            .into_iter()
            .enumerate()
            .map(|(index, port)| {
                let name = midi_in
                    .port_name(&port)
                    .unwrap_or_else(|_| UNKNOWN_INPUT.to_string());
                (device_id(index, &name), name, port)
            })
            .collect()
    }
}

impl Default for MidirMidiInputPort {
    fn default() -> Self {
        Self::new("Klavir")
    }
}

pub fn device_id(index: usize, name: &str) -> DeviceId {
    DeviceId(format!("midir:{}:{}", index, name))
}

/// Decodes the note messages a keyboard sends. Note-on with velocity zero is
/// a note-off; everything else (controllers, clock, sysex) is dropped.
pub fn parse_message(message: &[u8]) -> Option<MidiLikeEvent> {
    let &[status, note, velocity, ..] = message else {
        return None;
    };
    if note > 0x7F {
        return None;
    }
    match status & 0xF0 {
        NOTE_OFF => Some(MidiLikeEvent::NoteOff { note }),
        NOTE_ON if velocity == 0 => Some(MidiLikeEvent::NoteOff { note }),
        NOTE_ON => Some(MidiLikeEvent::NoteOn { note, velocity }),
        _ => None,
    }
}

pub struct MidirMidiInputStream {
    connection: Option<MidiInputConnection<PlayerEventCallback>>,
}

impl MidiInputStream for MidirMidiInputStream {
    fn close(mut self: Box<Self>) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
            debug!("midi input closed");
        }
    }
}

impl MidiInputPort for MidirMidiInputPort {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError> {
        let midi_in = self.client()?;
        Ok(Self::named_ports(&midi_in)
            .into_iter()
            .map(|(id, name, _)| MidiInputDevice {
                id,
                name,
                is_available: true,
            })
            .collect())
    }

    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: PlayerEventCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError> {
        let mut midi_in = self.client()?;
        midi_in.ignore(Ignore::All);

        let (name, port) = Self::named_ports(&midi_in)
            .into_iter()
            .find(|(id, _, _)| id == device_id)
            .map(|(_, name, port)| (name, port))
            .ok_or_else(|| MidiError::DeviceNotFound(device_id.to_string()))?;

        let connection = midi_in
            .connect(
                &port,
                CONNECTION_NAME,
                |_stamp, message, callback| {
                    if let Some(event) = parse_message(message) {
                        callback(PlayerEvent {
                            at: Instant::now(),
                            event,
                        });
                    }
                },
                cb,
            )
            .map_err(|e| MidiError::DeviceUnavailable(e.to_string()))?;

        info!(device = %name, "midi input opened");
        Ok(Box::new(MidirMidiInputStream {
            connection: Some(connection),
        }))
    }
}
