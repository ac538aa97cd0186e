use klavir_infra_midi_midir::{device_id, parse_message};
use klavir_ports::midi::MidiLikeEvent;
use pretty_assertions::assert_eq;

#[test]
fn note_on_on_any_channel() {
    assert_eq!(
        parse_message(&[0x90, 60, 100]),
        Some(MidiLikeEvent::NoteOn {
            note: 60,
            velocity: 100
        })
    );
    assert_eq!(
        parse_message(&[0x9F, 72, 1]),
        Some(MidiLikeEvent::NoteOn {
            note: 72,
            velocity: 1
        })
    );
}

#[test]
fn zero_velocity_note_on_is_note_off() {
    assert_eq!(
        parse_message(&[0x90, 64, 0]),
        Some(MidiLikeEvent::NoteOff { note: 64 })
    );
    assert_eq!(
        parse_message(&[0x83, 64, 40]),
        Some(MidiLikeEvent::NoteOff { note: 64 })
    );
}

#[test]
fn other_messages_are_ignored() {
    assert_eq!(parse_message(&[0xB0, 64, 127]), None);
    assert_eq!(parse_message(&[0xF8]), None);
    assert_eq!(parse_message(&[0x90, 60]), None);
    assert_eq!(parse_message(&[]), None);
    assert_eq!(parse_message(&[0x90, 0x80, 10]), None);
}

#[test]
fn device_ids_embed_index_and_name() {
    assert_eq!(device_id(0, "Digital Piano").0, "midir:0:Digital Piano");
}
