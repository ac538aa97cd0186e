use crate::model::*;
use klavir_ports::types::PitchName;

pub const BASE_OCTAVE: i32 = 4;

/// MIDI note number of `C` in [`BASE_OCTAVE`].
const BASE_OCTAVE_MIDI_C: i32 = 60;

impl OctaveMarker {
    pub fn octave(self) -> i32 {
        match self {
            OctaveMarker::None => BASE_OCTAVE,
            OctaveMarker::Higher => BASE_OCTAVE + 1,
            OctaveMarker::Lower => BASE_OCTAVE - 1,
        }
    }
}

impl Accidental {
    pub fn semitone_offset(self) -> i32 {
        match self {
            Accidental::None => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
        }
    }
}

impl NoteToken {
    /// Resolves letter, accidental and octave into the synth identifier, e.g. `F#4`.
    pub fn pitch_name(&self) -> PitchName {
        let accidental = match self.accidental {
            Accidental::None => "",
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
        };
        PitchName(format!(
            "{}{}{}",
            self.letter.as_char(),
            accidental,
            self.octave.octave()
        ))
    }

    pub fn midi_note(&self) -> i32 {
        BASE_OCTAVE_MIDI_C
            + (self.octave.octave() - BASE_OCTAVE) * 12
            + self.letter.semitone()
            + self.accidental.semitone_offset()
    }
}

/// Octave of `note` relative to middle C, limited to the three octaves
/// notation can mark.
fn keyboard_octave_offset(relative: i32) -> i32 {
    relative.div_euclid(12).clamp(-1, 1)
}

/// Folds a MIDI note into the three marked octaves and then treats the lower
/// one like the middle one, the way note comparison ignores the `.` marker.
fn comparable_key(note: i32) -> i32 {
    let relative = note - BASE_OCTAVE_MIDI_C;
    let octave_offset = keyboard_octave_offset(relative).max(0);
    BASE_OCTAVE_MIDI_C + octave_offset * 12 + relative.rem_euclid(12)
}

impl NoteToken {
    /// True when the physical key `note` sounds this token's pitch, whatever
    /// spelling the notation uses (`Ees` and `Dis` are the same key).
    pub fn is_played_by_key(&self, note: u8) -> bool {
        comparable_key(self.midi_note()) == comparable_key(note as i32)
    }
}

/// Names a key pressed on a MIDI keyboard the way notation spells it:
/// `C`..`H` around middle C, `Cis` for black keys, `B` for B flat,
/// `'` one octave up and `.` one octave down. Keys outside those three
/// octaves fold into the nearest one.
pub fn press_name_for_midi(note: u8) -> String {
    let relative = note as i32 - BASE_OCTAVE_MIDI_C;
    let octave_offset = keyboard_octave_offset(relative);
    let name = match relative.rem_euclid(12) {
        0 => "C",
        1 => "Cis",
        2 => "D",
        3 => "Dis",
        4 => "E",
        5 => "F",
        6 => "Fis",
        7 => "G",
        8 => "Gis",
        9 => "A",
        10 => "B",
        _ => "H",
    };
    match octave_offset {
        1 => format!("{}'", name),
        -1 => format!("{}.", name),
        _ => name.to_string(),
    }
}
