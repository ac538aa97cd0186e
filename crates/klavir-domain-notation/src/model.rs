use serde::{Deserialize, Serialize};
use std::fmt;

/// Diatonic letters in the Czech convention: `H` is B natural, `B` is B flat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteLetter {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accidental {
    #[default]
    None,
    Sharp,
    Flat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OctaveMarker {
    #[default]
    None,
    Higher,
    Lower,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationClass {
    Sixteenth,
    Eighth,
    Quarter,
    QuarterDotted,
    Half,
    HalfDotted,
    Whole,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestLength {
    Short,
    Medium,
    Long,
    ExtraLong,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteToken {
    pub letter: NoteLetter,
    pub accidental: Accidental,
    pub octave: OctaveMarker,
    pub duration: DurationClass,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotationToken {
    Note(NoteToken),
    Rest(RestLength),
    BarBreak,
}

impl NoteLetter {
    pub const ALL: [NoteLetter; 8] = [
        NoteLetter::A,
        NoteLetter::B,
        NoteLetter::C,
        NoteLetter::D,
        NoteLetter::E,
        NoteLetter::F,
        NoteLetter::G,
        NoteLetter::H,
    ];

    /// Case-insensitive.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(NoteLetter::A),
            'B' => Some(NoteLetter::B),
            'C' => Some(NoteLetter::C),
            'D' => Some(NoteLetter::D),
            'E' => Some(NoteLetter::E),
            'F' => Some(NoteLetter::F),
            'G' => Some(NoteLetter::G),
            'H' => Some(NoteLetter::H),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            NoteLetter::A => 'A',
            NoteLetter::B => 'B',
            NoteLetter::C => 'C',
            NoteLetter::D => 'D',
            NoteLetter::E => 'E',
            NoteLetter::F => 'F',
            NoteLetter::G => 'G',
            NoteLetter::H => 'H',
        }
    }

    /// Semitones above C within one octave.
    pub fn semitone(self) -> i32 {
        match self {
            NoteLetter::C => 0,
            NoteLetter::D => 2,
            NoteLetter::E => 4,
            NoteLetter::F => 5,
            NoteLetter::G => 7,
            NoteLetter::A => 9,
            NoteLetter::B => 10,
            NoteLetter::H => 11,
        }
    }
}

impl DurationClass {
    pub const ALL: [DurationClass; 7] = [
        DurationClass::Sixteenth,
        DurationClass::Eighth,
        DurationClass::Quarter,
        DurationClass::QuarterDotted,
        DurationClass::Half,
        DurationClass::HalfDotted,
        DurationClass::Whole,
    ];

    /// Text form of a bare note of this class, the inverse of core matching.
    pub fn encode(self, letter: NoteLetter) -> String {
        let upper = letter.as_char();
        let lower = upper.to_ascii_lowercase();
        match self {
            DurationClass::Sixteenth => [lower, lower].iter().collect(),
            DurationClass::Eighth => lower.to_string(),
            DurationClass::Quarter => upper.to_string(),
            DurationClass::QuarterDotted => [upper, lower].iter().collect(),
            DurationClass::Half => [upper; 2].iter().collect(),
            DurationClass::HalfDotted => [upper; 3].iter().collect(),
            DurationClass::Whole => [upper; 4].iter().collect(),
        }
    }
}

impl RestLength {
    /// 1, 2, 3 and 4-or-more dashes.
    pub fn from_dashes(count: usize) -> Option<Self> {
        match count {
            0 => None,
            1 => Some(RestLength::Short),
            2 => Some(RestLength::Medium),
            3 => Some(RestLength::Long),
            _ => Some(RestLength::ExtraLong),
        }
    }

    pub fn dashes(self) -> usize {
        match self {
            RestLength::Short => 1,
            RestLength::Medium => 2,
            RestLength::Long => 3,
            RestLength::ExtraLong => 4,
        }
    }
}

impl NotationToken {
    pub fn as_note(&self) -> Option<&NoteToken> {
        match self {
            NotationToken::Note(note) => Some(note),
            _ => None,
        }
    }

    pub fn is_note(&self) -> bool {
        matches!(self, NotationToken::Note(_))
    }
}

impl fmt::Display for NoteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.duration.encode(self.letter))?;
        match self.accidental {
            Accidental::None => {}
            Accidental::Sharp => f.write_str("is")?,
            Accidental::Flat => f.write_str("es")?,
        }
        match self.octave {
            OctaveMarker::None => Ok(()),
            OctaveMarker::Higher => f.write_str("'"),
            OctaveMarker::Lower => f.write_str("."),
        }
    }
}

impl fmt::Display for NotationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotationToken::Note(note) => write!(f, "{}", note),
            NotationToken::Rest(length) => f.write_str(&"-".repeat(length.dashes())),
            NotationToken::BarBreak => f.write_str("|"),
        }
    }
}
