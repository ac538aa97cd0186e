use klavir_domain_notation::{
    note_tokens, parse, parse_element, Accidental, NotationToken, NoteLetter, NoteToken,
    OctaveMarker,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

const KEYBOARD_SHARP: char = '#';

/// Comparison key for a pressed or expected note.
///
/// Sharp and flat both collapse into `raised`, so `Cis` and `Ces` compare
/// equal. The lower octave marker is not part of the key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteKey {
    pub letter: NoteLetter,
    pub raised: bool,
    pub higher: bool,
}

/// What a mismatch does to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MismatchPolicy {
    /// Practice mode: the miss is counted and logged, progress is kept.
    Lenient,
    /// Challenge mode: the miss restarts the series from the first note
    /// with a cleared error count.
    Strict,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedNote {
    pub input: String,
    pub expected: NoteKey,
    pub correct: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressOutcome {
    pub correct: bool,
    pub session_complete: bool,
    pub session_perfect: bool,
    /// Set only on the press that first reaches the expected length.
    pub just_completed: bool,
    /// Set when a strict mismatch cleared the session.
    pub reset: bool,
}

#[derive(Clone, Debug)]
pub struct PracticeSession {
    policy: MismatchPolicy,
    expected: Vec<NoteKey>,
    played: Vec<PlayedNote>,
    attempts: Vec<PlayedNote>,
    error_count: u32,
}

impl NoteKey {
    pub fn from_note(note: &NoteToken) -> Self {
        Self {
            letter: note.letter,
            raised: note.accidental != Accidental::None,
            higher: note.octave == OctaveMarker::Higher,
        }
    }
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter.as_char())?;
        if self.raised {
            write!(f, "{}", KEYBOARD_SHARP)?;
        }
        if self.higher {
            write!(f, "'")?;
        }
        Ok(())
    }
}

/// Reduces a note element to its comparison key. Accepts notation syntax
/// (`Cis'`, `dd`, `Hes.`) as well as keyboard labels with `#` (`C#'`).
/// Rests, prose and unrecognized elements have no key.
pub fn normalize(input: &str) -> Option<NoteKey> {
    let input = input.trim();
    let (body, octave) = match input.char_indices().last() {
        Some((idx, c @ ('\'' | '.'))) => (&input[..idx], Some(c)),
        _ => (input, None),
    };
    let (body, keyboard_sharp) = match body.strip_suffix(KEYBOARD_SHARP) {
        Some(body) => (body, true),
        None => (body, false),
    };

    let mut element = body.to_string();
    element.extend(octave);

    match parse_element(&element)? {
        NotationToken::Note(note) => {
            let mut key = NoteKey::from_note(&note);
            key.raised |= keyboard_sharp;
            Some(key)
        }
        NotationToken::Rest(_) | NotationToken::BarBreak => None,
    }
}

impl PracticeSession {
    pub fn new(expected: Vec<NoteKey>, policy: MismatchPolicy) -> Self {
        Self {
            policy,
            expected,
            played: Vec::new(),
            attempts: Vec::new(),
            error_count: 0,
        }
    }

    /// Expected sequence is every note of the notation in order; rests and
    /// bar breaks are left out.
    pub fn from_tokens(tokens: &[NotationToken], policy: MismatchPolicy) -> Self {
        let expected = note_tokens(tokens).map(NoteKey::from_note).collect();
        Self::new(expected, policy)
    }

    pub fn from_notation(source: &str, policy: MismatchPolicy) -> Self {
        Self::from_tokens(&parse(source), policy)
    }

    pub fn policy(&self) -> MismatchPolicy {
        self.policy
    }

    /// Switching mode starts the session over.
    pub fn set_policy(&mut self, policy: MismatchPolicy) {
        self.policy = policy;
        self.reset();
    }

    pub fn expected(&self) -> &[NoteKey] {
        &self.expected
    }

    pub fn played(&self) -> &[PlayedNote] {
        &self.played
    }

    pub fn attempts(&self) -> &[PlayedNote] {
        &self.attempts
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn progress(&self) -> usize {
        self.played.len()
    }

    /// Wraps around after completion so a chord or phrase can be repeated.
    pub fn current_expected(&self) -> Option<NoteKey> {
        if self.expected.is_empty() {
            return None;
        }
        self.expected.get(self.played.len() % self.expected.len()).copied()
    }

    pub fn is_complete(&self) -> bool {
        !self.expected.is_empty() && self.played.len() >= self.expected.len()
    }

    pub fn is_perfect(&self) -> bool {
        self.is_complete() && self.error_count == 0
    }

    pub fn is_reward_eligible(&self) -> bool {
        self.policy == MismatchPolicy::Strict && self.is_perfect()
    }

    pub fn reset(&mut self) {
        self.played.clear();
        self.attempts.clear();
        self.error_count = 0;
    }

    pub fn submit_press(&mut self, input: &str) -> PressOutcome {
        let Some(expected) = self.current_expected() else {
            return PressOutcome::default();
        };

        let correct = normalize(input) == Some(expected);
        let entry = PlayedNote {
            input: input.to_string(),
            expected,
            correct,
        };

        if correct {
            self.attempts.push(entry.clone());
            self.played.push(entry);
            let just_completed = self.played.len() == self.expected.len();
            if just_completed {
                info!(
                    errors = self.error_count,
                    policy = ?self.policy,
                    "practice session completed"
                );
            }
            return PressOutcome {
                correct: true,
                session_complete: self.is_complete(),
                session_perfect: self.is_perfect(),
                just_completed,
                reset: false,
            };
        }

        self.error_count += 1;
        match self.policy {
            MismatchPolicy::Strict => {
                debug!(input, %expected, "challenge miss, restarting series");
                self.reset();
                PressOutcome {
                    reset: true,
                    ..PressOutcome::default()
                }
            }
            MismatchPolicy::Lenient => {
                debug!(input, %expected, errors = self.error_count, "practice miss");
                self.attempts.push(entry);
                PressOutcome {
                    correct: false,
                    session_complete: self.is_complete(),
                    session_perfect: self.is_perfect(),
                    just_completed: false,
                    reset: false,
                }
            }
        }
    }
}
