use crate::model::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

const HIGHER_OCTAVE: char = '\'';
const LOWER_OCTAVE: char = '.';
const SHARP_SUFFIX: &str = "is";
const FLAT_SUFFIX: &str = "es";
const REST: char = '-';

/// Minimum run of lowercase letters that marks an element as lyric or comment text.
const PROSE_RUN: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CoreShape {
    /// `c`
    Lower,
    /// `cc`
    LowerPair,
    /// `C`
    Upper,
    /// `Cc`
    UpperLower,
    /// `CC`
    UpperPair,
    /// `CCC`
    UpperTriple,
    /// `CCCC`
    UpperQuad,
}

/// Core shape to duration, evaluated top to bottom; the first match wins.
const CORE_PATTERNS: [(CoreShape, DurationClass); 7] = [
    (CoreShape::Lower, DurationClass::Eighth),
    (CoreShape::LowerPair, DurationClass::Sixteenth),
    (CoreShape::Upper, DurationClass::Quarter),
    (CoreShape::UpperLower, DurationClass::QuarterDotted),
    (CoreShape::UpperPair, DurationClass::Half),
    (CoreShape::UpperTriple, DurationClass::HalfDotted),
    (CoreShape::UpperQuad, DurationClass::Whole),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    Prose,
    Unrecognized,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedElement {
    pub element: String,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseReport {
    pub tokens: Vec<NotationToken>,
    pub skipped: Vec<SkippedElement>,
}

impl CoreShape {
    fn matches(self, core: &[char]) -> Option<NoteLetter> {
        let (len, lower_from) = match self {
            CoreShape::Lower => (1, 0),
            CoreShape::LowerPair => (2, 0),
            CoreShape::Upper => (1, 1),
            CoreShape::UpperLower => (2, 1),
            CoreShape::UpperPair => (2, 2),
            CoreShape::UpperTriple => (3, 3),
            CoreShape::UpperQuad => (4, 4),
        };
        if core.len() != len {
            return None;
        }

        let first = *core.first()?;
        for (idx, c) in core.iter().enumerate() {
            let case_ok = if idx < lower_from {
                c.is_ascii_uppercase()
            } else {
                c.is_ascii_lowercase()
            };
            if !case_ok || !c.eq_ignore_ascii_case(&first) {
                return None;
            }
        }

        NoteLetter::from_char(first)
    }
}

impl ParseReport {
    pub fn notes(&self) -> impl Iterator<Item = &NoteToken> {
        note_tokens(&self.tokens)
    }
}

/// Parses notation text. Never fails: elements that are not notation are dropped.
pub fn parse(source: &str) -> Vec<NotationToken> {
    parse_report(source).tokens
}

/// Like [`parse`], but also lists every dropped element and why.
pub fn parse_report(source: &str) -> ParseReport {
    let mut report = ParseReport::default();
    let mut pending_break = false;

    for (segment_idx, segment) in source.split(is_bar_separator).enumerate() {
        if segment_idx > 0 {
            pending_break = true;
        }

        for element in segment.split_whitespace() {
            match classify(element) {
                Ok(token) => {
                    if pending_break
                        && matches!(report.tokens.last(), Some(last) if *last != NotationToken::BarBreak)
                    {
                        report.tokens.push(NotationToken::BarBreak);
                    }
                    pending_break = false;
                    report.tokens.push(token);
                }
                Err(reason) => {
                    debug!(element, ?reason, "skipping notation element");
                    report.skipped.push(SkippedElement {
                        element: element.to_string(),
                        reason,
                    });
                }
            }
        }
    }

    report
}

/// Classifies a single whitespace-free element.
pub fn parse_element(element: &str) -> Option<NotationToken> {
    classify(element).ok()
}

/// Parses a note element (`core accidental? octave?`) without rest or prose handling.
pub fn parse_note(element: &str) -> Option<NoteToken> {
    let (rest, octave) = strip_octave(element);
    let (core, accidental) = strip_accidental(rest);
    let chars: Vec<char> = core.chars().collect();

    CORE_PATTERNS.iter().find_map(|(shape, duration)| {
        shape.matches(&chars).map(|letter| NoteToken {
            letter,
            accidental,
            octave,
            duration: *duration,
        })
    })
}

/// Best-effort lyric/comment detection: a run of three or more lowercase
/// letters in an element that is not itself a note. Short words such as
/// `ah` or `be` are not caught and fall through to note matching.
pub fn is_prose_word(element: &str) -> bool {
    let mut run = 0usize;
    let mut longest = 0usize;
    for c in element.chars() {
        if c.is_ascii_lowercase() {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest >= PROSE_RUN && parse_note(element).is_none()
}

pub fn note_tokens(tokens: &[NotationToken]) -> impl Iterator<Item = &NoteToken> {
    tokens.iter().filter_map(NotationToken::as_note)
}

fn classify(element: &str) -> Result<NotationToken, SkipReason> {
    if !element.is_empty() && element.chars().all(|c| c == REST) {
        let length = RestLength::from_dashes(element.chars().count()).ok_or(SkipReason::Unrecognized)?;
        return Ok(NotationToken::Rest(length));
    }

    if is_prose_word(element) {
        return Err(SkipReason::Prose);
    }

    parse_note(element)
        .map(NotationToken::Note)
        .ok_or(SkipReason::Unrecognized)
}

fn is_bar_separator(c: char) -> bool {
    matches!(c, '|' | '\n' | '\r')
}

fn strip_octave(element: &str) -> (&str, OctaveMarker) {
    if let Some(rest) = element.strip_suffix(HIGHER_OCTAVE) {
        (rest, OctaveMarker::Higher)
    } else if let Some(rest) = element.strip_suffix(LOWER_OCTAVE) {
        (rest, OctaveMarker::Lower)
    } else {
        (element, OctaveMarker::None)
    }
}

fn strip_accidental(element: &str) -> (&str, Accidental) {
    let suffix_len = SHARP_SUFFIX.len();
    if element.len() <= suffix_len || !element.is_char_boundary(element.len() - suffix_len) {
        return (element, Accidental::None);
    }

    let (core, suffix) = element.split_at(element.len() - suffix_len);
    if suffix.eq_ignore_ascii_case(SHARP_SUFFIX) {
        (core, Accidental::Sharp)
    } else if suffix.eq_ignore_ascii_case(FLAT_SUFFIX) {
        (core, Accidental::Flat)
    } else {
        (element, Accidental::None)
    }
}
