/// Middle C, used for pitch names that cannot be resolved.
pub const FALLBACK_FREQUENCY_HZ: f32 = 261.63;

/// Resolves `<letter>[#|b]<octave>` to Hz, equal temperament with A4 = 440 Hz.
/// Letters follow the Czech convention (`H` natural, `B` flat).
pub fn frequency_for(name: &str) -> Option<f32> {
    let mut chars = name.trim().chars();
    let semitone = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 10,
        'H' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (offset, octave) = if let Some(octave) = rest.strip_prefix('#') {
        (1, octave)
    } else if let Some(octave) = rest.strip_prefix('b') {
        (-1, octave)
    } else {
        (0, rest)
    };

    let octave: i32 = octave.parse().ok()?;
    if !(0..=8).contains(&octave) {
        return None;
    }

    let midi = (octave + 1) * 12 + semitone + offset;
    Some(440.0 * 2.0_f32.powf((midi as f32 - 69.0) / 12.0))
}
