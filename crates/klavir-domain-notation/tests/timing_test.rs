use klavir_domain_notation::{
    parse, parse_note, press_name_for_midi, scale_ms, timeline, total_duration_ms, DurationClass,
    NotationToken, RestLength,
};
use klavir_ports::types::PitchName;
use pretty_assertions::assert_eq;

#[test]
fn rest_wait_grows_with_dash_count() {
    let waits: Vec<u64> = ["-", "--", "---", "----"]
        .iter()
        .map(|source| {
            let tokens = parse(source);
            timeline(&tokens, 1.0)[0].wait_ms
        })
        .collect();

    assert!(waits.windows(2).all(|w| w[0] < w[1]), "{:?}", waits);
}

#[test]
fn note_durations_grow_with_class() {
    let waits: Vec<u64> = DurationClass::ALL.iter().map(|d| d.base_wait_ms()).collect();
    assert!(waits.windows(2).all(|w| w[0] < w[1]));
    for duration in DurationClass::ALL {
        assert!(duration.base_play_ms() < duration.base_wait_ms());
    }
}

#[test]
fn timeline_skips_bar_breaks_and_keeps_token_indices() {
    let tokens = parse("C - | Dis'");
    assert_eq!(tokens[2], NotationToken::BarBreak);

    let events = timeline(&tokens, 1.0);
    assert_eq!(events.len(), 3);

    assert_eq!(events[0].token_index, 0);
    assert_eq!(events[0].pitch, Some(PitchName::new("C4")));
    assert_eq!(events[0].play_ms, 450);
    assert_eq!(events[0].wait_ms, 500);

    assert_eq!(events[1].token_index, 1);
    assert_eq!(events[1].pitch, None);
    assert_eq!(events[1].play_ms, 0);
    assert_eq!(events[1].wait_ms, RestLength::Short.base_wait_ms());

    assert_eq!(events[2].token_index, 3);
    assert_eq!(events[2].pitch, Some(PitchName::new("D#5")));
}

#[test]
fn tempo_multiplier_scales_every_value() {
    let tokens = parse("C Dd -");
    let slow = timeline(&tokens, 1.6);
    let fast = timeline(&tokens, 0.6);

    assert_eq!(slow[0].wait_ms, 800);
    assert_eq!(slow[0].play_ms, 720);
    assert_eq!(fast[1].wait_ms, 450);
    assert_eq!(fast[2].wait_ms, 150);
    assert_eq!(total_duration_ms(&timeline(&tokens, 1.0)), 500 + 750 + 250);
}

#[test]
fn invalid_multipliers_fall_back() {
    assert_eq!(scale_ms(500, f32::NAN), 500);
    assert_eq!(scale_ms(500, 0.0), 500);
    assert_eq!(scale_ms(500, -2.0), 500);
    assert_eq!(scale_ms(500, 0.01), 50);
    assert_eq!(scale_ms(500, 1e30), 5_000);
    assert_eq!(scale_ms(500, f32::MAX), 5_000);
}

#[test]
fn pitch_names_cover_octave_markers() {
    let tokens = parse("hes. H B' Cis");
    let names: Vec<String> = timeline(&tokens, 1.0)
        .into_iter()
        .filter_map(|e| e.pitch.map(|p| p.0))
        .collect();
    assert_eq!(names, vec!["Hb3", "H4", "B5", "C#4"]);
}

#[test]
fn midi_keys_are_named_like_notation() {
    assert_eq!(press_name_for_midi(60), "C");
    assert_eq!(press_name_for_midi(61), "Cis");
    assert_eq!(press_name_for_midi(70), "B");
    assert_eq!(press_name_for_midi(71), "H");
    assert_eq!(press_name_for_midi(72), "C'");
    assert_eq!(press_name_for_midi(59), "H.");
    assert_eq!(press_name_for_midi(96), "C'");
    assert_eq!(press_name_for_midi(21), "A.");
}

#[test]
fn keys_match_notes_by_sound_not_spelling() {
    let played_by = |element: &str, key: u8| {
        parse_note(element)
            .unwrap_or_else(|| panic!("{} should parse", element))
            .is_played_by_key(key)
    };

    assert!(played_by("Ees", 63));
    assert!(played_by("Dis", 63));
    assert!(played_by("Hes", 70));
    assert!(played_by("B", 70));
    assert!(played_by("Eis", 65));
    assert!(played_by("Cis'", 73));
    assert!(!played_by("Ees", 62));
    assert!(!played_by("Cis'", 61));

    // The lower marker is not significant, so either octave's key counts.
    assert!(played_by("Ees.", 51));
    assert!(played_by("Ees.", 63));
    assert!(played_by("Ees", 51));
    assert!(!played_by("Ees'", 63));
}
