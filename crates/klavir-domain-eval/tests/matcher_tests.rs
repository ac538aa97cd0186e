use klavir_domain_eval::{normalize, MismatchPolicy, NoteKey, PracticeSession, PressOutcome};
use klavir_domain_notation::NoteLetter;
use pretty_assertions::assert_eq;

fn key(letter: NoteLetter) -> NoteKey {
    NoteKey {
        letter,
        raised: false,
        higher: false,
    }
}

fn played_inputs(session: &PracticeSession) -> Vec<&str> {
    session.played().iter().map(|p| p.input.as_str()).collect()
}

#[test]
fn sharp_and_flat_collapse_to_same_key() {
    assert_eq!(normalize("Cis"), normalize("Ces"));
    assert_eq!(normalize("Cis"), normalize("C#"));
    assert_eq!(normalize("cis").map(|k| k.to_string()).as_deref(), Some("C#"));
}

#[test]
fn higher_octave_is_significant_lower_is_not() {
    assert_ne!(normalize("C"), normalize("C'"));
    assert_eq!(normalize("C"), normalize("C."));
    assert_eq!(normalize("Dis'").map(|k| k.to_string()).as_deref(), Some("D#'"));
    assert_eq!(normalize("D#'"), normalize("Des'"));
}

#[test]
fn duration_does_not_affect_key() {
    assert_eq!(normalize("c"), normalize("CCCC"));
    assert_eq!(normalize("dd"), Some(key(NoteLetter::D)));
}

#[test]
fn rests_and_prose_have_no_key() {
    assert_eq!(normalize("-"), None);
    assert_eq!(normalize("---"), None);
    assert_eq!(normalize("hello"), None);
    assert_eq!(normalize("|"), None);
    assert_eq!(normalize(""), None);
}

#[test]
fn expected_sequence_skips_rests_and_bars() {
    let session = PracticeSession::from_notation("D D E - F | G A H", MismatchPolicy::Lenient);
    let expected: Vec<String> = session.expected().iter().map(|k| k.to_string()).collect();
    assert_eq!(expected, vec!["D", "D", "E", "F", "G", "A", "H"]);
}

#[test]
fn challenge_mismatch_clears_everything() {
    let mut session = PracticeSession::from_notation("C E G", MismatchPolicy::Strict);

    assert!(session.submit_press("C").correct);
    assert!(session.submit_press("E").correct);
    let outcome = session.submit_press("A");

    assert_eq!(
        outcome,
        PressOutcome {
            correct: false,
            session_complete: false,
            session_perfect: false,
            just_completed: false,
            reset: true,
        }
    );
    assert!(session.played().is_empty());
    assert!(session.attempts().is_empty());
    assert_eq!(session.error_count(), 0);
    assert_eq!(session.current_expected(), Some(key(NoteLetter::C)));
}

#[test]
fn challenge_perfect_run_is_reward_eligible() {
    let mut session = PracticeSession::from_notation("C E G", MismatchPolicy::Strict);
    session.submit_press("C");
    session.submit_press("E");
    let outcome = session.submit_press("G");

    assert!(outcome.session_complete);
    assert!(outcome.session_perfect);
    assert!(outcome.just_completed);
    assert!(session.is_reward_eligible());
}

#[test]
fn practice_mismatch_is_recorded_without_reset() {
    let mut session = PracticeSession::from_notation("C E G", MismatchPolicy::Lenient);

    session.submit_press("C");
    session.submit_press("E");
    let miss = session.submit_press("A");
    assert!(!miss.correct);
    assert!(!miss.reset);

    let last = session.submit_press("G");
    assert!(last.correct);
    assert!(last.session_complete);
    assert!(last.just_completed);
    assert!(!last.session_perfect);

    assert_eq!(session.error_count(), 1);
    assert_eq!(played_inputs(&session), vec!["C", "E", "G"]);

    let attempts: Vec<(&str, bool)> = session
        .attempts()
        .iter()
        .map(|p| (p.input.as_str(), p.correct))
        .collect();
    assert_eq!(
        attempts,
        vec![("C", true), ("E", true), ("A", false), ("G", true)]
    );
    assert!(!session.is_reward_eligible());
}

#[test]
fn perfect_lenient_session_is_not_reward_eligible() {
    let mut session = PracticeSession::from_notation("C", MismatchPolicy::Lenient);
    let outcome = session.submit_press("C");
    assert!(outcome.session_perfect);
    assert!(!session.is_reward_eligible());
}

#[test]
fn practice_loops_after_completion() {
    let mut session = PracticeSession::from_notation("C E G", MismatchPolicy::Lenient);
    for note in ["C", "E", "G"] {
        session.submit_press(note);
    }

    assert_eq!(session.current_expected(), Some(key(NoteLetter::C)));
    let outcome = session.submit_press("C");
    assert!(outcome.correct);
    assert!(outcome.session_complete);
    assert!(!outcome.just_completed);
    assert_eq!(session.progress(), 4);
}

#[test]
fn played_length_grows_monotonically_in_practice() {
    let mut session = PracticeSession::from_notation("C D E F", MismatchPolicy::Lenient);
    let mut last = 0;
    for input in ["C", "X", "D", "D", "E", "-", "F"] {
        session.submit_press(input);
        assert!(session.progress() >= last);
        last = session.progress();
    }
    assert!(session.is_complete());
    assert_eq!(session.error_count(), 3);
}

#[test]
fn raised_notes_match_either_spelling() {
    let mut session = PracticeSession::from_notation("Fis Hes'", MismatchPolicy::Strict);
    assert!(session.submit_press("F#").correct);
    assert!(session.submit_press("His'").correct);
    assert!(session.is_perfect());
}

#[test]
fn empty_session_ignores_presses() {
    let mut session = PracticeSession::from_notation("- | words only", MismatchPolicy::Strict);
    let outcome = session.submit_press("C");
    assert_eq!(outcome, PressOutcome::default());
    assert!(!session.is_complete());
    assert!(!session.is_perfect());
    assert_eq!(session.error_count(), 0);
}

#[test]
fn switching_policy_resets_progress() {
    let mut session = PracticeSession::from_notation("C D", MismatchPolicy::Lenient);
    session.submit_press("C");
    session.submit_press("E");
    session.set_policy(MismatchPolicy::Strict);

    assert_eq!(session.policy(), MismatchPolicy::Strict);
    assert_eq!(session.progress(), 0);
    assert_eq!(session.error_count(), 0);
}
