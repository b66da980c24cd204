//! Per-letter scoring of a guess against the solution.
//!
//! Two passes over the solution: exact matches claim their position
//! first, then each remaining guess letter claims the leftmost unclaimed
//! occurrence of the same letter. A solution letter is claimed at most
//! once, so repeated guess letters are never over-reported.

use battleword_protocol::LetterFeedback;

use crate::Game;

/// Scores `guess` against `solution`, case-insensitively.
///
/// The result has one entry per solution letter. Guess positions beyond
/// the end of a short guess score [`LetterFeedback::Absent`]; letters of a
/// long guess past the solution length are ignored.
pub fn feedback(guess: &str, solution: &str) -> Vec<LetterFeedback> {
    let guess: Vec<char> = guess.to_uppercase().chars().collect();
    let solution: Vec<char> = solution.to_uppercase().chars().collect();

    let mut marks = vec![LetterFeedback::Absent; solution.len()];
    let mut claimed = vec![false; solution.len()];

    for (i, target) in solution.iter().enumerate() {
        if guess.get(i) == Some(target) {
            marks[i] = LetterFeedback::Correct;
            claimed[i] = true;
        }
    }

    for i in 0..solution.len() {
        if marks[i] == LetterFeedback::Correct {
            continue;
        }
        let Some(letter) = guess.get(i) else {
            continue;
        };
        let hit = solution
            .iter()
            .enumerate()
            .position(|(j, c)| !claimed[j] && c == letter);
        if let Some(j) = hit {
            claimed[j] = true;
            marks[i] = LetterFeedback::Present;
        }
    }

    marks
}

/// Feedback for every guess of `game`, in guess order.
pub fn feedbacks(game: &Game) -> Vec<Vec<LetterFeedback>> {
    game.guesses
        .iter()
        .map(|guess| feedback(guess, &game.solution))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use LetterFeedback::{Absent, Correct, Present};
    use proptest::prelude::*;

    #[test]
    fn test_feedback_repeated_guess_letter_claims_once() {
        assert_eq!(
            feedback("ALLOW", "APPLE"),
            vec![Correct, Present, Absent, Absent, Absent]
        );
    }

    #[test]
    fn test_feedback_exact_match_is_all_correct() {
        assert_eq!(feedback("crane", "CRANE"), vec![Correct; 5]);
    }

    #[test]
    fn test_feedback_exact_match_wins_over_earlier_present() {
        // The second P is correct; the first can only claim the other P.
        assert_eq!(
            feedback("PAPER", "APPLE"),
            vec![Present, Present, Correct, Present, Absent]
        );
        assert_eq!(
            feedback("PPPPP", "APPLE"),
            vec![Absent, Correct, Correct, Absent, Absent]
        );
    }

    #[test]
    fn test_feedback_no_common_letters_is_all_absent() {
        assert_eq!(feedback("DUCKY", "APPLE"), vec![Absent; 5]);
    }

    #[test]
    fn test_feedback_short_guess_pads_with_absent() {
        assert_eq!(
            feedback("AP", "APPLE"),
            vec![Correct, Correct, Absent, Absent, Absent]
        );
        assert_eq!(feedback("", "APPLE"), vec![Absent; 5]);
    }

    #[test]
    fn test_feedback_long_guess_is_truncated() {
        assert_eq!(feedback("APPLESAUCE", "APPLE"), vec![Correct; 5]);
    }

    fn word() -> impl Strategy<Value = String> {
        "[A-E]{5}"
    }

    proptest! {
        #[test]
        fn prop_length_matches_solution(guess in "[A-Z]{0,8}", solution in word()) {
            prop_assert_eq!(feedback(&guess, &solution).len(), solution.len());
        }

        #[test]
        fn prop_marks_never_exceed_solution_letter_count(guess in word(), solution in word()) {
            let marks = feedback(&guess, &solution);
            for letter in 'A'..='E' {
                let scored = guess
                    .chars()
                    .zip(&marks)
                    .filter(|(c, m)| *c == letter && **m != Absent)
                    .count();
                let available = solution.chars().filter(|c| *c == letter).count();
                prop_assert!(scored <= available);
            }
        }

        #[test]
        fn prop_correct_exactly_where_letters_agree(guess in word(), solution in word()) {
            let marks = feedback(&guess, &solution);
            for ((g, s), m) in guess.chars().zip(solution.chars()).zip(&marks) {
                prop_assert_eq!(g == s, *m == Correct);
            }
        }
    }
}
