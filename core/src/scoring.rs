//! Scoring engine with deterministic point calculations.
//!
//! Points reward both correctness and speed: a correct answer earns its
//! difficulty's base points scaled by how much of the question timer was
//! left. Half of the base is guaranteed for any correct answer, the other
//! half decays linearly over the timeout.

use crate::types::{Difficulty, QuizMode, ScoringBase};

/// Inputs for scoring one accepted answer.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput {
    pub correct: bool,
    /// Seconds from question start to submission.
    pub response_time: f64,
    /// The question's full timeout in seconds.
    pub timeout: f64,
    pub difficulty: Difficulty,
    pub mode: QuizMode,
    /// Whether this answer was the earliest correct one for the question.
    pub is_first_correct: bool,
}

/// Deterministic point calculator, configured once per engine.
#[derive(Debug, Clone)]
pub struct Scorer {
    base: ScoringBase,
}

impl Scorer {
    pub fn new(base: ScoringBase) -> Self {
        Self { base }
    }

    /// Fraction of the timer remaining at submission, clamped to [0, 1].
    fn time_factor(response_time: f64, timeout: f64) -> f64 {
        if timeout <= 0.0 {
            return 0.0;
        }
        (1.0 - response_time / timeout).clamp(0.0, 1.0)
    }

    /// Points awarded for one answer. Wrong answers and non-winning correct
    /// answers in first-correct-wins mode score zero.
    pub fn points(&self, input: ScoringInput) -> u32 {
        if !input.correct {
            return 0;
        }
        if input.mode == QuizMode::FirstCorrectWins && !input.is_first_correct {
            return 0;
        }
        let base = f64::from(self.base.for_difficulty(input.difficulty));
        let factor = Self::time_factor(input.response_time, input.timeout);
        (base * (0.5 + 0.5 * factor)).round() as u32
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(ScoringBase::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn input(difficulty: Difficulty, response_time: f64, timeout: f64) -> ScoringInput {
        ScoringInput {
            correct: true,
            response_time,
            timeout,
            difficulty,
            mode: QuizMode::Standard,
            is_first_correct: true,
        }
    }

    #[test]
    fn base_points_by_difficulty_at_full_speed() {
        let scorer = Scorer::default();
        assert_eq!(scorer.points(input(Difficulty::Easy, 0.0, 30.0)), 10);
        assert_eq!(scorer.points(input(Difficulty::Medium, 0.0, 30.0)), 20);
        assert_eq!(scorer.points(input(Difficulty::Hard, 0.0, 30.0)), 30);
    }

    #[test]
    fn slowest_answer_earns_half_base() {
        let scorer = Scorer::default();
        assert_eq!(scorer.points(input(Difficulty::Easy, 30.0, 30.0)), 5);
        assert_eq!(scorer.points(input(Difficulty::Hard, 45.0, 30.0)), 15);
    }

    #[test]
    fn reference_values_easy_thirty_second_timeout() {
        let scorer = Scorer::default();
        assert_eq!(scorer.points(input(Difficulty::Easy, 5.0, 30.0)), 9);
        assert_eq!(scorer.points(input(Difficulty::Easy, 12.0, 30.0)), 8);
        assert_eq!(scorer.points(input(Difficulty::Easy, 29.0, 30.0)), 5);
    }

    #[test]
    fn reference_value_medium_first_correct() {
        let scorer = Scorer::default();
        let mut i = input(Difficulty::Medium, 2.0, 30.0);
        i.mode = QuizMode::FirstCorrectWins;
        assert_eq!(scorer.points(i), 19);
    }

    #[test]
    fn wrong_answers_score_zero() {
        let scorer = Scorer::default();
        let mut i = input(Difficulty::Hard, 1.0, 30.0);
        i.correct = false;
        assert_eq!(scorer.points(i), 0);
    }

    #[test]
    fn late_correct_scores_zero_in_first_correct_wins() {
        let scorer = Scorer::default();
        let mut i = input(Difficulty::Medium, 3.0, 30.0);
        i.mode = QuizMode::FirstCorrectWins;
        i.is_first_correct = false;
        assert_eq!(scorer.points(i), 0);
    }

    proptest! {
        /// Holding correctness and difficulty fixed, answering faster never
        /// yields fewer points.
        #[test]
        fn faster_never_scores_less(
            timeout in 5.0_f64..120.0,
            a in 0.0_f64..120.0,
            b in 0.0_f64..120.0,
        ) {
            let scorer = Scorer::default();
            let (fast, slow) = if a <= b { (a, b) } else { (b, a) };
            let fast_points = scorer.points(input(Difficulty::Medium, fast, timeout));
            let slow_points = scorer.points(input(Difficulty::Medium, slow, timeout));
            prop_assert!(fast_points >= slow_points);
        }

        /// Points never exceed base and never drop below half base (rounded)
        /// for a correct answer.
        #[test]
        fn points_stay_in_band(
            timeout in 5.0_f64..120.0,
            t in 0.0_f64..240.0,
        ) {
            let scorer = Scorer::default();
            let points = scorer.points(input(Difficulty::Hard, t, timeout));
            prop_assert!(points >= 15);
            prop_assert!(points <= 30);
        }
    }
}
