//! Construction of render-ready views from session state.
//!
//! Presenters receive finished view models: options already carry fresh
//! letter prefixes (source prefixes were stripped at validation), true/false
//! renders bare `True` / `False`, and degraded questions carry the
//! best-guess flag for the reveal prose.

use quizcord_core::session::{QuestionOutcome, QuizSession};
use quizcord_core::traits::{FinalView, QuestionView, RevealView};
use quizcord_core::types::{Question, QuestionType};
use chrono::{DateTime, Utc};

const REVEAL_LEADERBOARD_LIMIT: usize = 5;
const FINAL_LEADERBOARD_LIMIT: usize = 10;

fn option_letter(index: usize) -> char {
    (b'A' + (index as u8).min(25)) as char
}

/// Display options for a question: lettered for multiple choice, bare
/// `True` / `False` for boolean questions, none for short answers.
pub fn display_options(question: &Question) -> Vec<String> {
    match question.question_type {
        QuestionType::MultipleChoice => question
            .options
            .iter()
            .enumerate()
            .map(|(index, option)| format!("{}. {}", option_letter(index), option))
            .collect(),
        QuestionType::TrueFalse => vec!["True".to_string(), "False".to_string()],
        QuestionType::ShortAnswer => Vec::new(),
    }
}

/// Display form of the canonical answer.
pub fn display_answer(question: &Question) -> String {
    match question.question_type {
        QuestionType::TrueFalse => {
            if question.answer == "true" {
                "True".to_string()
            } else {
                "False".to_string()
            }
        }
        _ => question.answer.clone(),
    }
}

pub fn question_view(session: &QuizSession, question: &Question) -> QuestionView {
    QuestionView {
        index: question.id,
        total: session.total_questions(),
        topic: session.topic().to_string(),
        text: question.text.clone(),
        question_type: question.question_type,
        options: display_options(question),
        difficulty: question.difficulty,
        category: question.category.clone(),
        timeout_s: session.question_timeout_s(),
    }
}

/// Build the reveal for a resolved question. `deadline_fired` distinguishes
/// "time ran out" from an early finish when nobody was right.
pub fn reveal_view(
    session: &QuizSession,
    outcome: &QuestionOutcome,
    deadline_fired: bool,
) -> RevealView {
    RevealView {
        index: outcome.question.id,
        total: session.total_questions(),
        question_text: outcome.question.text.clone(),
        answer: display_answer(&outcome.question),
        explanation: outcome.question.explanation.clone(),
        best_guess: outcome.question.degraded,
        timed_out: deadline_fired && outcome.correct_responders.is_empty(),
        correct_responders: outcome.correct_responders.clone(),
        leaderboard_top: session.leaderboard(REVEAL_LEADERBOARD_LIMIT),
    }
}

pub fn final_view(session: &QuizSession, now: DateTime<Utc>, stopped_early: bool) -> FinalView {
    FinalView {
        topic: session.topic().to_string(),
        stats: session.stats(now),
        leaderboard: session.leaderboard(FINAL_LEADERBOARD_LIMIT),
        stopped_early,
    }
}
