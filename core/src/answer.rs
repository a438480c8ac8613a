//! Answer normalization and correctness judging.
//!
//! Everything a raw user string goes through before it can affect a session
//! lives here: the syntactic gate (is this parseable as an answer to the
//! current question at all?) and the correctness judgment against the
//! question's canonical answer. Judging is deterministic, so the ingress
//! pre-filter and the session's authoritative resolution share one code path.

use crate::types::{Question, QuestionType};
use unicode_normalization::UnicodeNormalization;

/// Outcome of judging one raw answer against one question.
///
/// `accepted == false` means the input failed the syntactic gate and must not
/// enter the session's answer map. `correct` is only meaningful when
/// `accepted` is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub accepted: bool,
    pub correct: bool,
}

impl Verdict {
    pub const REJECTED: Verdict = Verdict {
        accepted: false,
        correct: false,
    };

    fn accepted(correct: bool) -> Self {
        Self {
            accepted: true,
            correct,
        }
    }
}

/// Canonical comparison form: NFC-normalized, trimmed, lowercased.
///
/// LLM output and chat input disagree on composed vs. decomposed accents
/// often enough that skipping NFC produces spurious wrong answers.
pub fn canonical(s: &str) -> String {
    s.nfc().collect::<String>().trim().to_lowercase()
}

/// Canonical form for short answers: additionally strips trailing
/// sentence punctuation.
pub fn canonical_short(s: &str) -> String {
    canonical(s).trim_end_matches(['.', ',']).to_string()
}

/// Judge a raw answer against a question. Total over all inputs.
pub fn judge(question: &Question, raw: &str) -> Verdict {
    match question.question_type {
        QuestionType::MultipleChoice => judge_multiple_choice(question, raw),
        QuestionType::TrueFalse => judge_true_false(question, raw),
        QuestionType::ShortAnswer => judge_short_answer(question, raw),
    }
}

/// The syntactic gate used by the ingress pre-filter.
pub fn accepts(question: &Question, raw: &str) -> bool {
    judge(question, raw).accepted
}

/// A bare `A`-`D` letter pick (any case), as an option index.
fn parse_letter_pick(raw: &str) -> Option<usize> {
    let mut chars = raw.chars();
    if let (Some(letter), None) = (chars.next(), chars.next()) {
        let lower = letter.to_ascii_lowercase();
        if ('a'..='d').contains(&lower) {
            return Some((lower as usize) - ('a' as usize));
        }
    }
    None
}

/// A bare `1`-`4` number pick, as an option index.
fn parse_number_pick(raw: &str) -> Option<usize> {
    let mut chars = raw.chars();
    if let (Some(digit), None) = (chars.next(), chars.next()) {
        if ('1'..='4').contains(&digit) {
            return Some((digit as usize) - ('1' as usize));
        }
    }
    None
}

fn option_is_answer(question: &Question, index: usize) -> bool {
    question
        .options
        .get(index)
        .is_some_and(|option| canonical(option) == canonical(&question.answer))
}

fn judge_multiple_choice(question: &Question, raw: &str) -> Verdict {
    let trimmed = raw.trim();

    // A recognized letter or number pick always consumes the participant's
    // one answer for the question; pointing past the option list just
    // scores as wrong.
    if let Some(index) = parse_letter_pick(trimmed).or_else(|| parse_number_pick(trimmed)) {
        return Verdict::accepted(option_is_answer(question, index));
    }

    let wanted = canonical(trimmed);
    if wanted.is_empty() {
        return Verdict::REJECTED;
    }
    match question
        .options
        .iter()
        .position(|option| canonical(option) == wanted)
    {
        Some(index) => Verdict::accepted(option_is_answer(question, index)),
        None => Verdict::REJECTED,
    }
}

/// Map a true/false token to its normalized form, or `None` when the input
/// is not recognizable as either.
pub fn normalize_boolean(raw: &str) -> Option<&'static str> {
    match canonical(raw).as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some("true"),
        "false" | "f" | "no" | "n" | "0" => Some("false"),
        _ => None,
    }
}

fn judge_true_false(question: &Question, raw: &str) -> Verdict {
    match normalize_boolean(raw) {
        Some(normalized) => Verdict::accepted(normalized == canonical(&question.answer)),
        None => Verdict::REJECTED,
    }
}

fn judge_short_answer(question: &Question, raw: &str) -> Verdict {
    let given = canonical_short(raw);
    if given.is_empty() {
        return Verdict::REJECTED;
    }
    let wanted = canonical_short(&question.answer);
    let correct = given == wanted || given.contains(&wanted) || wanted.contains(&given);
    Verdict::accepted(correct)
}
