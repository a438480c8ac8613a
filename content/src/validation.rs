//! Validation and repair of generated questions.
//!
//! LLM output is messy: options arrive with their own letter prefixes,
//! answers arrive as letters, 1-based numbers, option text, or not at all.
//! This module turns a raw batch into playable [`Question`]s: it strips
//! stale prefixes, resolves every answer to its canonical form, repairs
//! unparsed answers where policy allows, drops what cannot be saved, and
//! re-assigns contiguous IDs so ordinality survives filtering.

use quizcord_core::answer;
use quizcord_core::types::{DegradedPolicy, Question, QuestionType, QuizError, Result};
use regex::Regex;
use tracing::{debug, warn};

use crate::provider::{is_unparsed_sentinel, RawQuestion};

/// Stateless once compiled; one per [`QuestionSource`].
///
/// [`QuestionSource`]: crate::generator::QuestionSource
#[derive(Debug)]
pub struct QuestionValidator {
    option_prefix: Regex,
    policy: DegradedPolicy,
}

impl QuestionValidator {
    pub fn new(policy: DegradedPolicy) -> Result<Self> {
        Ok(Self {
            // "A) ", "b. ", "(C): " and similar artifacts at the front of an
            // option. Fresh prefixes are applied at render time.
            option_prefix: Regex::new(r"^\s*\(?([A-Da-d])\s*[).:\-]+\s+").map_err(|e| {
                QuizError::Config(format!("failed to compile option prefix regex: {e}"))
            })?,
            policy,
        })
    }

    /// Validate a raw batch. Clean questions keep their relative order and
    /// come first; repaired (degraded) questions follow; unfixable ones are
    /// dropped. IDs are re-assigned 0..n-1 afterwards.
    pub fn validate_batch(&self, raw: Vec<RawQuestion>) -> Vec<Question> {
        let mut clean = Vec::new();
        let mut repaired = Vec::new();
        let total = raw.len();

        for raw_question in raw {
            match self.validate_one(raw_question) {
                Some(question) if question.degraded => repaired.push(question),
                Some(question) => clean.push(question),
                None => {}
            }
        }

        clean.append(&mut repaired);
        for (index, question) in clean.iter_mut().enumerate() {
            question.id = index;
        }
        if clean.len() < total {
            debug!(kept = clean.len(), received = total, "dropped unusable questions");
        }
        clean
    }

    fn validate_one(&self, raw: RawQuestion) -> Option<Question> {
        let text = raw.text.trim().to_string();
        if text.is_empty() {
            warn!("dropping question with empty text");
            return None;
        }

        let category = {
            let trimmed = raw.category.trim();
            if trimmed.is_empty() {
                "general".to_string()
            } else {
                trimmed.to_string()
            }
        };
        let explanation = raw
            .explanation
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        let (options, answer, degraded) = match raw.question_type {
            QuestionType::MultipleChoice => {
                let options = self.strip_prefixes(&raw.options);
                if options.len() < 2 {
                    warn!(question = %text, "dropping multiple choice question with too few options");
                    return None;
                }
                let (answer, degraded) = self.resolve_choice_answer(&options, raw.answer.as_deref())?;
                (options, answer, degraded)
            }
            QuestionType::TrueFalse => {
                let answer = raw
                    .answer
                    .as_deref()
                    .filter(|a| !is_unparsed_sentinel(a))
                    .and_then(answer::normalize_boolean)?;
                (Vec::new(), answer.to_string(), false)
            }
            QuestionType::ShortAnswer => {
                let answer = raw
                    .answer
                    .as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty() && !is_unparsed_sentinel(a))?;
                (Vec::new(), answer.to_string(), false)
            }
        };

        Some(Question {
            id: 0,
            text,
            question_type: raw.question_type,
            options,
            answer,
            explanation,
            difficulty: raw.difficulty,
            category,
            degraded,
        })
    }

    /// Resolve a multiple-choice answer to the text of one of `options`.
    /// An unparsed or missing answer is repaired to the first option under
    /// the `Play` policy; anything unresolvable drops the question.
    fn resolve_choice_answer(
        &self,
        options: &[String],
        raw_answer: Option<&str>,
    ) -> Option<(String, bool)> {
        let answer = raw_answer.map(str::trim).filter(|a| !a.is_empty());

        let needs_repair = match answer {
            None => true,
            Some(a) => is_unparsed_sentinel(a),
        };
        if needs_repair {
            return match self.policy {
                DegradedPolicy::Play => {
                    let first = options.first()?.clone();
                    debug!(answer = %first, "repaired unparsed answer to first option");
                    Some((first, true))
                }
                DegradedPolicy::Drop => {
                    warn!("dropping question with unparsed answer");
                    None
                }
            };
        }

        let answer = answer?;

        // A bare letter or 1-based number maps to an option index.
        let mut letters = answer.chars();
        if let (Some(letter), None) = (letters.next(), letters.next()) {
            let lower = letter.to_ascii_lowercase();
            if ('a'..='d').contains(&lower) {
                let index = (lower as usize) - ('a' as usize);
                return options.get(index).map(|o| (o.clone(), false));
            }
            if let Some(digit) = lower.to_digit(10) {
                let digit = digit as usize;
                if (1..=options.len()).contains(&digit) {
                    return options.get(digit - 1).map(|o| (o.clone(), false));
                }
            }
        }

        let wanted = answer::canonical(answer);
        options
            .iter()
            .find(|o| answer::canonical(o) == wanted)
            .map(|o| (o.clone(), false))
    }

    fn strip_prefixes(&self, options: &[String]) -> Vec<String> {
        options
            .iter()
            .map(|o| self.option_prefix.replace(o, "").trim().to_string())
            .filter(|o| !o.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizcord_core::types::Difficulty;

    fn validator() -> QuestionValidator {
        QuestionValidator::new(DegradedPolicy::Play).unwrap()
    }

    fn raw_choice(options: &[&str], answer: Option<&str>) -> RawQuestion {
        RawQuestion {
            text: "Which planet is largest?".to_string(),
            question_type: QuestionType::MultipleChoice,
            options: options.iter().map(|s| s.to_string()).collect(),
            answer: answer.map(str::to_string),
            explanation: None,
            difficulty: Difficulty::Easy,
            category: "science".to_string(),
        }
    }

    #[test]
    fn stale_prefixes_are_stripped() {
        let v = validator();
        let batch = v.validate_batch(vec![raw_choice(
            &["A) Mars", "b. Jupiter", "(C): Venus", "D - Saturn"],
            Some("Jupiter"),
        )]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].options, vec!["Mars", "Jupiter", "Venus", "Saturn"]);
    }

    #[test]
    fn letter_answers_resolve_to_option_text() {
        let v = validator();
        let batch = v.validate_batch(vec![raw_choice(&["Mars", "Jupiter"], Some("B"))]);
        assert_eq!(batch[0].answer, "Jupiter");
        assert!(!batch[0].degraded);
    }

    #[test]
    fn numeric_answers_resolve_one_based() {
        let v = validator();
        let batch = v.validate_batch(vec![raw_choice(&["Mars", "Jupiter"], Some("2"))]);
        assert_eq!(batch[0].answer, "Jupiter");
    }

    #[test]
    fn unparsed_answer_repairs_to_first_option() {
        let v = validator();
        let batch = v.validate_batch(vec![raw_choice(
            &["Mars", "Jupiter"],
            Some("Unable to parse from response"),
        )]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].answer, "Mars");
        assert!(batch[0].degraded);
    }

    #[test]
    fn drop_policy_discards_unparsed_answers() {
        let v = QuestionValidator::new(DegradedPolicy::Drop).unwrap();
        let batch = v.validate_batch(vec![raw_choice(&["Mars", "Jupiter"], None)]);
        assert!(batch.is_empty());
    }

    #[test]
    fn unresolvable_answers_drop_the_question() {
        let v = validator();
        let batch = v.validate_batch(vec![raw_choice(&["Mars", "Jupiter"], Some("Neptune"))]);
        assert!(batch.is_empty());
    }

    #[test]
    fn too_few_options_drop_the_question() {
        let v = validator();
        let batch = v.validate_batch(vec![raw_choice(&["Mars"], Some("Mars"))]);
        assert!(batch.is_empty());
    }

    #[test]
    fn true_false_answers_normalize() {
        let v = validator();
        let raw = RawQuestion {
            text: "The Sun is a star.".to_string(),
            question_type: QuestionType::TrueFalse,
            options: vec!["True".to_string(), "False".to_string()],
            answer: Some("Yes".to_string()),
            explanation: Some("  ".to_string()),
            difficulty: Difficulty::Medium,
            category: String::new(),
        };
        let batch = v.validate_batch(vec![raw]);
        assert_eq!(batch[0].answer, "true");
        assert!(batch[0].options.is_empty());
        assert!(batch[0].explanation.is_none());
        assert_eq!(batch[0].category, "general");
    }

    #[test]
    fn unparsed_true_false_is_dropped() {
        let v = validator();
        let raw = RawQuestion {
            text: "The Sun is a star.".to_string(),
            question_type: QuestionType::TrueFalse,
            options: Vec::new(),
            answer: Some("Answer unavailable".to_string()),
            explanation: None,
            difficulty: Difficulty::Medium,
            category: "science".to_string(),
        };
        assert!(v.validate_batch(vec![raw]).is_empty());
    }

    #[test]
    fn ids_are_reassigned_with_clean_questions_first() {
        let v = validator();
        let batch = v.validate_batch(vec![
            raw_choice(&["Mars", "Jupiter"], None), // repaired, goes last
            raw_choice(&["Venus", "Mercury"], Some("Venus")),
            RawQuestion {
                text: String::new(), // dropped
                question_type: QuestionType::ShortAnswer,
                options: Vec::new(),
                answer: Some("x".to_string()),
                explanation: None,
                difficulty: Difficulty::Easy,
                category: "general".to_string(),
            },
        ]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id, 0);
        assert_eq!(batch[0].answer, "Venus");
        assert_eq!(batch[1].id, 1);
        assert!(batch[1].degraded);
    }
}
