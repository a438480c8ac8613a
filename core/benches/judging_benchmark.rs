//! Benchmarks for the answer-judging and scoring hot paths.
//!
//! Both run on every accepted chat message while a question is open, so they
//! must stay well under a millisecond.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quizcord_core::answer;
use quizcord_core::scoring::{Scorer, ScoringInput};
use quizcord_core::types::{Difficulty, Question, QuestionType, QuizMode};

fn multiple_choice() -> Question {
    Question {
        id: 0,
        text: "Which planet has the most moons?".to_string(),
        question_type: QuestionType::MultipleChoice,
        options: vec![
            "Jupiter".to_string(),
            "Saturn".to_string(),
            "Uranus".to_string(),
            "Neptune".to_string(),
        ],
        answer: "Saturn".to_string(),
        explanation: None,
        difficulty: Difficulty::Medium,
        category: "science".to_string(),
        degraded: false,
    }
}

fn short_answer() -> Question {
    Question {
        id: 0,
        text: "Name the tallest mountain on Earth.".to_string(),
        question_type: QuestionType::ShortAnswer,
        options: Vec::new(),
        answer: "Mount Everest".to_string(),
        explanation: None,
        difficulty: Difficulty::Hard,
        category: "geography".to_string(),
        degraded: false,
    }
}

fn bench_judging(c: &mut Criterion) {
    let mc = multiple_choice();
    let sa = short_answer();

    c.bench_function("judge_multiple_choice_letter", |b| {
        b.iter(|| answer::judge(black_box(&mc), black_box("b")))
    });

    c.bench_function("judge_multiple_choice_text", |b| {
        b.iter(|| answer::judge(black_box(&mc), black_box("  SATURN ")))
    });

    c.bench_function("judge_short_answer_substring", |b| {
        b.iter(|| answer::judge(black_box(&sa), black_box("everest")))
    });
}

fn bench_scoring(c: &mut Criterion) {
    let scorer = Scorer::default();
    let input = ScoringInput {
        correct: true,
        response_time: 7.3,
        timeout: 30.0,
        difficulty: Difficulty::Medium,
        mode: QuizMode::Standard,
        is_first_correct: true,
    };

    c.bench_function("score_correct_answer", |b| {
        b.iter(|| scorer.points(black_box(input)))
    });
}

criterion_group!(benches, bench_judging, bench_scoring);
criterion_main!(benches);
