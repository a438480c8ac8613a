//! Per-channel quiz session state machine.
//!
//! A [`QuizSession`] is a pure state value: it never spawns tasks, never
//! sleeps, and never talks to a presenter or store. The engine's owning task
//! is its single writer; everything here is synchronous so tests can drive a
//! session without any runtime. Wall-clock instants are passed in by the
//! caller for the same reason.

use crate::answer;
use crate::scoring::{Scorer, ScoringInput};
use crate::traits::MessageRef;
use crate::types::*;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Lifecycle states. `Finished` is terminal; exactly one non-`Finished`
/// session may exist per (guild, channel) at a time, which the registry
/// enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Setup,
    Active,
    WaitingForAnswer,
    Reviewing,
    Finished,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Setup => "setup",
            SessionState::Active => "active",
            SessionState::WaitingForAnswer => "waiting_for_answer",
            SessionState::Reviewing => "reviewing",
            SessionState::Finished => "finished",
        }
    }
}

/// One accepted raw answer, kept until the question resolves.
#[derive(Debug, Clone)]
pub struct RecordedAnswer {
    pub raw: String,
    pub response_time: f64,
    pub correct: bool,
}

/// What `record_raw_answer` tells the owning task about one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub accepted: bool,
    pub correct: bool,
    /// This acceptance was the first correct answer for the question
    /// (drives the early finish in first-correct-wins mode).
    pub first_correct: bool,
    /// The participant was created by this answer.
    pub newly_registered: bool,
}

impl AnswerOutcome {
    const REJECTED: AnswerOutcome = AnswerOutcome {
        accepted: false,
        correct: false,
        first_correct: false,
        newly_registered: false,
    };
}

/// A correct responder for one question, in response-time order. Zero-point
/// entries are correct answers that arrived after the winner in
/// first-correct-wins mode.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectResponder {
    pub user_id: UserId,
    pub display_name: String,
    pub points: u32,
    pub total_score: u32,
    pub response_time: f64,
}

/// Everything the reveal needs about a resolved question.
#[derive(Debug, Clone)]
pub struct QuestionOutcome {
    pub question: Question,
    pub correct_responders: Vec<CorrectResponder>,
    pub answered_count: usize,
}

/// A single quiz playthrough bound to one chat channel.
pub struct QuizSession {
    guild_id: GuildId,
    channel_id: ChannelId,
    host_id: UserId,
    quiz_id: String,
    topic: String,
    questions: Vec<Question>,
    current_index: usize,
    state: SessionState,
    participants: IndexMap<UserId, Participant>,
    current_answers: IndexMap<UserId, RecordedAnswer>,
    current_correct: Vec<UserId>,
    current_question_message: Option<MessageRef>,
    created_at: DateTime<Utc>,
    started_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    question_timeout_s: u64,
    inter_question_pause_s: u64,
    mode: QuizMode,
    privacy: Privacy,
    provider_info: IndexMap<String, String>,
    max_participants: usize,
    results_recorded: bool,
}

impl QuizSession {
    /// Build a session in `Setup` from a clamped request and a validated,
    /// non-empty question batch. Private sessions pre-register the host so
    /// DM delivery has at least one recipient.
    pub fn new(
        request: &QuizRequest,
        questions: Vec<Question>,
        provider_info: IndexMap<String, String>,
        now: DateTime<Utc>,
        config: &EngineConfig,
    ) -> Result<Self> {
        if questions.is_empty() {
            return Err(QuizError::Invariant(
                "session constructed with no questions".to_string(),
            ));
        }

        let quiz_id = format!("trivia_{}_{}", request.channel_id, now.timestamp());
        let mut session = Self {
            guild_id: request.guild_id,
            channel_id: request.channel_id,
            host_id: request.host_id,
            quiz_id,
            topic: request.topic.clone(),
            questions,
            current_index: 0,
            state: SessionState::Setup,
            participants: IndexMap::new(),
            current_answers: IndexMap::new(),
            current_correct: Vec::new(),
            current_question_message: None,
            created_at: now,
            started_at: now,
            last_activity_at: now,
            ended_at: None,
            question_timeout_s: request.timeout_s,
            inter_question_pause_s: config.inter_question_pause_s,
            mode: request.mode,
            privacy: request.privacy,
            provider_info,
            max_participants: config.max_participants,
            results_recorded: false,
        };

        if session.privacy == Privacy::Private {
            session.register_participant(request.host_id, request.host_name.clone());
        }

        info!(
            quiz_id = %session.quiz_id,
            topic = %session.topic,
            questions = session.questions.len(),
            mode = ?session.mode,
            "created quiz session"
        );
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn key(&self) -> SessionKey {
        (self.guild_id, self.channel_id)
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn host_id(&self) -> UserId {
        self.host_id
    }

    pub fn quiz_id(&self) -> &str {
        &self.quiz_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    pub fn privacy(&self) -> Privacy {
        self.privacy
    }

    pub fn question_timeout_s(&self) -> u64 {
        self.question_timeout_s
    }

    pub fn inter_question_pause_s(&self) -> u64 {
        self.inter_question_pause_s
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider_info.get("provider_name").map(String::as_str)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn participant(&self, user_id: UserId) -> Option<&Participant> {
        self.participants.get(&user_id)
    }

    pub fn participant_ids(&self) -> Vec<UserId> {
        self.participants.keys().copied().collect()
    }

    pub fn answered_this_question(&self, user_id: UserId) -> bool {
        self.current_answers.contains_key(&user_id)
    }

    pub fn current_question_message(&self) -> Option<MessageRef> {
        self.current_question_message
    }

    pub fn set_current_question_message(&mut self, message: Option<MessageRef>) {
        self.current_question_message = message;
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// `Setup` → `Active`: the question batch is ready and the intro has
    /// been announced.
    pub fn begin(&mut self) -> Result<()> {
        if self.state != SessionState::Setup {
            return Err(QuizError::State(format!(
                "cannot begin from {}",
                self.state.as_str()
            )));
        }
        self.state = SessionState::Active;
        Ok(())
    }

    /// `Active` → `WaitingForAnswer`: the current question is being shown
    /// and its timer is about to start. Clears per-question state.
    pub fn begin_question(&mut self, now: DateTime<Utc>) -> Result<&Question> {
        if self.state != SessionState::Active {
            return Err(QuizError::State(format!(
                "cannot begin a question from {}",
                self.state.as_str()
            )));
        }
        if self.current_index >= self.questions.len() {
            return Err(QuizError::Invariant(format!(
                "question index {} out of range ({} questions)",
                self.current_index,
                self.questions.len()
            )));
        }
        self.current_answers.clear();
        self.current_correct.clear();
        self.current_question_message = None;
        self.state = SessionState::WaitingForAnswer;
        self.last_activity_at = now;
        debug!(
            quiz_id = %self.quiz_id,
            question = self.current_index + 1,
            "question open for answers"
        );
        self.questions
            .get(self.current_index)
            .ok_or_else(|| QuizError::Invariant("question disappeared".to_string()))
    }

    /// Register a participant up front. Returns false when the participant
    /// cap is reached or the user is already registered.
    pub fn register_participant(&mut self, user_id: UserId, display_name: String) -> bool {
        if self.participants.contains_key(&user_id) {
            return false;
        }
        if self.participants.len() >= self.max_participants {
            debug!(quiz_id = %self.quiz_id, %user_id, "participant cap reached");
            return false;
        }
        self.participants
            .insert(user_id, Participant::new(user_id, display_name));
        true
    }

    /// Record one raw answer for the current question.
    ///
    /// The response time is the submission-time measurement taken by the
    /// ingress, so ordering here never affects fairness. Each user gets at
    /// most one entry per question; syntactically invalid input and answers
    /// outside `WaitingForAnswer` are rejected without side effects.
    pub fn record_raw_answer(
        &mut self,
        user_id: UserId,
        display_name: &str,
        raw: &str,
        response_time: f64,
        now: DateTime<Utc>,
    ) -> AnswerOutcome {
        if self.state != SessionState::WaitingForAnswer {
            return AnswerOutcome::REJECTED;
        }
        if self.current_answers.contains_key(&user_id) {
            return AnswerOutcome::REJECTED;
        }
        let Some(question) = self.questions.get(self.current_index) else {
            return AnswerOutcome::REJECTED;
        };

        let verdict = answer::judge(question, raw);
        if !verdict.accepted {
            return AnswerOutcome::REJECTED;
        }

        // Private sessions only hear from their pre-registered participants.
        let newly_registered = if self.privacy == Privacy::Private {
            if !self.participants.contains_key(&user_id) {
                return AnswerOutcome::REJECTED;
            }
            false
        } else if !self.participants.contains_key(&user_id) {
            if !self.register_participant(user_id, display_name.to_string()) {
                return AnswerOutcome::REJECTED;
            }
            true
        } else {
            false
        };

        if let Some(participant) = self.participants.get_mut(&user_id) {
            participant.response_times.push(response_time);
        }
        self.current_answers.insert(
            user_id,
            RecordedAnswer {
                raw: raw.to_string(),
                response_time,
                correct: verdict.correct,
            },
        );

        let first_correct = verdict.correct && self.current_correct.is_empty();
        if verdict.correct {
            self.current_correct.push(user_id);
        }
        self.last_activity_at = now;

        AnswerOutcome {
            accepted: true,
            correct: verdict.correct,
            first_correct,
            newly_registered,
        }
    }

    /// `WaitingForAnswer` → `Reviewing`: the deadline fired or an early
    /// finish triggered. Scores every recorded answer and returns the
    /// reveal material.
    pub fn resolve_current_question(&mut self, scorer: &Scorer) -> Result<QuestionOutcome> {
        if self.state != SessionState::WaitingForAnswer {
            return Err(QuizError::State(format!(
                "cannot resolve from {}",
                self.state.as_str()
            )));
        }
        let question = self
            .questions
            .get(self.current_index)
            .cloned()
            .ok_or_else(|| {
                QuizError::Invariant(format!(
                    "question index {} out of range ({} questions)",
                    self.current_index,
                    self.questions.len()
                ))
            })?;

        // The winner in first-correct-wins is the earliest correct answer by
        // submission-time measurement, independent of processing order.
        let mut entries: Vec<(UserId, RecordedAnswer)> = self
            .current_answers
            .iter()
            .map(|(id, a)| (*id, a.clone()))
            .collect();
        if self.mode == QuizMode::FirstCorrectWins {
            entries.sort_by(|a, b| {
                a.1.response_time
                    .partial_cmp(&b.1.response_time)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let answered_count = entries.len();
        let mut correct_responders = Vec::new();
        let mut winner_taken = false;

        for (user_id, recorded) in entries {
            let Some(participant) = self.participants.get_mut(&user_id) else {
                continue;
            };
            if recorded.correct {
                participant.correct_count += 1;
                let is_first_correct = !winner_taken;
                winner_taken = true;
                let points = scorer.points(ScoringInput {
                    correct: true,
                    response_time: recorded.response_time,
                    timeout: self.question_timeout_s as f64,
                    difficulty: question.difficulty,
                    mode: self.mode,
                    is_first_correct,
                });
                participant.score += points;
                correct_responders.push(CorrectResponder {
                    user_id,
                    display_name: participant.display_name.clone(),
                    points,
                    total_score: participant.score,
                    response_time: recorded.response_time,
                });
            } else {
                participant.wrong_count += 1;
            }
        }

        correct_responders.sort_by(|a, b| {
            a.response_time
                .partial_cmp(&b.response_time)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        self.current_answers.clear();
        self.state = SessionState::Reviewing;
        debug!(
            quiz_id = %self.quiz_id,
            question = self.current_index + 1,
            answered = answered_count,
            correct = correct_responders.len(),
            "question resolved"
        );

        Ok(QuestionOutcome {
            question,
            correct_responders,
            answered_count,
        })
    }

    /// `Reviewing` → `Active` (more questions) or `Finished` (none left).
    /// Returns the next question when play continues.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Option<&Question>> {
        if self.state != SessionState::Reviewing {
            return Err(QuizError::State(format!(
                "cannot advance from {}",
                self.state.as_str()
            )));
        }
        self.current_index += 1;
        self.current_correct.clear();
        self.current_question_message = None;
        self.last_activity_at = now;

        if self.current_index >= self.questions.len() {
            self.current_index = self.questions.len();
            self.state = SessionState::Finished;
            self.ended_at = Some(now);
            info!(quiz_id = %self.quiz_id, "quiz complete");
            return Ok(None);
        }
        self.state = SessionState::Active;
        Ok(self.questions.get(self.current_index))
    }

    /// Force the terminal state from anywhere (host stop, expiry, defensive
    /// shutdown). Idempotent.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        if self.state == SessionState::Finished {
            return;
        }
        self.state = SessionState::Finished;
        self.current_index = self.questions.len();
        if self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
    }

    /// Claim the one-shot right to record results. Returns false on every
    /// call after the first.
    pub fn mark_recorded(&mut self) -> bool {
        if self.results_recorded {
            return false;
        }
        self.results_recorded = true;
        true
    }

    pub fn results_recorded(&self) -> bool {
        self.results_recorded
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    // ------------------------------------------------------------------
    // Derived Views
    // ------------------------------------------------------------------

    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .participants
            .values()
            .map(|p| LeaderboardEntry {
                user_id: p.user_id,
                display_name: p.display_name.clone(),
                score: p.score,
                correct: p.correct_count,
                wrong: p.wrong_count,
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then(b.correct.cmp(&a.correct)));
        entries.truncate(limit);
        entries
    }

    pub fn progress_info(&self) -> ProgressInfo {
        let total = self.questions.len();
        let current = (self.current_index + 1).min(total);
        ProgressInfo {
            current,
            total,
            remaining: total.saturating_sub(self.current_index + 1),
            percent: if total == 0 {
                0.0
            } else {
                current as f64 / total as f64 * 100.0
            },
            state: self.state.as_str().to_string(),
            participant_count: self.participants.len(),
        }
    }

    pub fn stats(&self, now: DateTime<Utc>) -> SessionStats {
        let correct: u32 = self.participants.values().map(|p| p.correct_count).sum();
        let wrong: u32 = self.participants.values().map(|p| p.wrong_count).sum();
        let total_answers = correct + wrong;
        let end = self.ended_at.unwrap_or(now);
        SessionStats {
            quiz_id: self.quiz_id.clone(),
            topic: self.topic.clone(),
            total_questions: self.questions.len(),
            participant_count: self.participants.len(),
            correct_answers: correct,
            wrong_answers: wrong,
            accuracy: if total_answers == 0 {
                0.0
            } else {
                f64::from(correct) / f64::from(total_answers) * 100.0
            },
            duration_s: (end - self.started_at).num_milliseconds().max(0) as f64 / 1000.0,
            provider: self.provider_name().map(str::to_string),
        }
    }

    /// Terminal batch for the recorder. Difficulty and category come from
    /// the first question, matching how the results are reported.
    pub fn results(&self) -> QuizResultBatch {
        let (difficulty, category) = self
            .questions
            .first()
            .map(|q| (q.difficulty, q.category.clone()))
            .unwrap_or((Difficulty::Medium, "general".to_string()));
        QuizResultBatch {
            quiz_id: self.quiz_id.clone(),
            topic: self.topic.clone(),
            guild_id: self.guild_id,
            results: self
                .participants
                .values()
                .map(|p| ParticipantResult {
                    user_id: p.user_id,
                    display_name: p.display_name.clone(),
                    correct: p.correct_count,
                    wrong: p.wrong_count,
                    points: p.score,
                    difficulty,
                    category: category.clone(),
                })
                .collect(),
        }
    }

    pub fn snapshot(&self, saved_at: DateTime<Utc>) -> RecoverySnapshot {
        RecoverySnapshot {
            guild_id: self.guild_id,
            channel_id: self.channel_id,
            quiz_id: self.quiz_id.clone(),
            topic: self.topic.clone(),
            host_id: self.host_id,
            started_at: self.started_at,
            last_activity_at: self.last_activity_at,
            current_index: self.current_index,
            total_questions: self.questions.len(),
            saved_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionType;

    fn question(id: usize, answer: &str) -> Question {
        Question {
            id,
            text: format!("Question {id}?"),
            question_type: QuestionType::MultipleChoice,
            options: vec![
                "Alpha".to_string(),
                "Beta".to_string(),
                "Gamma".to_string(),
                "Delta".to_string(),
            ],
            answer: answer.to_string(),
            explanation: None,
            difficulty: Difficulty::Easy,
            category: "general".to_string(),
            degraded: false,
        }
    }

    fn request(mode: QuizMode, privacy: Privacy) -> QuizRequest {
        QuizRequest {
            guild_id: GuildId(10),
            channel_id: ChannelId(20),
            host_id: UserId(1),
            host_name: "host".to_string(),
            topic: "Space".to_string(),
            count: 3,
            difficulty: Difficulty::Easy,
            question_type: QuestionType::MultipleChoice,
            provider_hint: None,
            category_hint: None,
            template_hint: None,
            timeout_s: 30,
            mode,
            privacy,
            scope: QuizScope::Group,
        }
    }

    fn session(mode: QuizMode) -> QuizSession {
        QuizSession::new(
            &request(mode, Privacy::Public),
            vec![question(0, "Alpha"), question(1, "Beta")],
            IndexMap::new(),
            Utc::now(),
            &EngineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn empty_question_batch_is_rejected() {
        let result = QuizSession::new(
            &request(QuizMode::Standard, Privacy::Public),
            Vec::new(),
            IndexMap::new(),
            Utc::now(),
            &EngineConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn full_lifecycle_reaches_finished() {
        let mut s = session(QuizMode::Standard);
        let now = Utc::now();
        let scorer = Scorer::default();

        s.begin().unwrap();
        s.begin_question(now).unwrap();
        let outcome = s.record_raw_answer(UserId(2), "alice", "A", 5.0, now);
        assert!(outcome.accepted && outcome.correct);
        s.resolve_current_question(&scorer).unwrap();
        assert!(s.advance(now).unwrap().is_some());

        s.begin_question(now).unwrap();
        s.record_raw_answer(UserId(2), "alice", "a", 4.0, now);
        s.resolve_current_question(&scorer).unwrap();
        assert!(s.advance(now).unwrap().is_none());

        assert!(s.is_finished());
        assert_eq!(s.current_index(), s.total_questions());
        let alice = s.participant(UserId(2)).unwrap();
        assert_eq!(alice.correct_count, 1);
        assert_eq!(alice.wrong_count, 1);
    }

    #[test]
    fn one_answer_per_user_per_question() {
        let mut s = session(QuizMode::Standard);
        let now = Utc::now();
        s.begin().unwrap();
        s.begin_question(now).unwrap();

        assert!(s.record_raw_answer(UserId(2), "alice", "B", 2.0, now).accepted);
        let second = s.record_raw_answer(UserId(2), "alice", "A", 3.0, now);
        assert!(!second.accepted);

        let alice = s.participant(UserId(2)).unwrap();
        assert_eq!(alice.response_times.len(), 1);
    }

    #[test]
    fn rejected_input_leaves_no_trace() {
        let mut s = session(QuizMode::Standard);
        let now = Utc::now();
        s.begin().unwrap();
        s.begin_question(now).unwrap();

        let outcome = s.record_raw_answer(UserId(2), "alice", "Epsilon", 2.0, now);
        assert!(!outcome.accepted);
        assert!(s.participant(UserId(2)).is_none());
        assert!(!s.answered_this_question(UserId(2)));
    }

    #[test]
    fn first_correct_wins_awards_exactly_one() {
        let mut s = session(QuizMode::FirstCorrectWins);
        let now = Utc::now();
        let scorer = Scorer::default();
        s.begin().unwrap();
        s.begin_question(now).unwrap();

        // Processed out of submission-time order on purpose: the slower
        // answer arrives first.
        let slow = s.record_raw_answer(UserId(3), "bob", "A", 6.0, now);
        assert!(slow.correct && slow.first_correct);
        let fast = s.record_raw_answer(UserId(2), "alice", "Alpha", 2.0, now);
        assert!(fast.correct && !fast.first_correct);

        let outcome = s.resolve_current_question(&scorer).unwrap();
        let scored: Vec<_> = outcome
            .correct_responders
            .iter()
            .filter(|r| r.points > 0)
            .collect();
        assert_eq!(scored.len(), 1);
        // The earliest submission-time answer wins regardless of processing
        // order.
        assert_eq!(scored[0].user_id, UserId(2));
        assert_eq!(outcome.correct_responders.len(), 2);
    }

    #[test]
    fn standard_mode_scores_everyone_correct() {
        let mut s = session(QuizMode::Standard);
        let now = Utc::now();
        let scorer = Scorer::default();
        s.begin().unwrap();
        s.begin_question(now).unwrap();

        s.record_raw_answer(UserId(2), "alice", "A", 2.0, now);
        s.record_raw_answer(UserId(3), "bob", "1", 6.0, now);
        s.record_raw_answer(UserId(4), "carol", "B", 3.0, now);

        let outcome = s.resolve_current_question(&scorer).unwrap();
        assert_eq!(outcome.answered_count, 3);
        assert_eq!(outcome.correct_responders.len(), 2);
        assert!(outcome.correct_responders.iter().all(|r| r.points > 0));
        // Ordered fastest first.
        assert_eq!(outcome.correct_responders[0].user_id, UserId(2));
    }

    #[test]
    fn participant_cap_rejects_overflow() {
        let mut config = EngineConfig::default();
        config.max_participants = 1;
        let mut s = QuizSession::new(
            &request(QuizMode::Standard, Privacy::Public),
            vec![question(0, "Alpha")],
            IndexMap::new(),
            Utc::now(),
            &config,
        )
        .unwrap();
        let now = Utc::now();
        s.begin().unwrap();
        s.begin_question(now).unwrap();

        assert!(s.record_raw_answer(UserId(2), "alice", "A", 1.0, now).accepted);
        assert!(!s.record_raw_answer(UserId(3), "bob", "B", 2.0, now).accepted);
    }

    #[test]
    fn private_session_rejects_unregistered_users() {
        let mut s = QuizSession::new(
            &request(QuizMode::Standard, Privacy::Private),
            vec![question(0, "Alpha")],
            IndexMap::new(),
            Utc::now(),
            &EngineConfig::default(),
        )
        .unwrap();
        let now = Utc::now();
        s.begin().unwrap();
        s.begin_question(now).unwrap();

        // The host was pre-registered at construction.
        assert!(s.record_raw_answer(UserId(1), "host", "A", 1.0, now).accepted);
        assert!(!s.record_raw_answer(UserId(9), "drifter", "A", 1.0, now).accepted);
    }

    #[test]
    fn results_recorded_at_most_once() {
        let mut s = session(QuizMode::Standard);
        assert!(s.mark_recorded());
        assert!(!s.mark_recorded());
        assert!(s.results_recorded());
    }

    #[test]
    fn finish_is_idempotent_and_terminal() {
        let mut s = session(QuizMode::Standard);
        let now = Utc::now();
        s.finish(now);
        assert!(s.is_finished());
        assert_eq!(s.current_index(), s.total_questions());
        let ended = s.stats(now).duration_s;
        s.finish(now + chrono::Duration::seconds(60));
        assert_eq!(s.stats(now).duration_s, ended);
    }

    #[test]
    fn leaderboard_sorts_by_score() {
        let mut s = session(QuizMode::Standard);
        let now = Utc::now();
        let scorer = Scorer::default();
        s.begin().unwrap();
        s.begin_question(now).unwrap();
        s.record_raw_answer(UserId(2), "alice", "B", 2.0, now);
        s.record_raw_answer(UserId(3), "bob", "A", 2.0, now);
        s.resolve_current_question(&scorer).unwrap();

        let board = s.leaderboard(10);
        assert_eq!(board[0].user_id, UserId(3));
        assert_eq!(board[1].score, 0);
    }

    #[test]
    fn quiz_id_uses_channel_and_start_epoch() {
        let s = session(QuizMode::Standard);
        let expected_prefix = format!("trivia_{}_", 20);
        assert!(s.quiz_id().starts_with(&expected_prefix));
    }

    #[test]
    fn progress_info_tracks_position() {
        let mut s = session(QuizMode::Standard);
        let now = Utc::now();
        let scorer = Scorer::default();
        s.begin().unwrap();
        s.begin_question(now).unwrap();
        let progress = s.progress_info();
        assert_eq!(progress.current, 1);
        assert_eq!(progress.total, 2);
        assert_eq!(progress.remaining, 1);

        s.resolve_current_question(&scorer).unwrap();
        s.advance(now).unwrap();
        assert_eq!(s.progress_info().current, 2);
    }
}
