//! Shared types for the Quizcord session engine.
//!
//! This module defines the core data structures used across all crates.
//! These types are designed to be:
//! - Serializable for snapshots and result persistence
//! - Free of any chat-platform types (the engine stays transport-agnostic)
//! - Cheap to clone where the engine hands them across task boundaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Identity Types
// ============================================================================

/// Chat-platform guild (server) identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(pub u64);

/// Chat-platform channel identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

/// Chat-platform user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Identifies one live session: exactly one unfinished session may exist per key.
pub type SessionKey = (GuildId, ChannelId);

impl std::fmt::Display for GuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Question Types
// ============================================================================

/// The answer format a question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

/// Question difficulty, which drives base scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated quiz question. Immutable once constructed; repair and ID
/// assignment happen in the content crate before a question reaches a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Ordinal within the batch (0-based, contiguous after validation).
    pub id: usize,
    pub text: String,
    pub question_type: QuestionType,
    /// Ordered option texts for multiple choice; empty for other types.
    pub options: Vec<String>,
    /// Canonical correct value as text. For multiple choice this is one of
    /// `options`; for true/false it is `"true"` or `"false"`.
    pub answer: String,
    pub explanation: Option<String>,
    pub difficulty: Difficulty,
    pub category: String,
    /// Set when the answer had to be repaired from a best-guess fallback.
    /// Degraded questions are still playable; reveals note the guess.
    pub degraded: bool,
}

// ============================================================================
// Session Modes
// ============================================================================

/// How points are awarded within a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizMode {
    /// Everyone who answers correctly scores, weighted by speed.
    Standard,
    /// Only the earliest correct responder scores; the question ends early.
    FirstCorrectWins,
}

/// Where questions and reveals are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    /// Questions and reveals post to the channel.
    Public,
    /// Questions and reveals go to each participant's DMs; the channel only
    /// sees progress notices.
    Private,
}

/// Session size tier. Independent of [`Privacy`]: a solo quiz can run in a
/// public channel and a group trivia game can be DM-delivered; only the
/// question-count allowance differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizScope {
    /// One player; gets the larger question allowance.
    Solo,
    /// Open trivia game; capped tighter so rounds stay short.
    Group,
}

// ============================================================================
// Participants and Results
// ============================================================================

/// Per-user tally inside a live session. Created lazily on first accepted
/// answer, or up front for private-mode participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub display_name: String,
    pub score: u32,
    pub correct_count: u32,
    pub wrong_count: u32,
    /// Seconds from question start to submission, one entry per accepted answer.
    pub response_times: Vec<f64>,
}

impl Participant {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            score: 0,
            correct_count: 0,
            wrong_count: 0,
            response_times: Vec::new(),
        }
    }

    pub fn total_answers(&self) -> u32 {
        self.correct_count + self.wrong_count
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_answers() == 0 {
            return 0.0;
        }
        f64::from(self.correct_count) / f64::from(self.total_answers()) * 100.0
    }
}

/// One row of a session leaderboard, ordered by score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub display_name: String,
    pub score: u32,
    pub correct: u32,
    pub wrong: u32,
}

/// Terminal per-participant record handed to the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantResult {
    pub user_id: UserId,
    pub display_name: String,
    pub correct: u32,
    pub wrong: u32,
    pub points: u32,
    pub difficulty: Difficulty,
    pub category: String,
}

/// The transactional unit the store persists: one batch per finished quiz.
/// Duplicate batches for the same `quiz_id` must upsert, keyed by
/// `(quiz_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResultBatch {
    pub quiz_id: String,
    pub topic: String,
    pub guild_id: GuildId,
    pub results: Vec<ParticipantResult>,
}

// ============================================================================
// Requests and Progress
// ============================================================================

/// A validated start request from the command layer. The engine re-applies
/// the count and timeout clamps so its invariants never depend on the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRequest {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub host_id: UserId,
    pub host_name: String,
    pub topic: String,
    pub count: usize,
    pub difficulty: Difficulty,
    pub question_type: QuestionType,
    pub provider_hint: Option<String>,
    pub category_hint: Option<String>,
    pub template_hint: Option<String>,
    pub timeout_s: u64,
    pub mode: QuizMode,
    pub privacy: Privacy,
    pub scope: QuizScope,
}

impl QuizRequest {
    /// Clamp question count and timeout to the engine's configured bounds.
    /// Solo sessions get the larger question allowance; group sessions the
    /// tighter one. Delivery privacy never changes the allowance.
    pub fn clamped(mut self, config: &EngineConfig) -> Self {
        let max_count = match self.scope {
            QuizScope::Solo => config.solo_max_questions,
            QuizScope::Group => config.group_max_questions,
        };
        self.count = self.count.clamp(1, max_count.max(1));
        self.timeout_s = self
            .timeout_s
            .clamp(config.question_timeout_min_s, config.question_timeout_max_s);
        self
    }

    pub fn key(&self) -> SessionKey {
        (self.guild_id, self.channel_id)
    }
}

/// Snapshot of where a session is in its question list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// 1-based index of the question being played.
    pub current: usize,
    pub total: usize,
    pub remaining: usize,
    pub percent: f64,
    pub state: String,
    pub participant_count: usize,
}

/// Aggregate numbers for the final results view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub quiz_id: String,
    pub topic: String,
    pub total_questions: usize,
    pub participant_count: usize,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    /// Percentage of accepted answers that were correct.
    pub accuracy: f64,
    pub duration_s: f64,
    pub provider: Option<String>,
}

// ============================================================================
// Recovery
// ============================================================================

/// Minimal durable record of an in-flight session. Enough to tell a channel
/// its quiz was interrupted after a restart; never enough to resume play
/// (questions are not journaled).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoverySnapshot {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub quiz_id: String,
    pub topic: String,
    pub host_id: UserId,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub current_index: usize,
    pub total_questions: usize,
    pub saved_at: DateTime<Utc>,
}

impl RecoverySnapshot {
    pub fn key(&self) -> SessionKey {
        (self.guild_id, self.channel_id)
    }

    /// Age of the snapshot relative to `now`, in whole seconds (zero if the
    /// clock went backwards).
    pub fn age_s(&self, now: DateTime<Utc>) -> u64 {
        (now - self.saved_at).num_seconds().max(0) as u64
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// What to do with questions whose answer had to be guessed during repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradedPolicy {
    /// Keep them playable; reveals note the best guess.
    Play,
    /// Drop them from the batch.
    Drop,
}

/// Base points per difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringBase {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
}

impl ScoringBase {
    pub fn for_difficulty(&self, difficulty: Difficulty) -> u32 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

impl Default for ScoringBase {
    fn default() -> Self {
        Self {
            easy: 10,
            medium: 20,
            hard: 30,
        }
    }
}

/// Engine-level configuration. Every field has a serde default so partial
/// config files stay valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub solo_max_questions: usize,
    pub group_max_questions: usize,
    pub question_timeout_min_s: u64,
    pub question_timeout_max_s: u64,
    pub inter_question_pause_s: u64,
    pub session_inactivity_s: u64,
    pub session_hard_cap_s: u64,
    pub sweep_interval_s: u64,
    pub recovery_ttl_s: u64,
    pub answer_channel_capacity: usize,
    pub max_participants: usize,
    pub degraded_policy: DegradedPolicy,
    pub provider_order: Vec<String>,
    pub scoring_base: ScoringBase,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            solo_max_questions: 20,
            group_max_questions: 5,
            question_timeout_min_s: 5,
            question_timeout_max_s: 120,
            inter_question_pause_s: 5,
            session_inactivity_s: 1800,
            session_hard_cap_s: 3600,
            sweep_interval_s: 300,
            recovery_ttl_s: 1800,
            answer_channel_capacity: 64,
            max_participants: 20,
            degraded_policy: DegradedPolicy::Play,
            provider_order: vec![
                "openai".to_string(),
                "anthropic".to_string(),
                "google".to_string(),
            ],
            scoring_base: ScoringBase::default(),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("a quiz is already active in this channel")]
    AlreadyActive,

    #[error("no question provider is reachable: {0}")]
    GenerationUnavailable(String),

    #[error("question generation produced nothing usable: {0}")]
    GenerationInvalid(String),

    #[error("presentation failed: {0}")]
    Presentation(String),

    #[error("result recording failed: {0}")]
    Recorder(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("state error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QuizError {
    /// Transient errors are handled locally and never abort a session.
    pub fn is_transient(&self) -> bool {
        matches!(self, QuizError::Presentation(_))
    }
}

pub type Result<T> = std::result::Result<T, QuizError>;
