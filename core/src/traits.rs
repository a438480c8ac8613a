//! Stable trait boundaries for inter-crate communication.
//!
//! The engine never touches a chat-platform type: everything it needs from
//! the transport goes through [`Presenter`] (outbound rendering) and the
//! incoming-event types consumed by the ingress, and everything it needs
//! from storage goes through [`QuizStore`]. Adapters implement these traits
//! against the real platform and database.
//!
//! ## Data Flow
//!
//! ```text
//! content/ → core/ → engine/ (questions into sessions)
//! engine/ → Presenter (render, edit, react)
//! engine/ → QuizStore (results, snapshots; async, non-blocking)
//! ```

use async_trait::async_trait;

use crate::session::CorrectResponder;
use crate::types::*;

// ============================================================================
// Message Addressing
// ============================================================================

/// Where a rendered view is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Channel(ChannelId),
    Direct(UserId),
}

/// Opaque handle to a previously sent message. Used for in-place edits
/// (timer updates, reveals) and for correlating reaction events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub destination: Destination,
    pub message_id: u64,
}

/// Acknowledgement attached to a user's answer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Correct,
    Wrong,
}

// ============================================================================
// Render-Ready Views
// ============================================================================

/// A question prepared for display. Options carry fresh letter prefixes;
/// true/false renders bare `True` / `False`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    /// 0-based question index.
    pub index: usize,
    pub total: usize,
    pub topic: String,
    pub text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub difficulty: Difficulty,
    pub category: String,
    pub timeout_s: u64,
}

/// The per-question answer reveal. In public mode this replaces the question
/// message in place; in private mode it is DMed to each participant.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealView {
    pub index: usize,
    pub total: usize,
    pub question_text: String,
    /// Display form of the correct answer.
    pub answer: String,
    pub explanation: Option<String>,
    /// The answer was repaired from a best-guess fallback.
    pub best_guess: bool,
    /// The deadline expired with nobody correct.
    pub timed_out: bool,
    pub correct_responders: Vec<CorrectResponder>,
    pub leaderboard_top: Vec<LeaderboardEntry>,
}

/// Final results at session termination.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalView {
    pub topic: String,
    pub stats: SessionStats,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub stopped_early: bool,
}

// ============================================================================
// Engine → Chat Boundary
// ============================================================================

/// Outbound rendering surface.
///
/// Implementations hold no engine state. Failures are surfaced as
/// [`QuizError::Presentation`] and treated as transient by the engine: a
/// failed timer edit is skipped, a failed reveal edit falls back to
/// `send_reveal`.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Render a question and return a handle for later edits.
    async fn show_question(
        &self,
        destination: Destination,
        view: &QuestionView,
    ) -> Result<MessageRef>;

    /// Update the countdown on a previously sent question message.
    async fn update_timer(&self, message: MessageRef, remaining_s: u64, total_s: u64)
        -> Result<()>;

    /// Edit a question message in place to become its answer reveal.
    async fn reveal(&self, message: MessageRef, view: &RevealView) -> Result<()>;

    /// Post a reveal as a fresh message, used when the question message can
    /// no longer be edited.
    async fn send_reveal(&self, destination: Destination, view: &RevealView) -> Result<()>;

    /// Render the final leaderboard and session statistics.
    async fn show_final(&self, destination: Destination, view: &FinalView) -> Result<()>;

    /// Post a short plain notice (progress lines, interruption notes,
    /// expiry announcements).
    async fn notice(&self, destination: Destination, text: &str) -> Result<()>;

    /// Attach an acknowledgement reaction to a user's answer message.
    async fn react(&self, message: MessageRef, ack: Ack) -> Result<()>;
}

// ============================================================================
// Engine → Store Boundary
// ============================================================================

/// Durable storage surface consumed by the engine.
///
/// `record_quiz_batch` must be transactional and idempotent per
/// `(quiz_id, user_id)`; the engine may hand the same batch twice after a
/// partial failure. Snapshot operations are keyed by session key.
#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn record_quiz_batch(&self, batch: &QuizResultBatch) -> Result<()>;

    /// Best-effort, idempotent guild membership upkeep.
    async fn add_guild_member(&self, guild_id: GuildId, user_id: UserId) -> Result<()>;

    async fn list_recovery_snapshots(&self) -> Result<Vec<RecoverySnapshot>>;

    async fn put_recovery_snapshot(&self, snapshot: &RecoverySnapshot) -> Result<()>;

    async fn delete_recovery_snapshot(&self, key: SessionKey) -> Result<()>;
}
