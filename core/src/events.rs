//! Typed messages delivered to a session's owning task.
//!
//! Answers, host commands, expiry signals and read-only queries all travel
//! through one bounded channel, so the owning task has a single select point
//! and processes everything in submission order.

use crate::traits::MessageRef;
use crate::types::{LeaderboardEntry, ProgressInfo, UserId};
use tokio::sync::oneshot;

/// One accepted-at-the-gate answer on its way to the owning task.
///
/// `response_time` was measured by the ingress when the message arrived, so
/// queueing delay never penalizes a participant.
#[derive(Debug)]
pub struct AnswerSubmission {
    pub user_id: UserId,
    pub display_name: String,
    pub raw: String,
    pub response_time: f64,
    /// The user's own message, if the transport exposes it, so the owning
    /// task can attach an acknowledgement reaction.
    pub message: Option<MessageRef>,
}

/// Why a sweeper expired a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireReason {
    /// No activity for longer than the configured inactivity window.
    Inactivity,
    /// Total session duration exceeded the hard cap.
    HardCap,
}

impl ExpireReason {
    pub fn describe(&self) -> &'static str {
        match self {
            ExpireReason::Inactivity => "expired due to inactivity",
            ExpireReason::HardCap => "reached the maximum session duration",
        }
    }
}

/// Everything the owning task can receive.
#[derive(Debug)]
pub enum SessionCommand {
    Answer(AnswerSubmission),
    /// Host requested an early stop. Terminal; results are still recorded.
    Stop { by: UserId },
    /// Sweeper expired the session. Terminal; results are not recorded.
    Expire { reason: ExpireReason },
    /// Read-only progress query.
    Status {
        reply: oneshot::Sender<ProgressInfo>,
    },
    /// Read-only leaderboard query.
    Leaderboard {
        limit: usize,
        reply: oneshot::Sender<Vec<LeaderboardEntry>>,
    },
}
