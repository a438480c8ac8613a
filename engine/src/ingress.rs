//! Answer ingress: chat events in, session commands out.
//!
//! The transport adapter calls into this for every message and reaction it
//! sees. The ingress resolves the event to an active session, applies the
//! acceptance pre-filter (bot author, already answered, syntactic gate),
//! stamps the response time at submission, and forwards the answer over the
//! session's bounded channel. It never mutates session state itself.

use quizcord_core::answer;
use quizcord_core::clock::Clock;
use quizcord_core::events::{AnswerSubmission, SessionCommand};
use quizcord_core::registry::{SessionHandle, SessionRegistry};
use quizcord_core::traits::MessageRef;
use quizcord_core::types::{ChannelId, GuildId, Privacy, QuestionType, UserId};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// A chat message as the transport hands it over. `channel` is `None` for
/// direct messages.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub channel: Option<(GuildId, ChannelId)>,
    pub author: UserId,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    /// Reference to the user's own message, when the transport can attach
    /// reactions to it later.
    pub message: Option<MessageRef>,
}

/// A reaction on a question message, already mapped to an option index by
/// the transport adapter.
#[derive(Debug, Clone)]
pub struct IncomingReaction {
    pub channel: (GuildId, ChannelId),
    pub message_id: u64,
    pub user: UserId,
    pub user_name: String,
    pub user_is_bot: bool,
    pub option_index: usize,
}

/// Global answer router. Cheap to clone per event source.
#[derive(Clone)]
pub struct AnswerIngress {
    registry: Arc<SessionRegistry>,
    clock: Arc<dyn Clock>,
}

impl AnswerIngress {
    pub fn new(registry: Arc<SessionRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    /// Route one chat message. Returns whether it was submitted to a
    /// session; silently dropped input gets no user-facing error.
    pub fn handle_message(&self, incoming: &IncomingMessage) -> bool {
        if incoming.author_is_bot {
            return false;
        }
        let key = match incoming.channel {
            Some(key) => key,
            None => match self.registry.resolve_direct(incoming.author) {
                Some(key) => key,
                None => return false,
            },
        };
        let Some(handle) = self.registry.get(key) else {
            return false;
        };
        // Channel traffic answers public sessions; DMs answer private ones.
        let matches_privacy = match handle.privacy {
            Privacy::Public => incoming.channel.is_some(),
            Privacy::Private => incoming.channel.is_none(),
        };
        if !matches_privacy {
            return false;
        }
        self.submit(
            &handle,
            incoming.author,
            &incoming.author_name,
            incoming.content.trim(),
            incoming.message,
        )
    }

    /// Route an option reaction. Only multiple-choice questions accept
    /// reactions, and only on the current question message.
    pub fn handle_reaction(&self, incoming: &IncomingReaction) -> bool {
        if incoming.user_is_bot {
            return false;
        }
        let Some(handle) = self.registry.get(incoming.channel) else {
            return false;
        };
        if handle.privacy != Privacy::Public {
            return false;
        }

        let raw = {
            let gate = handle.gate.read();
            let Some(gate) = gate.as_ref() else {
                return false;
            };
            if !gate.accepting
                || gate.question.question_type != QuestionType::MultipleChoice
                || gate.message.map(|m| m.message_id) != Some(incoming.message_id)
            {
                return false;
            }
            match gate.question.options.get(incoming.option_index) {
                Some(option) => option.clone(),
                None => return false,
            }
        };
        self.submit(&handle, incoming.user, &incoming.user_name, &raw, None)
    }

    fn submit(
        &self,
        handle: &SessionHandle,
        user_id: UserId,
        display_name: &str,
        raw: &str,
        message: Option<MessageRef>,
    ) -> bool {
        let submission = {
            let gate = handle.gate.read();
            let Some(gate) = gate.as_ref() else {
                return false;
            };
            if !gate.accepting {
                return false;
            }
            if handle.answered.read().contains(&user_id) {
                return false;
            }
            if !answer::accepts(&gate.question, raw) {
                debug!(%user_id, "answer failed the syntactic gate");
                return false;
            }
            AnswerSubmission {
                user_id,
                display_name: display_name.to_string(),
                raw: raw.to_string(),
                // Captured here, at submission, so queueing delay in the
                // owning task never penalizes the participant.
                response_time: (self.clock.now() - gate.started_at).max(0.0),
                message,
            }
        };

        match handle
            .commands
            .try_send(SessionCommand::Answer(submission))
        {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(%user_id, "answer channel full, dropping answer");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
