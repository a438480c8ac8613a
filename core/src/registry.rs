//! Session registry: the only process-global mutable structure.
//!
//! Maps (guild, channel) to a live session's handle and enforces the
//! single-active invariant atomically on the create path. The handle carries
//! everything concurrent readers need (the command sender for the owning
//! task, the activity ticker the sweeper polls, and the per-question gate
//! the ingress filters against), so nobody but the owning task ever touches
//! the `QuizSession` itself.

use crate::events::SessionCommand;
use crate::session::QuizSession;
use crate::traits::MessageRef;
use crate::types::*;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Monotonic activity timestamps shared between the owning task (writer)
/// and the sweeper (reader). Seconds are stored as f64 bit patterns.
#[derive(Debug)]
pub struct ActivityTicker {
    started_at: AtomicU64,
    last_activity: AtomicU64,
}

impl ActivityTicker {
    pub fn new(now: f64) -> Self {
        Self {
            started_at: AtomicU64::new(now.to_bits()),
            last_activity: AtomicU64::new(now.to_bits()),
        }
    }

    pub fn touch(&self, now: f64) {
        self.last_activity.store(now.to_bits(), Ordering::Relaxed);
    }

    pub fn idle_secs(&self, now: f64) -> f64 {
        (now - f64::from_bits(self.last_activity.load(Ordering::Relaxed))).max(0.0)
    }

    pub fn age_secs(&self, now: f64) -> f64 {
        (now - f64::from_bits(self.started_at.load(Ordering::Relaxed))).max(0.0)
    }
}

/// Per-question state the ingress needs before it may submit an answer:
/// the question itself (for the syntactic gate), the question message (to
/// match option reactions), and the monotonic moment the timer started.
#[derive(Debug, Clone)]
pub struct QuestionGate {
    pub question: Question,
    pub message: Option<MessageRef>,
    pub started_at: f64,
    pub accepting: bool,
}

/// Shared view of one live session. Cloning is cheap; everything heavy sits
/// behind an `Arc`.
#[derive(Clone)]
pub struct SessionHandle {
    pub key: SessionKey,
    pub host_id: UserId,
    pub privacy: Privacy,
    pub commands: mpsc::Sender<SessionCommand>,
    pub ticker: Arc<ActivityTicker>,
    /// Users who already answered the current question; advisory pre-filter
    /// for the ingress, authoritative dedup stays in the session.
    pub answered: Arc<RwLock<HashSet<UserId>>>,
    pub gate: Arc<RwLock<Option<QuestionGate>>>,
}

/// A freshly created session, ready for the engine to spawn its owning task.
pub struct CreatedSession {
    pub session: QuizSession,
    pub handle: SessionHandle,
    pub commands: mpsc::Receiver<SessionCommand>,
}

/// Mapping (guild_id, channel_id) → live session handle.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionKey, SessionHandle>>,
    /// Routes private-mode DM answers back to their session.
    dm_index: Mutex<HashMap<UserId, SessionKey>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a session atomically. Fails with `AlreadyActive`
    /// when the key already has an unfinished session.
    pub fn create(
        &self,
        request: &QuizRequest,
        questions: Vec<Question>,
        provider_info: IndexMap<String, String>,
        now_wall: DateTime<Utc>,
        now_mono: f64,
        config: &EngineConfig,
    ) -> Result<CreatedSession> {
        let key = request.key();
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&key) {
            return Err(QuizError::AlreadyActive);
        }

        let session = QuizSession::new(request, questions, provider_info, now_wall, config)?;
        let (tx, rx) = mpsc::channel(config.answer_channel_capacity.max(1));
        let handle = SessionHandle {
            key,
            host_id: request.host_id,
            privacy: request.privacy,
            commands: tx,
            ticker: Arc::new(ActivityTicker::new(now_mono)),
            answered: Arc::new(RwLock::new(HashSet::new())),
            gate: Arc::new(RwLock::new(None)),
        };
        sessions.insert(key, handle.clone());
        drop(sessions);

        if request.privacy == Privacy::Private {
            self.dm_index.lock().insert(request.host_id, key);
        }

        info!(
            guild_id = %key.0,
            channel_id = %key.1,
            quiz_id = %session.quiz_id(),
            "registered session"
        );
        Ok(CreatedSession {
            session,
            handle,
            commands: rx,
        })
    }

    pub fn get(&self, key: SessionKey) -> Option<SessionHandle> {
        self.sessions.lock().get(&key).cloned()
    }

    /// Remove a session. Idempotent and safe from any termination path;
    /// returns whether a session was actually removed.
    pub fn end(&self, key: SessionKey) -> bool {
        let removed = self.sessions.lock().remove(&key).is_some();
        if removed {
            self.dm_index.lock().retain(|_, v| *v != key);
            debug!(guild_id = %key.0, channel_id = %key.1, "unregistered session");
        }
        removed
    }

    /// Session key a user's DMs route to, if any.
    pub fn resolve_direct(&self, user_id: UserId) -> Option<SessionKey> {
        self.dm_index.lock().get(&user_id).copied()
    }

    /// Route a private participant's DMs to a session. No effect unless the
    /// session exists and is private.
    pub fn register_private_participant(&self, key: SessionKey, user_id: UserId) {
        let is_private = self
            .sessions
            .lock()
            .get(&key)
            .is_some_and(|h| h.privacy == Privacy::Private);
        if is_private {
            self.dm_index.lock().insert(user_id, key);
        }
    }

    pub fn active_keys(&self) -> Vec<SessionKey> {
        self.sessions.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Difficulty, QuestionType, QuizMode};

    fn question() -> Question {
        Question {
            id: 0,
            text: "Q?".to_string(),
            question_type: QuestionType::ShortAnswer,
            options: Vec::new(),
            answer: "yes".to_string(),
            explanation: None,
            difficulty: Difficulty::Easy,
            category: "general".to_string(),
            degraded: false,
        }
    }

    fn request(channel: u64, privacy: Privacy) -> QuizRequest {
        QuizRequest {
            guild_id: GuildId(1),
            channel_id: ChannelId(channel),
            host_id: UserId(7),
            host_name: "host".to_string(),
            topic: "Space".to_string(),
            count: 1,
            difficulty: Difficulty::Easy,
            question_type: QuestionType::ShortAnswer,
            provider_hint: None,
            category_hint: None,
            template_hint: None,
            timeout_s: 30,
            mode: QuizMode::Standard,
            privacy,
            scope: QuizScope::Group,
        }
    }

    fn create(registry: &SessionRegistry, channel: u64, privacy: Privacy) -> Result<CreatedSession> {
        registry.create(
            &request(channel, privacy),
            vec![question()],
            IndexMap::new(),
            Utc::now(),
            0.0,
            &EngineConfig::default(),
        )
    }

    #[test]
    fn second_create_for_same_key_is_rejected() {
        let registry = SessionRegistry::new();
        assert!(create(&registry, 5, Privacy::Public).is_ok());
        assert!(matches!(
            create(&registry, 5, Privacy::Public),
            Err(QuizError::AlreadyActive)
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn end_is_idempotent_and_allows_recreate() {
        let registry = SessionRegistry::new();
        let key = (GuildId(1), ChannelId(5));
        create(&registry, 5, Privacy::Public).unwrap();

        assert!(registry.end(key));
        assert!(!registry.end(key));
        assert!(registry.is_empty());
        assert!(create(&registry, 5, Privacy::Public).is_ok());
    }

    #[test]
    fn distinct_channels_coexist() {
        let registry = SessionRegistry::new();
        create(&registry, 5, Privacy::Public).unwrap();
        create(&registry, 6, Privacy::Public).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn private_sessions_index_host_dms() {
        let registry = SessionRegistry::new();
        create(&registry, 5, Privacy::Private).unwrap();
        let key = (GuildId(1), ChannelId(5));
        assert_eq!(registry.resolve_direct(UserId(7)), Some(key));

        registry.register_private_participant(key, UserId(8));
        assert_eq!(registry.resolve_direct(UserId(8)), Some(key));

        registry.end(key);
        assert_eq!(registry.resolve_direct(UserId(7)), None);
        assert_eq!(registry.resolve_direct(UserId(8)), None);
    }

    #[test]
    fn public_sessions_do_not_index_dms() {
        let registry = SessionRegistry::new();
        create(&registry, 5, Privacy::Public).unwrap();
        assert_eq!(registry.resolve_direct(UserId(7)), None);
        registry.register_private_participant((GuildId(1), ChannelId(5)), UserId(8));
        assert_eq!(registry.resolve_direct(UserId(8)), None);
    }

    #[test]
    fn ticker_tracks_idle_and_age() {
        let ticker = ActivityTicker::new(100.0);
        assert_eq!(ticker.idle_secs(130.0), 30.0);
        assert_eq!(ticker.age_secs(160.0), 60.0);
        ticker.touch(150.0);
        assert_eq!(ticker.idle_secs(160.0), 10.0);
        assert_eq!(ticker.age_secs(160.0), 60.0);
    }
}
