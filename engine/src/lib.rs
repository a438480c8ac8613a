//! # Quizcord Engine
//!
//! The engine crate runs live quiz sessions: one owning task per session
//! drives the question loop, timer tasks handle the countdown, the ingress
//! routes chat traffic, and a sweeper expires stale sessions. This crate
//! wires the core state machine to the presenter, store, and question
//! source, and owns every task the system spawns.

pub mod ingress;
mod runner;
pub mod sweep;
pub mod timer;
pub mod views;

pub use ingress::{AnswerIngress, IncomingMessage, IncomingReaction};

use chrono::Utc;
use quizcord_content::{GenerationRequest, QuestionSource};
use quizcord_core::clock::Clock;
use quizcord_core::events::SessionCommand;
use quizcord_core::registry::SessionRegistry;
use quizcord_core::scoring::Scorer;
use quizcord_core::traits::{Destination, Presenter, QuizStore};
use quizcord_core::types::*;
use quizcord_persistence::RecoveryJournal;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::runner::SessionRunner;

/// The quiz session engine. One per process; cheap to share behind an `Arc`.
pub struct QuizEngine {
    registry: Arc<SessionRegistry>,
    presenter: Arc<dyn Presenter>,
    store: Arc<dyn QuizStore>,
    source: Arc<QuestionSource>,
    clock: Arc<dyn Clock>,
    scorer: Scorer,
    config: EngineConfig,
}

impl QuizEngine {
    pub fn new(
        presenter: Arc<dyn Presenter>,
        store: Arc<dyn QuizStore>,
        source: Arc<QuestionSource>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            presenter,
            store,
            source,
            clock,
            scorer: Scorer::new(config.scoring_base),
            config,
        }
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The router the transport adapter feeds message and reaction events.
    pub fn ingress(&self) -> AnswerIngress {
        AnswerIngress::new(Arc::clone(&self.registry), Arc::clone(&self.clock))
    }

    /// Start a quiz: fetch questions, register the session, save the first
    /// recovery snapshot, and spawn the owning task. Returns the quiz ID
    /// for the caller's acknowledgement.
    ///
    /// Fails with `AlreadyActive` when the channel already has a live
    /// session, and with the generation errors when no questions could be
    /// produced; in both cases nothing was registered.
    pub async fn start(&self, request: QuizRequest) -> Result<String> {
        let request = request.clamped(&self.config);
        let key = request.key();
        if self.registry.get(key).is_some() {
            return Err(QuizError::AlreadyActive);
        }

        let generation = GenerationRequest::from_quiz(&request);
        let (questions, provider_info) = self.source.fetch(&generation).await?;

        let created = self.registry.create(
            &request,
            questions,
            provider_info,
            Utc::now(),
            self.clock.now(),
            &self.config,
        )?;
        let quiz_id = created.session.quiz_id().to_string();

        let runner = SessionRunner::new(
            created,
            Arc::clone(&self.registry),
            Arc::clone(&self.presenter),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.scorer.clone(),
            self.config.recovery_ttl_s,
        );
        tokio::spawn(runner.run());

        info!(quiz_id = %quiz_id, topic = %request.topic, "quiz started");
        Ok(quiz_id)
    }

    /// Ask the session in `key` to stop. Returns whether a live session was
    /// reached.
    pub async fn stop(&self, key: SessionKey, by: UserId) -> bool {
        let Some(handle) = self.registry.get(key) else {
            return false;
        };
        handle
            .commands
            .send(SessionCommand::Stop { by })
            .await
            .is_ok()
    }

    /// Progress of the session in `key`, if one is live.
    pub async fn status(&self, key: SessionKey) -> Option<ProgressInfo> {
        let handle = self.registry.get(key)?;
        let (reply, response) = oneshot::channel();
        handle
            .commands
            .send(SessionCommand::Status { reply })
            .await
            .ok()?;
        response.await.ok()
    }

    /// Current leaderboard of the session in `key`, if one is live.
    pub async fn leaderboard(
        &self,
        key: SessionKey,
        limit: usize,
    ) -> Option<Vec<LeaderboardEntry>> {
        let handle = self.registry.get(key)?;
        let (reply, response) = oneshot::channel();
        handle
            .commands
            .send(SessionCommand::Leaderboard { limit, reply })
            .await
            .ok()?;
        response.await.ok()
    }

    /// Post one interruption notice per fresh recovery snapshot and clear
    /// the journal. Called once at process start; play is never resumed.
    pub async fn announce_interrupted(&self) -> Result<usize> {
        let journal = RecoveryJournal::new(Arc::clone(&self.store), self.config.recovery_ttl_s);
        let interrupted = journal.drain_interrupted(Utc::now()).await?;
        for snapshot in &interrupted {
            let text = format!(
                "⚠️ A quiz on **{}** was interrupted by a restart. Start a new quiz to play again.",
                snapshot.topic
            );
            if let Err(e) = self
                .presenter
                .notice(Destination::Channel(snapshot.channel_id), &text)
                .await
            {
                warn!(error = %e, channel_id = %snapshot.channel_id, "interruption notice failed");
            }
        }
        Ok(interrupted.len())
    }

    /// Spawn the periodic inactivity / hard-cap sweeper.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        sweep::spawn(
            Arc::clone(&self.registry),
            Arc::clone(&self.clock),
            &self.config,
        )
    }
}
