//! The owning task: single writer of one session's state.
//!
//! Each session gets one runner task that drives the per-question loop to
//! termination. Everything that mutates the `QuizSession` happens here; the
//! ingress and sweeper only submit commands over the bounded channel, and
//! the timer tasks only signal back through their cancellation flag and
//! deadline channel.

use chrono::Utc;
use quizcord_core::clock::Clock;
use quizcord_core::events::{AnswerSubmission, ExpireReason, SessionCommand};
use quizcord_core::registry::{CreatedSession, QuestionGate, SessionHandle, SessionRegistry};
use quizcord_core::scoring::Scorer;
use quizcord_core::session::{QuestionOutcome, QuizSession};
use quizcord_core::traits::{Ack, Destination, MessageRef, Presenter, QuizStore};
use quizcord_core::types::*;
use quizcord_persistence::{Recorder, RecoveryJournal};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};

use crate::timer::{self, REVEAL_SETTLE};
use crate::views;

/// How one question ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuestionEnd {
    /// The deadline expired naturally.
    Deadline,
    /// First-correct-wins was satisfied before the deadline.
    EarlyFinish,
    /// The host stopped the session.
    Stopped,
    /// The sweeper expired the session.
    Expired(ExpireReason),
    /// The command channel closed under us; the engine is shutting down.
    Detached,
}

/// Which terminal path to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
    Completed,
    Stopped,
    Expired(ExpireReason),
    /// Internal invariant breach: record what we can, no final board.
    Failed,
    /// Engine went away: clean up silently.
    Detached,
}

pub(crate) struct SessionRunner {
    session: QuizSession,
    commands: mpsc::Receiver<SessionCommand>,
    handle: SessionHandle,
    registry: Arc<SessionRegistry>,
    presenter: Arc<dyn Presenter>,
    store: Arc<dyn QuizStore>,
    recorder: Recorder,
    journal: RecoveryJournal,
    clock: Arc<dyn Clock>,
    scorer: Scorer,
    /// Private mode: per-participant question messages, replaced each
    /// question, edited into reveals.
    dm_messages: Vec<(UserId, MessageRef)>,
}

impl SessionRunner {
    pub(crate) fn new(
        created: CreatedSession,
        registry: Arc<SessionRegistry>,
        presenter: Arc<dyn Presenter>,
        store: Arc<dyn QuizStore>,
        clock: Arc<dyn Clock>,
        scorer: Scorer,
        recovery_ttl_s: u64,
    ) -> Self {
        let recorder = Recorder::new(Arc::clone(&store));
        let journal = RecoveryJournal::new(Arc::clone(&store), recovery_ttl_s);
        Self {
            session: created.session,
            commands: created.commands,
            handle: created.handle,
            registry,
            presenter,
            store,
            recorder,
            journal,
            clock,
            scorer,
            dm_messages: Vec::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        match self.play().await {
            Ok(()) => {}
            Err(e) => {
                error!(
                    quiz_id = %self.session.quiz_id(),
                    error = %e,
                    "session aborted on internal error"
                );
                let _ = self
                    .presenter
                    .notice(
                        self.channel(),
                        "❌ The quiz ran into an internal error and had to end.",
                    )
                    .await;
                self.terminate(Terminal::Failed).await;
            }
        }
    }

    async fn play(&mut self) -> Result<()> {
        if let Err(e) = self.journal.save(&self.session, Utc::now()).await {
            warn!(error = %e, "failed to save recovery snapshot");
        }
        self.announce_intro().await;
        self.session.begin()?;

        loop {
            // Terminal commands that arrived between questions.
            if let Some(end) = self.drain_control() {
                match end {
                    QuestionEnd::Stopped => {
                        self.terminate(Terminal::Stopped).await;
                        return Ok(());
                    }
                    QuestionEnd::Expired(reason) => {
                        self.terminate(Terminal::Expired(reason)).await;
                        return Ok(());
                    }
                    QuestionEnd::Detached => {
                        self.terminate(Terminal::Detached).await;
                        return Ok(());
                    }
                    QuestionEnd::Deadline | QuestionEnd::EarlyFinish => {}
                }
            }

            let end = self.play_question().await?;
            match end {
                QuestionEnd::Deadline | QuestionEnd::EarlyFinish => {
                    let deadline_fired = end == QuestionEnd::Deadline;
                    let outcome = self.session.resolve_current_question(&self.scorer)?;
                    self.reveal(&outcome, deadline_fired).await;

                    let more_questions = self.session.advance(Utc::now())?.is_some();
                    if !more_questions {
                        self.terminate(Terminal::Completed).await;
                        return Ok(());
                    }
                    if let Err(e) = self.journal.save(&self.session, Utc::now()).await {
                        warn!(error = %e, "failed to refresh recovery snapshot");
                    }
                    self.clock
                        .sleep(Duration::from_secs(self.session.inter_question_pause_s()))
                        .await;
                }
                QuestionEnd::Stopped => {
                    self.terminate(Terminal::Stopped).await;
                    return Ok(());
                }
                QuestionEnd::Expired(reason) => {
                    self.terminate(Terminal::Expired(reason)).await;
                    return Ok(());
                }
                QuestionEnd::Detached => {
                    self.terminate(Terminal::Detached).await;
                    return Ok(());
                }
            }
        }
    }

    /// Render the current question, run its timer loop, and collect answers
    /// until the deadline or a terminal trigger.
    async fn play_question(&mut self) -> Result<QuestionEnd> {
        let question = self.session.begin_question(Utc::now())?.clone();
        let view = views::question_view(&self.session, &question);

        self.dm_messages.clear();
        let message = match self.session.privacy() {
            Privacy::Public => match self.presenter.show_question(self.channel(), &view).await {
                Ok(message) => {
                    self.session.set_current_question_message(Some(message));
                    Some(message)
                }
                Err(e) => {
                    // No countdown display, but the question still plays.
                    warn!(error = %e, "question render failed");
                    None
                }
            },
            Privacy::Private => {
                for user_id in self.session.participant_ids() {
                    match self
                        .presenter
                        .show_question(Destination::Direct(user_id), &view)
                        .await
                    {
                        Ok(message) => self.dm_messages.push((user_id, message)),
                        Err(e) => warn!(error = %e, %user_id, "DM question delivery failed"),
                    }
                }
                let progress = self.session.progress_info();
                let text = format!(
                    "📝 Question {}/{} sent to participants. Reply in your DMs.",
                    progress.current, progress.total
                );
                if let Err(e) = self.presenter.notice(self.channel(), &text).await {
                    warn!(error = %e, "progress notice failed");
                }
                None
            }
        };

        let started_at = self.clock.now();
        self.handle.answered.write().clear();
        *self.handle.gate.write() = Some(QuestionGate {
            question: question.clone(),
            message,
            started_at,
            accepting: true,
        });

        let timer::QuestionTimer {
            cancel,
            mut deadline,
            ..
        } = timer::start(
            Arc::clone(&self.clock),
            Arc::clone(&self.presenter),
            started_at,
            self.session.question_timeout_s(),
            message,
        );

        let mut end = loop {
            tokio::select! {
                _ = &mut deadline => break QuestionEnd::Deadline,
                command = self.commands.recv() => match command {
                    None => break QuestionEnd::Detached,
                    Some(SessionCommand::Answer(submission)) => {
                        if self.process_answer(submission).await {
                            break QuestionEnd::EarlyFinish;
                        }
                    }
                    Some(SessionCommand::Stop { by }) => {
                        info!(%by, quiz_id = %self.session.quiz_id(), "host stopped the quiz");
                        break QuestionEnd::Stopped;
                    }
                    Some(SessionCommand::Expire { reason }) => break QuestionEnd::Expired(reason),
                    Some(SessionCommand::Status { reply }) => {
                        let _ = reply.send(self.session.progress_info());
                    }
                    Some(SessionCommand::Leaderboard { limit, reply }) => {
                        let _ = reply.send(self.session.leaderboard(limit));
                    }
                }
            }
        };

        cancel.cancel();
        if let Some(gate) = self.handle.gate.write().as_mut() {
            gate.accepting = false;
        }

        if end == QuestionEnd::EarlyFinish {
            // Answers already in the queue were submitted before anyone saw
            // a reveal: they still count for the tally, just never score.
            loop {
                match self.commands.try_recv() {
                    Ok(SessionCommand::Answer(submission)) => {
                        let _ = self.process_answer(submission).await;
                    }
                    Ok(SessionCommand::Stop { by }) => {
                        info!(%by, "host stop during early finish");
                        end = QuestionEnd::Stopped;
                        break;
                    }
                    Ok(SessionCommand::Expire { reason }) => {
                        end = QuestionEnd::Expired(reason);
                        break;
                    }
                    Ok(SessionCommand::Status { reply }) => {
                        let _ = reply.send(self.session.progress_info());
                    }
                    Ok(SessionCommand::Leaderboard { limit, reply }) => {
                        let _ = reply.send(self.session.leaderboard(limit));
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
        }

        // Let any in-flight countdown edit land before the reveal edit.
        self.clock.sleep(REVEAL_SETTLE).await;
        Ok(end)
    }

    /// Apply one submission. Returns true when it satisfied
    /// first-correct-wins.
    async fn process_answer(&mut self, submission: AnswerSubmission) -> bool {
        let outcome = self.session.record_raw_answer(
            submission.user_id,
            &submission.display_name,
            &submission.raw,
            submission.response_time,
            Utc::now(),
        );
        if !outcome.accepted {
            return false;
        }

        self.handle.answered.write().insert(submission.user_id);
        self.handle.ticker.touch(self.clock.now());

        if outcome.newly_registered {
            if let Err(e) = self
                .store
                .add_guild_member(self.session.guild_id(), submission.user_id)
                .await
            {
                debug!(error = %e, "guild membership upkeep failed");
            }
        }

        if let Some(message) = submission.message {
            let ack = if outcome.correct {
                Ack::Correct
            } else {
                Ack::Wrong
            };
            if let Err(e) = self.presenter.react(message, ack).await {
                debug!(error = %e, "acknowledgement reaction failed");
            }
        }

        outcome.first_correct && self.session.mode() == QuizMode::FirstCorrectWins
    }

    /// Public reveals edit the question message in place, falling back to a
    /// fresh message when the edit fails. Private reveals edit each
    /// participant's DM copy and leave the channel a progress notice.
    async fn reveal(&mut self, outcome: &QuestionOutcome, deadline_fired: bool) {
        let view = views::reveal_view(&self.session, outcome, deadline_fired);
        match self.session.privacy() {
            Privacy::Public => match self.session.current_question_message() {
                Some(message) => {
                    if let Err(e) = self.presenter.reveal(message, &view).await {
                        warn!(error = %e, "reveal edit failed, sending a new message");
                        if let Err(e) = self.presenter.send_reveal(self.channel(), &view).await {
                            warn!(error = %e, "reveal fallback failed");
                        }
                    }
                }
                None => {
                    if let Err(e) = self.presenter.send_reveal(self.channel(), &view).await {
                        warn!(error = %e, "reveal send failed");
                    }
                }
            },
            Privacy::Private => {
                for (user_id, message) in &self.dm_messages {
                    if let Err(e) = self.presenter.reveal(*message, &view).await {
                        warn!(error = %e, %user_id, "DM reveal failed");
                    }
                }
                let progress = self.session.progress_info();
                let text = format!(
                    "✅ Question {}/{} complete.",
                    progress.current, progress.total
                );
                if let Err(e) = self.presenter.notice(self.channel(), &text).await {
                    warn!(error = %e, "progress notice failed");
                }
            }
        }
    }

    async fn terminate(&mut self, terminal: Terminal) {
        self.session.finish(Utc::now());
        *self.handle.gate.write() = None;

        match terminal {
            Terminal::Expired(reason) => {
                let text = format!("⏰ Trivia game {}.", reason.describe());
                if let Err(e) = self.presenter.notice(self.channel(), &text).await {
                    warn!(error = %e, "expiry notice failed");
                }
            }
            Terminal::Completed | Terminal::Stopped => {
                if terminal == Terminal::Stopped {
                    let _ = self
                        .presenter
                        .notice(self.channel(), "🛑 Quiz stopped by the host.")
                        .await;
                }
                let view = views::final_view(&self.session, Utc::now(), terminal == Terminal::Stopped);
                if let Err(e) = self.presenter.show_final(self.channel(), &view).await {
                    warn!(error = %e, "final results render failed");
                }
                self.record_results().await;
            }
            Terminal::Failed => {
                self.record_results().await;
            }
            Terminal::Detached => {
                self.record_results().await;
            }
        }

        self.registry.end(self.session.key());
        if let Err(e) = self.journal.clear(self.session.key()).await {
            warn!(error = %e, "failed to clear recovery snapshot");
        }
        info!(
            quiz_id = %self.session.quiz_id(),
            ?terminal,
            "session terminated"
        );
    }

    async fn record_results(&mut self) {
        match self.recorder.record(&mut self.session).await {
            Ok(_) => {}
            Err(e) => {
                // Forward progress wins: the quiz is over either way.
                warn!(error = %e, quiz_id = %self.session.quiz_id(), "result recording failed");
                let _ = self
                    .presenter
                    .notice(
                        self.channel(),
                        "⚠️ Results could not be saved for this quiz.",
                    )
                    .await;
            }
        }
    }

    async fn announce_intro(&self) {
        let mode_note = match self.session.mode() {
            QuizMode::FirstCorrectWins => " First correct answer wins each question.",
            QuizMode::Standard => "",
        };
        let delivery_note = match self.session.privacy() {
            Privacy::Private => " Questions arrive in participants' DMs.",
            Privacy::Public => "",
        };
        let text = format!(
            "🎲 Trivia on **{}**: {} questions, {}s per question.{}{}",
            self.session.topic(),
            self.session.total_questions(),
            self.session.question_timeout_s(),
            mode_note,
            delivery_note,
        );
        if let Err(e) = self.presenter.notice(self.channel(), &text).await {
            warn!(error = %e, "intro notice failed");
        }
    }

    /// Pull terminal and query commands queued while no question was open.
    /// Stray answers are dropped; the session rejects them anyway.
    fn drain_control(&mut self) -> Option<QuestionEnd> {
        loop {
            match self.commands.try_recv() {
                Ok(SessionCommand::Answer(_)) => continue,
                Ok(SessionCommand::Stop { by }) => {
                    info!(%by, "host stopped the quiz between questions");
                    return Some(QuestionEnd::Stopped);
                }
                Ok(SessionCommand::Expire { reason }) => {
                    return Some(QuestionEnd::Expired(reason))
                }
                Ok(SessionCommand::Status { reply }) => {
                    let _ = reply.send(self.session.progress_info());
                }
                Ok(SessionCommand::Leaderboard { limit, reply }) => {
                    let _ = reply.send(self.session.leaderboard(limit));
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(QuestionEnd::Detached),
            }
        }
    }

    fn channel(&self) -> Destination {
        Destination::Channel(self.session.channel_id())
    }
}
