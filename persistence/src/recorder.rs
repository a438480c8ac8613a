//! One-shot result recording at session termination.

use quizcord_core::session::QuizSession;
use quizcord_core::traits::QuizStore;
use quizcord_core::types::{QuizError, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Batches a finished session's participant outcomes into one transactional
/// store write. The session's `results_recorded` flag guarantees at most one
/// write per session, no matter which termination path ran.
pub struct Recorder {
    store: Arc<dyn QuizStore>,
}

impl Recorder {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    /// Record the session batch. Returns false when there was nothing to do:
    /// the session was already recorded, or nobody participated.
    ///
    /// On store failure the recorded claim is not rolled back; the quiz has
    /// already ended for its participants and the engine only surfaces a
    /// notice.
    pub async fn record(&self, session: &mut QuizSession) -> Result<bool> {
        if !session.mark_recorded() {
            debug!(quiz_id = %session.quiz_id(), "results already recorded");
            return Ok(false);
        }

        let batch = session.results();
        if batch.results.is_empty() {
            debug!(quiz_id = %session.quiz_id(), "no participants, skipping record");
            return Ok(false);
        }

        self.store
            .record_quiz_batch(&batch)
            .await
            .map_err(|e| QuizError::Recorder(e.to_string()))?;
        info!(
            quiz_id = %batch.quiz_id,
            participants = batch.results.len(),
            "session results recorded"
        );
        Ok(true)
    }
}
