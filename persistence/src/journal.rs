//! Recovery journal: interrupted-session snapshots.
//!
//! The owning task saves a snapshot at session creation and at every
//! question boundary, and clears it on termination. After a restart the
//! engine drains the journal: snapshots younger than the TTL produce one
//! interruption notice each, older ones vanish silently. Play is never
//! resumed from a snapshot.

use chrono::{DateTime, Utc};
use quizcord_core::session::QuizSession;
use quizcord_core::traits::QuizStore;
use quizcord_core::types::{RecoverySnapshot, Result, SessionKey};
use std::sync::Arc;
use tracing::{debug, info};

pub struct RecoveryJournal {
    store: Arc<dyn QuizStore>,
    ttl_s: u64,
}

impl RecoveryJournal {
    pub fn new(store: Arc<dyn QuizStore>, ttl_s: u64) -> Self {
        Self { store, ttl_s }
    }

    /// Persist the current position of a live session.
    pub async fn save(&self, session: &QuizSession, now: DateTime<Utc>) -> Result<()> {
        let snapshot = session.snapshot(now);
        self.store.put_recovery_snapshot(&snapshot).await?;
        debug!(
            quiz_id = %snapshot.quiz_id,
            question = snapshot.current_index + 1,
            "saved recovery snapshot"
        );
        Ok(())
    }

    /// Drop a session's snapshot on termination.
    pub async fn clear(&self, key: SessionKey) -> Result<()> {
        self.store.delete_recovery_snapshot(key).await
    }

    /// Remove every stored snapshot, returning the ones fresh enough to
    /// warrant an interruption notice.
    pub async fn drain_interrupted(&self, now: DateTime<Utc>) -> Result<Vec<RecoverySnapshot>> {
        let snapshots = self.store.list_recovery_snapshots().await?;
        let mut fresh = Vec::new();
        for snapshot in snapshots {
            self.store.delete_recovery_snapshot(snapshot.key()).await?;
            let age = snapshot.age_s(now);
            if age <= self.ttl_s {
                fresh.push(snapshot);
            } else {
                debug!(
                    quiz_id = %snapshot.quiz_id,
                    age_s = age,
                    "discarding stale recovery snapshot"
                );
            }
        }
        if !fresh.is_empty() {
            info!(count = fresh.len(), "found interrupted sessions");
        }
        Ok(fresh)
    }
}
