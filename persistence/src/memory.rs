//! In-memory [`QuizStore`] for tests and ephemeral deployments.

use async_trait::async_trait;
use parking_lot::Mutex;
use quizcord_core::traits::QuizStore;
use quizcord_core::types::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use crate::store::StoredQuiz;

/// Same shape as the JSON store, minus the file. Exposes inspection helpers
/// so tests can assert on what the engine persisted, and a failure toggle to
/// exercise the recorder-failed path.
#[derive(Default)]
pub struct MemoryStore {
    quizzes: Mutex<BTreeMap<String, StoredQuiz>>,
    guild_members: Mutex<BTreeMap<u64, BTreeSet<u64>>>,
    snapshots: Mutex<BTreeMap<String, RecoverySnapshot>>,
    record_calls: AtomicUsize,
    fail_recording: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot_key(key: SessionKey) -> String {
        format!("{}:{}", key.0, key.1)
    }

    /// Make every subsequent `record_quiz_batch` fail.
    pub fn fail_recording(&self, fail: bool) {
        self.fail_recording.store(fail, Ordering::SeqCst);
    }

    pub fn record_call_count(&self) -> usize {
        self.record_calls.load(Ordering::SeqCst)
    }

    pub fn quiz(&self, quiz_id: &str) -> Option<StoredQuiz> {
        self.quizzes.lock().get(quiz_id).cloned()
    }

    pub fn quiz_ids(&self) -> Vec<String> {
        self.quizzes.lock().keys().cloned().collect()
    }

    pub fn points_for(&self, quiz_id: &str, user_id: UserId) -> Option<u32> {
        self.quizzes
            .lock()
            .get(quiz_id)
            .and_then(|q| q.results.get(&user_id.0))
            .map(|r| r.points)
    }

    pub fn is_guild_member(&self, guild_id: GuildId, user_id: UserId) -> bool {
        self.guild_members
            .lock()
            .get(&guild_id.0)
            .is_some_and(|members| members.contains(&user_id.0))
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().len()
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn record_quiz_batch(&self, batch: &QuizResultBatch) -> Result<()> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_recording.load(Ordering::SeqCst) {
            return Err(QuizError::Store("simulated store outage".to_string()));
        }
        let mut quizzes = self.quizzes.lock();
        let quiz = quizzes.entry(batch.quiz_id.clone()).or_default();
        quiz.topic = batch.topic.clone();
        quiz.guild_id = batch.guild_id;
        for result in &batch.results {
            quiz.results.insert(result.user_id.0, result.clone());
        }
        debug!(quiz_id = %batch.quiz_id, "recorded quiz batch in memory");
        Ok(())
    }

    async fn add_guild_member(&self, guild_id: GuildId, user_id: UserId) -> Result<()> {
        self.guild_members
            .lock()
            .entry(guild_id.0)
            .or_default()
            .insert(user_id.0);
        Ok(())
    }

    async fn list_recovery_snapshots(&self) -> Result<Vec<RecoverySnapshot>> {
        Ok(self.snapshots.lock().values().cloned().collect())
    }

    async fn put_recovery_snapshot(&self, snapshot: &RecoverySnapshot) -> Result<()> {
        self.snapshots
            .lock()
            .insert(Self::snapshot_key(snapshot.key()), snapshot.clone());
        Ok(())
    }

    async fn delete_recovery_snapshot(&self, key: SessionKey) -> Result<()> {
        self.snapshots.lock().remove(&Self::snapshot_key(key));
        Ok(())
    }
}
