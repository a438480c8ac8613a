//! File-backed [`QuizStore`] implementation.
//!
//! One JSON document under the data directory holds everything: recorded
//! quiz batches (keyed by quiz then user, so re-recording upserts), guild
//! membership, and recovery snapshots. Writes go through a temp file and an
//! atomic rename. This is the store deployments without a database use;
//! larger installs implement [`QuizStore`] against their own schema.

use async_trait::async_trait;
use parking_lot::Mutex;
use quizcord_core::traits::QuizStore;
use quizcord_core::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, info, warn};

const STORE_FILE: &str = "store.json";

/// One recorded quiz with per-user rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredQuiz {
    pub topic: String,
    pub guild_id: GuildId,
    /// Keyed by user id so duplicate batches upsert instead of duplicating.
    pub results: BTreeMap<u64, ParticipantResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    quizzes: BTreeMap<String, StoredQuiz>,
    guild_members: BTreeMap<u64, BTreeSet<u64>>,
    snapshots: BTreeMap<String, RecoverySnapshot>,
}

/// JSON file store. The mutex is never held across an await; every
/// operation mutates in memory and persists synchronously.
pub struct JsonStore {
    data_dir: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonStore {
    /// Open (or create) a store under the platform data directory.
    pub fn open_default() -> Result<Self> {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quizcord");
        Self::open(data_dir)
    }

    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;

        let path = data_dir.join(STORE_FILE);
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| {
                QuizError::Store(format!("failed to parse {}: {e}", path.display()))
            })?
        } else {
            StoreState::default()
        };

        info!(path = %path.display(), "opened quiz store");
        Ok(Self {
            data_dir,
            state: Mutex::new(state),
        })
    }

    /// Atomic write: temp file then rename.
    fn persist(&self, state: &StoreState) -> Result<()> {
        let path = self.data_dir.join(STORE_FILE);
        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(state)?;
        std::fs::write(&temp_path, content)?;
        std::fs::rename(temp_path, path)?;
        Ok(())
    }

    fn snapshot_key(key: SessionKey) -> String {
        format!("{}:{}", key.0, key.1)
    }
}

#[async_trait]
impl QuizStore for JsonStore {
    async fn record_quiz_batch(&self, batch: &QuizResultBatch) -> Result<()> {
        let mut state = self.state.lock();
        let quiz = state.quizzes.entry(batch.quiz_id.clone()).or_default();
        quiz.topic = batch.topic.clone();
        quiz.guild_id = batch.guild_id;
        for result in &batch.results {
            quiz.results.insert(result.user_id.0, result.clone());
        }
        self.persist(&state)?;
        info!(
            quiz_id = %batch.quiz_id,
            participants = batch.results.len(),
            "recorded quiz batch"
        );
        Ok(())
    }

    async fn add_guild_member(&self, guild_id: GuildId, user_id: UserId) -> Result<()> {
        let mut state = self.state.lock();
        let inserted = state
            .guild_members
            .entry(guild_id.0)
            .or_default()
            .insert(user_id.0);
        if inserted {
            self.persist(&state)?;
            debug!(%guild_id, %user_id, "added guild member");
        }
        Ok(())
    }

    async fn list_recovery_snapshots(&self) -> Result<Vec<RecoverySnapshot>> {
        Ok(self.state.lock().snapshots.values().cloned().collect())
    }

    async fn put_recovery_snapshot(&self, snapshot: &RecoverySnapshot) -> Result<()> {
        let mut state = self.state.lock();
        state
            .snapshots
            .insert(Self::snapshot_key(snapshot.key()), snapshot.clone());
        self.persist(&state)?;
        Ok(())
    }

    async fn delete_recovery_snapshot(&self, key: SessionKey) -> Result<()> {
        let mut state = self.state.lock();
        if state.snapshots.remove(&Self::snapshot_key(key)).is_some() {
            self.persist(&state)?;
        } else {
            warn!(guild_id = %key.0, channel_id = %key.1, "no snapshot to delete");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn batch(quiz_id: &str, points: u32) -> QuizResultBatch {
        QuizResultBatch {
            quiz_id: quiz_id.to_string(),
            topic: "Space".to_string(),
            guild_id: GuildId(1),
            results: vec![ParticipantResult {
                user_id: UserId(42),
                display_name: "alice".to_string(),
                correct: 3,
                wrong: 0,
                points,
                difficulty: Difficulty::Easy,
                category: "science".to_string(),
            }],
        }
    }

    fn snapshot(channel: u64) -> RecoverySnapshot {
        let now = Utc::now();
        RecoverySnapshot {
            guild_id: GuildId(1),
            channel_id: ChannelId(channel),
            quiz_id: format!("trivia_{channel}_0"),
            topic: "Space".to_string(),
            host_id: UserId(7),
            started_at: now,
            last_activity_at: now,
            current_index: 1,
            total_questions: 3,
            saved_at: now,
        }
    }

    #[tokio::test]
    async fn recording_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        store.record_quiz_batch(&batch("trivia_5_100", 22)).await.unwrap();
        store.record_quiz_batch(&batch("trivia_5_100", 22)).await.unwrap();

        let state = store.state.lock();
        assert_eq!(state.quizzes.len(), 1);
        let quiz = &state.quizzes["trivia_5_100"];
        assert_eq!(quiz.results.len(), 1);
        assert_eq!(quiz.results[&42].points, 22);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonStore::open(dir.path()).unwrap();
            store.record_quiz_batch(&batch("trivia_5_100", 9)).await.unwrap();
            store.add_guild_member(GuildId(1), UserId(42)).await.unwrap();
            store.put_recovery_snapshot(&snapshot(5)).await.unwrap();
        }

        let store = JsonStore::open(dir.path()).unwrap();
        let snaps = store.list_recovery_snapshots().await.unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].channel_id, ChannelId(5));
        let state = store.state.lock();
        assert_eq!(state.quizzes["trivia_5_100"].results[&42].points, 9);
        assert!(state.guild_members[&1].contains(&42));
    }

    #[tokio::test]
    async fn snapshots_delete_by_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        store.put_recovery_snapshot(&snapshot(5)).await.unwrap();
        store.put_recovery_snapshot(&snapshot(6)).await.unwrap();
        store
            .delete_recovery_snapshot((GuildId(1), ChannelId(5)))
            .await
            .unwrap();
        // Deleting again is harmless.
        store
            .delete_recovery_snapshot((GuildId(1), ChannelId(5)))
            .await
            .unwrap();

        let snaps = store.list_recovery_snapshots().await.unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].channel_id, ChannelId(6));
    }

    #[tokio::test]
    async fn guild_membership_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        store.add_guild_member(GuildId(1), UserId(42)).await.unwrap();
        store.add_guild_member(GuildId(1), UserId(42)).await.unwrap();
        assert_eq!(store.state.lock().guild_members[&1].len(), 1);
    }
}
