//! Study state store
//!
//! Sole mutation path for per-user study data. Each user id owns one
//! mutex-guarded state cell, so that user's operations run one at a time in
//! arrival order while different users proceed independently. Every write
//! operation mutates in memory and persists the user's document before
//! returning.

pub mod persistence;
pub mod state;

pub use persistence::StatePersistence;
pub use state::UserState;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::errors::{Result, StudyError};
use crate::types::{
    ChatMessage, Difficulty, ProgressData, Quiz, QuizResult, SessionStatus, SpacedRepetitionItem,
    StudySession, TopicProgress, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES,
};

/// Per-user serialized access to study state
pub struct StudyStore {
    persistence: StatePersistence,
    cells: RwLock<HashMap<String, Arc<Mutex<UserState>>>>,
}

impl StudyStore {
    /// Open a store rooted at `storage_dir`
    pub fn open(storage_dir: PathBuf) -> Result<Self> {
        let persistence = StatePersistence::new(storage_dir)?;
        Ok(Self {
            persistence,
            cells: RwLock::new(HashMap::new()),
        })
    }

    /// Transcript for a session (empty if none)
    pub async fn chat_history(&self, user_id: &str, session_id: &str) -> Result<Vec<ChatMessage>> {
        let cell = self.cell(user_id).await?;
        let state = cell.lock().await;
        Ok(state.chat_history(session_id))
    }

    /// Append a user/assistant message pair to a session's transcript
    pub async fn append_chat_turn(
        &self,
        user_id: &str,
        session_id: &str,
        user_text: &str,
        ai_text: &str,
    ) -> Result<()> {
        let cell = self.cell(user_id).await?;
        let mut state = cell.lock().await;
        state.append_chat_turn(session_id, user_text, ai_text, now_ms());
        self.persist(user_id, &state)
    }

    /// Create a session and make it current
    pub async fn create_session(
        &self,
        user_id: &str,
        topic: &str,
        duration_minutes: u32,
        difficulty: Difficulty,
    ) -> Result<StudySession> {
        validate_topic(topic)?;
        validate_duration(duration_minutes)?;

        let now = now_ms();
        let session = StudySession {
            id: tagged_id("session", now),
            topic: topic.trim().to_string(),
            duration_minutes,
            difficulty,
            start_time: now,
            end_time: None,
            status: SessionStatus::Active,
        };

        let cell = self.cell(user_id).await?;
        let mut state = cell.lock().await;
        state.create_session(session.clone());
        self.persist(user_id, &state)?;

        debug!(user_id, session_id = %session.id, topic, "session created");
        Ok(session)
    }

    /// The most recently created session that is still active
    pub async fn current_session(&self, user_id: &str) -> Result<Option<StudySession>> {
        let cell = self.cell(user_id).await?;
        let state = cell.lock().await;
        Ok(state.current_session().cloned())
    }

    /// Complete a session and fold it into the aggregates
    ///
    /// Completing an unknown session id is a silent no-op.
    pub async fn complete_session(&self, user_id: &str, session_id: &str) -> Result<()> {
        let cell = self.cell(user_id).await?;
        let mut state = cell.lock().await;
        if state.complete_session(session_id, now_ms()) {
            self.persist(user_id, &state)?;
            debug!(user_id, session_id, "session completed");
        }
        Ok(())
    }

    /// Store a quiz by id
    pub async fn save_quiz(&self, user_id: &str, quiz: Quiz) -> Result<()> {
        let cell = self.cell(user_id).await?;
        let mut state = cell.lock().await;
        state.save_quiz(quiz);
        self.persist(user_id, &state)
    }

    /// Fetch a stored quiz
    pub async fn quiz(&self, user_id: &str, quiz_id: &str) -> Result<Option<Quiz>> {
        let cell = self.cell(user_id).await?;
        let state = cell.lock().await;
        Ok(state.quiz(quiz_id).cloned())
    }

    /// Grade a submission; unknown quiz ids are an error
    pub async fn submit_quiz(
        &self,
        user_id: &str,
        quiz_id: &str,
        answers: HashMap<String, String>,
    ) -> Result<QuizResult> {
        let cell = self.cell(user_id).await?;
        let mut state = cell.lock().await;
        let result = state.submit_quiz(quiz_id, answers, now_ms())?;
        self.persist(user_id, &state)?;

        debug!(user_id, quiz_id, score = result.score, "quiz submitted");
        Ok(result)
    }

    /// All graded submissions, in submission order
    pub async fn quiz_results(&self, user_id: &str) -> Result<Vec<QuizResult>> {
        let cell = self.cell(user_id).await?;
        let state = cell.lock().await;
        Ok(state.quiz_results().to_vec())
    }

    /// Full dashboard aggregate
    pub async fn overall_progress(&self, user_id: &str) -> Result<ProgressData> {
        let cell = self.cell(user_id).await?;
        let state = cell.lock().await;
        Ok(state.progress().clone())
    }

    /// Per-topic aggregates
    pub async fn topic_progress(&self, user_id: &str) -> Result<Vec<TopicProgress>> {
        let cell = self.cell(user_id).await?;
        let state = cell.lock().await;
        Ok(state.progress().topics.clone())
    }

    /// One topic's aggregate, if it exists yet
    pub async fn topic_progress_for(
        &self,
        user_id: &str,
        topic: &str,
    ) -> Result<Option<TopicProgress>> {
        let cell = self.cell(user_id).await?;
        let state = cell.lock().await;
        Ok(state.progress().topic(topic).cloned())
    }

    /// Overwrite a topic's mastery level (study-session workflow step)
    pub async fn record_mastery(&self, user_id: &str, topic: &str, level: f64) -> Result<()> {
        let cell = self.cell(user_id).await?;
        let mut state = cell.lock().await;
        state.record_mastery(topic, level);
        self.persist(user_id, &state)
    }

    /// Upsert the topic's spaced-repetition schedule
    pub async fn schedule_review(
        &self,
        user_id: &str,
        topic: &str,
        next_review: i64,
        interval_days: u32,
    ) -> Result<SpacedRepetitionItem> {
        let cell = self.cell(user_id).await?;
        let mut state = cell.lock().await;
        state.schedule_review(topic, next_review, interval_days);
        self.persist(user_id, &state)?;

        let item = state
            .review_queue
            .iter()
            .find(|i| i.topic == topic)
            .cloned()
            .ok_or_else(|| StudyError::Generic("review queue upsert lost its entry".to_string()))?;
        Ok(item)
    }

    /// Pending reviews, in insertion order
    pub async fn review_queue(&self, user_id: &str) -> Result<Vec<SpacedRepetitionItem>> {
        let cell = self.cell(user_id).await?;
        let state = cell.lock().await;
        Ok(state.review_queue.clone())
    }

    /// Get or lazily load the user's state cell
    async fn cell(&self, user_id: &str) -> Result<Arc<Mutex<UserState>>> {
        {
            let cells = self.cells.read().await;
            if let Some(cell) = cells.get(user_id) {
                return Ok(cell.clone());
            }
        }

        let mut cells = self.cells.write().await;
        // Another caller may have loaded it while we waited for the lock
        if let Some(cell) = cells.get(user_id) {
            return Ok(cell.clone());
        }

        let state = self.persistence.load(user_id)?;
        let cell = Arc::new(Mutex::new(state));
        cells.insert(user_id.to_string(), cell.clone());
        Ok(cell)
    }

    fn persist(&self, user_id: &str, state: &UserState) -> Result<()> {
        self.persistence.save(user_id, state)?;
        Ok(())
    }
}

/// Id of the form `{prefix}_{timestamp}_{9-char alphanumeric}`
pub(crate) fn tagged_id(prefix: &str, now_ms: i64) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("{}_{}_{}", prefix, now_ms, suffix)
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn validate_topic(topic: &str) -> Result<()> {
    if topic.trim().is_empty() {
        return Err(StudyError::invalid("topic", "must not be empty"));
    }
    Ok(())
}

fn validate_duration(duration_minutes: u32) -> Result<()> {
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
        return Err(StudyError::invalid(
            "duration",
            format!(
                "must be between {} and {} minutes",
                MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store() -> (StudyStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = StudyStore::open(temp_dir.path().to_path_buf()).unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_create_session_validates_input() {
        let (store, _temp) = open_store().await;

        let err = store
            .create_session("alice", "  ", 30, Difficulty::Beginner)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::InvalidInput { .. }));

        let err = store
            .create_session("alice", "Physics", 3, Difficulty::Beginner)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::InvalidInput { .. }));

        let err = store
            .create_session("alice", "Physics", 150, Difficulty::Beginner)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_session_roundtrip_and_pointer() {
        let (store, _temp) = open_store().await;

        let session = store
            .create_session("alice", "Physics", 30, Difficulty::Beginner)
            .await
            .unwrap();
        assert!(session.id.starts_with("session_"));

        let current = store.current_session("alice").await.unwrap().unwrap();
        assert_eq!(current.id, session.id);

        store.complete_session("alice", &session.id).await.unwrap();
        assert!(store.current_session("alice").await.unwrap().is_none());

        let progress = store.overall_progress("alice").await.unwrap();
        assert_eq!(progress.total_sessions, 1);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let (store, _temp) = open_store().await;

        store
            .create_session("alice", "Physics", 30, Difficulty::Beginner)
            .await
            .unwrap();

        let bob = store.overall_progress("bob").await.unwrap();
        assert_eq!(bob.total_sessions, 0);
    }

    #[tokio::test]
    async fn test_tagged_id_shape() {
        let id = tagged_id("quiz", 1_700_000_000_000);
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts[0], "quiz");
        assert_eq!(parts[1], "1700000000000");
        assert_eq!(parts[2].len(), 9);
    }
}
