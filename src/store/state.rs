//! Per-user state and its mutation rules
//!
//! Everything in this file is pure in-memory bookkeeping with explicit
//! timestamps; serialization and per-user locking live in the sibling
//! modules. This is the sole place aggregate invariants are enforced:
//! activity capping, streaks, mastery recomputation, and score averaging.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{Result, StudyError};
use crate::types::{
    ActivityEntry, ActivityKind, ChatMessage, ChatRole, ProgressData, Quiz, QuizResult,
    SpacedRepetitionItem, StudySession, SessionStatus, MAX_RECENT_ACTIVITY,
};

/// Complete state owned by one user id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserState {
    #[serde(default)]
    pub sessions: HashMap<String, StudySession>,
    #[serde(default)]
    pub chat_histories: HashMap<String, Vec<ChatMessage>>,
    #[serde(default)]
    pub quizzes: HashMap<String, Quiz>,
    #[serde(default)]
    pub quiz_results: Vec<QuizResult>,
    #[serde(default)]
    pub progress: ProgressData,
    #[serde(default)]
    pub review_queue: Vec<SpacedRepetitionItem>,
    /// Current-session pointer, refreshed on every creation
    #[serde(default)]
    pub active_session_id: Option<String>,
    /// UTC date of the most recent completed session, for streak upkeep
    #[serde(default)]
    last_completion_day: Option<NaiveDate>,
}

impl UserState {
    /// Transcript for a session, empty when none exists
    pub fn chat_history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.chat_histories
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Append a user message and the assistant reply as one turn
    ///
    /// The assistant message is stamped one millisecond after the user's so
    /// the pair keeps its order under any stable sort.
    pub fn append_chat_turn(
        &mut self,
        session_id: &str,
        user_text: &str,
        ai_text: &str,
        now_ms: i64,
    ) {
        let history = self
            .chat_histories
            .entry(session_id.to_string())
            .or_default();

        history.push(ChatMessage {
            role: ChatRole::User,
            content: user_text.to_string(),
            timestamp: now_ms,
        });
        history.push(ChatMessage {
            role: ChatRole::Assistant,
            content: ai_text.to_string(),
            timestamp: now_ms + 1,
        });
    }

    /// Store a new session and make it current
    pub fn create_session(&mut self, session: StudySession) {
        self.record_activity(
            ActivityKind::Session,
            &session.topic,
            format!("Started studying {}", session.topic),
            session.start_time,
        );
        self.progress.total_sessions += 1;
        self.active_session_id = Some(session.id.clone());
        self.sessions.insert(session.id.clone(), session);
    }

    /// The pointed-to session, as long as it is still active
    pub fn current_session(&self) -> Option<&StudySession> {
        let id = self.active_session_id.as_deref()?;
        self.sessions.get(id).filter(|s| s.is_active())
    }

    /// Mark a session completed and fold it into the aggregates
    ///
    /// Unknown ids are a silent no-op. Returns whether anything changed.
    pub fn complete_session(&mut self, session_id: &str, now_ms: i64) -> bool {
        let session = match self.sessions.get_mut(session_id) {
            Some(s) => s,
            None => return false,
        };
        if session.status == SessionStatus::Completed {
            return false;
        }

        session.status = SessionStatus::Completed;
        session.end_time = Some(now_ms);

        let topic = session.topic.clone();
        let elapsed_minutes = (now_ms - session.start_time).max(0) as f64 / 60_000.0;

        self.progress.total_study_time += elapsed_minutes;

        let quiz_average = self.topic_quiz_average(&topic);
        let entry = self.progress.topic_mut(&topic);
        entry.time_spent += elapsed_minutes;
        entry.sessions_count += 1;
        entry.last_studied = now_ms;
        entry.quiz_average = quiz_average;
        entry.recompute_mastery();

        self.update_streak(now_ms);

        if self.active_session_id.as_deref() == Some(session_id) {
            self.repoint_active_session();
        }

        true
    }

    /// Store a quiz by id (overwrites on retry)
    pub fn save_quiz(&mut self, quiz: Quiz) {
        self.quizzes.insert(quiz.id.clone(), quiz);
    }

    pub fn quiz(&self, quiz_id: &str) -> Option<&Quiz> {
        self.quizzes.get(quiz_id)
    }

    /// Grade a submission and append the result
    ///
    /// Deliberately not idempotent: submitting the same answers twice yields
    /// two independent results, and both count toward the averages.
    pub fn submit_quiz(
        &mut self,
        quiz_id: &str,
        answers: HashMap<String, String>,
        now_ms: i64,
    ) -> Result<QuizResult> {
        let quiz = self
            .quizzes
            .get(quiz_id)
            .ok_or_else(|| StudyError::QuizNotFound(quiz_id.to_string()))?;

        let mut score = 0u32;
        for question in &quiz.questions {
            if let Some(submitted) = answers.get(&question.id) {
                if question.is_correct(submitted) {
                    score += question.points;
                }
            }
        }

        let max_score = quiz.max_score();
        let percentage = if max_score > 0 {
            100.0 * f64::from(score) / f64::from(max_score)
        } else {
            0.0
        };
        let topic = quiz.topic.clone();

        let result = QuizResult {
            quiz_id: quiz_id.to_string(),
            score,
            max_score,
            percentage,
            completed_at: now_ms,
            answers,
        };
        self.quiz_results.push(result.clone());

        self.progress.total_quizzes += 1;
        self.progress.average_score = mean(self.quiz_results.iter().map(|r| r.percentage));

        self.record_activity(
            ActivityKind::Quiz,
            &topic,
            format!("Scored {:.0}% on a {} quiz", percentage, topic),
            now_ms,
        );

        let quiz_average = self.topic_quiz_average(&topic);
        let entry = self.progress.topic_mut(&topic);
        entry.quiz_average = quiz_average;
        entry.recompute_mastery();

        Ok(result)
    }

    pub fn quiz_results(&self) -> &[QuizResult] {
        &self.quiz_results
    }

    pub fn progress(&self) -> &ProgressData {
        &self.progress
    }

    /// Overwrite a topic's mastery level (workflow mastery updates)
    pub fn record_mastery(&mut self, topic: &str, level: f64) {
        let entry = self.progress.topic_mut(topic);
        entry.mastery_level = level.clamp(0.0, 100.0);
    }

    /// Upsert the topic's spaced-repetition entry
    ///
    /// First insert starts at ease factor 2.5 and one repetition; later calls
    /// replace the schedule and bump the repetition count.
    pub fn schedule_review(&mut self, topic: &str, next_review: i64, interval_days: u32) {
        if let Some(item) = self.review_queue.iter_mut().find(|i| i.topic == topic) {
            item.next_review = next_review;
            item.interval_days = interval_days;
            item.repetitions += 1;
        } else {
            self.review_queue.push(SpacedRepetitionItem {
                topic: topic.to_string(),
                next_review,
                interval_days,
                ease_factor: 2.5,
                repetitions: 1,
            });
        }
    }

    /// Mean percentage over results belonging to this topic's quizzes
    fn topic_quiz_average(&self, topic: &str) -> f64 {
        mean(
            self.quiz_results
                .iter()
                .filter(|r| {
                    self.quizzes
                        .get(&r.quiz_id)
                        .map(|q| q.topic == topic)
                        .unwrap_or(false)
                })
                .map(|r| r.percentage),
        )
    }

    /// Prepend a dashboard entry, truncating the oldest past the cap
    fn record_activity(&mut self, kind: ActivityKind, topic: &str, detail: String, now_ms: i64) {
        self.progress.recent_activity.insert(
            0,
            ActivityEntry {
                kind,
                topic: topic.to_string(),
                detail,
                timestamp: now_ms,
            },
        );
        self.progress.recent_activity.truncate(MAX_RECENT_ACTIVITY);
    }

    /// Streak rule: consecutive UTC calendar days with ≥1 completed session
    fn update_streak(&mut self, now_ms: i64) {
        let today = match DateTime::<Utc>::from_timestamp_millis(now_ms) {
            Some(dt) => dt.date_naive(),
            None => return,
        };

        self.progress.current_streak = match self.last_completion_day {
            Some(last) if last == today => self.progress.current_streak,
            Some(last) if last + ChronoDuration::days(1) == today => {
                self.progress.current_streak + 1
            }
            _ => 1,
        };
        self.progress.longest_streak = self
            .progress
            .longest_streak
            .max(self.progress.current_streak);
        self.last_completion_day = Some(today);
    }

    /// After completing the current session, point at the newest remaining
    /// active one (creation order, last wins)
    fn repoint_active_session(&mut self) {
        self.active_session_id = self
            .sessions
            .values()
            .filter(|s| s.is_active())
            .max_by_key(|s| (s.start_time, s.id.clone()))
            .map(|s| s.id.clone());
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0u32;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}
