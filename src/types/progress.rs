//! Per-user progress aggregates and the spaced-repetition queue

use serde::{Deserialize, Serialize};

/// Upper bound on retained activity entries
pub const MAX_RECENT_ACTIVITY: usize = 50;

/// Kinds of dashboard activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Session,
    Quiz,
}

/// One dashboard activity entry, newest first in `ProgressData::recent_activity`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub kind: ActivityKind,
    pub topic: String,
    pub detail: String,
    /// Epoch milliseconds
    pub timestamp: i64,
}

/// Per-topic aggregate of study effort and quiz performance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicProgress {
    pub topic: String,
    /// 0–100, recomputed as min(100, sessions_count*10 + quiz_average*0.5)
    pub mastery_level: f64,
    /// Cumulative minutes
    pub time_spent: f64,
    pub sessions_count: u32,
    /// Mean percentage across this topic's quiz results
    pub quiz_average: f64,
    /// Epoch milliseconds
    pub last_studied: i64,
}

impl TopicProgress {
    /// Fresh aggregate for a topic never studied before
    pub fn new(topic: &str) -> Self {
        TopicProgress {
            topic: topic.to_string(),
            mastery_level: 0.0,
            time_spent: 0.0,
            sessions_count: 0,
            quiz_average: 0.0,
            last_studied: 0,
        }
    }

    /// Mastery formula shared by session completion and quiz grading
    pub fn recompute_mastery(&mut self) {
        let level = f64::from(self.sessions_count) * 10.0 + self.quiz_average * 0.5;
        self.mastery_level = level.min(100.0);
    }
}

/// A scheduled future review of a topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpacedRepetitionItem {
    pub topic: String,
    /// Epoch milliseconds
    pub next_review: i64,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub repetitions: u32,
}

/// Whole-dashboard aggregate for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressData {
    /// Minutes, accumulated across completed sessions
    pub total_study_time: f64,
    pub total_sessions: u32,
    pub total_quizzes: u32,
    /// Mean percentage over every stored quiz result
    pub average_score: f64,
    /// Consecutive UTC calendar days with at least one completed session
    pub current_streak: u32,
    pub longest_streak: u32,
    pub topics: Vec<TopicProgress>,
    /// Most-recent-first, capped at `MAX_RECENT_ACTIVITY`
    pub recent_activity: Vec<ActivityEntry>,
}

impl Default for ProgressData {
    fn default() -> Self {
        ProgressData {
            total_study_time: 0.0,
            total_sessions: 0,
            total_quizzes: 0,
            average_score: 0.0,
            current_streak: 0,
            longest_streak: 0,
            topics: Vec::new(),
            recent_activity: Vec::new(),
        }
    }
}

impl ProgressData {
    /// Borrow a topic's aggregate, if it exists
    pub fn topic(&self, topic: &str) -> Option<&TopicProgress> {
        self.topics.iter().find(|t| t.topic == topic)
    }

    /// Mutable access, creating the aggregate on first use
    pub fn topic_mut(&mut self, topic: &str) -> &mut TopicProgress {
        if let Some(idx) = self.topics.iter().position(|t| t.topic == topic) {
            &mut self.topics[idx]
        } else {
            self.topics.push(TopicProgress::new(topic));
            self.topics.last_mut().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mastery_is_capped() {
        let mut progress = TopicProgress::new("Calculus");
        progress.sessions_count = 12;
        progress.quiz_average = 90.0;
        progress.recompute_mastery();
        assert_eq!(progress.mastery_level, 100.0);
    }

    #[test]
    fn test_mastery_formula() {
        let mut progress = TopicProgress::new("Calculus");
        progress.sessions_count = 3;
        progress.quiz_average = 80.0;
        progress.recompute_mastery();
        assert_eq!(progress.mastery_level, 70.0);
    }

    #[test]
    fn test_topic_mut_creates_once() {
        let mut data = ProgressData::default();
        data.topic_mut("Physics").sessions_count = 1;
        data.topic_mut("Physics").sessions_count += 1;
        assert_eq!(data.topics.len(), 1);
        assert_eq!(data.topic("Physics").unwrap().sessions_count, 2);
    }
}
