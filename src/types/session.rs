//! Study session and chat transcript types

use serde::{Deserialize, Serialize};

/// Allowed session length bounds, in minutes
pub const MIN_DURATION_MINUTES: u32 = 5;
pub const MAX_DURATION_MINUTES: u32 = 120;

/// Session difficulty levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Lowercase name as used in prompts and cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Paused,
}

/// A single study session owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySession {
    pub id: String,
    pub topic: String,
    /// Planned length in minutes (5–120)
    pub duration_minutes: u32,
    pub difficulty: Difficulty,
    /// Epoch milliseconds
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub status: SessionStatus,
}

impl StudySession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Chat roles in a tutoring transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// One message in a session's transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Epoch milliseconds; user/assistant pairs are stamped t and t+1
    pub timestamp: i64,
}
