//! Core data model for the study assistant
//!
//! Sessions, chat transcripts, quizzes, and per-user progress aggregates.

pub mod progress;
pub mod quiz;
pub mod session;

pub use progress::{
    ActivityEntry, ActivityKind, ProgressData, SpacedRepetitionItem, TopicProgress,
    MAX_RECENT_ACTIVITY,
};
pub use quiz::{Quiz, QuizQuestion, QuizResult, QuestionType, MAX_QUESTION_COUNT, MIN_QUESTION_COUNT};
pub use session::{
    ChatMessage, ChatRole, Difficulty, SessionStatus, StudySession, MAX_DURATION_MINUTES,
    MIN_DURATION_MINUTES,
};
