//! Quiz, question, and result types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::session::Difficulty;

/// Allowed question-count bounds per generated quiz
pub const MIN_QUESTION_COUNT: usize = 1;
pub const MAX_QUESTION_COUNT: usize = 20;

/// Question formats a quiz may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "multiple-choice")]
    MultipleChoice,
    #[serde(rename = "true-false")]
    TrueFalse,
    #[serde(rename = "short-answer")]
    ShortAnswer,
}

/// A single validated quiz question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Unique within its quiz (synthesized as `q{n}` when the model omits one)
    pub id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Present only for multiple-choice questions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Compared case-insensitively at grading time
    pub correct_answer: String,
    pub explanation: String,
    pub points: u32,
}

impl QuizQuestion {
    /// Case-insensitive exact match against a submitted answer
    pub fn is_correct(&self, submitted: &str) -> bool {
        submitted.trim().eq_ignore_ascii_case(self.correct_answer.trim())
    }
}

/// A stored quiz
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub questions: Vec<QuizQuestion>,
    /// Epoch milliseconds
    pub created_at: i64,
}

impl Quiz {
    /// Sum of question points
    pub fn max_score(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }
}

/// One graded submission (append-only; resubmission produces a new record)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub quiz_id: String,
    pub score: u32,
    pub max_score: u32,
    /// 100 * score / max_score
    pub percentage: f64,
    /// Epoch milliseconds
    pub completed_at: i64,
    /// Question id -> submitted answer
    pub answers: HashMap<String, String>,
}
