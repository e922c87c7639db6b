//! studybuddy - Study Assistant Core
//!
//! Per-user study state, quiz generation/grading, and progress tracking on
//! top of local Ollama models.
//!
//! # Architecture
//!
//! - **Store**: one serialized state cell per user id, write-through JSON
//!   persistence, sole mutation path for progress data
//! - **Workflows**: durable, resumable step sequences for study sessions and
//!   quiz generation
//! - **Codec**: resilient parsing of model output into validated questions

pub mod cache;
pub mod codec;
pub mod config;
pub mod errors;
pub mod generator;
pub mod store;
pub mod tutor;
pub mod types;
pub mod workflow;

// Re-export commonly used types
pub use errors::{Result, StudyError};
pub use store::StudyStore;
pub use workflow::{
    QuizGenerationParams, QuizGenerationWorkflow, StudySessionParams, StudySessionWorkflow,
};
