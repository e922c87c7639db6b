//! Quiz generation workflow
//!
//! Seven checkpointed stages: analyze prior progress, identify key concepts,
//! generate (or reuse cached) questions, validate, build the answer key,
//! persist the quiz, and finalize. Generator failures degrade to
//! deterministic fallback content; only the persist stage is fatal.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::KvCache;
use crate::codec;
use crate::errors::{Result, StudyError};
use crate::generator::{GenMessage, TextGenerator};
use crate::store::{now_ms, tagged_id, StudyStore};
use crate::types::{Difficulty, Quiz, QuizQuestion, MAX_QUESTION_COUNT, MIN_QUESTION_COUNT};
use crate::workflow::{RunContext, RunRecord, WorkflowJournal, WorkflowKind};

/// Cached question lists live for one hour
const QUESTION_CACHE_TTL_SECS: u64 = 3600;

/// Rough completion estimate per question, in minutes
const MINUTES_PER_QUESTION: usize = 2;

/// Trigger payload for one quiz generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizGenerationParams {
    pub topic: String,
    pub question_count: usize,
    pub difficulty: Difficulty,
    pub user_id: String,
}

/// Final result handed back to the trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizGenerationOutcome {
    pub success: bool,
    pub run_id: String,
    pub quiz_id: String,
    pub quiz: Quiz,
    pub total_points: u32,
    pub estimated_time_minutes: usize,
    /// Question id -> correct answer
    pub answer_key: HashMap<String, String>,
    pub key_concepts: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ContentAnalysis {
    mastery_level: f64,
    sessions_count: u32,
    quiz_average: f64,
}

/// Orchestrates quiz generation against the store, generator, and cache
pub struct QuizGenerationWorkflow {
    store: Arc<StudyStore>,
    generator: Arc<dyn TextGenerator>,
    cache: Arc<dyn KvCache>,
    journal: Arc<WorkflowJournal>,
}

impl QuizGenerationWorkflow {
    pub fn new(
        store: Arc<StudyStore>,
        generator: Arc<dyn TextGenerator>,
        cache: Arc<dyn KvCache>,
        journal: Arc<WorkflowJournal>,
    ) -> Self {
        Self {
            store,
            generator,
            cache,
            journal,
        }
    }

    /// Start a fresh run
    pub async fn run(&self, params: QuizGenerationParams) -> Result<QuizGenerationOutcome> {
        validate_params(&params)?;
        let record = RunRecord::new(
            WorkflowKind::QuizGeneration,
            &params.user_id,
            serde_json::to_value(&params)?,
        );
        self.execute(record, params).await
    }

    /// Re-enter a journaled run, skipping completed steps
    pub async fn resume(&self, run_id: &str) -> Result<QuizGenerationOutcome> {
        let record = self.journal.load(run_id)?;
        let params: QuizGenerationParams = serde_json::from_value(record.params.clone())?;
        self.execute(record, params).await
    }

    async fn execute(
        &self,
        record: RunRecord,
        params: QuizGenerationParams,
    ) -> Result<QuizGenerationOutcome> {
        let mut ctx = RunContext::new(&self.journal, record);

        let _analysis = ctx
            .step("analyze_content", || async {
                let existing = self
                    .store
                    .topic_progress_for(&params.user_id, &params.topic)
                    .await?;
                Ok(match existing {
                    Some(topic) => ContentAnalysis {
                        mastery_level: topic.mastery_level,
                        sessions_count: topic.sessions_count,
                        quiz_average: topic.quiz_average,
                    },
                    None => ContentAnalysis::default(),
                })
            })
            .await?;

        let key_concepts = ctx
            .step("identify_key_concepts", || async {
                Ok(self.identify_key_concepts(&params).await)
            })
            .await?;

        let questions = ctx
            .step("generate_questions", || async {
                Ok(self.generate_questions(&params, &key_concepts).await)
            })
            .await?;

        let validated = ctx
            .step("validate_quality", || async {
                Ok(codec::revalidate(questions.clone(), params.question_count))
            })
            .await?;

        let answer_key = ctx
            .step("build_answer_key", || async {
                Ok(validated
                    .iter()
                    .map(|q| (q.id.clone(), q.correct_answer.clone()))
                    .collect::<HashMap<String, String>>())
            })
            .await?;

        let quiz = ctx
            .step("persist_quiz", || async {
                let quiz = Quiz {
                    id: tagged_id("quiz", now_ms()),
                    topic: params.topic.clone(),
                    difficulty: params.difficulty,
                    questions: validated.clone(),
                    created_at: now_ms(),
                };
                self.store.save_quiz(&params.user_id, quiz.clone()).await?;
                Ok(quiz)
            })
            .await?;

        let record = ctx.finish()?;
        let total_points = quiz.max_score();
        let estimated_time_minutes = quiz.questions.len() * MINUTES_PER_QUESTION;

        Ok(QuizGenerationOutcome {
            success: true,
            run_id: record.id,
            quiz_id: quiz.id.clone(),
            quiz,
            total_points,
            estimated_time_minutes,
            answer_key,
            key_concepts,
        })
    }

    /// Ask for comma-separated concepts, falling back to templated ones
    async fn identify_key_concepts(&self, params: &QuizGenerationParams) -> Vec<String> {
        let prompt = format!(
            "List 5 to 10 key concepts a {} learner should be quizzed on for {}. \
             Reply with one comma-separated line, no numbering.",
            params.difficulty.as_str(),
            params.topic
        );
        let messages = [
            GenMessage::system("You are a curriculum expert."),
            GenMessage::user(prompt),
        ];

        let concepts = match self.generator.generate(&messages, 200, 0.7).await {
            Ok(text) => text
                .split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect(),
            Err(e) => {
                warn!(topic = %params.topic, error = %e, "concept generation failed, using templates");
                Vec::new()
            }
        };

        if concepts.is_empty() {
            fallback_concepts(&params.topic)
        } else {
            concepts
        }
    }

    /// Reuse cached questions when possible; otherwise generate and cache
    async fn generate_questions(
        &self,
        params: &QuizGenerationParams,
        key_concepts: &[String],
    ) -> Vec<QuizQuestion> {
        let cache_key = format!(
            "quiz:{}:{}:{}",
            params.topic,
            params.difficulty.as_str(),
            params.question_count
        );

        if let Some(value) = self.cache.get(&cache_key).await {
            if let Ok(questions) = serde_json::from_value::<Vec<QuizQuestion>>(value) {
                debug!(%cache_key, "reusing cached question list");
                return questions;
            }
        }

        let prompt = format!(
            "Create {} quiz questions on {} at {} difficulty covering these concepts: {}. \
             Respond with JSON only, shaped as {{\"questions\": [{{\"id\": \"q1\", \
             \"question\": \"...\", \"type\": \"multiple-choice|true-false|short-answer\", \
             \"options\": [\"...\"], \"correctAnswer\": \"...\", \"explanation\": \"...\", \
             \"points\": 10}}]}}.",
            params.question_count,
            params.topic,
            params.difficulty.as_str(),
            key_concepts.join(", ")
        );
        let messages = [
            GenMessage::system("You are a quiz generator."),
            GenMessage::user(prompt),
        ];

        match self.generator.generate(&messages, 2500, 0.8).await {
            Ok(text) => {
                let questions = codec::decode_questions(
                    &text,
                    params.question_count,
                    &params.topic,
                    key_concepts,
                );
                if let Ok(value) = serde_json::to_value(&questions) {
                    self.cache
                        .put(&cache_key, value, QUESTION_CACHE_TTL_SECS)
                        .await;
                }
                questions
            }
            Err(e) => {
                warn!(topic = %params.topic, error = %e, "question generation failed, using fallback");
                codec::fallback_questions(params.question_count, &params.topic, key_concepts)
            }
        }
    }
}

fn fallback_concepts(topic: &str) -> Vec<String> {
    vec![
        format!("{} fundamentals", topic),
        format!("Core principles of {}", topic),
        format!("Practical applications of {}", topic),
    ]
}

fn validate_params(params: &QuizGenerationParams) -> Result<()> {
    if params.topic.trim().is_empty() {
        return Err(StudyError::invalid("topic", "must not be empty"));
    }
    if !(MIN_QUESTION_COUNT..=MAX_QUESTION_COUNT).contains(&params.question_count) {
        return Err(StudyError::invalid(
            "question_count",
            format!(
                "must be between {} and {}",
                MIN_QUESTION_COUNT, MAX_QUESTION_COUNT
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_concepts_reference_topic() {
        let concepts = fallback_concepts("Calculus");
        assert_eq!(concepts.len(), 3);
        assert!(concepts.iter().all(|c| c.contains("Calculus")));
    }

    #[test]
    fn test_param_validation_bounds() {
        let params = QuizGenerationParams {
            topic: "Calculus".to_string(),
            question_count: 0,
            difficulty: Difficulty::Beginner,
            user_id: "alice".to_string(),
        };
        assert!(validate_params(&params).is_err());

        let params = QuizGenerationParams {
            question_count: 21,
            ..params
        };
        assert!(validate_params(&params).is_err());

        let params = QuizGenerationParams {
            question_count: 10,
            ..params
        };
        assert!(validate_params(&params).is_ok());
    }
}
