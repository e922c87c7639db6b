//! Study session workflow
//!
//! Seven checkpointed stages: initialize, load prior progress, compute the
//! learning path, suspend for the session duration, summarize, update
//! mastery, and schedule the next spaced-repetition review. The duration wait
//! is the only suspension point; everything after it degrades gracefully
//! except store writes.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::errors::{Result, StudyError};
use crate::generator::{GenMessage, TextGenerator};
use crate::store::{now_ms, StudyStore};
use crate::types::{Difficulty, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES};
use crate::workflow::{RunContext, RunRecord, WorkflowJournal, WorkflowKind};

const DAY_MS: i64 = 86_400_000;

/// Trigger payload for one study session run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySessionParams {
    pub session_id: String,
    pub topic: String,
    pub duration_minutes: u32,
    pub difficulty: Difficulty,
    pub user_id: String,
}

/// Classification of how the session should be taught
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningApproach {
    Introduction,
    Reinforcement,
    Advanced,
}

impl LearningApproach {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningApproach::Introduction => "introduction",
            LearningApproach::Reinforcement => "reinforcement",
            LearningApproach::Advanced => "advanced",
        }
    }
}

/// Learning path computed from prior progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPath {
    pub approach: LearningApproach,
    pub focus_areas: Vec<String>,
    pub suggested_duration: u32,
}

/// Mastery movement produced by one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryUpdate {
    pub topic: String,
    pub previous_level: f64,
    pub new_level: f64,
    pub increase: f64,
}

/// Next scheduled review for the session's topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepetitionSchedule {
    pub topic: String,
    /// Epoch milliseconds
    pub next_review: i64,
    pub interval_days: u32,
    pub mastery_level: f64,
}

/// Final result handed back to the trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySessionOutcome {
    pub success: bool,
    pub run_id: String,
    pub session_id: String,
    pub summary: String,
    pub mastery: MasteryUpdate,
    pub repetition: RepetitionSchedule,
    pub learning_path: LearningPath,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InitRecord {
    session_id: String,
    topic: String,
    /// Epoch milliseconds
    started_at: i64,
    status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PriorProgress {
    mastery_level: f64,
    time_spent: f64,
    sessions_count: u32,
}

/// Orchestrates study session runs against the store and the generator
pub struct StudySessionWorkflow {
    store: Arc<StudyStore>,
    generator: Arc<dyn TextGenerator>,
    journal: Arc<WorkflowJournal>,
}

impl StudySessionWorkflow {
    pub fn new(
        store: Arc<StudyStore>,
        generator: Arc<dyn TextGenerator>,
        journal: Arc<WorkflowJournal>,
    ) -> Self {
        Self {
            store,
            generator,
            journal,
        }
    }

    /// Start a fresh run
    pub async fn run(&self, params: StudySessionParams) -> Result<StudySessionOutcome> {
        validate_params(&params)?;
        let record = RunRecord::new(
            WorkflowKind::StudySession,
            &params.user_id,
            serde_json::to_value(&params)?,
        );
        self.execute(record, params).await
    }

    /// Re-enter a journaled run, skipping completed steps
    pub async fn resume(&self, run_id: &str) -> Result<StudySessionOutcome> {
        let record = self.journal.load(run_id)?;
        let params: StudySessionParams = serde_json::from_value(record.params.clone())?;
        self.execute(record, params).await
    }

    async fn execute(
        &self,
        record: RunRecord,
        params: StudySessionParams,
    ) -> Result<StudySessionOutcome> {
        let mut ctx = RunContext::new(&self.journal, record);

        let init = ctx
            .step("initialize", || async {
                Ok(InitRecord {
                    session_id: params.session_id.clone(),
                    topic: params.topic.clone(),
                    started_at: now_ms(),
                    status: "initialized".to_string(),
                })
            })
            .await?;

        let prior = ctx
            .step("load_progress", || async {
                let existing = self
                    .store
                    .topic_progress_for(&params.user_id, &params.topic)
                    .await?;
                Ok(match existing {
                    Some(topic) => PriorProgress {
                        mastery_level: topic.mastery_level,
                        time_spent: topic.time_spent,
                        sessions_count: topic.sessions_count,
                    },
                    None => PriorProgress::default(),
                })
            })
            .await?;

        let learning_path = ctx
            .step("compute_learning_path", || async {
                Ok(compute_learning_path(&prior, params.duration_minutes))
            })
            .await?;

        // The session itself: suspend until the planned duration has elapsed
        let resume_at = ctx
            .step("await_duration", || async {
                Ok(init.started_at + i64::from(params.duration_minutes) * 60_000)
            })
            .await?;
        ctx.wait_until(resume_at).await;

        let summary = ctx
            .step("generate_summary", || async {
                Ok(self.summarize(&params, learning_path.approach).await)
            })
            .await?;

        let mastery = ctx
            .step("update_mastery", || async {
                let new_level = next_mastery_level(prior.mastery_level, params.duration_minutes);
                self.store
                    .record_mastery(&params.user_id, &params.topic, new_level)
                    .await?;
                Ok(MasteryUpdate {
                    topic: params.topic.clone(),
                    previous_level: prior.mastery_level,
                    new_level,
                    increase: new_level - prior.mastery_level,
                })
            })
            .await?;

        let repetition = ctx
            .step("schedule_repetition", || async {
                let interval_days = repetition_interval(mastery.new_level);
                let next_review = now_ms() + i64::from(interval_days) * DAY_MS;
                self.store
                    .schedule_review(&params.user_id, &params.topic, next_review, interval_days)
                    .await?;
                Ok(RepetitionSchedule {
                    topic: params.topic.clone(),
                    next_review,
                    interval_days,
                    mastery_level: mastery.new_level,
                })
            })
            .await?;

        let record = ctx.finish()?;
        Ok(StudySessionOutcome {
            success: true,
            run_id: record.id,
            session_id: params.session_id,
            summary,
            mastery,
            repetition,
            learning_path,
        })
    }

    /// Summarize the session, falling back to a template on generator failure
    async fn summarize(&self, params: &StudySessionParams, approach: LearningApproach) -> String {
        let history = self
            .store
            .chat_history(&params.user_id, &params.session_id)
            .await
            .unwrap_or_default();

        let prompt = format!(
            "Summarize a {}-minute study session on {}. The learner followed an {} \
             approach and exchanged {} chat messages. Highlight what was covered and \
             one suggestion for next time.",
            params.duration_minutes,
            params.topic,
            approach.as_str(),
            history.len()
        );
        let messages = [
            GenMessage::system("You are a study session summarizer."),
            GenMessage::user(prompt),
        ];

        match self.generator.generate(&messages, 300, 0.7).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(topic = %params.topic, error = %e, "summary generation failed, using template");
                format!(
                    "Completed {}-minute study session on {}.",
                    params.duration_minutes, params.topic
                )
            }
        }
    }
}

/// Classify the session by prior exposure and attach its focus areas
fn compute_learning_path(prior: &PriorProgress, duration_minutes: u32) -> LearningPath {
    let approach = if prior.sessions_count == 0 {
        LearningApproach::Introduction
    } else if prior.mastery_level < 50.0 {
        LearningApproach::Reinforcement
    } else {
        LearningApproach::Advanced
    };

    let focus_areas = match approach {
        LearningApproach::Introduction => vec![
            "Fundamental concepts and definitions",
            "Basic principles",
            "Simple worked examples",
            "Key terminology",
        ],
        LearningApproach::Reinforcement => vec![
            "Review of core concepts",
            "Practice problems",
            "Common misconceptions",
            "Real-world applications",
        ],
        LearningApproach::Advanced => vec![
            "Advanced aspects",
            "Complex scenarios",
            "Edge cases",
            "Integration with related topics",
        ],
    }
    .into_iter()
    .map(String::from)
    .collect();

    LearningPath {
        approach,
        focus_areas,
        suggested_duration: duration_minutes,
    }
}

/// Session gain: +5 base plus one point per 10 minutes, capped at +10, total capped at 100
fn next_mastery_level(previous: f64, duration_minutes: u32) -> f64 {
    let duration_bonus = f64::from((duration_minutes / 10).min(10));
    (previous + 5.0 + duration_bonus).min(100.0)
}

/// Review interval widens as mastery grows
fn repetition_interval(mastery_level: f64) -> u32 {
    if mastery_level >= 80.0 {
        7
    } else if mastery_level >= 60.0 {
        3
    } else if mastery_level >= 40.0 {
        2
    } else {
        1
    }
}

fn validate_params(params: &StudySessionParams) -> Result<()> {
    if params.topic.trim().is_empty() {
        return Err(StudyError::invalid("topic", "must not be empty"));
    }
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&params.duration_minutes) {
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
