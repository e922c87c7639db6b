//! Chat tutor
//!
//! Builds the tutoring prompt from a session's recent transcript and returns
//! the model's reply. Generator failures produce a templated reply instead of
//! an error; the gateway stores the finished turn via
//! `StudyStore::append_chat_turn`.

use std::sync::Arc;
use tracing::warn;

use crate::generator::{GenMessage, TextGenerator};
use crate::types::ChatMessage;

/// Most recent transcript messages carried into each prompt
const CONTEXT_MESSAGES: usize = 12;

/// Reply length bound, in tokens
const REPLY_MAX_TOKENS: u32 = 500;

/// Conversational tutor over a text generator
pub struct Tutor {
    generator: Arc<dyn TextGenerator>,
}

impl Tutor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Produce the assistant's next reply for a session
    pub async fn reply(&self, topic: &str, history: &[ChatMessage], user_text: &str) -> String {
        let mut messages = Vec::with_capacity(history.len().min(CONTEXT_MESSAGES) + 2);
        messages.push(GenMessage::system(format!(
            "You are a patient study tutor helping a student learn {}. \
             Explain step by step, check understanding, and stay on topic.",
            topic
        )));

        let recent_start = history.len().saturating_sub(CONTEXT_MESSAGES);
        for message in &history[recent_start..] {
            messages.push(GenMessage {
                role: message.role,
                content: message.content.clone(),
            });
        }
        messages.push(GenMessage::user(user_text));

        match self.generator.generate(&messages, REPLY_MAX_TOKENS, 0.7).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(topic, error = %e, "tutor reply failed, using template");
                format!(
                    "I couldn't reach the tutoring model just now. Let's keep working on {}. \
                     Could you try asking that again?",
                    topic
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Result, StudyError};
    use crate::types::ChatRole;
    use async_trait::async_trait;

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _: &[GenMessage], _: u32, _: f32) -> Result<String> {
            Err(StudyError::Generator("offline".to_string()))
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(
            &self,
            messages: &[GenMessage],
            _: u32,
            _: f32,
        ) -> Result<String> {
            Ok(format!("saw {} messages", messages.len()))
        }
    }

    fn history(len: usize) -> Vec<ChatMessage> {
        (0..len)
            .map(|i| ChatMessage {
                role: if i % 2 == 0 {
                    ChatRole::User
                } else {
                    ChatRole::Assistant
                },
                content: format!("msg {}", i),
                timestamp: i as i64,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_reply_falls_back_on_failure() {
        let tutor = Tutor::new(Arc::new(FailingGenerator));
        let reply = tutor.reply("Physics", &[], "What is inertia?").await;
        assert!(reply.contains("Physics"));
    }

    #[tokio::test]
    async fn test_context_window_is_bounded() {
        let tutor = Tutor::new(Arc::new(EchoGenerator));
        // system + 12 recent + new user message
        let reply = tutor.reply("Physics", &history(40), "next?").await;
        assert_eq!(reply, format!("saw {} messages", CONTEXT_MESSAGES + 2));
    }
}
