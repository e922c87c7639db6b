//! AI text generation seam
//!
//! The core never talks to a model directly; it goes through the
//! [`TextGenerator`] trait so workflows can be driven by the Ollama client in
//! production and by scripted generators in tests. Callers always consume the
//! full text; there are no streaming semantics at this seam.

pub mod ollama;

pub use ollama::OllamaGenerator;

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::ChatRole;

/// One role-tagged message in a generation request
#[derive(Debug, Clone)]
pub struct GenMessage {
    pub role: ChatRole,
    pub content: String,
}

impl GenMessage {
    pub fn system(content: impl Into<String>) -> Self {
        GenMessage {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        GenMessage {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Synchronous-round-trip text generation: request in, text or failure out
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        messages: &[GenMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String>;
}
