//! Ollama chat-API generator
//!
//! Non-streaming client for POST /api/chat. The whole reply is returned in
//! one round-trip; per-call latency is bounded by the client timeout.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GeneratorConfig;
use crate::errors::{Result, StudyError};
use crate::generator::{GenMessage, TextGenerator};
use crate::types::ChatRole;

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default model
pub const DEFAULT_MODEL: &str = "qwen2.5:7b-instruct";

/// Ollama-backed text generator
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    /// Create a generator with default settings
    pub fn new() -> Result<Self> {
        Self::from_config(&GeneratorConfig::default())
    }

    /// Create a generator from configuration
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(StudyError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Check if the Ollama server is reachable
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Get current model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(
        &self,
        messages: &[GenMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(WireMessage::from).collect(),
            stream: false,
            options: ChatOptions {
                num_predict: max_tokens,
                temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| StudyError::Generator(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StudyError::Generator(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| StudyError::Generator(format!("Failed to parse response: {}", e)))?;

        Ok(chat.message.content)
    }
}

/// Ollama chat request
#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl From<&GenMessage> for WireMessage {
    fn from(msg: &GenMessage) -> Self {
        let role = match msg.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
        };
        WireMessage {
            role: role.to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Ollama chat response (non-streaming)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: WireMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_creation() {
        let generator = OllamaGenerator::new().unwrap();
        assert_eq!(generator.base_url(), DEFAULT_OLLAMA_URL);
        assert_eq!(generator.model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let config = GeneratorConfig {
            base_url: "http://localhost:11434/".to_string(),
            model: "llama3.1:8b".to_string(),
            timeout_secs: 30,
        };
        let generator = OllamaGenerator::from_config(&config).unwrap();
        assert_eq!(generator.base_url(), "http://localhost:11434");
        assert_eq!(generator.model(), "llama3.1:8b");
    }

    #[test]
    fn test_wire_roles() {
        let wire = WireMessage::from(&GenMessage::system("s"));
        assert_eq!(wire.role, "system");

        let wire = WireMessage::from(&GenMessage::user("u"));
        assert_eq!(wire.role, "user");
    }

    #[tokio::test]
    #[ignore] // Requires Ollama running
    async fn test_generate_integration() {
        let generator = OllamaGenerator::new().unwrap();
        let reply = generator
            .generate(&[GenMessage::user("Say hi".to_string())], 16, 0.0)
            .await;
        assert!(reply.is_ok());
    }
}
