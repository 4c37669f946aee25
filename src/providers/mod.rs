// src/providers/mod.rs

use reqwest::Client;
use serde::Serialize;

use crate::config::AppConfig;
use crate::errors::{AnimationError, Result};

pub mod anthropic;
pub mod ollama;
pub mod openai;

use anthropic::AnthropicProvider;
use ollama::OllamaProvider;
use openai::OpenAIProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One text-completion call: model, ordered role-tagged messages and sampling limits.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Concatenated system messages, for APIs that take the system prompt separately.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub latency_ms: u64,
    pub usage: TokenUsage,
}

/// A common trait for Large Language Model (LLM) providers.
///
/// Not object safe: callers are generic over the provider, and [`Provider`]
/// dispatches between the configured backends.
pub trait LlmProvider: Send + Sync {
    /// Sends the request and returns the completion text with latency and token usage.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<Completion>> + Send;
}

/// Parses a model string like "provider:model_name" and returns the provider and model.
/// Defaults to "openai" if no provider is specified.
pub fn parse_model_string(model_str: &str) -> (String, String) {
    match model_str.split_once(':') {
        Some((provider, model)) => (provider.to_string(), model.to_string()),
        None => ("openai".to_string(), model_str.to_string()),
    }
}

/// The configured backend.
pub enum Provider {
    OpenAI(OpenAIProvider),
    Anthropic(AnthropicProvider),
    Ollama(OllamaProvider),
}

impl Provider {
    /// Picks the backend named by `config.model`, returning it with the bare model name.
    pub fn from_config(config: &AppConfig, client: Client) -> Result<(Self, String)> {
        let (provider_name, model_name) = parse_model_string(&config.model);
        let provider = match provider_name.as_str() {
            "openai" | "deepseek" => {
                let openai_config = config
                    .openai
                    .as_ref()
                    .ok_or_else(|| AnimationError::ProviderNotFound(provider_name.clone()))?;
                Provider::OpenAI(OpenAIProvider::new(client, openai_config.clone()))
            }
            "anthropic" => {
                let anthropic_config = config
                    .anthropic
                    .as_ref()
                    .ok_or_else(|| AnimationError::ProviderNotFound("anthropic".to_string()))?;
                Provider::Anthropic(AnthropicProvider::new(client, anthropic_config.clone()))
            }
            "ollama" => {
                let ollama_config = config
                    .ollama
                    .as_ref()
                    .ok_or_else(|| AnimationError::ProviderNotFound("ollama".to_string()))?;
                Provider::Ollama(OllamaProvider::new(client, ollama_config.clone()))
            }
            other => return Err(AnimationError::ProviderNotFound(other.to_string())),
        };
        Ok((provider, model_name))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI(_) => "openai",
            Provider::Anthropic(_) => "anthropic",
            Provider::Ollama(_) => "ollama",
        }
    }
}

impl LlmProvider for Provider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        match self {
            Provider::OpenAI(p) => p.complete(request).await,
            Provider::Anthropic(p) => p.complete(request).await,
            Provider::Ollama(p) => p.complete(request).await,
        }
    }
}

/// Reads a non-success response body for error reporting.
pub(crate) async fn api_error(resp: reqwest::Response) -> AnimationError {
    let status = resp.status().as_u16();
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "Could not read error body".to_string());
    AnimationError::ApiError { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OllamaConfig, Settings};

    fn config(model: &str) -> AppConfig {
        AppConfig {
            openai: None,
            anthropic: None,
            ollama: Some(OllamaConfig {
                api_base: "http://localhost:11434".to_string(),
            }),
            model: model.to_string(),
            settings: Settings::default(),
        }
    }

    #[test]
    fn test_parse_model_string() {
        assert_eq!(
            parse_model_string("ollama:llama3"),
            ("ollama".to_string(), "llama3".to_string())
        );
        assert_eq!(
            parse_model_string("deepseek-chat"),
            ("openai".to_string(), "deepseek-chat".to_string())
        );
    }

    #[test]
    fn test_provider_selection() {
        let (provider, model) =
            Provider::from_config(&config("ollama:llama3"), Client::new()).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(model, "llama3");

        let err = Provider::from_config(&config("anthropic:claude"), Client::new())
            .err()
            .unwrap();
        assert!(matches!(err, AnimationError::ProviderNotFound(p) if p == "anthropic"));

        let err = Provider::from_config(&config("mystery:model"), Client::new())
            .err()
            .unwrap();
        assert!(matches!(err, AnimationError::ProviderNotFound(p) if p == "mystery"));
    }

    #[test]
    fn test_system_prompt_joins_system_messages() {
        let request = CompletionRequest {
            model: "m".to_string(),
            messages: vec![
                ChatMessage::system("a"),
                ChatMessage::user("u"),
                ChatMessage::system("b"),
            ],
            temperature: 0.3,
            max_tokens: 10,
        };
        assert_eq!(request.system_prompt().as_deref(), Some("a\n\nb"));
    }
}
