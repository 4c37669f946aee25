// src/providers/openai.rs

use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::OpenAIConfig;
use crate::errors::{AnimationError, Result};
use crate::providers::{
    api_error, ChatMessage, Completion, CompletionRequest, LlmProvider, TokenUsage,
};

/// A provider for OpenAI-compatible chat completion APIs (OpenAI, DeepSeek, ...).
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider`.
    pub fn new(client: Client, config: OpenAIConfig) -> Self {
        Self { client, config }
    }
}

impl LlmProvider for OpenAIProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));

        info!("📡 Calling OpenAI-compatible API: {} with model: {}", url, request.model);

        let body = OpenAIRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let start = Instant::now();

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        debug!("📥 OpenAI response status: {} ({}ms)", status, latency_ms);

        if !status.is_success() {
            return Err(api_error(resp).await);
        }

        let openai_resp: OpenAIResponse = resp.json().await?;

        let usage = openai_resp.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            input_tokens: Some(u.prompt_tokens),
            output_tokens: Some(u.completion_tokens),
        });

        let text = openai_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                AnimationError::UnexpectedResponse("No choices in response".to_string())
            })?
            .message
            .content
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AnimationError::EmptyResponse);
        }

        Ok(Completion {
            text,
            latency_ms,
            usage,
        })
    }
}
