// src/providers/anthropic.rs

use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::AnthropicConfig;
use crate::errors::{AnimationError, Result};
use crate::providers::{api_error, Completion, CompletionRequest, LlmProvider, Role, TokenUsage};

/// A provider for interacting with Anthropic Claude models.
pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: ApiUsage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicProvider {
    /// Creates a new `AnthropicProvider`.
    pub fn new(client: Client, config: AnthropicConfig) -> Self {
        Self { client, config }
    }
}

impl LlmProvider for AnthropicProvider {
    /// System messages go in the top-level `system` field; the rest are sent as turns.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let url = format!("{}/v1/messages", self.config.api_base.trim_end_matches('/'));

        info!("📡 Calling Anthropic: {} with model: {}", url, request.model);

        let body = AnthropicRequest {
            model: &request.model,
            system: request.system_prompt(),
            messages: request
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| Message {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let start = Instant::now();

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        debug!("📥 Anthropic response status: {} ({}ms)", status, latency_ms);

        if !status.is_success() {
            return Err(api_error(resp).await);
        }

        let anthropic_resp: AnthropicResponse = resp.json().await?;

        let usage = TokenUsage {
            input_tokens: Some(anthropic_resp.usage.input_tokens),
            output_tokens: Some(anthropic_resp.usage.output_tokens),
        };

        let text = anthropic_resp
            .content
            .into_iter()
            .find(|block| block.content_type == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| {
                AnimationError::UnexpectedResponse("No text content in response".to_string())
            })?;

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
