// src/providers/ollama.rs

use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::OllamaConfig;
use crate::errors::{AnimationError, Result};
use crate::providers::{
    api_error, ChatMessage, Completion, CompletionRequest, LlmProvider, TokenUsage,
};

/// A provider for interacting with local Ollama models.
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

impl OllamaProvider {
    /// Creates a new `OllamaProvider`.
    pub fn new(client: Client, config: OllamaConfig) -> Self {
        Self { client, config }
    }
}

impl LlmProvider for OllamaProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let url = format!("{}/api/chat", self.config.api_base.trim_end_matches('/'));

        info!("📡 Calling Ollama: {} with model: {}", url, request.model);

        let body = OllamaRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let start = Instant::now();

        let resp = self.client.post(&url).json(&body).send().await?;

        let status = resp.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        debug!("📥 Ollama response status: {} ({}ms)", status, latency_ms);

        if !status.is_success() {
            return Err(api_error(resp).await);
        }

        let ollama_resp: OllamaResponse = resp.json().await?;
        if ollama_resp.message.content.trim().is_empty() {
            return Err(AnimationError::EmptyResponse);
        }

        Ok(Completion {
            text: ollama_resp.message.content,
            latency_ms,
            usage: TokenUsage {
                input_tokens: ollama_resp.prompt_eval_count,
                output_tokens: ollama_resp.eval_count,
            },
        })
    }
}
