// src/api/state.rs
use crate::config::AppConfig;
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::providers::{LlmProvider, Provider};
use reqwest::Client;
use std::sync::Arc;

pub struct AppState<P = Provider> {
    pub pipeline: Arc<Pipeline<P>>,
}

// Manual impl: cloning the state never needs `P: Clone`.
impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl AppState {
    /// Builds the state with the provider selected by `config.model`.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let (provider, model) = Provider::from_config(config, Client::new())?;
        Ok(Self::with_provider(config, provider, model))
    }
}

impl<P: LlmProvider> AppState<P> {
    pub fn with_provider(config: &AppConfig, provider: P, model: impl Into<String>) -> Self {
        Self {
            pipeline: Arc::new(Pipeline::new(provider, model, config)),
        }
    }
}
